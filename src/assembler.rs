use log::debug;
use nalgebra::{DMatrix, SMatrix};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::{
    datatypes::Connectivity,
    error::{FemError, Result},
};

/// Local entries at or below this magnitude are left out of sparse assembly
pub const SPARSE_DROP_TOLERANCE: f64 = 1e-15;

/// Maps an element's nodes to global DOF indices
///
/// # Arguments
/// * `nodes` - The element's node indices
/// * `dof_per_node` - Number of DOFs carried by each node
///
/// # Returns
/// `node * dof_per_node + offset` for every node and local offset, in
/// element order
pub fn global_dofs(nodes: &[usize], dof_per_node: usize) -> Vec<usize> {
    nodes
        .iter()
        .flat_map(|node| (0..dof_per_node).map(move |offset| node * dof_per_node + offset))
        .collect()
}

/// Checks connectivity and local matrix size for one element
fn element_dofs<E: Connectivity>(
    index: usize,
    element: &E,
    num_nodes: usize,
    dof_per_node: usize,
    local_size: usize,
) -> Result<Vec<usize>> {
    let nodes = element.node_indices();

    if let Some(node) = nodes.iter().find(|n| **n >= num_nodes) {
        return Err(FemError::NodeOutOfRange {
            element: index,
            node: *node,
            num_nodes,
        });
    }

    let expected = nodes.len() * dof_per_node;
    if expected != local_size {
        return Err(FemError::DofMismatch {
            expected,
            found: local_size,
        });
    }

    Ok(global_dofs(nodes, dof_per_node))
}

/// Compiles element stiffness matrices into a dense total stiffness matrix
///
/// # Arguments
/// * `num_nodes` - Number of nodes in the model
/// * `dof_per_node` - Number of DOFs carried by each node
/// * `elements` - The element connectivity
/// * `local_stiffness` - Builds the local matrix of element `i`
///
/// # Returns
/// A square matrix of size `num_nodes * dof_per_node`. Contributions at shared
/// nodes are summed.
pub fn assemble_dense<E, F, const N: usize>(
    num_nodes: usize,
    dof_per_node: usize,
    elements: &[E],
    mut local_stiffness: F,
) -> Result<DMatrix<f64>>
where
    E: Connectivity,
    F: FnMut(usize, &E) -> Result<SMatrix<f64, N, N>>,
{
    let size = num_nodes * dof_per_node;
    let mut total_stiffness_matrix: DMatrix<f64> = DMatrix::zeros(size, size);

    for (i, element) in elements.iter().enumerate() {
        let dofs = element_dofs(i, element, num_nodes, dof_per_node, N)?;
        let stiffness_mat = local_stiffness(i, element)?;

        for (local_row, global_row) in dofs.iter().enumerate() {
            for (local_col, global_col) in dofs.iter().enumerate() {
                total_stiffness_matrix[(*global_row, *global_col)] +=
                    stiffness_mat[(local_row, local_col)];
            }
        }
    }

    debug!(
        "assembled {} elements into a dense {size}x{size} stiffness matrix",
        elements.len()
    );

    Ok(total_stiffness_matrix)
}

/// Compiles element stiffness matrices into a sparse total stiffness matrix
///
/// Same contract as [`assemble_dense`], except that local entries with
/// magnitude at or below [`SPARSE_DROP_TOLERANCE`] are skipped.
pub fn assemble_sparse<E, F, const N: usize>(
    num_nodes: usize,
    dof_per_node: usize,
    elements: &[E],
    mut local_stiffness: F,
) -> Result<CsrMatrix<f64>>
where
    E: Connectivity,
    F: FnMut(usize, &E) -> Result<SMatrix<f64, N, N>>,
{
    let size = num_nodes * dof_per_node;
    let mut triplets: CooMatrix<f64> = CooMatrix::new(size, size);

    for (i, element) in elements.iter().enumerate() {
        let dofs = element_dofs(i, element, num_nodes, dof_per_node, N)?;
        let stiffness_mat = local_stiffness(i, element)?;

        for (local_row, global_row) in dofs.iter().enumerate() {
            for (local_col, global_col) in dofs.iter().enumerate() {
                let value = stiffness_mat[(local_row, local_col)];
                if value.abs() > SPARSE_DROP_TOLERANCE {
                    triplets.push(*global_row, *global_col, value);
                }
            }
        }
    }

    // duplicate triplets are summed on conversion
    let total_stiffness_matrix = CsrMatrix::from(&triplets);

    debug!(
        "assembled {} elements into a sparse {size}x{size} stiffness matrix with {} stored entries",
        elements.len(),
        total_stiffness_matrix.nnz()
    );

    Ok(total_stiffness_matrix)
}

/// Expands a sparse matrix into dense storage
pub fn to_dense(matrix: &CsrMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (row, col, value) in matrix.triplet_iter() {
        dense[(row, col)] += *value;
    }
    dense
}
