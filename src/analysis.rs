//! End-to-end runs built from the mesher, stiffness library, assembler and
//! solver: the cantilever verification and the plate analysis.

use log::info;
use nalgebra::DVector;

use crate::{
    assembler::{assemble_dense, assemble_sparse},
    config::{apply_boundary_conditions, distributed_loads, PlateModel},
    datatypes::{BeamSection, Line, Mesh, Triangle, BEAM_DOF, PLATE_DOF},
    derived::{cantilever_deflection, cantilever_rotation, clamped_plate_deflection},
    error::Result,
    mesher::{line_mesh, rect_mesh},
    solver::{compute_reactions, solve, solve_reduced, Constraints},
    stiffness::{beam2d_stiffness, plate_stiffness},
};

/// Tip response of a cantilever compared to the closed-form solution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CantileverResult {
    pub num_elements: usize,
    pub deflection: f64,
    pub rotation: f64,
    pub analytic_deflection: f64,
    pub analytic_rotation: f64,
}

/// Solves a cantilever clamped at x = 0 with a transverse point load at the tip
///
/// # Arguments
/// * `section` - The beam cross-section
/// * `length` - Total length of the cantilever
/// * `load` - Transverse tip load
/// * `num_elements` - Number of equal beam elements
///
/// # Returns
/// The FE tip deflection and rotation together with `PL³/(3EI)` and
/// `PL²/(2EI)`
pub fn cantilever(
    section: &BeamSection,
    length: f64,
    load: f64,
    num_elements: usize,
) -> Result<CantileverResult> {
    let (nodes, elements) = line_mesh(length, num_elements)?;

    let stiffness = assemble_dense(nodes.len(), BEAM_DOF, &elements, |_, element: &Line| {
        let [a, b] = element.nodes;
        beam2d_stiffness(section, nodes[b].x - nodes[a].x)
    })?;

    let num_dofs = nodes.len() * BEAM_DOF;
    let tip = nodes.len() - 1;
    let mut loads = DVector::zeros(num_dofs);
    loads[tip * BEAM_DOF + 1] = load;

    let mut constraints = Constraints::new();
    constraints.fix_node(0, BEAM_DOF);

    let displacements = solve_reduced(&stiffness, &loads, &constraints)?;

    Ok(CantileverResult {
        num_elements,
        deflection: displacements[tip * BEAM_DOF + 1],
        rotation: displacements[tip * BEAM_DOF + 2],
        analytic_deflection: cantilever_deflection(
            load,
            length,
            section.youngs_modulus,
            section.moment_of_inertia,
        )?,
        analytic_rotation: cantilever_rotation(
            load,
            length,
            section.youngs_modulus,
            section.moment_of_inertia,
        )?,
    })
}

/// Result of a plate analysis
#[derive(Debug, Clone)]
pub struct PlateSolution {
    pub mesh: Mesh,
    pub constraints: Constraints,
    /// `[w, theta_x, theta_y]` per node
    pub displacements: DVector<f64>,
    /// Nodal forces `K u`, including support reactions
    pub reactions: DVector<f64>,
}

impl PlateSolution {
    /// The `[w, theta_x, theta_y]` displacements of one node
    pub fn node_displacements(&self, node: usize) -> [f64; 3] {
        let start = node * PLATE_DOF;
        [
            self.displacements[start],
            self.displacements[start + 1],
            self.displacements[start + 2],
        ]
    }

    /// The transverse deflection with the largest magnitude, and its node
    pub fn max_deflection(&self) -> (usize, f64) {
        (0..self.mesh.nodes.len())
            .map(|node| (node, self.displacements[node * PLATE_DOF]))
            .fold((0, 0.0), |best, current| {
                if current.1.abs() > best.1.abs() {
                    current
                } else {
                    best
                }
            })
    }

    /// Sum of the transverse reactions at fixed w dofs
    pub fn total_vertical_reaction(&self) -> f64 {
        self.constraints
            .iter()
            .filter(|dof| dof % PLATE_DOF == 0)
            .map(|dof| self.reactions[dof])
            .sum()
    }
}

/// Meshes, assembles and solves a plate model
///
/// # Arguments
/// * `model` - The parsed plate model
///
/// # Returns
/// The mesh, constraints, displacements and reactions
pub fn run_plate(model: &PlateModel) -> Result<PlateSolution> {
    let metadata = &model.metadata;
    let mesh = rect_mesh(metadata.width, metadata.height, metadata.nx, metadata.ny)?;
    info!(
        "meshed {} x {} plate into {} nodes and {} elements",
        metadata.width,
        metadata.height,
        mesh.nodes.len(),
        mesh.elements.len()
    );

    let stiffness = assemble_sparse(
        mesh.nodes.len(),
        PLATE_DOF,
        &mesh.elements,
        |_, element: &Triangle| {
            let [a, b, c] = element.nodes;
            plate_stiffness(&[mesh.nodes[a], mesh.nodes[b], mesh.nodes[c]], &metadata.material)
        },
    )?;

    let loads = DVector::from_vec(distributed_loads(metadata, mesh.nodes.len()));
    let constraints = apply_boundary_conditions(&model.rules, &mesh.nodes);
    info!("fixed {} of {} dofs", constraints.len(), loads.len());

    let displacements = solve(&stiffness, &loads, &constraints, &model.solver)?;
    let reactions = compute_reactions(&stiffness, &displacements);

    Ok(PlateSolution {
        mesh,
        constraints,
        displacements,
        reactions,
    })
}

/// The clamped square plate estimate for a model, using its shorter side
pub fn plate_reference_deflection(model: &PlateModel) -> Result<f64> {
    let metadata = &model.metadata;
    clamped_plate_deflection(
        metadata.distributed_load,
        metadata.width.min(metadata.height),
        metadata.material.youngs_modulus,
        metadata.material.poisson_ratio,
        metadata.material.thickness,
    )
}
