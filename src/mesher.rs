use log::debug;

use crate::{
    datatypes::{IndexBase, Line, Mesh, Triangle, Vertex},
    error::{FemError, Result},
};

pub(crate) fn check_dimension(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FemError::InvalidDimension(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

fn check_subdivisions(nx: usize, ny: usize) -> Result<()> {
    if nx < 1 || ny < 1 {
        return Err(FemError::InvalidSubdivision(format!(
            "nx and ny must be at least 1, got nx={nx}, ny={ny}"
        )));
    }
    Ok(())
}

/// Converts a real-valued subdivision count into an integer
///
/// # Arguments
/// * `value` - The count as supplied by the caller
///
/// # Returns
/// The count, if `value` is a positive integer
pub fn subdivisions_from_real(value: f64) -> Result<usize> {
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(FemError::InvalidSubdivision(format!(
            "subdivision count must be a positive integer, got {value}"
        )));
    }
    Ok(value as usize)
}

/// Node and triangle counts of an `nx` by `ny` grid
///
/// # Returns
/// `((nx + 1) * (ny + 1), 2 * nx * ny)`, or `InvalidSubdivision` when either
/// count does not fit in a `usize`
pub fn rect_grid_counts(nx: usize, ny: usize) -> Result<(usize, usize)> {
    check_subdivisions(nx, ny)?;

    let num_nodes = nx
        .checked_add(1)
        .zip(ny.checked_add(1))
        .and_then(|(cols, rows)| cols.checked_mul(rows));
    let num_triangles = nx.checked_mul(ny).and_then(|cells| cells.checked_mul(2));

    match (num_nodes, num_triangles) {
        (Some(num_nodes), Some(num_triangles)) => Ok((num_nodes, num_triangles)),
        _ => Err(FemError::InvalidSubdivision(format!(
            "a {nx} x {ny} grid has more nodes than can be indexed"
        ))),
    }
}

/// Lazily generates the nodes of a regular rectangular grid
///
/// Nodes are ordered row-major with x increasing fastest.
///
/// # Arguments
/// * `width` - Extent of the grid along x
/// * `height` - Extent of the grid along y
/// * `nx` - Number of cells along x
/// * `ny` - Number of cells along y
pub fn rect_node_iter(
    width: f64,
    height: f64,
    nx: usize,
    ny: usize,
) -> Result<impl Iterator<Item = Vertex>> {
    check_dimension("width", width)?;
    check_dimension("height", height)?;
    rect_grid_counts(nx, ny)?;

    let dx = width / nx as f64;
    let dy = height / ny as f64;

    Ok((0..=ny).flat_map(move |j| {
        (0..=nx).map(move |i| Vertex {
            x: i as f64 * dx,
            y: j as f64 * dy,
        })
    }))
}

/// Generates the nodes of a regular rectangular grid
///
/// # Returns
/// A vector of `(nx + 1) * (ny + 1)` vertices, ordered as [`rect_node_iter`]
pub fn rect_nodes(width: f64, height: f64, nx: usize, ny: usize) -> Result<Vec<Vertex>> {
    let nodes = rect_node_iter(width, height, nx, ny)?;
    let (num_nodes, _) = rect_grid_counts(nx, ny)?;

    let mut collected = Vec::with_capacity(num_nodes);
    collected.extend(nodes);
    Ok(collected)
}

/// Lazily generates triangle connectivity for a regular `nx` by `ny` grid
///
/// Each cell with corners n1 (bottom-left), n2 (bottom-right), n3 (top-right)
/// and n4 (top-left) is split into `(n1, n2, n4)` and `(n2, n3, n4)`. Cells
/// are visited row-major.
///
/// # Arguments
/// * `nx` - Number of cells along x
/// * `ny` - Number of cells along y
/// * `base` - Index convention of the emitted node numbers
pub fn rect_triangle_iter(
    nx: usize,
    ny: usize,
    base: IndexBase,
) -> Result<impl Iterator<Item = Triangle>> {
    rect_grid_counts(nx, ny)?;

    let offset = base.offset();
    let row = nx + 1;

    Ok((0..ny).flat_map(move |j| {
        (0..nx).flat_map(move |i| {
            let n1 = j * row + i + offset;
            let n2 = n1 + 1;
            let n4 = n1 + row;
            let n3 = n4 + 1;
            [
                Triangle {
                    nodes: [n1, n2, n4],
                },
                Triangle {
                    nodes: [n2, n3, n4],
                },
            ]
        })
    }))
}

/// Generates triangle connectivity for a regular `nx` by `ny` grid
///
/// # Returns
/// A vector of `2 * nx * ny` triangles, ordered as [`rect_triangle_iter`]
pub fn rect_triangles(nx: usize, ny: usize, base: IndexBase) -> Result<Vec<Triangle>> {
    let elements = rect_triangle_iter(nx, ny, base)?;
    let (_, num_triangles) = rect_grid_counts(nx, ny)?;

    let mut collected = Vec::with_capacity(num_triangles);
    collected.extend(elements);
    Ok(collected)
}

/// Generates a rectangular triangle mesh with 0-based connectivity
///
/// # Arguments
/// * `width` - Extent of the plate along x
/// * `height` - Extent of the plate along y
/// * `nx` - Number of cells along x
/// * `ny` - Number of cells along y
pub fn rect_mesh(width: f64, height: f64, nx: usize, ny: usize) -> Result<Mesh> {
    let nodes = rect_nodes(width, height, nx, ny)?;
    let elements = rect_triangles(nx, ny, IndexBase::Zero)?;

    debug!(
        "generated {} nodes and {} triangles for a {width} x {height} grid",
        nodes.len(),
        elements.len()
    );

    Ok(Mesh { nodes, elements })
}

/// Divides a straight member along x into equal line elements
///
/// # Arguments
/// * `length` - Total member length
/// * `num_elements` - Number of elements
///
/// # Returns
/// The `num_elements + 1` nodes and the `num_elements` lines, in that order
pub fn line_mesh(length: f64, num_elements: usize) -> Result<(Vec<Vertex>, Vec<Line>)> {
    check_dimension("length", length)?;
    if num_elements < 1 {
        return Err(FemError::InvalidSubdivision(
            "a line mesh needs at least one element".to_owned(),
        ));
    }

    let dx = length / num_elements as f64;
    let nodes = (0..=num_elements)
        .map(|i| Vertex {
            x: i as f64 * dx,
            y: 0.0,
        })
        .collect();
    let elements = (0..num_elements)
        .map(|i| Line { nodes: [i, i + 1] })
        .collect();

    Ok((nodes, elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::triangle_signed_area;

    #[test]
    fn test_counts_match_grid() {
        for (nx, ny) in [(1, 1), (3, 2), (5, 7)] {
            let mesh = rect_mesh(6.0, 4.0, nx, ny).unwrap();
            assert_eq!(mesh.nodes.len(), (nx + 1) * (ny + 1));
            assert_eq!(mesh.elements.len(), 2 * nx * ny);
        }
    }

    #[test]
    fn test_node_ordering_is_row_major() {
        let nodes = rect_nodes(6.0, 4.0, 3, 2).unwrap();
        assert_eq!(nodes[0], Vertex { x: 0.0, y: 0.0 });
        assert_eq!(nodes[1], Vertex { x: 2.0, y: 0.0 });
        assert_eq!(nodes[3], Vertex { x: 6.0, y: 0.0 });
        assert_eq!(nodes[4], Vertex { x: 0.0, y: 2.0 });
        assert_eq!(nodes[11], Vertex { x: 6.0, y: 4.0 });
    }

    #[test]
    fn test_first_cell_split() {
        let elements = rect_triangles(2, 1, IndexBase::Zero).unwrap();
        assert_eq!(elements[0].nodes, [0, 1, 3]);
        assert_eq!(elements[1].nodes, [1, 4, 3]);
        assert_eq!(elements[2].nodes, [1, 2, 4]);
        assert_eq!(elements[3].nodes, [2, 5, 4]);
    }

    #[test]
    fn test_one_based_connectivity() {
        let zero = rect_triangles(3, 2, IndexBase::Zero).unwrap();
        let one = rect_triangles(3, 2, IndexBase::One).unwrap();
        for (a, b) in zero.iter().zip(one.iter()) {
            for k in 0..3 {
                assert_eq!(a.nodes[k] + 1, b.nodes[k]);
            }
        }
        assert_eq!(one[0].nodes, [1, 2, 5]);
    }

    #[test]
    fn test_triangles_distinct_in_bounds_and_ccw() {
        let mesh = rect_mesh(3.0, 2.0, 4, 3).unwrap();
        for element in &mesh.elements {
            let [a, b, c] = element.nodes;
            assert!(a != b && b != c && a != c);
            assert!(element.nodes.iter().all(|n| *n < mesh.nodes.len()));

            let (p1, p2, p3) = (mesh.nodes[a], mesh.nodes[b], mesh.nodes[c]);
            assert!(triangle_signed_area(p1, p2, p3) > 0.0);
        }
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            rect_nodes(0.0, 1.0, 1, 1),
            Err(FemError::InvalidDimension(_))
        ));
        assert!(matches!(
            rect_nodes(1.0, -2.0, 1, 1),
            Err(FemError::InvalidDimension(_))
        ));
        assert!(matches!(
            rect_mesh(1.0, 1.0, 0, 1),
            Err(FemError::InvalidSubdivision(_))
        ));
    }

    #[test]
    fn test_subdivisions_from_real() {
        assert_eq!(subdivisions_from_real(4.0).unwrap(), 4);
        for bad in [0.0, -1.0, 2.5, f64::NAN] {
            assert!(matches!(
                subdivisions_from_real(bad),
                Err(FemError::InvalidSubdivision(_))
            ));
        }
    }

    #[test]
    fn test_grid_counts() {
        assert_eq!(rect_grid_counts(3, 2).unwrap(), (12, 12));
        assert!(matches!(
            rect_grid_counts(0, 2),
            Err(FemError::InvalidSubdivision(_))
        ));

        // 1e10 x 1e10 cells cannot be numbered
        let huge = subdivisions_from_real(1e10).unwrap();
        assert!(matches!(
            rect_grid_counts(huge, huge),
            Err(FemError::InvalidSubdivision(_))
        ));
        assert!(rect_triangle_iter(huge, huge, IndexBase::One).is_err());
        assert!(rect_node_iter(1.0, 1.0, usize::MAX, 1).is_err());
    }

    #[test]
    fn test_iterators_match_vectors() {
        let nodes: Vec<Vertex> = rect_node_iter(6.0, 4.0, 3, 2).unwrap().collect();
        assert_eq!(nodes, rect_nodes(6.0, 4.0, 3, 2).unwrap());

        let elements: Vec<Triangle> = rect_triangle_iter(3, 2, IndexBase::One).unwrap().collect();
        assert_eq!(elements, rect_triangles(3, 2, IndexBase::One).unwrap());
        assert_eq!(elements[11].nodes, [8, 12, 11]);
    }

    #[test]
    fn test_line_mesh() {
        let (nodes, elements) = line_mesh(3.0, 4).unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!(elements.len(), 4);
        assert!((nodes[4].x - 3.0).abs() < 1e-12);
        assert_eq!(elements[3].nodes, [3, 4]);
    }
}
