//! Closed-form local stiffness matrices.
//!
//! DOF ordering per node:
//! - 2D beam: `[ux, uy, rz]` (6x6)
//! - 3D frame: `[ux, uy, uz, rx, ry, rz]` (12x12)
//! - triangular plate: `[w, θx, θy]` (9x9)

use log::warn;
use nalgebra::{matrix, SMatrix};

use crate::{
    datatypes::{BeamSection, FrameSection, Line, PlateMaterial, SectionTable, Vertex, Vertex3},
    derived::triangle_signed_area,
    error::{FemError, Result},
};

/// Triangles with an area below this produce a zero stiffness matrix
pub const DEGENERATE_AREA: f64 = 1e-12;

/// Frame members shorter than this produce a zero stiffness matrix
pub const DEGENERATE_LENGTH: f64 = 1e-12;

/// Shear correction factor for the plate element
pub const SHEAR_CORRECTION: f64 = 5.0 / 6.0;

pub type BeamMatrix = SMatrix<f64, 6, 6>;
pub type FrameMatrix = SMatrix<f64, 12, 12>;
pub type PlateMatrix = SMatrix<f64, 9, 9>;

fn check_length(length: f64) -> Result<()> {
    if !length.is_finite() || length <= 0.0 {
        return Err(FemError::InvalidLength(length));
    }
    Ok(())
}

/// Computes the stiffness matrix of a 2D Euler-Bernoulli beam
///
/// # Arguments
/// * `section` - The beam's material and cross-section
/// * `length` - The element length
///
/// # Returns
/// A 6x6 stiffness matrix over `[ux1, uy1, rz1, ux2, uy2, rz2]`
pub fn beam2d_stiffness(section: &BeamSection, length: f64) -> Result<BeamMatrix> {
    check_length(length)?;

    let e = section.youngs_modulus;
    let ea = e * section.area / length;
    let ei3 = e * section.moment_of_inertia / length.powi(3);
    let ei2 = e * section.moment_of_inertia / length.powi(2);
    let ei1 = e * section.moment_of_inertia / length;

    Ok(matrix![
        ea,   0.0,         0.0,        -ea,  0.0,         0.0;
        0.0,  12.0 * ei3,  6.0 * ei2,  0.0,  -12.0 * ei3, 6.0 * ei2;
        0.0,  6.0 * ei2,   4.0 * ei1,  0.0,  -6.0 * ei2,  2.0 * ei1;
        -ea,  0.0,         0.0,        ea,   0.0,         0.0;
        0.0,  -12.0 * ei3, -6.0 * ei2, 0.0,  12.0 * ei3,  -6.0 * ei2;
        0.0,  6.0 * ei2,   2.0 * ei1,  0.0,  -6.0 * ei2,  4.0 * ei1;
    ])
}

/// Computes the local stiffness matrix of a 3D frame member
///
/// # Arguments
/// * `section` - The member's material and cross-section
/// * `length` - The member length
///
/// # Returns
/// A 12x12 stiffness matrix over `[ux, uy, uz, rx, ry, rz]` for each node
pub fn frame3d_stiffness(section: &FrameSection, length: f64) -> Result<FrameMatrix> {
    check_length(length)?;

    let e = section.youngs_modulus;
    let l = length;
    let ea = e * section.area / l;
    let gj = section.shear_modulus * section.torsional_constant / l;
    let ez3 = e * section.moment_of_inertia_z / l.powi(3);
    let ey3 = e * section.moment_of_inertia_y / l.powi(3);
    let ez2 = e * section.moment_of_inertia_z / l.powi(2);
    let ey2 = e * section.moment_of_inertia_y / l.powi(2);
    let ez1 = e * section.moment_of_inertia_z / l;
    let ey1 = e * section.moment_of_inertia_y / l;

    Ok(matrix![
        ea,  0.0,         0.0,         0.0, 0.0,        0.0,        -ea, 0.0,         0.0,         0.0, 0.0,        0.0;
        0.0, 12.0 * ez3,  0.0,         0.0, 0.0,        6.0 * ez2,  0.0, -12.0 * ez3, 0.0,         0.0, 0.0,        6.0 * ez2;
        0.0, 0.0,         12.0 * ey3,  0.0, -6.0 * ey2, 0.0,        0.0, 0.0,         -12.0 * ey3, 0.0, -6.0 * ey2, 0.0;
        0.0, 0.0,         0.0,         gj,  0.0,        0.0,        0.0, 0.0,         0.0,         -gj, 0.0,        0.0;
        0.0, 0.0,         -6.0 * ey2,  0.0, 4.0 * ey1,  0.0,        0.0, 0.0,         6.0 * ey2,   0.0, 2.0 * ey1,  0.0;
        0.0, 6.0 * ez2,   0.0,         0.0, 0.0,        4.0 * ez1,  0.0, -6.0 * ez2,  0.0,         0.0, 0.0,        2.0 * ez1;
        -ea, 0.0,         0.0,         0.0, 0.0,        0.0,        ea,  0.0,         0.0,         0.0, 0.0,        0.0;
        0.0, -12.0 * ez3, 0.0,         0.0, 0.0,        -6.0 * ez2, 0.0, 12.0 * ez3,  0.0,         0.0, 0.0,        -6.0 * ez2;
        0.0, 0.0,         -12.0 * ey3, 0.0, 6.0 * ey2,  0.0,        0.0, 0.0,         12.0 * ey3,  0.0, 6.0 * ey2,  0.0;
        0.0, 0.0,         0.0,         -gj, 0.0,        0.0,        0.0, 0.0,         0.0,         gj,  0.0,        0.0;
        0.0, 0.0,         -6.0 * ey2,  0.0, 2.0 * ey1,  0.0,        0.0, 0.0,         6.0 * ey2,   0.0, 4.0 * ey1,  0.0;
        0.0, 6.0 * ez2,   0.0,         0.0, 0.0,        2.0 * ez1,  0.0, -6.0 * ez2,  0.0,         0.0, 0.0,        4.0 * ez1;
    ])
}

/// Computes the frame stiffness matrix of a member spanning two nodes
///
/// A member of (near) zero length yields the zero matrix rather than an error.
pub fn frame3d_element_stiffness(start: &Vertex3, end: &Vertex3, section: &FrameSection) -> Result<FrameMatrix> {
    let length = start.distance_to(end);

    if length < DEGENERATE_LENGTH {
        warn!("zero-length frame member between {start:?} and {end:?}; using a zero stiffness matrix");
        return Ok(FrameMatrix::zeros());
    }

    frame3d_stiffness(section, length)
}

/// Computes the frame stiffness matrix of element `index`, reading its
/// properties from `sections`
///
/// # Arguments
/// * `nodes` - The 3D node coordinates
/// * `element` - The member connectivity
/// * `index` - Element index used for the property lookup
/// * `sections` - Per-element properties; missing entries read as 0
pub fn frame3d_stiffness_from_table(
    nodes: &[Vertex3],
    element: &Line,
    index: usize,
    sections: &SectionTable,
) -> Result<FrameMatrix> {
    let [i, j] = element.nodes;
    for node in [i, j] {
        if node >= nodes.len() {
            return Err(FemError::NodeOutOfRange {
                element: index,
                node,
                num_nodes: nodes.len(),
            });
        }
    }

    frame3d_element_stiffness(&nodes[i], &nodes[j], &sections.section(index))
}

fn check_plate_material(material: &PlateMaterial) -> Result<()> {
    if !(material.youngs_modulus > 0.0) {
        return Err(FemError::MustBePositive("E".to_owned()));
    }
    if !(material.thickness > 0.0) {
        return Err(FemError::MustBePositive("t".to_owned()));
    }
    Ok(())
}

/// Shape function gradients `(b, c)` of a linear triangle, unscaled
fn shape_gradients(vertices: &[Vertex; 3]) -> ([f64; 3], [f64; 3]) {
    let [v0, v1, v2] = vertices;

    let b = [v1.y - v2.y, v2.y - v0.y, v0.y - v1.y];
    let c = [v2.x - v1.x, v0.x - v2.x, v1.x - v0.x];

    (b, c)
}

/// Calculates the bending constitutive matrix `Db`
///
/// # Arguments
/// * `material` - The plate material
///
/// # Returns
/// A 3x3 moment-curvature matrix
pub fn compute_bending_constitutive_matrix(material: &PlateMaterial) -> SMatrix<f64, 3, 3> {
    let nu = material.poisson_ratio;
    let mut constitutive_mat: SMatrix<f64, 3, 3> = matrix![
        1.0, nu,  0.0;
        nu,  1.0, 0.0;
        0.0, 0.0, (1.0 - nu) / 2.0;
    ];

    constitutive_mat *=
        material.youngs_modulus * material.thickness.powi(3) / (12.0 * (1.0 - nu * nu));

    constitutive_mat
}

/// Calculates the curvature-displacement matrix `Bb`
///
/// # Arguments
/// * `vertices` - The triangle's corners
/// * `signed_area` - The signed area of the triangle
///
/// # Returns
/// A 3x9 matrix mapping `[w, θx, θy]` per node to `[κx, κy, κxy]`
pub fn compute_bending_strain_displacement_matrix(
    vertices: &[Vertex; 3],
    signed_area: f64,
) -> SMatrix<f64, 3, 9> {
    let (b, c) = shape_gradients(vertices);

    let mut strain_displacement_mat: SMatrix<f64, 3, 9> = SMatrix::zeros();
    for i in 0..3 {
        let theta_x = 3 * i + 1;
        let theta_y = 3 * i + 2;

        strain_displacement_mat[(0, theta_y)] = b[i];
        strain_displacement_mat[(1, theta_x)] = -c[i];
        strain_displacement_mat[(2, theta_x)] = -b[i];
        strain_displacement_mat[(2, theta_y)] = c[i];
    }

    strain_displacement_mat /= 2.0 * signed_area;

    strain_displacement_mat
}

/// Calculates the transverse shear strain-displacement matrix `Bs` at the
/// centroid, where every shape function equals 1/3
///
/// # Returns
/// A 2x9 matrix mapping `[w, θx, θy]` per node to `[γxz, γyz]`
pub fn compute_shear_strain_displacement_matrix(
    vertices: &[Vertex; 3],
    signed_area: f64,
) -> SMatrix<f64, 2, 9> {
    let (b, c) = shape_gradients(vertices);
    let inv_2a = 1.0 / (2.0 * signed_area);
    let n = 1.0 / 3.0;

    let mut strain_displacement_mat: SMatrix<f64, 2, 9> = SMatrix::zeros();
    for i in 0..3 {
        let w = 3 * i;

        // γxz = ∂w/∂x - θy
        strain_displacement_mat[(0, w)] = b[i] * inv_2a;
        strain_displacement_mat[(0, w + 2)] = -n;

        // γyz = ∂w/∂y + θx
        strain_displacement_mat[(1, w)] = c[i] * inv_2a;
        strain_displacement_mat[(1, w + 1)] = n;
    }

    strain_displacement_mat
}

/// Computes the bending stiffness matrix of a triangular plate element
///
/// # Arguments
/// * `vertices` - The triangle's corners
/// * `material` - The plate material
///
/// # Returns
/// A 9x9 matrix, all zero for a degenerate triangle
pub fn plate_bending_stiffness(vertices: &[Vertex; 3], material: &PlateMaterial) -> Result<PlateMatrix> {
    check_plate_material(material)?;

    let signed_area = triangle_signed_area(vertices[0], vertices[1], vertices[2]);
    let area = signed_area.abs();
    if area < DEGENERATE_AREA {
        return Ok(PlateMatrix::zeros());
    }

    let constitutive_mat = compute_bending_constitutive_matrix(material);
    let strain_displacement_mat = compute_bending_strain_displacement_matrix(vertices, signed_area);

    Ok((strain_displacement_mat.transpose() * constitutive_mat) * strain_displacement_mat * area)
}

/// Computes the transverse shear stiffness matrix of a triangular plate
/// element using one-point integration at the centroid
///
/// # Arguments
/// * `vertices` - The triangle's corners
/// * `material` - The plate material
///
/// # Returns
/// A 9x9 matrix, all zero for a degenerate triangle
pub fn plate_shear_stiffness(vertices: &[Vertex; 3], material: &PlateMaterial) -> Result<PlateMatrix> {
    check_plate_material(material)?;

    let signed_area = triangle_signed_area(vertices[0], vertices[1], vertices[2]);
    let area = signed_area.abs();
    if area < DEGENERATE_AREA {
        return Ok(PlateMatrix::zeros());
    }

    let shear_modulus = material.youngs_modulus / (2.0 * (1.0 + material.poisson_ratio));
    let shear_rigidity = SHEAR_CORRECTION * shear_modulus * material.thickness;
    let strain_displacement_mat = compute_shear_strain_displacement_matrix(vertices, signed_area);

    Ok(strain_displacement_mat.transpose() * strain_displacement_mat * (shear_rigidity * area))
}

/// Computes the total (bending + shear) stiffness of a triangular plate element
pub fn plate_stiffness(vertices: &[Vertex; 3], material: &PlateMaterial) -> Result<PlateMatrix> {
    let bending = plate_bending_stiffness(vertices, material)?;
    let shear = plate_shear_stiffness(vertices, material)?;

    Ok(bending + shear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::SVector;

    fn assert_symmetric<const N: usize>(k: &SMatrix<f64, N, N>) {
        let scale = k.amax().max(1.0);
        for i in 0..N {
            for j in 0..N {
                assert!(
                    (k[(i, j)] - k[(j, i)]).abs() <= 1e-10 * scale,
                    "K[{i},{j}] = {} but K[{j},{i}] = {}",
                    k[(i, j)],
                    k[(j, i)]
                );
            }
        }
    }

    fn assert_null<const N: usize>(k: &SMatrix<f64, N, N>, u: &SVector<f64, N>) {
        let scale = k.amax().max(1.0);
        let f = k * u;
        assert!(f.amax() <= 1e-9 * scale, "rigid motion produced forces {f:?}");
    }

    fn steel_beam() -> BeamSection {
        BeamSection {
            youngs_modulus: 210e9,
            area: 0.01,
            moment_of_inertia: 8.333e-6,
        }
    }

    fn steel_frame() -> FrameSection {
        FrameSection {
            youngs_modulus: 210e9,
            shear_modulus: 80.77e9,
            area: 0.01,
            moment_of_inertia_y: 4.2e-6,
            moment_of_inertia_z: 8.333e-6,
            torsional_constant: 1.1e-6,
        }
    }

    fn steel_plate() -> PlateMaterial {
        PlateMaterial {
            youngs_modulus: 210e9,
            poisson_ratio: 0.3,
            thickness: 0.1,
        }
    }

    fn unit_triangle() -> [Vertex; 3] {
        [
            Vertex { x: 0.0, y: 0.0 },
            Vertex { x: 1.0, y: 0.0 },
            Vertex { x: 0.0, y: 1.0 },
        ]
    }

    #[test]
    fn test_beam_entries() {
        let section = steel_beam();
        let l = 3.0;
        let k = beam2d_stiffness(&section, l).unwrap();
        let ei = section.youngs_modulus * section.moment_of_inertia;

        assert_relative_eq!(k[(0, 0)], section.youngs_modulus * section.area / l, max_relative = 1e-12);
        assert_relative_eq!(k[(0, 3)], -section.youngs_modulus * section.area / l, max_relative = 1e-12);
        assert_relative_eq!(k[(1, 1)], 12.0 * ei / l.powi(3), max_relative = 1e-12);
        assert_relative_eq!(k[(1, 2)], 6.0 * ei / l.powi(2), max_relative = 1e-12);
        assert_relative_eq!(k[(4, 5)], -6.0 * ei / l.powi(2), max_relative = 1e-12);
        assert_relative_eq!(k[(2, 5)], 2.0 * ei / l, max_relative = 1e-12);
        assert_relative_eq!(k[(5, 5)], 4.0 * ei / l, max_relative = 1e-12);
    }

    #[test]
    fn test_beam_symmetric_and_rigid_body_modes() {
        for l in [0.25, 1.0, 3.0, 12.5] {
            let k = beam2d_stiffness(&steel_beam(), l).unwrap();
            assert_symmetric(&k);

            // axial translation, transverse translation, rotation about node 1
            assert_null(&k, &SVector::from([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]));
            assert_null(&k, &SVector::from([0.0, 1.0, 0.0, 0.0, 1.0, 0.0]));
            assert_null(&k, &SVector::from([0.0, 0.0, 1.0, 0.0, l, 1.0]));
        }
    }

    #[test]
    fn test_beam_rejects_bad_length() {
        assert_eq!(
            beam2d_stiffness(&steel_beam(), 0.0),
            Err(FemError::InvalidLength(0.0))
        );
        assert!(matches!(
            frame3d_stiffness(&steel_frame(), -1.0),
            Err(FemError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_frame_symmetric_and_rigid_body_modes() {
        let l = 2.5;
        let k = frame3d_stiffness(&steel_frame(), l).unwrap();
        assert_symmetric(&k);

        // translations and the uniform twist
        for axis in 0..4 {
            let mut u = SVector::<f64, 12>::zeros();
            u[axis] = 1.0;
            u[axis + 6] = 1.0;
            assert_null(&k, &u);
        }

        let mut about_z = SVector::<f64, 12>::zeros();
        about_z[5] = 1.0;
        about_z[11] = 1.0;
        about_z[7] = l;
        assert_null(&k, &about_z);

        let mut about_y = SVector::<f64, 12>::zeros();
        about_y[4] = 1.0;
        about_y[10] = 1.0;
        about_y[8] = -l;
        assert_null(&k, &about_y);
    }

    #[test]
    fn test_frame_reduces_to_beam_in_plane() {
        let mut section = steel_frame();
        section.moment_of_inertia_y = 0.0;
        section.shear_modulus = 0.0;
        let l = 4.0;

        let frame = frame3d_stiffness(&section, l).unwrap();
        let beam = beam2d_stiffness(&section.in_plane(), l).unwrap();
        let in_plane = [0, 1, 5, 6, 7, 11];

        for (bi, fi) in in_plane.iter().enumerate() {
            for (bj, fj) in in_plane.iter().enumerate() {
                assert_relative_eq!(frame[(*fi, *fj)], beam[(bi, bj)], max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_frame_from_nodes_and_table() {
        let nodes = vec![
            Vertex3 { x: 0.0, y: 0.0, z: 0.0 },
            Vertex3 { x: 3.0, y: 4.0, z: 0.0 },
            Vertex3 { x: 3.0, y: 4.0, z: 0.0 },
        ];
        let mut table = SectionTable::default();
        table.insert(0, steel_frame());

        let k = frame3d_stiffness_from_table(&nodes, &Line { nodes: [0, 1] }, 0, &table).unwrap();
        assert_eq!(k, frame3d_stiffness(&steel_frame(), 5.0).unwrap());

        // no properties registered: everything reads as zero
        let empty = frame3d_stiffness_from_table(&nodes, &Line { nodes: [0, 1] }, 3, &table).unwrap();
        assert_eq!(empty, FrameMatrix::zeros());

        let zero_length =
            frame3d_stiffness_from_table(&nodes, &Line { nodes: [1, 2] }, 0, &table).unwrap();
        assert_eq!(zero_length, FrameMatrix::zeros());

        assert!(matches!(
            frame3d_stiffness_from_table(&nodes, &Line { nodes: [0, 9] }, 0, &table),
            Err(FemError::NodeOutOfRange { node: 9, .. })
        ));
    }

    #[test]
    fn test_plate_reference_entries() {
        let material = steel_plate();
        let nu = material.poisson_ratio;
        let d = material.youngs_modulus * material.thickness.powi(3) / (12.0 * (1.0 - nu * nu));
        let g = material.youngs_modulus / (2.0 * (1.0 + nu));

        let kb = plate_bending_stiffness(&unit_triangle(), &material).unwrap();
        assert_relative_eq!(kb[(2, 2)], 0.5 * d * (1.0 + (1.0 - nu) / 2.0), max_relative = 1e-12);
        for i in 0..9 {
            // no w coupling in bending
            assert_eq!(kb[(0, i)], 0.0);
        }

        let ks = plate_shear_stiffness(&unit_triangle(), &material).unwrap();
        assert_relative_eq!(ks[(0, 0)], SHEAR_CORRECTION * g * material.thickness, max_relative = 1e-12);
    }

    #[test]
    fn test_plate_symmetric_and_sum() {
        let vertices = [
            Vertex { x: 0.3, y: -0.2 },
            Vertex { x: 2.1, y: 0.4 },
            Vertex { x: 0.9, y: 1.7 },
        ];
        let material = steel_plate();

        let kb = plate_bending_stiffness(&vertices, &material).unwrap();
        let ks = plate_shear_stiffness(&vertices, &material).unwrap();
        let k = plate_stiffness(&vertices, &material).unwrap();

        assert_symmetric(&kb);
        assert_symmetric(&ks);
        assert_symmetric(&k);
        assert_eq!(k, kb + ks);
        for i in 0..9 {
            assert!(k[(i, i)] >= 0.0);
        }
    }

    #[test]
    fn test_plate_rigid_body_modes() {
        let vertices = [
            Vertex { x: 0.0, y: 0.0 },
            Vertex { x: 2.0, y: 0.5 },
            Vertex { x: 0.5, y: 1.5 },
        ];
        let k = plate_stiffness(&vertices, &steel_plate()).unwrap();

        let mut translation = SVector::<f64, 9>::zeros();
        let mut tilt_x = SVector::<f64, 9>::zeros();
        let mut tilt_y = SVector::<f64, 9>::zeros();
        for (i, v) in vertices.iter().enumerate() {
            translation[3 * i] = 1.0;

            // w = x with θy = 1 leaves γxz = 0
            tilt_x[3 * i] = v.x;
            tilt_x[3 * i + 2] = 1.0;

            // w = y with θx = -1 leaves γyz = 0
            tilt_y[3 * i] = v.y;
            tilt_y[3 * i + 1] = -1.0;
        }

        assert_null(&k, &translation);
        assert_null(&k, &tilt_x);
        assert_null(&k, &tilt_y);
    }

    #[test]
    fn test_plate_orientation_independent() {
        let ccw = unit_triangle();
        let cw = [ccw[0], ccw[2], ccw[1]];
        let material = steel_plate();

        let k_ccw = plate_stiffness(&ccw, &material).unwrap();
        let k_cw = plate_stiffness(&cw, &material).unwrap();

        // swap node 1 and node 2 blocks
        let perm = [0, 1, 2, 6, 7, 8, 3, 4, 5];
        for i in 0..9 {
            for j in 0..9 {
                assert_relative_eq!(k_cw[(i, j)], k_ccw[(perm[i], perm[j])], epsilon = 1e-6, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_degenerate_plate_is_zero() {
        let colinear = [
            Vertex { x: 0.0, y: 0.0 },
            Vertex { x: 1.0, y: 1.0 },
            Vertex { x: 2.0, y: 2.0 },
        ];
        let k = plate_stiffness(&colinear, &steel_plate()).unwrap();
        assert_eq!(k, PlateMatrix::zeros());
        assert!(k.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_plate_rejects_non_positive_material() {
        let mut material = steel_plate();
        material.youngs_modulus = 0.0;
        assert_eq!(
            plate_stiffness(&unit_triangle(), &material),
            Err(FemError::MustBePositive("E".to_owned()))
        );

        let mut material = steel_plate();
        material.thickness = -0.1;
        assert_eq!(
            plate_shear_stiffness(&unit_triangle(), &material),
            Err(FemError::MustBePositive("t".to_owned()))
        );
    }
}
