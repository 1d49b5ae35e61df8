use std::collections::HashMap;

/// `[ux, uy, rz]`
pub const BEAM_DOF: usize = 3;
/// `[ux, uy, uz, rx, ry, rz]`
pub const FRAME_DOF: usize = 6;
/// `[w, theta_x, theta_y]`
pub const PLATE_DOF: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex3 {
    pub fn distance_to(&self, other: &Vertex3) -> f64 {
        f64::sqrt(
            f64::powi(other.x - self.x, 2)
                + f64::powi(other.y - self.y, 2)
                + f64::powi(other.z - self.z, 2),
        )
    }
}

/// Three-node triangle, counter-clockwise for meshes built by the mesher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub nodes: [usize; 3],
}

/// Two-node line (beam or frame) element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub nodes: [usize; 2],
}

/// Anything that can be scattered into a global matrix by node indices
pub trait Connectivity {
    fn node_indices(&self) -> &[usize];
}

impl Connectivity for Triangle {
    fn node_indices(&self) -> &[usize] {
        &self.nodes
    }
}

impl Connectivity for Line {
    fn node_indices(&self) -> &[usize] {
        &self.nodes
    }
}

/// Convention for node numbering in emitted connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    #[default]
    Zero,
    One,
}

impl IndexBase {
    pub fn offset(&self) -> usize {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }
}

/// Nodes and triangles of a generated mesh. Connectivity is 0-based.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub nodes: Vec<Vertex>,
    pub elements: Vec<Triangle>,
}

/// Cross-section of an in-plane Euler-Bernoulli beam
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSection {
    pub youngs_modulus: f64,
    pub area: f64,
    pub moment_of_inertia: f64,
}

/// Cross-section of a 3D frame member
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSection {
    pub youngs_modulus: f64,
    pub shear_modulus: f64,
    pub area: f64,
    pub moment_of_inertia_y: f64,
    pub moment_of_inertia_z: f64,
    pub torsional_constant: f64,
}

impl FrameSection {
    /// The in-plane beam carried by this section (bending about z)
    pub fn in_plane(&self) -> BeamSection {
        BeamSection {
            youngs_modulus: self.youngs_modulus,
            area: self.area,
            moment_of_inertia: self.moment_of_inertia_z,
        }
    }
}

/// Frame properties keyed by element index. Missing entries read as 0.
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    pub youngs_moduli: HashMap<usize, f64>,
    pub shear_moduli: HashMap<usize, f64>,
    pub areas: HashMap<usize, f64>,
    pub moments_of_inertia_y: HashMap<usize, f64>,
    pub moments_of_inertia_z: HashMap<usize, f64>,
    pub torsional_constants: HashMap<usize, f64>,
}

impl SectionTable {
    /// Registers every property of `section` for element `index`
    pub fn insert(&mut self, index: usize, section: FrameSection) {
        self.youngs_moduli.insert(index, section.youngs_modulus);
        self.shear_moduli.insert(index, section.shear_modulus);
        self.areas.insert(index, section.area);
        self.moments_of_inertia_y
            .insert(index, section.moment_of_inertia_y);
        self.moments_of_inertia_z
            .insert(index, section.moment_of_inertia_z);
        self.torsional_constants
            .insert(index, section.torsional_constant);
    }

    pub fn section(&self, index: usize) -> FrameSection {
        let lookup = |m: &HashMap<usize, f64>| m.get(&index).copied().unwrap_or(0.0);

        FrameSection {
            youngs_modulus: lookup(&self.youngs_moduli),
            shear_modulus: lookup(&self.shear_moduli),
            area: lookup(&self.areas),
            moment_of_inertia_y: lookup(&self.moments_of_inertia_y),
            moment_of_inertia_z: lookup(&self.moments_of_inertia_z),
            torsional_constant: lookup(&self.torsional_constants),
        }
    }
}

/// Isotropic plate material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateMaterial {
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub thickness: f64,
}
