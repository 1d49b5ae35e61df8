use thiserror::Error;

pub type Result<T> = std::result::Result<T, FemError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FemError {
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("invalid subdivision: {0}")]
    InvalidSubdivision(String),

    #[error("invalid length (must be > 0): {0}")]
    InvalidLength(f64),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0} must be a real number")]
    MustBeReal(String),

    #[error("{0} must be positive")]
    MustBePositive(String),

    #[error("insufficient memory")]
    InsufficientMemory,

    #[error("all DOFs are constrained")]
    NoFreeDofs,

    #[error("singular system: {0}")]
    SingularSystem(String),

    #[error("solver did not converge: {0}")]
    SolverDidNotConverge(String),

    #[error("interrupted by user")]
    Interrupted,

    #[error("element {element} references node {node}, but only {num_nodes} nodes exist")]
    NodeOutOfRange {
        element: usize,
        node: usize,
        num_nodes: usize,
    },

    #[error("dof {dof} is out of range for a system with {num_dofs} dofs")]
    DofOutOfRange { dof: usize, num_dofs: usize },

    #[error("local matrix has {found} dofs, expected {expected}")]
    DofMismatch { expected: usize, found: usize },

    #[error("Input error: {0}")]
    Input(String),

    #[error("Post Processor error: {0}")]
    PostProcessor(String),
}
