pub mod analysis;
pub mod assembler;
pub mod config;
pub mod datatypes;
pub mod derived;
pub mod error;
pub mod host;
pub mod mesher;
pub mod post_processor;
pub mod solver;
pub mod stiffness;

pub use error::{FemError, Result};
