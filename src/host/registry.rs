use log::info;
use thiserror::Error;

use super::{ArgType, HostFunction};
use crate::error::FemError;

/// Largest argument count the host accepts for one function
pub const MAX_ARGS: usize = 10;

/// Describes a plugin function to the host
#[derive(Clone)]
pub struct FunctionInfo {
    pub name: &'static str,
    /// Comma separated parameter names shown by the host
    pub params: &'static str,
    pub description: &'static str,
    pub return_type: ArgType,
    pub arg_types: Vec<ArgType>,
    pub function: HostFunction,
}

impl std::fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionInfo")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("arg_types", &self.arg_types)
            .finish()
    }
}

/// The host's registration entry points
pub trait Registrar {
    fn create_user_function(&mut self, info: &FunctionInfo) -> bool;
    fn create_error_table(&mut self, messages: &[&'static str]) -> bool;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("{name} declares {count} arguments, the host accepts at most {MAX_ARGS}")]
    TooManyArguments { name: &'static str, count: usize },

    #[error("host refused to register {0}")]
    FunctionRefused(&'static str),

    #[error("host refused the error message table")]
    ErrorTableRefused,
}

/// Host-facing messages, in table order. Index `i` here is error `i + 1`.
const ERROR_MESSAGES: [&str; 16] = [
    "invalid dimension (must be > 0)",
    "subdivisions must be positive integers",
    "invalid length (must be > 0)",
    "invalid parameter",
    "must be a real number",
    "must be positive",
    "insufficient memory",
    "all DOFs are constrained",
    "stiffness matrix is singular",
    "solver did not converge",
    "interrupted by user",
    "node index out of range",
    "DOF index out of range",
    "element DOF count mismatch",
    "invalid input",
    "could not write results",
];

/// The error message table registered once at load time
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorTable {
    messages: Vec<&'static str>,
}

impl Default for ErrorTable {
    fn default() -> Self {
        Self {
            messages: ERROR_MESSAGES.to_vec(),
        }
    }
}

impl ErrorTable {
    pub fn messages(&self) -> &[&'static str] {
        &self.messages
    }

    /// Looks up the message for a 1-based error index
    pub fn message(&self, index: u16) -> Option<&'static str> {
        let slot = usize::from(index).checked_sub(1)?;
        self.messages.get(slot).copied()
    }
}

/// The 1-based index of an error in the [`ErrorTable`]
pub fn error_index(error: &FemError) -> u16 {
    match error {
        FemError::InvalidDimension(_) => 1,
        FemError::InvalidSubdivision(_) => 2,
        FemError::InvalidLength(_) => 3,
        FemError::InvalidParameter(_) => 4,
        FemError::MustBeReal(_) => 5,
        FemError::MustBePositive(_) => 6,
        FemError::InsufficientMemory => 7,
        FemError::NoFreeDofs => 8,
        FemError::SingularSystem(_) => 9,
        FemError::SolverDidNotConverge(_) => 10,
        FemError::Interrupted => 11,
        FemError::NodeOutOfRange { .. } => 12,
        FemError::DofOutOfRange { .. } => 13,
        FemError::DofMismatch { .. } => 14,
        FemError::Input(_) => 15,
        FemError::PostProcessor(_) => 16,
    }
}

/// Packs an error and the 1-based index of the offending argument
///
/// The error index sits in the low 16 bits and the argument in the high 16
/// bits. 0 is reserved for success.
pub fn status(error: &FemError, arg: usize) -> u32 {
    let arg = u16::try_from(arg).unwrap_or(u16::MAX);
    (u32::from(arg) << 16) | u32::from(error_index(error))
}

/// Registers every plugin function followed by the error table
///
/// # Arguments
/// * `registrar` - The host registration interface
///
/// # Returns
/// The number of functions registered. The first refusal aborts the load.
pub fn register_all<R: Registrar>(registrar: &mut R) -> Result<usize, RegistrationError> {
    let functions = super::functions::function_infos();

    for info in &functions {
        if info.arg_types.len() > MAX_ARGS {
            return Err(RegistrationError::TooManyArguments {
                name: info.name,
                count: info.arg_types.len(),
            });
        }
        if !registrar.create_user_function(info) {
            return Err(RegistrationError::FunctionRefused(info.name));
        }
    }

    if !registrar.create_error_table(ErrorTable::default().messages()) {
        return Err(RegistrationError::ErrorTableRefused);
    }

    info!("registered {} plugin functions", functions.len());

    Ok(functions.len())
}
