//! Adapter exposing the FEM core as numbered plugin functions of a
//! computer-algebra host.
//!
//! The host is never reached through process-wide state: every call receives
//! a [`HostServices`] capability, result arrays are acquired through it as
//! [`HostBuffer`]s, and failures come back as packed status codes indexing
//! the registered [`ErrorTable`].

pub mod buffer;
pub mod functions;
pub mod registry;

use nalgebra::DMatrix;

use crate::error::FemError;

pub use buffer::{HostBlock, HostBuffer, HostResource};
pub use registry::{
    error_index, register_all, status, ErrorTable, FunctionInfo, Registrar, RegistrationError,
    MAX_ARGS,
};

/// A host scalar argument
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComplexScalar {
    pub real: f64,
    pub imag: f64,
}

impl ComplexScalar {
    pub fn real(value: f64) -> Self {
        Self {
            real: value,
            imag: 0.0,
        }
    }
}

/// A host matrix with column-major storage
///
/// Either part may be absent when it is entirely zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostMatrix {
    pub rows: usize,
    pub cols: usize,
    pub real: Option<Vec<f64>>,
    pub imag: Option<Vec<f64>>,
}

impl HostMatrix {
    /// Builds a real-only matrix from a column-major slice
    pub fn from_column_slice(rows: usize, cols: usize, values: &[f64]) -> Self {
        Self {
            rows,
            cols,
            real: Some(values.to_vec()),
            imag: None,
        }
    }

    /// Real part of one entry; an absent real part reads as 0
    pub fn real_at(&self, row: usize, col: usize) -> f64 {
        match &self.real {
            Some(real) => real[col * self.rows + row],
            None => 0.0,
        }
    }

    pub fn set_real(&mut self, row: usize, col: usize, value: f64) {
        if let Some(real) = &mut self.real {
            real[col * self.rows + row] = value;
        }
    }

    /// True when the imaginary part is absent or all zero
    pub fn is_real(&self) -> bool {
        match &self.imag {
            Some(imag) => imag.iter().all(|v| *v == 0.0),
            None => true,
        }
    }

    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.rows, self.cols, |row, col| self.real_at(row, col))
    }

    /// Copies `values` into the real part, which must have the same shape
    pub fn copy_from<R, C, S>(&mut self, values: &nalgebra::Matrix<f64, R, C, S>)
    where
        R: nalgebra::Dim,
        C: nalgebra::Dim,
        S: nalgebra::RawStorage<f64, R, C>,
    {
        for col in 0..self.cols.min(values.ncols()) {
            for row in 0..self.rows.min(values.nrows()) {
                self.set_real(row, col, values[(row, col)]);
            }
        }
    }
}

/// Type tag of an argument or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    ComplexScalar,
    ComplexArray,
}

/// An argument as passed by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostArg<'a> {
    Scalar(ComplexScalar),
    Array(&'a HostMatrix),
}

/// A result handed back to the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Scalar(ComplexScalar),
    Array(HostMatrix),
}

/// Routines the host provides to plugin functions
pub trait HostServices {
    /// Allocates a block of `size` bytes
    ///
    /// Part of the host's allocator pair. Plugin results are all arrays, so
    /// the functions here only go through [`HostServices::allocate_array`].
    fn allocate(&self, size: usize) -> Option<HostBlock>;
    fn free(&self, block: HostBlock);
    /// Allocates a `rows` x `cols` array with the requested parts zeroed
    fn allocate_array(&self, rows: usize, cols: usize, real: bool, imag: bool) -> Option<HostMatrix>;
    fn free_array(&self, array: HostMatrix);
    /// True once the user has asked the host to stop evaluating
    fn user_interrupted(&self) -> bool;
}

/// An error tagged with the 1-based argument it concerns; 0 means the
/// function as a whole
#[derive(Debug, Clone, PartialEq)]
pub struct ArgError {
    pub error: FemError,
    pub arg: usize,
}

impl ArgError {
    pub fn at(error: FemError, arg: usize) -> Self {
        Self { error, arg }
    }

    /// The packed status code reported to the host
    pub fn status(&self) -> u32 {
        status(&self.error, self.arg)
    }
}

impl From<FemError> for ArgError {
    fn from(error: FemError) -> Self {
        Self { error, arg: 0 }
    }
}

pub type HostResult<T> = std::result::Result<T, ArgError>;

/// Signature shared by every plugin function
pub type HostFunction = fn(&dyn HostServices, &[HostArg]) -> HostResult<HostValue>;

/// Evaluates a plugin function the way the host does
///
/// # Returns
/// The result on success, otherwise no result and the packed status code
pub fn call(host: &dyn HostServices, info: &FunctionInfo, args: &[HostArg]) -> (Option<HostValue>, u32) {
    match (info.function)(host, args) {
        Ok(value) => (Some(value), 0),
        Err(err) => {
            log::debug!("{} failed on argument {}: {}", info.name, err.arg, err.error);
            (None, err.status())
        }
    }
}
