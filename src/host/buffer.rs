use std::ops::{Deref, DerefMut};

use super::{HostMatrix, HostServices};
use crate::error::{FemError, Result};

/// A raw block of host memory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostBlock {
    pub bytes: Vec<u8>,
}

/// Something acquired from the host that must be given back to it
pub trait HostResource: Default {
    fn release(self, host: &dyn HostServices);
}

impl HostResource for HostMatrix {
    fn release(self, host: &dyn HostServices) {
        host.free_array(self)
    }
}

/// Scoped ownership of a host allocation
///
/// The resource goes back to the host that allocated it when the guard is
/// dropped, so every early return releases it. [`HostBuffer::into_result`]
/// hands it over instead.
pub struct HostBuffer<'h, R: HostResource> {
    host: &'h dyn HostServices,
    resource: R,
    owned: bool,
}

impl<'h> HostBuffer<'h, HostMatrix> {
    /// Allocates a real-valued `rows` x `cols` result array
    pub fn matrix(host: &'h dyn HostServices, rows: usize, cols: usize) -> Result<Self> {
        match host.allocate_array(rows, cols, true, false) {
            Some(resource) => Ok(Self {
                host,
                resource,
                owned: true,
            }),
            None => Err(FemError::InsufficientMemory),
        }
    }
}

impl<'h, R: HostResource> HostBuffer<'h, R> {
    /// Gives up ownership; the host now holds the resource as a result
    pub fn into_result(mut self) -> R {
        self.owned = false;
        std::mem::take(&mut self.resource)
    }
}

impl<'h, R: HostResource> Deref for HostBuffer<'h, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<'h, R: HostResource> DerefMut for HostBuffer<'h, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}

impl<'h, R: HostResource> Drop for HostBuffer<'h, R> {
    fn drop(&mut self) {
        if self.owned {
            self.owned = false;
            std::mem::take(&mut self.resource).release(self.host);
        }
    }
}
