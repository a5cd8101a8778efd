//! Typed reads through a foreign reference

use std::sync::Arc;

use super::convert::{ForeignToNative, FromForeign};
use super::foreign::ForeignHandle;
use crate::error::Result;
use crate::ir::Type;
use crate::runtime::Value;

/// Sends a sized `read` to a foreign object and converts the answer
#[derive(Clone)]
pub struct ForeignRead {
    target: Type,
    byte_size: usize,
    to_native: Arc<dyn FromForeign>,
}

impl ForeignRead {
    /// Reader producing values of type `target` with the default conversion
    pub fn new(target: Type) -> Self {
        Self::with_conversion(target, Arc::new(ForeignToNative))
    }

    pub fn with_conversion(target: Type, to_native: Arc<dyn FromForeign>) -> Self {
        ForeignRead {
            byte_size: target.byte_size(),
            target,
            to_native,
        }
    }

    pub fn target(&self) -> &Type {
        &self.target
    }

    /// Width of each read message
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Read at `offset` bytes into `object`
    pub fn execute(&self, object: &ForeignHandle, offset: i64) -> Result<Value> {
        let raw = object.read(offset, self.byte_size).map_err(|err| {
            tracing::warn!(offset, size = self.byte_size, error = %err, "foreign read failed");
            err
        })?;
        Ok(self.to_native.from_foreign(raw, &self.target)?)
    }
}

impl std::fmt::Debug for ForeignRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignRead")
            .field("target", &self.target)
            .field("byte_size", &self.byte_size)
            .finish()
    }
}
