//! Interpreter-managed allocations that have no native address

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Shared handle to a managed byte buffer
///
/// Handles compare by identity: two handles are equal only when they refer to
/// the same allocation.
#[derive(Clone)]
pub struct AllocationHandle(Arc<RwLock<Vec<u8>>>);

impl AllocationHandle {
    /// Allocate `size` zeroed bytes
    pub fn new(size: usize) -> Self {
        AllocationHandle(Arc::new(RwLock::new(vec![0; size])))
    }

    /// Wrap existing contents
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        AllocationHandle(Arc::new(RwLock::new(bytes)))
    }

    /// Allocation size in bytes
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// True for a zero-sized allocation
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn range(&self, offset: i64, len: usize) -> Result<std::ops::Range<usize>> {
        let size = self.len();
        let start = usize::try_from(offset).ok();
        match start.and_then(|start| start.checked_add(len).map(|end| start..end)) {
            Some(range) if range.end <= size => Ok(range),
            _ => Err(Error::fatal(
                "virtual allocation access",
                format!(
                    "{} bytes at offset {} outside allocation of {} bytes",
                    len, offset, size
                ),
            )),
        }
    }

    /// Read `len` bytes at `offset`
    pub fn read_bytes(&self, offset: i64, len: usize) -> Result<Vec<u8>> {
        let range = self.range(offset, len)?;
        Ok(self.0.read()[range].to_vec())
    }

    /// Write `data` at `offset`
    pub fn write_bytes(&self, offset: i64, data: &[u8]) -> Result<()> {
        let range = self.range(offset, data.len())?;
        self.0.write()[range].copy_from_slice(data);
        Ok(())
    }

    /// Read a little-endian `i64` at `offset`
    pub fn read_i64(&self, offset: i64) -> Result<i64> {
        let bytes = self.read_bytes(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(i64::from_le_bytes(buf))
    }

    /// Write a little-endian `i64` at `offset`
    pub fn write_i64(&self, offset: i64, value: i64) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// True if both handles refer to the same allocation
    pub fn ptr_eq(&self, other: &AllocationHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for AllocationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for AllocationHandle {}

impl fmt::Debug for AllocationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllocationHandle({} bytes)", self.len())
    }
}
