//! Ready-made foreign objects for embedders and tests

use std::fmt;

use super::foreign::{ForeignObject, ForeignResult, RawForeignValue};
use crate::error::ForeignError;

/// Host code callable across the foreign boundary
pub trait ForeignCallable: Send + Sync + 'static {
    /// Run with already escaped arguments
    fn call(&self, args: &[RawForeignValue]) -> ForeignResult<RawForeignValue>;
}

impl<F> ForeignCallable for F
where
    F: for<'a> Fn(&'a [RawForeignValue]) -> ForeignResult<RawForeignValue> + Send + Sync + 'static,
{
    fn call(&self, args: &[RawForeignValue]) -> ForeignResult<RawForeignValue> {
        self(args)
    }
}

/// Executable foreign object with a fixed arity
pub struct ForeignFunction {
    name: String,
    arity: usize,
    body: Box<dyn ForeignCallable>,
}

impl ForeignFunction {
    pub fn new(name: impl Into<String>, arity: usize, body: impl ForeignCallable) -> Self {
        ForeignFunction {
            name: name.into(),
            arity,
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl ForeignObject for ForeignFunction {
    fn execute(&self, args: &[RawForeignValue]) -> ForeignResult<RawForeignValue> {
        if args.len() != self.arity {
            return Err(ForeignError::Arity {
                expected: self.arity,
                actual: args.len(),
            });
        }
        self.body.call(args)
    }

    fn is_executable(&self) -> bool {
        true
    }
}

impl fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignFunction({}/{})", self.name, self.arity)
    }
}

/// Foreign array read element-wise
///
/// A read of `n` bytes at byte offset `o` returns element `o / n`.
#[derive(Debug, Clone, Default)]
pub struct ForeignArray {
    elements: Vec<RawForeignValue>,
}

impl ForeignArray {
    pub fn new(elements: Vec<RawForeignValue>) -> Self {
        ForeignArray { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl ForeignObject for ForeignArray {
    fn read(&self, offset: i64, byte_size: usize) -> ForeignResult<RawForeignValue> {
        if byte_size == 0 || offset < 0 {
            return Err(ForeignError::unsupported_message("READ"));
        }
        let index = offset as usize / byte_size;
        self.elements.get(index).cloned().ok_or_else(|| {
            ForeignError::unsupported_message(format!(
                "READ index {} of {}",
                index,
                self.elements.len()
            ))
        })
    }

    fn has_size(&self) -> bool {
        true
    }
}

/// The foreign null object
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignNull;

impl ForeignObject for ForeignNull {
    fn is_null(&self) -> bool {
        true
    }
}

/// A boxed foreign scalar or string
#[derive(Debug, Clone)]
pub struct ForeignBox(RawForeignValue);

impl ForeignBox {
    pub fn new(value: RawForeignValue) -> Self {
        ForeignBox(value)
    }

    /// The boxed value
    pub fn value(&self) -> &RawForeignValue {
        &self.0
    }
}

impl ForeignObject for ForeignBox {
    /// Only the box itself (offset 0) can be read
    fn read(&self, offset: i64, _byte_size: usize) -> ForeignResult<RawForeignValue> {
        if offset != 0 {
            return Err(ForeignError::unsupported_message("READ"));
        }
        Ok(self.0.clone())
    }

    fn is_boxed(&self) -> bool {
        true
    }
}
