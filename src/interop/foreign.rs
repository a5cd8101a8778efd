//! The foreign object protocol
//!
//! Objects living outside the interpreter's memory answer a small message
//! set: a sized `read`, `execute`, and four boolean queries. Anything an
//! object does not understand reports [`ForeignError::UnsupportedMessage`]
//! (or `false` for the queries).

use std::fmt;
use std::sync::Arc;

use crate::error::ForeignError;

/// Result of a single foreign boundary message
pub type ForeignResult<T> = std::result::Result<T, ForeignError>;

/// A value as it crosses the foreign boundary
#[derive(Debug, Clone, PartialEq)]
pub enum RawForeignValue {
    /// Foreign null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer of any width up to 64 bits
    Int(i64),
    /// Floating value
    Float(f64),
    /// String
    String(String),
    /// Native pointer handed to or from the foreign side
    Pointer(u64),
    /// Another foreign object
    Object(ForeignHandle),
}

impl RawForeignValue {
    /// Short name of the variant, used in conversion errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawForeignValue::Null => "null",
            RawForeignValue::Bool(_) => "bool",
            RawForeignValue::Int(_) => "int",
            RawForeignValue::Float(_) => "float",
            RawForeignValue::String(_) => "string",
            RawForeignValue::Pointer(_) => "pointer",
            RawForeignValue::Object(_) => "object",
        }
    }
}

/// Messages a foreign object can receive
pub trait ForeignObject: Send + Sync + fmt::Debug {
    /// Read `byte_size` bytes worth of value at byte `offset`
    fn read(&self, offset: i64, byte_size: usize) -> ForeignResult<RawForeignValue> {
        let _ = (offset, byte_size);
        Err(ForeignError::unsupported_message("READ"))
    }

    /// Call the object
    fn execute(&self, args: &[RawForeignValue]) -> ForeignResult<RawForeignValue> {
        let _ = args;
        Err(ForeignError::unsupported_message("EXECUTE"))
    }

    fn is_boxed(&self) -> bool {
        false
    }

    fn is_executable(&self) -> bool {
        false
    }

    fn is_null(&self) -> bool {
        false
    }

    fn has_size(&self) -> bool {
        false
    }
}

/// Shared reference to a foreign object, compared by identity
#[derive(Clone)]
pub struct ForeignHandle(Arc<dyn ForeignObject>);

impl ForeignHandle {
    /// Wrap a foreign object
    pub fn new<T: ForeignObject + 'static>(object: T) -> Self {
        ForeignHandle(Arc::new(object))
    }

    /// Wrap an already shared foreign object
    pub fn from_arc(object: Arc<dyn ForeignObject>) -> Self {
        ForeignHandle(object)
    }

    /// Address of the referenced object, stable for its lifetime
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// True if both handles reference the same object
    pub fn ptr_eq(&self, other: &ForeignHandle) -> bool {
        self.identity() == other.identity()
    }

    pub fn read(&self, offset: i64, byte_size: usize) -> ForeignResult<RawForeignValue> {
        self.0.read(offset, byte_size)
    }

    pub fn execute(&self, args: &[RawForeignValue]) -> ForeignResult<RawForeignValue> {
        self.0.execute(args)
    }

    pub fn is_boxed(&self) -> bool {
        self.0.is_boxed()
    }

    pub fn is_executable(&self) -> bool {
        self.0.is_executable()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn has_size(&self) -> bool {
        self.0.has_size()
    }
}

impl PartialEq for ForeignHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ForeignHandle {}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
