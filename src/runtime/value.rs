use std::fmt;

use super::address::Address;
use super::float80::Float80;
use super::ivarbit::IVarBit;

/// Native code pointer wrapped as a callable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(u64);

impl FunctionHandle {
    /// Wrap a native function pointer
    pub fn create_handle(pointer: u64) -> Self {
        FunctionHandle(pointer)
    }

    /// The wrapped function pointer
    pub fn pointer(self) -> u64 {
        self.0
    }

    /// True for the null function pointer
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Runtime value representation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // Fixed-width integers
    /// `i1`
    I1(bool),
    /// `i8`
    I8(i8),
    /// `i16`
    I16(i16),
    /// `i32`
    I32(i32),
    /// `i64`
    I64(i64),

    /// Integer of any other width, carrying its width
    IVarBit(IVarBit),

    // Floating point
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `x86_fp80`
    Float80(Float80),

    /// Native function pointer
    Function(FunctionHandle),

    /// Any address variant; also the result of loading an aggregate
    Address(Address),

    /// Result of a call returning `void`
    Void,
}

impl Value {
    /// Returns the type name as a string
    pub fn type_name(&self) -> String {
        match self {
            Value::I1(_) => "i1".to_string(),
            Value::I8(_) => "i8".to_string(),
            Value::I16(_) => "i16".to_string(),
            Value::I32(_) => "i32".to_string(),
            Value::I64(_) => "i64".to_string(),
            Value::IVarBit(v) => format!("i{}", v.bit_width()),
            Value::Float(_) => "float".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Float80(_) => "x86_fp80".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::Address(address) => format!("{} address", address.kind()),
            Value::Void => "void".to_string(),
        }
    }

    /// Sign-extended integer payload of any integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I1(b) => Some(*b as i64),
            Value::I8(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::IVarBit(v) => Some(v.to_i64()),
            _ => None,
        }
    }

    /// Re-express an integer value with an explicit bit width
    pub fn into_ivarbit(self, bits: u32) -> Option<IVarBit> {
        match self {
            Value::IVarBit(v) if v.bit_width() == bits => Some(v),
            other => other.as_i64().map(|v| IVarBit::from_i64(bits, v)),
        }
    }

    /// The address payload, if this value is in pointer position
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Value::Address(address) => Some(address),
            _ => None,
        }
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        Value::Address(address)
    }
}

impl From<FunctionHandle> for Value {
    fn from(handle: FunctionHandle) -> Self {
        Value::Function(handle)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I1(v) => write!(f, "i1 {}", v),
            Value::I8(v) => write!(f, "i8 {}", v),
            Value::I16(v) => write!(f, "i16 {}", v),
            Value::I32(v) => write!(f, "i32 {}", v),
            Value::I64(v) => write!(f, "i64 {}", v),
            Value::IVarBit(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "float {}", v),
            Value::Double(v) => write!(f, "double {}", v),
            Value::Float80(v) => write!(f, "x86_fp80 {}", v),
            Value::Function(h) => write!(f, "fn 0x{:x}", h.pointer()),
            Value::Address(a) => write!(f, "ptr {}", a),
            Value::Void => write!(f, "void"),
        }
    }
}
