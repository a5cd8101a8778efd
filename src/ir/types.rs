//! IR value types and their storage layout

use std::fmt;

/// Size of a pointer in interpreter memory
pub const ADDRESS_SIZE_IN_BYTES: usize = 8;

/// Storage size of an x86 80-bit extended float
pub const FLOAT80_SIZE_IN_BYTES: usize = 10;

/// Signature of a function type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Return type (`Type::Void` for procedures)
    pub return_type: Box<Type>,
    /// Fixed parameter types
    pub params: Vec<Type>,
    /// Whether extra arguments may follow the fixed parameters
    pub varargs: bool,
}

impl FunctionType {
    /// Creates a non-variadic function type
    pub fn new(return_type: Type, params: Vec<Type>) -> Self {
        FunctionType {
            return_type: Box::new(return_type),
            params,
            varargs: false,
        }
    }
}

/// A first-class IR type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (function results only)
    Void,
    /// Integer of an arbitrary bit width (`i1`, `i32`, `i13`, ...)
    Integer(u32),
    /// IEEE single precision
    Float,
    /// IEEE double precision
    Double,
    /// x86 80-bit extended precision
    X86Fp80,
    /// Opaque pointer
    Pointer,
    /// Function (only meaningful behind a pointer)
    Function(FunctionType),
    /// Structure with laid-out fields
    Struct {
        /// Field types in declaration order
        fields: Vec<Type>,
        /// Packed structs have no padding
        packed: bool,
    },
    /// Fixed-length array
    Array {
        /// Element type
        element: Box<Type>,
        /// Number of elements
        len: u64,
    },
}

impl Type {
    /// Shorthand for `i1`
    pub const I1: Type = Type::Integer(1);
    /// Shorthand for `i8`
    pub const I8: Type = Type::Integer(8);
    /// Shorthand for `i16`
    pub const I16: Type = Type::Integer(16);
    /// Shorthand for `i32`
    pub const I32: Type = Type::Integer(32);
    /// Shorthand for `i64`
    pub const I64: Type = Type::Integer(64);

    /// Returns the storage size of this type in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Integer(bits) => match *bits {
                1 | 8 => 1,
                16 => 2,
                32 => 4,
                64 => 8,
                n => var_bit_byte_size(n),
            },
            Type::Float => 4,
            Type::Double => 8,
            Type::X86Fp80 => FLOAT80_SIZE_IN_BYTES,
            Type::Pointer | Type::Function(_) => ADDRESS_SIZE_IN_BYTES,
            // Saturates; layout code that allocates uses `checked_byte_size`
            Type::Struct { .. } | Type::Array { .. } => {
                self.checked_byte_size().unwrap_or(usize::MAX)
            }
        }
    }

    /// Storage size in bytes, or `None` if an aggregate's size overflows `usize`
    pub fn checked_byte_size(&self) -> Option<usize> {
        match self {
            Type::Struct { fields, packed } => {
                let mut size = 0usize;
                let mut max_align = 1usize;
                for field in fields {
                    let align = if *packed { 1 } else { field.alignment() };
                    max_align = max_align.max(align);
                    size = align_up(size, align)?.checked_add(field.checked_byte_size()?)?;
                }
                if *packed {
                    Some(size)
                } else {
                    align_up(size, max_align)
                }
            }
            Type::Array { element, len } => {
                let len = usize::try_from(*len).ok()?;
                element.checked_byte_size()?.checked_mul(len)
            }
            scalar => Some(scalar.byte_size()),
        }
    }

    /// Returns the natural alignment of this type in bytes
    pub fn alignment(&self) -> usize {
        match self {
            Type::Void => 1,
            Type::Integer(_) => self.byte_size().next_power_of_two().min(8),
            Type::Float => 4,
            Type::Double => 8,
            Type::X86Fp80 => 16,
            Type::Pointer | Type::Function(_) => ADDRESS_SIZE_IN_BYTES,
            Type::Struct { fields, packed } => {
                if *packed {
                    1
                } else {
                    fields.iter().map(Type::alignment).max().unwrap_or(1)
                }
            }
            Type::Array { element, .. } => element.alignment(),
        }
    }

    /// Returns true for integer types of any width
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer(_))
    }

    /// Returns true for aggregates, which loads hand out by reference
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct { .. } | Type::Array { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Integer(bits) => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::X86Fp80 => write!(f, "x86_fp80"),
            Type::Pointer => write!(f, "ptr"),
            Type::Function(sig) => {
                write!(f, "{} (", sig.return_type)?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                if sig.varargs {
                    write!(f, ", ...")?;
                }
                write!(f, ")")
            }
            Type::Struct { fields, packed } => {
                if *packed {
                    write!(f, "<")?;
                }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")?;
                if *packed {
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Array { element, len } => write!(f, "[{} x {}]", len, element),
        }
    }
}

/// Bytes needed to store an integer of `bits` width: whole bytes, rounded up
pub fn var_bit_byte_size(bits: u32) -> usize {
    let mut bytes = (bits / 8) as usize;
    if bits % 8 != 0 {
        bytes += 1;
    }
    bytes
}

fn align_up(value: usize, align: usize) -> Option<usize> {
    Some(value.checked_add(align - 1)? / align * align)
}
