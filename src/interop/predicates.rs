//! Boolean queries over foreign references
//!
//! Unlike loads and calls, these never fault on an operand of the wrong kind:
//! anything that is not a foreign reference answers `false`. A foreign
//! reference displaced by pointer arithmetic still faults.

use std::fmt;

use super::foreign::ForeignHandle;
use crate::error::Result;
use crate::runtime::Value;

/// One of the four foreign queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignPredicate {
    /// Is the object a boxed primitive
    IsBoxed,
    /// Can the object be executed
    IsExecutable,
    /// Is the object the foreign null
    IsNull,
    /// Does the object have a size (array-like)
    HasSize,
}

impl ForeignPredicate {
    pub const ALL: [ForeignPredicate; 4] = [
        ForeignPredicate::IsBoxed,
        ForeignPredicate::IsExecutable,
        ForeignPredicate::IsNull,
        ForeignPredicate::HasSize,
    ];

    /// Intrinsic name
    pub fn name(self) -> &'static str {
        match self {
            ForeignPredicate::IsBoxed => "is_boxed",
            ForeignPredicate::IsExecutable => "is_executable",
            ForeignPredicate::IsNull => "is_null",
            ForeignPredicate::HasSize => "has_size",
        }
    }

    fn ask(self, object: &ForeignHandle) -> bool {
        match self {
            ForeignPredicate::IsBoxed => object.is_boxed(),
            ForeignPredicate::IsExecutable => object.is_executable(),
            ForeignPredicate::IsNull => object.is_null(),
            ForeignPredicate::HasSize => object.has_size(),
        }
    }

    /// Evaluate the query on `value`
    pub fn execute(self, value: &Value) -> Result<bool> {
        let address = match value {
            Value::Address(address) => address,
            _ => return Ok(false),
        };
        Ok(match address.unmodified_foreign(self.name())? {
            Some(object) => self.ask(object),
            None => false,
        })
    }
}

impl fmt::Display for ForeignPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `is_boxed` intrinsic
pub fn is_boxed(value: &Value) -> Result<bool> {
    ForeignPredicate::IsBoxed.execute(value)
}

/// `is_executable` intrinsic
pub fn is_executable(value: &Value) -> Result<bool> {
    ForeignPredicate::IsExecutable.execute(value)
}

/// `is_null` intrinsic
pub fn is_null(value: &Value) -> Result<bool> {
    ForeignPredicate::IsNull.execute(value)
}

/// `has_size` intrinsic
pub fn has_size(value: &Value) -> Result<bool> {
    ForeignPredicate::HasSize.execute(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::ForeignNull;
    use crate::runtime::Address;

    #[test]
    fn test_non_foreign_is_false() {
        for predicate in ForeignPredicate::ALL {
            assert!(!predicate.execute(&Value::I32(0)).unwrap());
            assert!(!predicate.execute(&Address::native(0).into()).unwrap());
        }
    }

    #[test]
    fn test_null_object() {
        let null: Value = Address::foreign(ForeignHandle::new(ForeignNull)).into();
        assert!(is_null(&null).unwrap());
        assert!(!is_boxed(&null).unwrap());
        assert!(!is_executable(&null).unwrap());
        assert!(!has_size(&null).unwrap());
    }
}
