//! Polymorphic address representation
//!
//! An operand in pointer position holds exactly one [`Address`] variant. Only
//! `Native` addresses touch raw memory directly; every other variant has to
//! reduce to one first or be rejected.

use std::fmt;
use std::sync::Arc;

use super::globals::GlobalResolver;
use crate::error::{Error, Result};
use crate::interop::ForeignHandle;
use crate::ir::GlobalEntry;
use crate::memory::AllocationHandle;

/// Tag identifying which [`Address`] variant is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// `Address::Native`
    Native,
    /// `Address::Global`
    Global,
    /// `Address::VirtualAllocation`
    VirtualAllocation,
    /// `Address::BoxedPrimitive`
    BoxedPrimitive,
    /// `Address::ForeignObject`
    ForeignObject,
}

impl AddressKind {
    /// All variants, in tag order
    pub const ALL: [AddressKind; 5] = [
        AddressKind::Native,
        AddressKind::Global,
        AddressKind::VirtualAllocation,
        AddressKind::BoxedPrimitive,
        AddressKind::ForeignObject,
    ];

    /// Non-zero key used by call-site caches
    pub fn cache_key(self) -> usize {
        self as usize + 1
    }

    /// Human-readable variant name
    pub fn name(self) -> &'static str {
        match self {
            AddressKind::Native => "native",
            AddressKind::Global => "global",
            AddressKind::VirtualAllocation => "virtual allocation",
            AddressKind::BoxedPrimitive => "boxed primitive",
            AddressKind::ForeignObject => "foreign object",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque host-level scalar used in pointer position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostValue {
    /// Integral host value; the only kind that can denote an address
    Int(i64),
    /// Floating host value
    Float(f64),
    /// Boolean host value
    Bool(bool),
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Int(v) => write!(f, "{}", v),
            HostValue::Float(v) => write!(f, "{}", v),
            HostValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// An address as held by an IR operand
#[derive(Clone)]
pub enum Address {
    /// Absolute address into the interpreter's native memory
    Native(u64),
    /// Symbolic global, resolved to a native location on access
    Global(Arc<GlobalEntry>),
    /// Interpreter-managed buffer plus byte offset
    VirtualAllocation {
        /// Managed buffer
        allocation: AllocationHandle,
        /// Byte offset into the buffer
        offset: i64,
    },
    /// Host scalar in pointer position
    BoxedPrimitive(HostValue),
    /// Reference into a foreign object plus accumulated pointer arithmetic
    ForeignObject {
        /// The foreign object
        object: ForeignHandle,
        /// Byte offset added by pointer arithmetic; 0 means "the object itself"
        offset: i64,
    },
}

impl Address {
    /// Native address
    pub fn native(address: u64) -> Self {
        Address::Native(address)
    }

    /// Unmodified reference to a foreign object
    pub fn foreign(object: ForeignHandle) -> Self {
        Address::ForeignObject { object, offset: 0 }
    }

    /// Reference to the start of a managed buffer
    pub fn virtual_allocation(allocation: AllocationHandle) -> Self {
        Address::VirtualAllocation {
            allocation,
            offset: 0,
        }
    }

    /// Which variant is active
    pub fn kind(&self) -> AddressKind {
        match self {
            Address::Native(_) => AddressKind::Native,
            Address::Global(_) => AddressKind::Global,
            Address::VirtualAllocation { .. } => AddressKind::VirtualAllocation,
            Address::BoxedPrimitive(_) => AddressKind::BoxedPrimitive,
            Address::ForeignObject { .. } => AddressKind::ForeignObject,
        }
    }

    /// Pointer arithmetic
    ///
    /// A `Global` has no offset of its own and must be resolved to a native
    /// address first.
    pub fn offset_by(&self, delta: i64) -> Result<Address> {
        match self {
            Address::Native(address) => Ok(Address::Native(address.wrapping_add(delta as u64))),
            Address::VirtualAllocation { allocation, offset } => Ok(Address::VirtualAllocation {
                allocation: allocation.clone(),
                offset: offset + delta,
            }),
            Address::ForeignObject { object, offset } => Ok(Address::ForeignObject {
                object: object.clone(),
                offset: offset + delta,
            }),
            Address::BoxedPrimitive(HostValue::Int(value)) => {
                Ok(Address::Native((*value as u64).wrapping_add(delta as u64)))
            }
            Address::BoxedPrimitive(other) => Err(Error::fatal(
                "pointer arithmetic",
                format!("Cannot access memory with address: {}", other),
            )),
            Address::Global(global) => Err(Error::fatal(
                "pointer arithmetic",
                format!("global {} must be resolved to a native address first", global),
            )),
        }
    }

    /// Reduce to a native address for raw memory access
    pub fn to_native(&self, resolver: &dyn GlobalResolver) -> Result<u64> {
        match self {
            Address::Native(address) => Ok(*address),
            Address::Global(global) => resolver.resolve_native_location(global),
            Address::BoxedPrimitive(HostValue::Int(value)) => Ok(*value as u64),
            Address::BoxedPrimitive(other) => Err(Error::fatal(
                "native access",
                format!("Cannot access memory with address: {}", other),
            )),
            other => Err(Error::fatal(
                "native access",
                format!("a {} address has no native location", other.kind()),
            )),
        }
    }

    /// The foreign object and offset, if this is a foreign reference
    pub fn as_foreign(&self) -> Option<(&ForeignHandle, i64)> {
        match self {
            Address::ForeignObject { object, offset } => Some((object, *offset)),
            _ => None,
        }
    }

    /// The foreign object itself, enforcing the unmodified-pointee rule
    ///
    /// Returns `Ok(None)` for non-foreign addresses and a fatal error for a
    /// foreign reference displaced by pointer arithmetic.
    pub fn unmodified_foreign(&self, operation: &str) -> Result<Option<&ForeignHandle>> {
        match self {
            Address::ForeignObject { object, offset: 0 } => Ok(Some(object)),
            Address::ForeignObject { offset, .. } => {
                tracing::warn!(operation, offset, "foreign pointee was modified");
                Err(Error::modified_pointee(operation, *offset))
            }
            _ => Ok(None),
        }
    }

    /// True for the native null address
    pub fn is_null(&self) -> bool {
        matches!(self, Address::Native(0))
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Address::Native(a), Address::Native(b)) => a == b,
            (Address::Global(a), Address::Global(b)) => Arc::ptr_eq(a, b),
            (
                Address::VirtualAllocation {
                    allocation: a,
                    offset: x,
                },
                Address::VirtualAllocation {
                    allocation: b,
                    offset: y,
                },
            ) => a == b && x == y,
            (Address::BoxedPrimitive(a), Address::BoxedPrimitive(b)) => a == b,
            (
                Address::ForeignObject {
                    object: a,
                    offset: x,
                },
                Address::ForeignObject {
                    object: b,
                    offset: y,
                },
            ) => a == b && x == y,
            _ => false,
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Native(address) => write!(f, "Native(0x{:x})", address),
            Address::Global(global) => write!(f, "Global({})", global.name()),
            Address::VirtualAllocation { allocation, offset } => {
                write!(f, "VirtualAllocation({:?} + {})", allocation, offset)
            }
            Address::BoxedPrimitive(value) => write!(f, "BoxedPrimitive({:?})", value),
            Address::ForeignObject { object, offset } => {
                write!(f, "ForeignObject({:?} + {})", object, offset)
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Native(address) => write!(f, "0x{:x}", address),
            Address::Global(global) => write!(f, "{}", global.name()),
            Address::VirtualAllocation { offset, .. } => write!(f, "<managed>+{}", offset),
            Address::BoxedPrimitive(value) => write!(f, "<boxed {}>", value),
            Address::ForeignObject { offset, .. } => write!(f, "<foreign>+{}", offset),
        }
    }
}
