//! Value conversion across the foreign boundary

use super::foreign::{ForeignHandle, ForeignResult, RawForeignValue};
use super::objects::ForeignBox;
use crate::error::{ForeignError, Result};
use crate::ir::Type;
use crate::runtime::{
    Address, Float80, FunctionHandle, GlobalResolver, HostValue, IVarBit, RuntimeContext, Value,
};

/// Converts an interpreter value into its foreign representation ("escape")
pub trait ToForeign: Send + Sync {
    /// Convert `value`, declared with type `ty`
    fn to_foreign(&self, ctx: &RuntimeContext, value: &Value, ty: &Type) -> Result<RawForeignValue>;
}

/// Converts a foreign result into an interpreter value of a declared type
pub trait FromForeign: Send + Sync {
    /// Convert `raw` into a value of type `ty`
    fn from_foreign(&self, raw: RawForeignValue, ty: &Type) -> ForeignResult<Value>;
}

/// Default escape conversion
///
/// Native, global and integral boxed addresses escape as raw pointers.
/// Managed buffers have no native identity and cannot escape.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataEscape;

impl DataEscape {
    fn escape_address(ctx: &RuntimeContext, address: &Address) -> Result<RawForeignValue> {
        Ok(match address {
            Address::Native(0) => RawForeignValue::Null,
            Address::Native(pointer) => RawForeignValue::Pointer(*pointer),
            Address::Global(global) => {
                RawForeignValue::Pointer(ctx.resolve_native_location(global)?)
            }
            Address::BoxedPrimitive(HostValue::Int(v)) => RawForeignValue::Int(*v),
            Address::BoxedPrimitive(HostValue::Float(v)) => RawForeignValue::Float(*v),
            Address::BoxedPrimitive(HostValue::Bool(v)) => RawForeignValue::Bool(*v),
            Address::ForeignObject { object, offset: 0 } => RawForeignValue::Object(object.clone()),
            Address::ForeignObject { offset, .. } => {
                return Err(ForeignError::unsupported_type(format!(
                    "foreign reference displaced by {} bytes",
                    offset
                ))
                .into())
            }
            Address::VirtualAllocation { .. } => {
                return Err(ForeignError::unsupported_type(
                    "virtual allocation cannot escape to foreign code",
                )
                .into())
            }
        })
    }
}

impl ToForeign for DataEscape {
    fn to_foreign(&self, ctx: &RuntimeContext, value: &Value, ty: &Type) -> Result<RawForeignValue> {
        let raw = match value {
            Value::I1(v) => RawForeignValue::Bool(*v),
            Value::I8(v) => RawForeignValue::Int(*v as i64),
            Value::I16(v) => RawForeignValue::Int(*v as i64),
            Value::I32(v) => RawForeignValue::Int(*v as i64),
            Value::I64(v) => RawForeignValue::Int(*v),
            Value::IVarBit(v) if v.bit_width() <= 64 => RawForeignValue::Int(v.to_i64()),
            Value::IVarBit(v) => {
                return Err(ForeignError::unsupported_type(format!(
                    "i{} does not fit a foreign integer",
                    v.bit_width()
                ))
                .into())
            }
            Value::Float(v) => RawForeignValue::Float(*v as f64),
            Value::Double(v) => RawForeignValue::Float(*v),
            Value::Float80(v) => RawForeignValue::Float(v.to_f64()),
            Value::Function(handle) if handle.is_null() => RawForeignValue::Null,
            Value::Function(handle) => RawForeignValue::Pointer(handle.pointer()),
            Value::Address(address) => Self::escape_address(ctx, address)?,
            Value::Void => RawForeignValue::Null,
        };

        // Integers passed in pointer position are addresses
        Ok(match (ty, raw) {
            (Type::Pointer, RawForeignValue::Int(v)) if !matches!(value, Value::Address(_)) => {
                RawForeignValue::Pointer(v as u64)
            }
            (_, raw) => raw,
        })
    }
}

/// Default conversion of foreign results into interpreter values
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignToNative;

impl ForeignToNative {
    fn to_int(raw: &RawForeignValue, ty: &Type) -> ForeignResult<i64> {
        match raw {
            RawForeignValue::Int(v) => Ok(*v),
            RawForeignValue::Bool(v) => Ok(*v as i64),
            RawForeignValue::Float(v) => Ok(*v as i64),
            RawForeignValue::Pointer(v) => Ok(*v as i64),
            RawForeignValue::Null => Ok(0),
            other => Err(unsupported(other, ty)),
        }
    }

    fn to_float(raw: &RawForeignValue, ty: &Type) -> ForeignResult<f64> {
        match raw {
            RawForeignValue::Float(v) => Ok(*v),
            RawForeignValue::Int(v) => Ok(*v as f64),
            RawForeignValue::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            other => Err(unsupported(other, ty)),
        }
    }

    fn to_address(raw: RawForeignValue) -> Address {
        match raw {
            RawForeignValue::Null => Address::Native(0),
            RawForeignValue::Pointer(pointer) => Address::Native(pointer),
            RawForeignValue::Int(v) => Address::BoxedPrimitive(HostValue::Int(v)),
            RawForeignValue::Float(v) => Address::BoxedPrimitive(HostValue::Float(v)),
            RawForeignValue::Bool(v) => Address::BoxedPrimitive(HostValue::Bool(v)),
            RawForeignValue::Object(object) => Address::foreign(object),
            string @ RawForeignValue::String(_) => {
                Address::foreign(ForeignHandle::new(ForeignBox::new(string)))
            }
        }
    }
}

fn unsupported(raw: &RawForeignValue, ty: &Type) -> ForeignError {
    ForeignError::unsupported_type(format!("cannot convert foreign {} to {}", raw.kind_name(), ty))
}

impl FromForeign for ForeignToNative {
    fn from_foreign(&self, raw: RawForeignValue, ty: &Type) -> ForeignResult<Value> {
        Ok(match ty {
            Type::Void => Value::Void,
            Type::Integer(1) => match raw {
                RawForeignValue::Bool(v) => Value::I1(v),
                other => Value::I1(Self::to_int(&other, ty)? & 1 != 0),
            },
            Type::Integer(8) => Value::I8(Self::to_int(&raw, ty)? as i8),
            Type::Integer(16) => Value::I16(Self::to_int(&raw, ty)? as i16),
            Type::Integer(32) => Value::I32(Self::to_int(&raw, ty)? as i32),
            Type::Integer(64) => Value::I64(Self::to_int(&raw, ty)?),
            Type::Integer(bits) => Value::IVarBit(IVarBit::from_i64(*bits, Self::to_int(&raw, ty)?)),
            Type::Float => Value::Float(Self::to_float(&raw, ty)? as f32),
            Type::Double => Value::Double(Self::to_float(&raw, ty)?),
            Type::X86Fp80 => Value::Float80(Float80::from_f64(Self::to_float(&raw, ty)?)),
            Type::Pointer => Value::Address(Self::to_address(raw)),
            Type::Function(_) => match raw {
                RawForeignValue::Null => Value::Function(FunctionHandle::create_handle(0)),
                RawForeignValue::Pointer(p) => Value::Function(FunctionHandle::create_handle(p)),
                RawForeignValue::Int(p) => {
                    Value::Function(FunctionHandle::create_handle(p as u64))
                }
                RawForeignValue::Object(object) => Value::Address(Address::foreign(object)),
                other => return Err(unsupported(&other, ty)),
            },
            Type::Struct { .. } | Type::Array { .. } => match raw {
                RawForeignValue::Object(object) => Value::Address(Address::foreign(object)),
                RawForeignValue::Pointer(p) => Value::Address(Address::Native(p)),
                other => return Err(unsupported(&other, ty)),
            },
        })
    }
}
