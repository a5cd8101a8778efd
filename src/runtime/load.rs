//! Typed loads through polymorphic addresses
//!
//! A [`LoadNode`] is one load site in the IR. Every execution discriminates
//! the address variant and picks a read routine from the rule table below.
//! While a site keeps seeing the same variant, the routine picked the first
//! time is reused without discrimination; once a second variant shows up the
//! site stays polymorphic. Both paths produce identical results.
//!
//! | value kind              | Native | Global | VirtualAllocation | BoxedPrimitive | ForeignObject |
//! |-------------------------|--------|--------|-------------------|----------------|---------------|
//! | fixed int, float, f80   | read   | read   | -                 | -              | -             |
//! | arbitrary-width int     | read   | read   | -                 | -              | foreign read  |
//! | function                | read   | read   | -                 | -              | foreign read  |
//! | address                 | read   | read   | stored i64        | integral only  | foreign read  |
//! | struct                  | as-is  | -      | -                 | -              | as-is         |
//!
//! Every `-` is a fatal fault.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::interop::ForeignRead;
use crate::ir::{FunctionType, GlobalEntry, Type};
use crate::memory::NativeMemory;

use super::address::{Address, AddressKind};
use super::context::RuntimeContext;
use super::globals::GlobalResolver;
use super::inline_cache::{CacheState, InlineCache};
use super::value::{FunctionHandle, Value};

/// Standard integer widths read with a fixed-size access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I1,
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    /// The standard width for `bits`, if there is one
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(IntWidth::I1),
            8 => Some(IntWidth::I8),
            16 => Some(IntWidth::I16),
            32 => Some(IntWidth::I32),
            64 => Some(IntWidth::I64),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            IntWidth::I1 => 1,
            IntWidth::I8 => 8,
            IntWidth::I16 => 16,
            IntWidth::I32 => 32,
            IntWidth::I64 => 64,
        }
    }
}

/// What a load site produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    /// `i1`, `i8`, `i16`, `i32` or `i64`
    FixedInt(IntWidth),
    /// Integer of any other width
    IVarBit(u32),
    /// `float`
    Float,
    /// `double`
    Double,
    /// `x86_fp80`
    Float80,
    /// Function pointer
    Function,
    /// Pointer
    Address,
    /// Aggregate, handed out by reference
    Struct,
}

impl LoadKind {
    /// Load kind for a value of type `ty`
    pub fn for_type(ty: &Type) -> Result<Self> {
        Ok(match ty {
            Type::Integer(0) | Type::Void => {
                return Err(Error::fatal("load", format!("cannot load a value of type {}", ty)))
            }
            Type::Integer(bits) => match IntWidth::from_bits(*bits) {
                Some(width) => LoadKind::FixedInt(width),
                None => LoadKind::IVarBit(*bits),
            },
            Type::Float => LoadKind::Float,
            Type::Double => LoadKind::Double,
            Type::X86Fp80 => LoadKind::Float80,
            Type::Function(_) => LoadKind::Function,
            Type::Pointer => LoadKind::Address,
            Type::Struct { .. } | Type::Array { .. } => LoadKind::Struct,
        })
    }

    /// IR type of the loaded value
    pub fn value_type(self) -> Type {
        match self {
            LoadKind::FixedInt(width) => Type::Integer(width.bits()),
            LoadKind::IVarBit(bits) => Type::Integer(bits),
            LoadKind::Float => Type::Float,
            LoadKind::Double => Type::Double,
            LoadKind::Float80 => Type::X86Fp80,
            LoadKind::Function => Type::Function(FunctionType::new(Type::Void, Vec::new())),
            LoadKind::Address | LoadKind::Struct => Type::Pointer,
        }
    }

    /// Width of one access
    pub fn byte_size(self) -> usize {
        self.value_type().byte_size()
    }

    /// Whether foreign objects answer this kind of read
    fn reads_foreign(self) -> bool {
        matches!(
            self,
            LoadKind::IVarBit(_) | LoadKind::Function | LoadKind::Address
        )
    }
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadKind::Struct => write!(f, "struct"),
            other => write!(f, "{}", other.value_type()),
        }
    }
}

/// Read routine chosen for one address variant
type Specialization = fn(&LoadNode, &RuntimeContext, &Address) -> Result<Value>;

/// One load site
pub struct LoadNode {
    kind: LoadKind,
    cache: InlineCache,
    /// Routine for the variant the cache is monomorphic on
    cached: OnceLock<Specialization>,
    foreign: Option<ForeignRead>,
}

impl LoadNode {
    pub fn new(kind: LoadKind) -> Self {
        LoadNode {
            foreign: kind
                .reads_foreign()
                .then(|| ForeignRead::new(kind.value_type())),
            kind,
            cache: InlineCache::new(),
            cached: OnceLock::new(),
        }
    }

    /// Load site for values of type `ty`
    pub fn for_type(ty: &Type) -> Result<Self> {
        Ok(Self::new(LoadKind::for_type(ty)?))
    }

    pub fn kind(&self) -> LoadKind {
        self.kind
    }

    /// Dispatch hint state of this site
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Load a value through `address`
    pub fn execute(&self, ctx: &RuntimeContext, address: &Address) -> Result<Value> {
        let kind = address.kind();

        if ctx.config().inline_caching && self.cache.check(kind.cache_key()) {
            if let Some(specialization) = self.cached.get() {
                return specialization(self, ctx, address);
            }
            let specialization = self.select(kind)?;
            let _ = self.cached.set(specialization);
            return specialization(self, ctx, address);
        }

        let specialization = self.select(kind)?;
        specialization(self, ctx, address)
    }

    fn select(&self, address: AddressKind) -> Result<Specialization> {
        use AddressKind::*;

        let specialization: Specialization = match (self.kind, address) {
            (LoadKind::Struct, Native) | (LoadKind::Struct, ForeignObject) => Self::pass_through,
            (LoadKind::Struct, _) => return Err(self.no_rule(address)),
            (_, Native) | (_, Global) => Self::read_direct,
            (LoadKind::Address, VirtualAllocation) => Self::read_virtual,
            (LoadKind::Address, BoxedPrimitive) => Self::read_direct,
            (kind, ForeignObject) if kind.reads_foreign() => Self::read_foreign,
            _ => return Err(self.no_rule(address)),
        };
        Ok(specialization)
    }

    fn no_rule(&self, address: AddressKind) -> Error {
        tracing::warn!(kind = %self.kind, address = %address, "no load rule");
        Error::fatal(
            format!("load {}", self.kind),
            format!("not defined for a {} address", address),
        )
    }

    /// Native, global and integral boxed addresses
    fn read_direct(&self, ctx: &RuntimeContext, address: &Address) -> Result<Value> {
        let location = address.to_native(ctx)?;
        read_native(ctx.memory(), self.kind, location)
    }

    /// Pointer stored in a managed buffer
    fn read_virtual(&self, _ctx: &RuntimeContext, address: &Address) -> Result<Value> {
        match address {
            Address::VirtualAllocation { allocation, offset } => Ok(Value::Address(
                Address::Native(allocation.read_i64(*offset)? as u64),
            )),
            other => Err(self.no_rule(other.kind())),
        }
    }

    fn read_foreign(&self, _ctx: &RuntimeContext, address: &Address) -> Result<Value> {
        let (object, offset, read) = match (address, &self.foreign) {
            (Address::ForeignObject { object, offset }, Some(read)) => (object, *offset, read),
            (other, _) => return Err(self.no_rule(other.kind())),
        };

        let value = read.execute(object, offset)?;
        match self.kind {
            LoadKind::IVarBit(bits) => {
                let type_name = value.type_name();
                value.into_ivarbit(bits).map(Value::IVarBit).ok_or_else(|| {
                    Error::fatal(
                        format!("load {}", self.kind),
                        format!("foreign read produced {}", type_name),
                    )
                })
            }
            _ => Ok(value),
        }
    }

    /// Aggregates are accessed by reference; the address is the result
    fn pass_through(&self, _ctx: &RuntimeContext, address: &Address) -> Result<Value> {
        Ok(Value::Address(address.clone()))
    }
}

impl fmt::Debug for LoadNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadNode")
            .field("kind", &self.kind)
            .field("cache", &self.cache.state())
            .finish()
    }
}

fn read_native(memory: &NativeMemory, kind: LoadKind, at: u64) -> Result<Value> {
    Ok(match kind {
        LoadKind::FixedInt(IntWidth::I1) => Value::I1(memory.get_i1(at)?),
        LoadKind::FixedInt(IntWidth::I8) => Value::I8(memory.get_i8(at)?),
        LoadKind::FixedInt(IntWidth::I16) => Value::I16(memory.get_i16(at)?),
        LoadKind::FixedInt(IntWidth::I32) => Value::I32(memory.get_i32(at)?),
        LoadKind::FixedInt(IntWidth::I64) => Value::I64(memory.get_i64(at)?),
        LoadKind::IVarBit(bits) => Value::IVarBit(memory.get_ivarbit(at, bits)?),
        LoadKind::Float => Value::Float(memory.get_f32(at)?),
        LoadKind::Double => Value::Double(memory.get_f64(at)?),
        LoadKind::Float80 => Value::Float80(memory.get_f80(at)?),
        LoadKind::Function => {
            Value::Function(FunctionHandle::create_handle(memory.get_function_pointer(at)?))
        }
        LoadKind::Address => Value::Address(Address::Native(memory.get_address(at)?)),
        LoadKind::Struct => Value::Address(Address::Native(at)),
    })
}

/// Load of a global's own value, typed by the global's declaration
#[derive(Debug)]
pub struct GlobalDirectLoad {
    global: Arc<GlobalEntry>,
    load: LoadNode,
}

impl GlobalDirectLoad {
    pub fn new(global: Arc<GlobalEntry>) -> Result<Self> {
        let load = LoadNode::for_type(global.ty())?;
        Ok(GlobalDirectLoad { global, load })
    }

    pub fn global(&self) -> &Arc<GlobalEntry> {
        &self.global
    }

    /// Read the global's current value
    pub fn execute(&self, ctx: &RuntimeContext) -> Result<Value> {
        let location = ctx.resolve_native_location(&self.global)?;
        self.load.execute(ctx, &Address::Native(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::{ForeignBox, ForeignHandle, RawForeignValue};
    use crate::runtime::{Float80, HostValue, IVarBit};

    #[test]
    fn test_kind_for_type() {
        assert_eq!(
            LoadKind::for_type(&Type::I32).unwrap(),
            LoadKind::FixedInt(IntWidth::I32)
        );
        assert_eq!(LoadKind::for_type(&Type::Integer(13)).unwrap(), LoadKind::IVarBit(13));
        assert_eq!(LoadKind::IVarBit(13).byte_size(), 2);
        assert_eq!(
            LoadKind::for_type(&Type::Array {
                element: Box::new(Type::I8),
                len: 4
            })
            .unwrap(),
            LoadKind::Struct
        );
        assert!(LoadKind::for_type(&Type::Void).is_err());
    }

    #[test]
    fn test_native_reads() {
        let ctx = RuntimeContext::with_defaults();
        let memory = ctx.memory();
        memory.put_f80(0x1000, Float80::from_f64(2.5)).unwrap();
        memory.put_i16(0x1010, -3).unwrap();

        let f80 = LoadNode::new(LoadKind::Float80);
        assert_eq!(
            f80.execute(&ctx, &Address::native(0x1000)).unwrap(),
            Value::Float80(Float80::from_f64(2.5))
        );

        let i16_load = LoadNode::new(LoadKind::FixedInt(IntWidth::I16));
        assert_eq!(
            i16_load.execute(&ctx, &Address::native(0x1010)).unwrap(),
            Value::I16(-3)
        );
    }

    #[test]
    fn test_boxed_primitive_rules() {
        let ctx = RuntimeContext::with_defaults();
        ctx.memory().put_address(0x1020, 0xABCD).unwrap();
        let load = LoadNode::new(LoadKind::Address);

        assert_eq!(
            load.execute(&ctx, &Address::BoxedPrimitive(HostValue::Int(0x1020)))
                .unwrap(),
            Value::Address(Address::Native(0xABCD))
        );

        let err = load
            .execute(&ctx, &Address::BoxedPrimitive(HostValue::Float(1.0)))
            .unwrap_err();
        assert!(err.to_string().contains("Cannot access memory with address"));

        let int_load = LoadNode::new(LoadKind::FixedInt(IntWidth::I64));
        assert!(int_load
            .execute(&ctx, &Address::BoxedPrimitive(HostValue::Int(0x1020)))
            .is_err());
    }

    #[test]
    fn test_foreign_ivarbit_is_coerced() {
        let ctx = RuntimeContext::with_defaults();
        let boxed = Address::foreign(ForeignHandle::new(ForeignBox::new(RawForeignValue::Int(
            0x1FFF,
        ))));
        let load = LoadNode::new(LoadKind::IVarBit(12));
        assert_eq!(
            load.execute(&ctx, &boxed).unwrap(),
            Value::IVarBit(IVarBit::from_u64(12, 0xFFF))
        );
    }

    #[test]
    fn test_struct_is_identity() {
        let ctx = RuntimeContext::with_defaults();
        let load = LoadNode::new(LoadKind::Struct);
        let address = Address::native(0x1040);
        assert_eq!(
            load.execute(&ctx, &address).unwrap(),
            Value::Address(address)
        );
    }
}
