//! Integration tests for typed load dispatch
//!
//! Covers the rule table for every address variant, the fatal combinations,
//! and the per-site dispatch hint.

use llir_runtime::error::Error;
use llir_runtime::interop::{ForeignArray, ForeignHandle, ForeignNull, RawForeignValue};
use llir_runtime::ir::{GlobalKind, Module, Symbol, Type};
use llir_runtime::memory::AllocationHandle;
use llir_runtime::runtime::{
    Address, AddressKind, CacheState, Float80, FunctionHandle, HostValue, IVarBit, IntWidth,
    LoadKind, LoadNode, RuntimeContext, Value,
};
use llir_runtime::RuntimeConfig;

fn i64_global(ctx: &RuntimeContext, value: i64) -> Address {
    let mut module = Module::new("test");
    let slot = module.add_symbol(Symbol::Integer {
        ty: Type::I64,
        value,
    });
    let global = module.declare_global(
        GlobalKind::Variable { constant: false },
        Type::I64,
        8,
        Some(slot),
    );
    global.set_name("value").unwrap();
    ctx.finalize_module(&module).unwrap();
    Address::Global(global)
}

// =============================================================================
// Native and Global
// =============================================================================

#[test]
fn test_ivarbit_9_from_two_bytes() {
    let ctx = RuntimeContext::with_defaults();
    ctx.memory().write_bytes(0x1000, &[0x2A, 0x00]).unwrap();

    let load = LoadNode::new(LoadKind::IVarBit(9));
    let value = load.execute(&ctx, &Address::native(0x1000)).unwrap();

    match value {
        Value::IVarBit(v) => {
            assert_eq!(v.bit_width(), 9);
            assert_eq!(v.byte_size(), 2);
            assert_eq!(v.to_u64(), 42);
        }
        other => panic!("expected i9, got {:?}", other),
    }
}

#[test]
fn test_ivarbit_ignores_bits_above_width() {
    let ctx = RuntimeContext::with_defaults();
    ctx.memory().write_bytes(0x1000, &[0xFF, 0xFF]).unwrap();

    let load = LoadNode::new(LoadKind::IVarBit(9));
    assert_eq!(
        load.execute(&ctx, &Address::native(0x1000)).unwrap(),
        Value::IVarBit(IVarBit::from_u64(9, 0x1FF))
    );
}

#[test]
fn test_fixed_width_reads() {
    let ctx = RuntimeContext::with_defaults();
    let memory = ctx.memory();
    memory.put_i1(0x1000, true).unwrap();
    memory.put_i8(0x1001, -5).unwrap();
    memory.put_i32(0x1004, 123_456).unwrap();
    memory.put_i64(0x1008, -9).unwrap();
    memory.put_f32(0x1010, 0.25).unwrap();
    memory.put_f64(0x1018, -1.5).unwrap();

    let cases = [
        (LoadKind::FixedInt(IntWidth::I1), 0x1000, Value::I1(true)),
        (LoadKind::FixedInt(IntWidth::I8), 0x1001, Value::I8(-5)),
        (LoadKind::FixedInt(IntWidth::I32), 0x1004, Value::I32(123_456)),
        (LoadKind::FixedInt(IntWidth::I64), 0x1008, Value::I64(-9)),
        (LoadKind::Float, 0x1010, Value::Float(0.25)),
        (LoadKind::Double, 0x1018, Value::Double(-1.5)),
    ];

    for (kind, at, expected) in cases {
        let load = LoadNode::new(kind);
        assert_eq!(load.execute(&ctx, &Address::native(at)).unwrap(), expected);
    }
}

#[test]
fn test_function_and_f80_reads() {
    let ctx = RuntimeContext::with_defaults();
    ctx.memory().put_address(0x1000, 0xDEAD_BEEF).unwrap();
    ctx.memory()
        .put_f80(0x1010, Float80::from_f64(-0.75))
        .unwrap();

    let function = LoadNode::new(LoadKind::Function);
    assert_eq!(
        function.execute(&ctx, &Address::native(0x1000)).unwrap(),
        Value::Function(FunctionHandle::create_handle(0xDEAD_BEEF))
    );

    let f80 = LoadNode::new(LoadKind::Float80);
    match f80.execute(&ctx, &Address::native(0x1010)).unwrap() {
        Value::Float80(v) => assert_eq!(v.to_f64(), -0.75),
        other => panic!("expected x86_fp80, got {:?}", other),
    }
}

#[test]
fn test_global_resolves_then_reads() {
    let ctx = RuntimeContext::with_defaults();
    let global = i64_global(&ctx, 77);

    let load = LoadNode::new(LoadKind::FixedInt(IntWidth::I64));
    assert_eq!(load.execute(&ctx, &global).unwrap(), Value::I64(77));
}

#[test]
fn test_unfinalized_global_is_unresolved() {
    let ctx = RuntimeContext::with_defaults();
    let mut module = Module::new("pending");
    let global = module.declare_global(GlobalKind::Variable { constant: false }, Type::I32, 4, None);

    let load = LoadNode::new(LoadKind::FixedInt(IntWidth::I32));
    let err = load.execute(&ctx, &Address::Global(global)).unwrap_err();
    assert!(matches!(err, Error::UnresolvedGlobal { .. }));
}

#[test]
fn test_unmapped_native_address_faults() {
    let ctx = RuntimeContext::with_defaults();
    let load = LoadNode::new(LoadKind::FixedInt(IntWidth::I32));
    let err = load.execute(&ctx, &Address::native(0)).unwrap_err();
    assert!(matches!(err, Error::MemoryFault { address: 0, size: 4 }));
}

// =============================================================================
// Virtual allocations, boxed primitives, foreign objects
// =============================================================================

#[test]
fn test_virtual_allocation_address_load() {
    let ctx = RuntimeContext::with_defaults();
    let allocation = AllocationHandle::new(16);
    allocation.write_i64(8, 0x2000).unwrap();

    let address = Address::virtual_allocation(allocation).offset_by(8).unwrap();
    let load = LoadNode::new(LoadKind::Address);
    assert_eq!(
        load.execute(&ctx, &address).unwrap(),
        Value::Address(Address::Native(0x2000))
    );
}

#[test]
fn test_boxed_integer_is_read_as_native() {
    let ctx = RuntimeContext::with_defaults();
    ctx.memory().put_address(0x1100, 0x1234).unwrap();

    let load = LoadNode::new(LoadKind::Address);
    assert_eq!(
        load.execute(&ctx, &Address::BoxedPrimitive(HostValue::Int(0x1100)))
            .unwrap(),
        Value::Address(Address::Native(0x1234))
    );
}

#[test]
fn test_boxed_non_integer_faults() {
    let ctx = RuntimeContext::with_defaults();
    let load = LoadNode::new(LoadKind::Address);
    let err = load
        .execute(&ctx, &Address::BoxedPrimitive(HostValue::Bool(true)))
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(err
        .to_string()
        .contains("Cannot access memory with address: true"));
}

#[test]
fn test_foreign_address_read_uses_element_index() {
    let ctx = RuntimeContext::with_defaults();
    let inner = ForeignHandle::new(ForeignNull);
    let array = ForeignHandle::new(ForeignArray::new(vec![
        RawForeignValue::Pointer(0x10),
        RawForeignValue::Object(inner.clone()),
    ]));

    let load = LoadNode::new(LoadKind::Address);
    let first = Address::foreign(array.clone());
    let second = first.offset_by(8).unwrap();

    assert_eq!(
        load.execute(&ctx, &first).unwrap(),
        Value::Address(Address::Native(0x10))
    );
    assert_eq!(
        load.execute(&ctx, &second).unwrap(),
        Value::Address(Address::foreign(inner))
    );
}

#[test]
fn test_foreign_function_read() {
    let ctx = RuntimeContext::with_defaults();
    let table = ForeignHandle::new(ForeignArray::new(vec![RawForeignValue::Pointer(0x4000)]));

    let load = LoadNode::new(LoadKind::Function);
    assert_eq!(
        load.execute(&ctx, &Address::foreign(table)).unwrap(),
        Value::Function(FunctionHandle::create_handle(0x4000))
    );
}

#[test]
fn test_undefined_combinations_are_fatal() {
    let ctx = RuntimeContext::with_defaults();
    let foreign = Address::foreign(ForeignHandle::new(ForeignArray::new(vec![
        RawForeignValue::Int(1),
    ])));
    let managed = Address::virtual_allocation(AllocationHandle::new(8));

    let cases = [
        (LoadKind::Float80, foreign.clone()),
        (LoadKind::FixedInt(IntWidth::I32), foreign.clone()),
        (LoadKind::Double, foreign),
        (LoadKind::FixedInt(IntWidth::I64), managed.clone()),
        (LoadKind::IVarBit(12), managed.clone()),
        (LoadKind::Struct, managed),
        (
            LoadKind::FixedInt(IntWidth::I8),
            Address::BoxedPrimitive(HostValue::Int(0x1000)),
        ),
    ];

    for (kind, address) in cases {
        let load = LoadNode::new(kind);
        let err = load.execute(&ctx, &address).unwrap_err();
        assert!(
            matches!(err, Error::FatalOperand { .. }),
            "{} via {:?} should be fatal, got {:?}",
            kind,
            address,
            err
        );
    }
}

#[test]
fn test_struct_load_returns_address_unchanged() {
    let ctx = RuntimeContext::with_defaults();
    let load = LoadNode::for_type(&Type::Struct {
        fields: vec![Type::I32, Type::Double],
        packed: false,
    })
    .unwrap();

    let native = Address::native(0x1200);
    assert_eq!(
        load.execute(&ctx, &native).unwrap(),
        Value::Address(native.clone())
    );

    let foreign = Address::foreign(ForeignHandle::new(ForeignNull))
        .offset_by(16)
        .unwrap();
    assert_eq!(
        load.execute(&ctx, &foreign).unwrap(),
        Value::Address(foreign.clone())
    );
}

// =============================================================================
// Dispatch hint
// =============================================================================

#[test]
fn test_site_goes_monomorphic_then_polymorphic() {
    let ctx = RuntimeContext::with_defaults();
    let global = i64_global(&ctx, 5);
    ctx.memory().put_i64(0x8_0000, 9).unwrap();

    let load = LoadNode::new(LoadKind::FixedInt(IntWidth::I64));
    assert_eq!(load.cache_state(), CacheState::Uninitialized);

    for _ in 0..3 {
        assert_eq!(
            load.execute(&ctx, &Address::native(0x8_0000)).unwrap(),
            Value::I64(9)
        );
    }
    assert_eq!(
        load.cache_state(),
        CacheState::Monomorphic(AddressKind::Native.cache_key())
    );

    assert_eq!(load.execute(&ctx, &global).unwrap(), Value::I64(5));
    assert_eq!(load.cache_state(), CacheState::Polymorphic);

    // Still correct after degrading
    assert_eq!(
        load.execute(&ctx, &Address::native(0x8_0000)).unwrap(),
        Value::I64(9)
    );
    assert_eq!(load.execute(&ctx, &global).unwrap(), Value::I64(5));
}

#[test]
fn test_caching_disabled_gives_identical_results() {
    let cached = RuntimeContext::with_defaults();
    let uncached =
        RuntimeContext::new(RuntimeConfig::default().with_inline_caching(false)).unwrap();

    for ctx in [&cached, &uncached] {
        ctx.memory().put_address(0x1000, 0x1008).unwrap();
        ctx.memory().put_address(0x1008, 0x77).unwrap();
    }

    let addresses = [
        Address::native(0x1000),
        Address::BoxedPrimitive(HostValue::Int(0x1008)),
        Address::native(0x1008),
    ];

    let on = LoadNode::new(LoadKind::Address);
    let off = LoadNode::new(LoadKind::Address);
    for address in &addresses {
        assert_eq!(
            on.execute(&cached, address).unwrap(),
            off.execute(&uncached, address).unwrap()
        );
    }
    assert_eq!(off.cache_state(), CacheState::Uninitialized);
    assert_eq!(on.cache_state(), CacheState::Polymorphic);
}

#[test]
fn test_failing_kind_does_not_poison_site() {
    let ctx = RuntimeContext::with_defaults();
    ctx.memory().put_i32(0x1000, 3).unwrap();
    let load = LoadNode::new(LoadKind::FixedInt(IntWidth::I32));

    let managed = Address::virtual_allocation(AllocationHandle::new(4));
    assert!(load.execute(&ctx, &managed).is_err());
    assert!(load.execute(&ctx, &managed).is_err());
    assert_eq!(
        load.execute(&ctx, &Address::native(0x1000)).unwrap(),
        Value::I32(3)
    );
}
