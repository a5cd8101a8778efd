//! Native storage for globals and two-phase module finalisation

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::ir::{GlobalEntry, GlobalId, GlobalKind, Module, Symbol, Type};
use crate::memory::NativeMemory;
use crate::runtime::IVarBit;

/// Longest alias chain followed before giving up
const MAX_ALIAS_DEPTH: usize = 64;

/// Maps a global to the native address of its storage
pub trait GlobalResolver: Send + Sync {
    /// Native location of `global`'s storage
    fn resolve_native_location(&self, global: &GlobalEntry) -> Result<u64>;
}

/// Global-to-native-address table shared by every executing thread
#[derive(Debug, Default)]
pub struct GlobalStorage {
    locations: DashMap<GlobalId, u64>,
}

impl GlobalStorage {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the native location of a global
    pub fn bind(&self, global: &GlobalEntry, address: u64) {
        self.locations.insert(global.id(), address);
    }

    /// Native location recorded for `id`
    pub fn location(&self, id: GlobalId) -> Option<u64> {
        self.locations.get(&id).map(|entry| *entry.value())
    }

    /// Number of bound globals
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// True when nothing is bound
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Resolve every global of `module` and materialise its initializer
    ///
    /// Runs single-threaded before execution starts. Every check happens
    /// before anything is allocated, bound or initialised, so a rejected
    /// module leaves the table and its entries as they were:
    /// 1. look up each initializer and check it fits its global's type
    /// 2. reserve storage for every variable, so forward references resolve
    /// 3. bind, `initialise` every entry, then bind aliases and write values
    pub fn finalize(&self, memory: &NativeMemory, module: &Module) -> Result<()> {
        let pending = module
            .globals()
            .iter()
            .map(|global| Ok((global.id(), global.pending_initializer(module.symbols())?)))
            .collect::<Result<Initializers>>()?;

        let mut layouts = Vec::new();
        for global in module.globals() {
            match global.kind() {
                GlobalKind::Variable { .. } => {
                    layouts.push((global, storage_layout(global)?));
                    if let Some(Some(symbol)) = pending.get(&global.id()) {
                        self.check_initializer(global, symbol, &pending)?;
                    }
                }
                GlobalKind::Alias => {
                    let target = alias_target(global, &pending)?;
                    if !pending.contains_key(&target.id()) {
                        self.resolve_native_location(&target)?;
                    }
                }
            }
        }

        let addresses = layouts
            .iter()
            .map(|(_, (size, align))| memory.allocate(*size, *align))
            .collect::<Result<Vec<_>>>()?;
        for ((global, _), address) in layouts.iter().zip(addresses) {
            self.bind(global, address);
        }

        for global in module.globals() {
            global.initialise(module.symbols())?;
        }

        for global in module.globals() {
            if global.kind() == GlobalKind::Alias {
                let target = alias_target(global, &pending)?;
                let address = self.resolve_native_location(&target)?;
                self.bind(global, address);
            }
        }

        for global in module.globals() {
            if let (GlobalKind::Variable { .. }, Some(symbol)) =
                (global.kind(), global.resolved_value())
            {
                let address = self.resolve_native_location(global)?;
                self.write_initializer(memory, address, global, symbol)?;
            }
        }

        tracing::debug!(
            module = module.name(),
            globals = module.globals().len(),
            "module finalised"
        );
        Ok(())
    }

    fn check_initializer(
        &self,
        global: &GlobalEntry,
        symbol: &Symbol,
        pending: &Initializers,
    ) -> Result<()> {
        if !initializer_fits(global.ty(), symbol) {
            return Err(Error::GlobalLifecycle {
                name: global.name().to_string(),
                message: format!("initializer {:?} does not fit type {}", symbol, global.ty()),
            });
        }
        if let Symbol::GlobalRef(target) = symbol {
            let target = upgrade(global, target)?;
            if !pending.contains_key(&target.id()) {
                self.resolve_native_location(&target)?;
            }
        }
        Ok(())
    }

    fn write_initializer(
        &self,
        memory: &NativeMemory,
        address: u64,
        global: &GlobalEntry,
        symbol: &Symbol,
    ) -> Result<()> {
        match (global.ty(), symbol) {
            (Type::Integer(bits), Symbol::Integer { value, .. }) => {
                memory.put_ivarbit(address, &IVarBit::from_i64(*bits, *value))
            }
            (Type::Float, Symbol::Floating { value, .. }) => memory.put_f32(address, *value as f32),
            (Type::Double, Symbol::Floating { value, .. }) => memory.put_f64(address, *value),
            (Type::X86Fp80, Symbol::Floating { value, .. }) => {
                memory.put_f80(address, (*value).into())
            }
            (Type::Pointer, Symbol::NullPointer) => memory.put_address(address, 0),
            (Type::Pointer, Symbol::GlobalRef(target)) => {
                let target = upgrade(global, target)?;
                let target_address = self.resolve_native_location(&target)?;
                memory.put_address(address, target_address)
            }
            (Type::Pointer, Symbol::Function { address: code, .. }) => {
                memory.put_address(address, *code)
            }
            (ty, Symbol::ZeroInitializer(_)) => {
                memory.write_bytes(address, &vec![0u8; ty.byte_size()])
            }
            _ => Err(Error::GlobalLifecycle {
                name: global.name().to_string(),
                message: format!("initializer {:?} does not fit type {}", symbol, global.ty()),
            }),
        }
    }
}

/// Initializers of one module, looked up but not yet stored in their entries
type Initializers = HashMap<GlobalId, Option<Symbol>>;

fn initializer_fits(ty: &Type, symbol: &Symbol) -> bool {
    matches!(
        (ty, symbol),
        (Type::Integer(_), Symbol::Integer { .. })
            | (Type::Float | Type::Double | Type::X86Fp80, Symbol::Floating { .. })
            | (
                Type::Pointer,
                Symbol::NullPointer | Symbol::GlobalRef(_) | Symbol::Function { .. }
            )
            | (_, Symbol::ZeroInitializer(_))
    )
}

/// Size and alignment of a variable's storage
fn storage_layout(global: &GlobalEntry) -> Result<(usize, usize)> {
    let ty = global.ty();
    let size = ty.checked_byte_size().ok_or_else(|| Error::GlobalLifecycle {
        name: global.name().to_string(),
        message: format!("type {} is too large to allocate", ty),
    })?;
    let align = match global.alignment() {
        0 => ty.alignment(),
        declared => declared as usize,
    };
    Ok((size.max(1), align))
}

fn upgrade(referrer: &GlobalEntry, target: &Weak<GlobalEntry>) -> Result<Arc<GlobalEntry>> {
    target.upgrade().ok_or_else(|| Error::GlobalLifecycle {
        name: referrer.name().to_string(),
        message: "initializer names a global that no longer exists".to_string(),
    })
}

/// The global `global`'s initializer names, from `pending` or its stored value
fn referenced_global(global: &GlobalEntry, pending: &Initializers) -> Result<Arc<GlobalEntry>> {
    let symbol = match pending.get(&global.id()) {
        Some(symbol) => symbol.as_ref(),
        None => global.resolved_value(),
    };
    match symbol {
        Some(Symbol::GlobalRef(target)) => upgrade(global, target),
        _ => Err(Error::GlobalLifecycle {
            name: global.name().to_string(),
            message: "alias must name a global".to_string(),
        }),
    }
}

/// Follow an alias to the first variable it names
fn alias_target(alias: &GlobalEntry, pending: &Initializers) -> Result<Arc<GlobalEntry>> {
    let mut current = referenced_global(alias, pending)?;
    for _ in 0..MAX_ALIAS_DEPTH {
        if current.kind() != GlobalKind::Alias {
            return Ok(current);
        }
        current = referenced_global(&current, pending)?;
    }

    Err(Error::GlobalLifecycle {
        name: alias.name().to_string(),
        message: "alias chain does not end in a variable".to_string(),
    })
}

impl GlobalResolver for GlobalStorage {
    fn resolve_native_location(&self, global: &GlobalEntry) -> Result<u64> {
        self.location(global.id())
            .ok_or_else(|| Error::UnresolvedGlobal {
                name: global.name().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_global_is_unresolved() {
        let storage = GlobalStorage::new();
        let global = GlobalEntry::variable(Type::I32, 4, None);
        assert!(matches!(
            storage.resolve_native_location(&global),
            Err(Error::UnresolvedGlobal { .. })
        ));
    }

    #[test]
    fn test_alias_cycle_is_rejected() {
        let memory = NativeMemory::new(0x1000, 256);
        let storage = GlobalStorage::new();
        let mut module = Module::new("cycle");
        let a = module.declare_global(GlobalKind::Alias, Type::Pointer, 8, Some(2));
        let b = module.declare_global(GlobalKind::Alias, Type::Pointer, 8, Some(1));
        module.add_symbol(Symbol::global_ref(&a));
        module.add_symbol(Symbol::global_ref(&b));

        assert!(matches!(
            storage.finalize(&memory, &module),
            Err(Error::GlobalLifecycle { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let memory = NativeMemory::new(0x1000, 256);
        let storage = GlobalStorage::new();
        let mut module = Module::new("bad");
        module.declare_global(GlobalKind::Variable { constant: true }, Type::Double, 8, Some(1));
        module.add_symbol(Symbol::NullPointer);

        assert!(storage.finalize(&memory, &module).is_err());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_reference_to_dropped_global_is_rejected() {
        let memory = NativeMemory::new(0x1000, 256);
        let storage = GlobalStorage::new();
        let mut module = Module::new("dangling");
        let gone = Arc::new(GlobalEntry::variable(Type::I32, 4, None));
        let slot = module.add_symbol(Symbol::global_ref(&gone));
        drop(gone);
        let pointer =
            module.declare_global(GlobalKind::Variable { constant: true }, Type::Pointer, 8, Some(slot));

        assert!(matches!(
            storage.finalize(&memory, &module),
            Err(Error::GlobalLifecycle { .. })
        ));
        assert!(storage.is_empty());
        assert!(!pointer.is_initialised());
    }

    #[test]
    fn test_oversized_global_is_rejected_before_allocation() {
        let memory = NativeMemory::new(0x1000, 256);
        let storage = GlobalStorage::new();
        let mut module = Module::new("huge");
        let small = module.declare_global(GlobalKind::Variable { constant: false }, Type::I32, 4, None);
        module.declare_global(
            GlobalKind::Variable { constant: false },
            Type::Array {
                element: Box::new(Type::I64),
                len: u64::MAX,
            },
            8,
            None,
        );

        assert!(matches!(
            storage.finalize(&memory, &module),
            Err(Error::GlobalLifecycle { .. })
        ));
        assert!(storage.is_empty());
        assert!(!small.is_initialised());
        assert_eq!(memory.allocate(4, 4).unwrap(), 0x1000);
    }
}
