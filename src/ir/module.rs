//! Module-level container for global declarations and their symbols

use std::sync::Arc;

use super::global::{GlobalEntry, GlobalKind, Symbol, Symbols};
use super::types::Type;

/// The globals and symbol list a loaded module declares
///
/// Building a module is the first phase of global setup: every declaration and
/// every symbol is registered here before any initializer is resolved. The
/// second phase is [`RuntimeContext::finalize_module`](crate::runtime::RuntimeContext::finalize_module).
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    globals: Vec<Arc<GlobalEntry>>,
    symbols: Symbols,
}

impl Module {
    /// Creates an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            globals: Vec::new(),
            symbols: Symbols::new(),
        }
    }

    /// Module identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a global variable or alias, one entry per declaration
    pub fn declare_global(
        &mut self,
        kind: GlobalKind,
        ty: Type,
        alignment: u32,
        initializer_slot: Option<u32>,
    ) -> Arc<GlobalEntry> {
        let global = Arc::new(GlobalEntry::new(kind, ty, alignment, initializer_slot));
        self.globals.push(global.clone());
        global
    }

    /// Register a symbol and return its one-based slot
    pub fn add_symbol(&mut self, symbol: Symbol) -> u32 {
        self.symbols.add(symbol)
    }

    /// Declared globals in declaration order
    pub fn globals(&self) -> &[Arc<GlobalEntry>] {
        &self.globals
    }

    /// The module's symbol list
    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    /// Look up a named global; `name` may omit the leading `@`
    pub fn global(&self, name: &str) -> Option<&Arc<GlobalEntry>> {
        let wanted = name.strip_prefix('@').unwrap_or(name);
        self.globals
            .iter()
            .find(|global| global.is_named() && &global.name()[1..] == wanted)
    }
}
