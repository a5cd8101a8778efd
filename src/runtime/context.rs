//! Shared state of one interpreter instance

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::ir::{GlobalEntry, Module};
use crate::memory::NativeMemory;

use super::globals::{GlobalResolver, GlobalStorage};
use super::threading::{ThreadStack, ThreadingStack};

/// Everything a load or call node needs at execution time
///
/// One context is shared by every thread executing the same program. After
/// [`finalize_module`](Self::finalize_module) the only mutable pieces are
/// native memory contents and the per-thread stack registry.
#[derive(Debug)]
pub struct RuntimeContext {
    config: RuntimeConfig,
    memory: NativeMemory,
    globals: GlobalStorage,
    threading_stack: ThreadingStack,
}

impl RuntimeContext {
    /// Build a context after validating `config`
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(RuntimeContext {
            memory: NativeMemory::new(config.memory_base, config.memory_size),
            globals: GlobalStorage::new(),
            threading_stack: ThreadingStack::new(config.stack_size),
            config,
        })
    }

    /// Context with the default configuration
    pub fn with_defaults() -> Self {
        let config = RuntimeConfig::default();
        RuntimeContext {
            memory: NativeMemory::new(config.memory_base, config.memory_size),
            globals: GlobalStorage::new(),
            threading_stack: ThreadingStack::new(config.stack_size),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn memory(&self) -> &NativeMemory {
        &self.memory
    }

    pub fn globals(&self) -> &GlobalStorage {
        &self.globals
    }

    pub fn threading_stack(&self) -> &ThreadingStack {
        &self.threading_stack
    }

    /// The calling thread's execution stack
    pub fn stack_for_current_thread(&self) -> Result<Arc<ThreadStack>> {
        self.threading_stack.stack_for_current_thread(&self.memory)
    }

    /// Place every global of `module` in native memory and write its
    /// initializer. Must complete before concurrent execution starts.
    pub fn finalize_module(&self, module: &Module) -> Result<()> {
        self.globals.finalize(&self.memory, module)
    }

    /// Pointer-sized content of a global's storage
    pub fn load_global_value(&self, global: &GlobalEntry) -> Result<u64> {
        let location = self.resolve_native_location(global)?;
        self.memory.get_address(location)
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl GlobalResolver for RuntimeContext {
    fn resolve_native_location(&self, global: &GlobalEntry) -> Result<u64> {
        self.globals.resolve_native_location(global)
    }
}
