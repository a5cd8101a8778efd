//! # IR model consumed by the runtime core
//!
//! ```text
//! ir/
//! ├── mod.rs      # This file - re-exports
//! ├── types.rs    # Type, FunctionType, storage sizes
//! ├── global.rs   # GlobalEntry lifecycle, Symbol, SymbolTable
//! └── module.rs   # Module: declarations + symbol list
//! ```

mod global;
mod module;
mod types;

pub use global::{GlobalEntry, GlobalId, GlobalKind, Symbol, SymbolTable, Symbols, UNKNOWN_NAME};
pub use module::Module;
pub use types::{
    var_bit_byte_size, FunctionType, Type, ADDRESS_SIZE_IN_BYTES, FLOAT80_SIZE_IN_BYTES,
};
