//! # llir-runtime - runtime core for an IR interpreter
//!
//! Executes loaded IR against a small set of polymorphic address
//! representations and crosses into foreign code when the IR references
//! objects or callables the interpreter does not own.
//!
//! ## Features
//!
//! - **Polymorphic addresses** - native, global, managed buffer, boxed host value, foreign object
//! - **Typed load dispatch** - one rule table per value kind, with a per-site dispatch hint
//! - **Foreign calls** - argument escape, result conversion, stack-pointer preservation
//! - **Foreign predicates** - `is_boxed`, `is_executable`, `is_null`, `has_size`
//! - **Deferred globals** - initializers resolved once the whole module is known
//!
//! ## Quick Start
//!
//! ```rust
//! use llir_runtime::ir::{GlobalKind, Module, Symbol, Type};
//! use llir_runtime::runtime::{Address, LoadNode, RuntimeContext, Value};
//!
//! # fn main() -> llir_runtime::Result<()> {
//! let mut module = Module::new("demo");
//! let slot = module.add_symbol(Symbol::Integer { ty: Type::I32, value: 42 });
//! let answer = module.declare_global(GlobalKind::Variable { constant: true }, Type::I32, 4, Some(slot));
//! answer.set_name("answer")?;
//!
//! let ctx = RuntimeContext::with_defaults();
//! ctx.finalize_module(&module)?;
//!
//! let load = LoadNode::for_type(&Type::I32)?;
//! assert_eq!(load.execute(&ctx, &Address::Global(answer))?, Value::I32(42));
//! # Ok(())
//! # }
//! ```
//!
//! ## Calling foreign code
//!
//! ```rust
//! use llir_runtime::interop::{
//!     ForeignExecuteNode, ForeignFunction, ForeignHandle, ForeignResult, RawForeignValue,
//! };
//! use llir_runtime::ir::Type;
//! use llir_runtime::runtime::{Address, ExecutionStack, RuntimeContext, Value};
//!
//! # fn main() -> llir_runtime::Result<()> {
//! let ctx = RuntimeContext::with_defaults();
//! let negate = ForeignFunction::new("negate", 1, |args: &[RawForeignValue]| -> ForeignResult<RawForeignValue> {
//!     match args {
//!         [RawForeignValue::Int(v)] => Ok(RawForeignValue::Int(-v)),
//!         _ => Ok(RawForeignValue::Null),
//!     }
//! });
//! let target: Value = Address::foreign(ForeignHandle::new(negate)).into();
//!
//! let sp = ctx.stack_for_current_thread()?.stack_pointer();
//! let call = ForeignExecuteNode::new(vec![Type::I64], Type::I64);
//! assert_eq!(call.execute(&ctx, &target, &[Value::I64(7)], sp)?, Value::I64(-7));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - types, global entries, modules
//! - [`memory`] - native memory image and managed buffers
//! - [`runtime`] - addresses, values, load dispatch, context, thread stacks
//! - [`interop`] - foreign object protocol, conversions, calls, predicates
//!
//! ## Error Handling
//!
//! Every operation returns [`Result`]. [`Error::classify`] separates faults
//! that abort the current execution unit from recoverable setup errors.

#![allow(missing_docs)]

/// Version of the runtime core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod error;
pub mod interop;
pub mod ir;
pub mod memory;
pub mod runtime;

// Re-export main types
pub use config::RuntimeConfig;
pub use error::{Error, ErrorSeverity, ForeignError, Result};
pub use interop::{ForeignExecuteNode, ForeignHandle, ForeignObject, ForeignPredicate};
pub use ir::{GlobalEntry, Module, Type};
pub use runtime::{Address, LoadKind, LoadNode, RuntimeContext, Value};
