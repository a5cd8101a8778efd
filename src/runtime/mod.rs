//! Runtime core: values, addresses, load dispatch and execution state

mod address;
mod context;
pub mod debug;
mod float80;
mod globals;
mod inline_cache;
mod ivarbit;
pub mod load;
pub mod threading;
mod value;

pub use address::{Address, AddressKind, HostValue};
pub use context::RuntimeContext;
pub use debug::{DebugFrame, DebugFrameWrite, DebugProviderKind, DebugValue, SourceSymbol};
pub use float80::Float80;
pub use globals::{GlobalResolver, GlobalStorage};
pub use inline_cache::{CacheState, InlineCache};
pub use ivarbit::IVarBit;
pub use load::{GlobalDirectLoad, IntWidth, LoadKind, LoadNode};
pub use threading::{ExecutionStack, ThreadStack, ThreadingStack};
pub use value::{FunctionHandle, Value};
