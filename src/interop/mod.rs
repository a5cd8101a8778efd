//! Interop with objects that live outside interpreter memory

mod convert;
mod execute;
mod foreign;
mod objects;
pub mod predicates;
mod read;

pub use convert::{DataEscape, ForeignToNative, FromForeign, ToForeign};
pub use execute::ForeignExecuteNode;
pub use foreign::{ForeignHandle, ForeignObject, ForeignResult, RawForeignValue};
pub use objects::{ForeignArray, ForeignBox, ForeignCallable, ForeignFunction, ForeignNull};
pub use predicates::{has_size, is_boxed, is_executable, is_null, ForeignPredicate};
pub use read::ForeignRead;
