//! Memory backing the address variants that reduce to bytes
//!
//! - [`NativeMemory`] - flat memory addressed by `Address::Native`
//! - [`AllocationHandle`] - managed buffers addressed by `Address::VirtualAllocation`

mod native;
mod virtual_alloc;

pub use native::NativeMemory;
pub use virtual_alloc::AllocationHandle;
