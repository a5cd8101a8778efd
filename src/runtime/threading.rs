//! Per-thread execution stacks
//!
//! The interpreted program may itself be multi-threaded, so every OS thread
//! that executes IR owns a separate stack region carved out of native memory.
//! Stacks are created lazily the first time a thread asks for one and live in
//! a registry keyed by thread id.
//!
//! ## Example
//!
//! ```
//! use llir_runtime::memory::NativeMemory;
//! use llir_runtime::runtime::{ExecutionStack, ThreadingStack};
//!
//! let memory = NativeMemory::new(0x1000, 0x10000);
//! let threading = ThreadingStack::new(0x1000);
//! let stack = threading.stack_for_current_thread(&memory).unwrap();
//! assert_eq!(stack.stack_pointer(), stack.top());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use crate::error::Result;
use crate::memory::NativeMemory;

/// Stack alignment used for every thread stack region
const STACK_ALIGNMENT: usize = 16;

/// Stack-pointer access for one execution unit
pub trait ExecutionStack: Send + Sync {
    /// Current stack pointer
    fn stack_pointer(&self) -> u64;

    /// Re-point the stack
    fn set_stack_pointer(&self, sp: u64);
}

/// Stack region owned by one OS thread
#[derive(Debug)]
pub struct ThreadStack {
    thread: ThreadId,
    base: u64,
    top: u64,
    sp: AtomicU64,
}

impl ThreadStack {
    fn new(thread: ThreadId, base: u64, size: u64) -> Self {
        let top = base + size;
        ThreadStack {
            thread,
            base,
            top,
            sp: AtomicU64::new(top),
        }
    }

    /// Owning thread
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Lowest address of the region
    pub fn base(&self) -> u64 {
        self.base
    }

    /// One past the highest address; the initial stack pointer
    pub fn top(&self) -> u64 {
        self.top
    }
}

impl ExecutionStack for ThreadStack {
    fn stack_pointer(&self) -> u64 {
        self.sp.load(Ordering::Acquire)
    }

    fn set_stack_pointer(&self, sp: u64) {
        self.sp.store(sp, Ordering::Release);
    }
}

/// Registry of thread stacks
#[derive(Debug)]
pub struct ThreadingStack {
    stacks: DashMap<ThreadId, Arc<ThreadStack>>,
    stack_size: u64,
}

impl ThreadingStack {
    /// Registry handing out stacks of `stack_size` bytes
    pub fn new(stack_size: u64) -> Self {
        ThreadingStack {
            stacks: DashMap::new(),
            stack_size,
        }
    }

    /// Size of each stack region
    pub fn stack_size(&self) -> u64 {
        self.stack_size
    }

    /// The calling thread's stack, allocating it from `memory` on first use
    pub fn stack_for_current_thread(&self, memory: &NativeMemory) -> Result<Arc<ThreadStack>> {
        let id = thread::current().id();
        if let Some(stack) = self.stacks.get(&id) {
            return Ok(stack.value().clone());
        }

        // Only the owning thread inserts under its own id
        let base = memory.allocate(self.stack_size as usize, STACK_ALIGNMENT)?;
        let stack = Arc::new(ThreadStack::new(id, base, self.stack_size));
        tracing::debug!(thread = ?id, base, size = self.stack_size, "thread stack created");
        self.stacks.insert(id, stack.clone());
        Ok(stack)
    }

    /// Stack of another thread, if it ever asked for one
    pub fn stack_for(&self, thread: ThreadId) -> Option<Arc<ThreadStack>> {
        self.stacks.get(&thread).map(|entry| entry.value().clone())
    }

    /// Number of threads that own a stack
    pub fn thread_count(&self) -> usize {
        self.stacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_is_reused_per_thread() {
        let memory = NativeMemory::new(0x1000, 0x4000);
        let threading = ThreadingStack::new(0x1000);

        let first = threading.stack_for_current_thread(&memory).unwrap();
        let second = threading.stack_for_current_thread(&memory).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.top() - first.base(), 0x1000);
        assert_eq!(threading.thread_count(), 1);
    }

    #[test]
    fn test_threads_get_distinct_stacks() {
        let memory = NativeMemory::new(0x1000, 0x4000);
        let threading = ThreadingStack::new(0x1000);
        let main = threading.stack_for_current_thread(&memory).unwrap();

        let other = std::thread::scope(|scope| {
            scope
                .spawn(|| threading.stack_for_current_thread(&memory).unwrap())
                .join()
                .unwrap()
        });

        assert_ne!(main.base(), other.base());
        assert_ne!(main.thread(), other.thread());
        assert!(threading.stack_for(other.thread()).is_some());
    }

    #[test]
    fn test_stack_pointer_round_trip() {
        let memory = NativeMemory::new(0x1000, 0x2000);
        let threading = ThreadingStack::new(0x1000);
        let stack = threading.stack_for_current_thread(&memory).unwrap();

        stack.set_stack_pointer(stack.top() - 64);
        assert_eq!(stack.stack_pointer(), stack.top() - 64);
    }

    #[test]
    fn test_exhausted_memory_is_reported() {
        let memory = NativeMemory::new(0x1000, 0x100);
        let threading = ThreadingStack::new(0x1000);
        assert!(threading.stack_for_current_thread(&memory).is_err());
    }
}
