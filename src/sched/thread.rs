// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread representation
//!
//! A thread owns one fixed-size stack for its entire life, a saved execution
//! context, an identity, a lifecycle state and a run counter. The main
//! thread (id 0) is special: it begins at the caller's own execution point,
//! so it has no entry function and borrows the process stack instead of
//! owning a buffer.

use super::state::ThreadState;
use crate::arch::Context;

/// Thread id type. Ids are small, unique among live threads, and reused
/// (smallest first) after termination.
pub type ThreadId = usize;

/// Function a spawned thread begins executing at.
pub type EntryPoint = fn();

/// Maximum number of simultaneously live threads, the main thread included.
pub const MAX_THREADS: usize = 100;

/// Fixed per-thread stack size in bytes.
///
/// Signal delivery pushes its frame onto whatever stack is current, so green
/// stacks must absorb a kernel signal frame plus the handler's own frames on
/// top of application usage.
pub const STACK_SIZE: usize = 64 * 1024;

/// A green thread.
#[derive(Debug)]
pub struct Thread {
    id: ThreadId,
    state: ThreadState,
    entry: Option<EntryPoint>,
    /// Owned stack buffer; `None` for the main thread. Heap-allocated so the
    /// buffer never moves while the thread is suspended on it. Released
    /// exactly once, when the thread is dropped.
    stack: Option<Box<[u8]>>,
    context: Context,
    quantum_count: u64,
}

impl Thread {
    /// Create a spawned thread, ready to run.
    ///
    /// The context is bootstrapped so the first dispatch enters `start`,
    /// which is expected to re-enable preemption delivery and call `entry`.
    pub fn new(id: ThreadId, entry: EntryPoint, start: extern "C" fn() -> !) -> Self {
        let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();
        let context = Context::bootstrap(&mut stack, start);
        Self {
            id,
            state: ThreadState::Ready,
            entry: Some(entry),
            stack: Some(stack),
            context,
            quantum_count: 0,
        }
    }

    /// Create the main thread (id 0), running from the moment the library
    /// is initialized. Its context is first filled in when it is switched
    /// away from.
    pub fn main() -> Self {
        Self {
            id: 0,
            state: ThreadState::Running,
            entry: None,
            stack: None,
            context: Context::default(),
            quantum_count: 0,
        }
    }

    /// The thread's id.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Set the lifecycle state.
    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    /// Entry function; `None` for the main thread.
    pub fn entry(&self) -> Option<EntryPoint> {
        self.entry
    }

    /// Number of quantums during which this thread was the running thread.
    pub fn quantum_count(&self) -> u64 {
        self.quantum_count
    }

    /// Count one more quantum of execution.
    pub fn increment_quantum(&mut self) {
        self.quantum_count += 1;
    }

    /// Saved context, for switching into this thread.
    pub fn context_ptr(&self) -> *const Context {
        &self.context
    }

    /// Saved context, for switching away from this thread.
    pub fn context_mut_ptr(&mut self) -> *mut Context {
        &mut self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    extern "C" fn never_starts() -> ! {
        unreachable!()
    }

    #[test]
    fn test_spawned_thread_starts_ready() {
        let thread = Thread::new(7, noop, never_starts);
        assert_eq!(thread.id(), 7);
        assert_eq!(thread.state(), ThreadState::Ready);
        assert_eq!(thread.quantum_count(), 0);
        assert!(thread.entry().is_some());
        assert_eq!(thread.stack.as_ref().map(|s| s.len()), Some(STACK_SIZE));
    }

    #[test]
    fn test_main_thread_shape() {
        let main = Thread::main();
        assert_eq!(main.id(), 0);
        assert_eq!(main.state(), ThreadState::Running);
        assert!(main.entry().is_none());
        assert!(main.stack.is_none());
    }

    #[test]
    fn test_bootstrap_points_into_own_stack() {
        let thread = Thread::new(1, noop, never_starts);
        let stack = thread.stack.as_ref().unwrap();
        let base = stack.as_ptr() as u64;
        let sp = thread.context.stack_pointer();
        assert!(sp >= base && sp < base + STACK_SIZE as u64);
    }

    #[test]
    fn test_quantum_counter_monotonic() {
        let mut thread = Thread::new(1, noop, never_starts);
        thread.increment_quantum();
        thread.increment_quantum();
        assert_eq!(thread.quantum_count(), 2);
    }
}
