// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler and thread management
//!
//! This module owns all scheduling state: the thread entities themselves,
//! the state machine governing their lifecycle, and the core that decides
//! which thread runs on each dispatch tick.

pub mod scheduler;
pub mod state;
pub mod thread;

pub use scheduler::{Outgoing, Scheduler, Terminate, Tick};
pub use state::{ReadyQueue, Request, ThreadState, Transition};
pub use thread::{EntryPoint, Thread, ThreadId, MAX_THREADS, STACK_SIZE};
