// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! # uthreads
//!
//! A user-level thread library: many green threads multiplexed onto the one
//! OS thread that calls [`init`]. Scheduling is preemptive round-robin over
//! a FIFO ready queue, driven by a virtual CPU-time quantum; threads can
//! also leave the CPU voluntarily by blocking themselves or sleeping for a
//! number of quantums.
//!
//! ```text
//! uthreads
//! ├── api        public calls, global runtime cell, signal handler
//! ├── sched      scheduler core, thread entities, state machine
//! │   ├── scheduler
//! │   ├── state
//! │   └── thread
//! ├── timer      SIGVTALRM / ITIMER_VIRTUAL plumbing, delivery guard
//! ├── arch       context switch and stack bootstrap (x86-64 SysV)
//! └── error      recoverable error type
//! ```
//!
//! The library is single-OS-thread by design. Calls made from any OS thread
//! other than the initializing one are unsupported.
//!
//! ## Example
//!
//! ```no_run
//! fn worker() {
//!     while uthreads::total_quantums().unwrap_or(0) < 50 {}
//!     let me = uthreads::current_thread().unwrap();
//!     uthreads::terminate(me).unwrap();
//! }
//!
//! uthreads::init(10_000).unwrap();
//! let tid = uthreads::spawn(worker).unwrap();
//! uthreads::resume(tid).unwrap();
//! ```

pub mod api;
pub mod arch;
pub mod error;
pub mod sched;
pub mod timer;

pub use api::{
    block, current_thread, init, quantums, resume, sleep, spawn, terminate, total_quantums,
};
pub use error::{Result, ThreadError};
pub use sched::{ThreadId, MAX_THREADS, STACK_SIZE};
