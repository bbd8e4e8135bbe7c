// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Recoverable library errors
//!
//! Every failure here is reported to the caller and leaves scheduler state
//! exactly as it was before the call. Environment faults (a failing
//! `sigaction`, `setitimer` or `sigprocmask`) are not represented: the
//! scheduler cannot function without them and they terminate the process
//! (see [`crate::timer`]).

use crate::sched::thread::ThreadId;
use thiserror::Error;

/// Errors returned by the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// The quantum length passed to `init` was zero or negative.
    #[error("quantum length must be a positive number of microseconds, got {0}")]
    NonPositiveQuantum(i64),

    /// The duration passed to `sleep` was zero or negative.
    #[error("sleep duration must be a positive number of quantums, got {0}")]
    NonPositiveSleep(i64),

    /// `init` was called a second time.
    #[error("thread library is already initialized")]
    AlreadyInitialized,

    /// A lifecycle call was made before `init`.
    #[error("thread library has not been initialized")]
    NotInitialized,

    /// No live thread carries this id.
    #[error("no thread with id {0}")]
    NotFound(ThreadId),

    /// The id can never name a thread (at or above the thread ceiling).
    #[error("thread id {0} is outside the valid range")]
    IdOutOfRange(ThreadId),

    /// The main thread cannot be blocked.
    #[error("the main thread cannot be blocked")]
    BlockMain,

    /// The main thread cannot put itself to sleep.
    #[error("the main thread cannot sleep")]
    SleepMain,

    /// Every id in the fixed-size pool is in use.
    #[error("thread capacity exhausted, no free ids remain")]
    Exhausted,

    /// A thread was found in an impossible combination of scheduler
    /// structures. Reported instead of crashing; no state is mutated.
    #[error("scheduler bookkeeping is inconsistent for thread {0}")]
    Inconsistent(ThreadId),
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, ThreadError>;
