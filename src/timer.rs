// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Virtual-timer preemption
//!
//! Preemption is driven by `SIGVTALRM` from a per-process virtual timer
//! (`ITIMER_VIRTUAL`), which counts CPU time consumed by the process rather
//! than wall-clock time. The timer is re-armed to a full quantum on every
//! dispatch, so a thread that yields early never shortens the next thread's
//! slice.
//!
//! Mask discipline: every context switch executes with `SIGVTALRM` delivery
//! paused. Delivery comes back on whichever path a thread resumes through:
//! the [`PreemptGuard`] drop at the end of a voluntary call, the kernel's
//! `sigreturn` when a preempted thread unwinds out of the signal handler, or
//! an explicit [`resume_delivery`] in the trampoline of a thread running for
//! the first time.
//!
//! The scheduler cannot operate at all if the kernel rejects the handler,
//! mask or timer syscalls, so those faults are not surfaced as `Result`s;
//! they report to stderr and end the process.

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use std::fmt::Display;
use std::process;
use std::sync::atomic::{AtomicI64, Ordering};

/// Quantum length in microseconds, recorded at configuration time so every
/// re-arm uses the same slice.
static QUANTUM_USECS: AtomicI64 = AtomicI64::new(0);

/// Split a microsecond count into the seconds/microseconds pair an
/// `itimerval` wants.
fn split_quantum(usecs: i64) -> (i64, i64) {
    (usecs / 1_000_000, usecs % 1_000_000)
}

fn fatal(what: &str, err: impl Display) -> ! {
    eprintln!("system error: {what}: {err}");
    process::exit(1);
}

fn vtalrm_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGVTALRM);
    set
}

/// Install `handler` for `SIGVTALRM` and start the virtual timer with the
/// given quantum. Called once, from library initialization, with delivery
/// already paused.
pub fn configure(quantum_usecs: i64, handler: extern "C" fn(libc::c_int)) {
    QUANTUM_USECS.store(quantum_usecs, Ordering::Relaxed);
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
    if let Err(err) = unsafe { signal::sigaction(Signal::SIGVTALRM, &action) } {
        fatal("sigaction(SIGVTALRM)", err);
    }
    rearm();
}

/// Restart the virtual timer so the next expiry is a full quantum away.
/// Called on every dispatch, voluntary or preemptive.
pub fn rearm() {
    let (sec, usec) = split_quantum(QUANTUM_USECS.load(Ordering::Relaxed));
    let slice = libc::timeval {
        tv_sec: sec,
        tv_usec: usec,
    };
    let timer = libc::itimerval {
        it_interval: slice,
        it_value: slice,
    };
    let rc = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) };
    if rc != 0 {
        fatal("setitimer(ITIMER_VIRTUAL)", std::io::Error::last_os_error());
    }
}

/// Allow `SIGVTALRM` delivery again. Used by the trampoline of a thread
/// entering its body for the first time; every other resume path restores
/// delivery on its own.
pub fn resume_delivery() {
    if let Err(err) = signal::sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&vtalrm_set()), None) {
        fatal("sigprocmask(SIG_UNBLOCK)", err);
    }
}

/// Pauses `SIGVTALRM` delivery for its lifetime.
///
/// Every voluntary entry into the scheduler holds one of these across its
/// whole critical section, context switch included. The signal handler does
/// not need one: the kernel already pauses delivery while it runs.
pub struct PreemptGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl PreemptGuard {
    /// Pause delivery until the guard is dropped.
    pub fn new() -> Self {
        if let Err(err) = signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&vtalrm_set()), None) {
            fatal("sigprocmask(SIG_BLOCK)", err);
        }
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Default for PreemptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        resume_delivery();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_quantum() {
        assert_eq!(split_quantum(1), (0, 1));
        assert_eq!(split_quantum(999_999), (0, 999_999));
        assert_eq!(split_quantum(1_000_000), (1, 0));
        assert_eq!(split_quantum(2_500_000), (2, 500_000));
    }

    #[test]
    fn test_guard_masks_and_unmasks_vtalrm() {
        let masked = |set: &SigSet| set.contains(Signal::SIGVTALRM);
        {
            let _guard = PreemptGuard::new();
            let current = SigSet::thread_get_mask().unwrap();
            assert!(masked(&current));
        }
        let current = SigSet::thread_get_mask().unwrap();
        assert!(!masked(&current));
    }
}
