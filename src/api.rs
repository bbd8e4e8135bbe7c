// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Public thread-library calls
//!
//! One scheduler instance lives in a process-global cell. Every public call
//! follows the same shape: pause preemption delivery, take the cell's lock,
//! consult or mutate the scheduler, and if a dispatch is needed, release the
//! lock and perform the context switch.
//!
//! The lock is a spin mutex, but contention is impossible by construction:
//! the library runs on a single OS thread, and the signal handler (the only
//! asynchronous entry) can only fire while no voluntary call holds the lock,
//! because voluntary calls pause delivery before locking.

use crate::arch;
use crate::error::{Result, ThreadError};
use crate::sched::{EntryPoint, Outgoing, Scheduler, Terminate, ThreadId, Tick};
use crate::timer::{self, PreemptGuard};
use std::process;

static RUNTIME: spin::Mutex<Option<Scheduler>> = spin::Mutex::new(None);

/// Log a library error before handing it to the caller.
fn report<T>(result: Result<T>) -> Result<T> {
    if let Err(ref err) = result {
        log::error!("thread library error: {err}");
    }
    result
}

/// Run one dispatch tick and, if another thread was chosen, switch to it.
///
/// Consumes the lock guard so the cell is unlocked across the switch; the
/// thread switched into acquires the lock itself on whichever path it
/// resumes through. The raw context pointers stay valid between
/// `prepare_tick` and the switch because nothing else can run in between:
/// delivery is paused and there is only one OS thread.
fn dispatch(mut runtime: spin::MutexGuard<'_, Option<Scheduler>>, outgoing: Outgoing) {
    let sched = match runtime.as_mut() {
        Some(sched) => sched,
        None => return,
    };
    match sched.prepare_tick(outgoing) {
        Tick::Continue => {}
        Tick::Switch { from, to, .. } => {
            drop(runtime);
            timer::rearm();
            unsafe { arch::switch(from, to) };
        }
    }
}

/// Timer-signal entry: preempt the running thread.
///
/// Runs with `SIGVTALRM` already paused by the kernel's handler mask, so it
/// can take the lock without racing a voluntary call. This path must not
/// allocate; the scheduler's quantum bookkeeping and queue moves all happen
/// in storage reserved at initialization.
extern "C" fn handle_preempt(_signum: libc::c_int) {
    let mut runtime = RUNTIME.lock();
    let sched = match runtime.as_mut() {
        Some(sched) => sched,
        None => return,
    };
    match sched.prepare_tick(Outgoing::Yield) {
        Tick::Continue => {}
        Tick::Switch { from, to, .. } => {
            drop(runtime);
            timer::rearm();
            unsafe { arch::switch(from, to) };
        }
    }
}

/// First instruction of every spawned thread.
///
/// The dispatch that switched here left delivery paused; re-enable it, run
/// the thread's entry function, and destroy the thread when it returns.
extern "C" fn thread_start() -> ! {
    let entry = {
        let runtime = RUNTIME.lock();
        runtime.as_ref().and_then(|sched| sched.current_entry())
    };
    timer::resume_delivery();
    if let Some(entry) = entry {
        entry();
    }
    let me = {
        let _guard = PreemptGuard::new();
        let runtime = RUNTIME.lock();
        runtime.as_ref().map(|sched| sched.running())
    };
    if let Some(me) = me {
        let _ = terminate(me);
    }
    // A terminated thread's context is never switched back into.
    process::abort();
}

/// Initialize the thread library.
///
/// The calling flow becomes the main thread (id 0), immediately running and
/// owning the first quantum, so the total quantum count starts at 1. The
/// quantum length is virtual CPU time in microseconds and must be positive.
pub fn init(quantum_usecs: i64) -> Result<()> {
    report(do_init(quantum_usecs))
}

fn do_init(quantum_usecs: i64) -> Result<()> {
    if quantum_usecs <= 0 {
        return Err(ThreadError::NonPositiveQuantum(quantum_usecs));
    }
    let _guard = PreemptGuard::new();
    {
        let mut runtime = RUNTIME.lock();
        if runtime.is_some() {
            return Err(ThreadError::AlreadyInitialized);
        }
        let mut sched = Scheduler::new();
        // The main thread's first quantum starts now.
        match sched.prepare_tick(Outgoing::Yield) {
            Tick::Continue => {}
            Tick::Switch { .. } => return Err(ThreadError::Inconsistent(0)),
        }
        *runtime = Some(sched);
    }
    timer::configure(quantum_usecs, handle_preempt);
    Ok(())
}

/// Create a new thread running `entry`, with the smallest free id. The new
/// thread joins the tail of the ready queue; the caller keeps running.
pub fn spawn(entry: EntryPoint) -> Result<ThreadId> {
    let _guard = PreemptGuard::new();
    let mut runtime = RUNTIME.lock();
    let result = match runtime.as_mut() {
        Some(sched) => sched.spawn(entry, thread_start),
        None => Err(ThreadError::NotInitialized),
    };
    report(result)
}

/// Terminate a thread and release its resources.
///
/// Terminating the main thread (id 0) ends the whole process with exit
/// status 0. A thread that terminates itself never returns from this call.
pub fn terminate(tid: ThreadId) -> Result<()> {
    let _guard = PreemptGuard::new();
    let mut runtime = RUNTIME.lock();
    let outcome = match runtime.as_mut() {
        Some(sched) => sched.terminate(tid),
        None => Err(ThreadError::NotInitialized),
    };
    match report(outcome)? {
        Terminate::Done => Ok(()),
        Terminate::ExitProcess => process::exit(0),
        Terminate::DispatchSelf => {
            dispatch(runtime, Outgoing::Terminate);
            // The terminating switch saves into a scratch context that is
            // never resumed.
            process::abort();
        }
    }
}

/// Block a thread until it is resumed. A thread may block itself, in which
/// case the call returns only after some other flow resumes it and it is
/// dispatched again. Blocking an already-blocked thread succeeds and does
/// nothing; the main thread cannot be blocked.
pub fn block(tid: ThreadId) -> Result<()> {
    let _guard = PreemptGuard::new();
    let mut runtime = RUNTIME.lock();
    let self_block = match runtime.as_mut() {
        Some(sched) => sched.block(tid),
        None => Err(ThreadError::NotInitialized),
    };
    if report(self_block)? {
        dispatch(runtime, Outgoing::Block);
    }
    Ok(())
}

/// Clear a thread's blocked condition. Resuming a thread that is ready,
/// running or merely sleeping succeeds and does nothing.
pub fn resume(tid: ThreadId) -> Result<()> {
    let _guard = PreemptGuard::new();
    let mut runtime = RUNTIME.lock();
    let result = match runtime.as_mut() {
        Some(sched) => sched.resume(tid),
        None => Err(ThreadError::NotInitialized),
    };
    report(result)
}

/// Put the calling thread to sleep for `num_quantums` dispatch ticks. The
/// call returns after the countdown expires and the thread is dispatched
/// again. The main thread cannot sleep.
pub fn sleep(num_quantums: i64) -> Result<()> {
    let _guard = PreemptGuard::new();
    let mut runtime = RUNTIME.lock();
    let prepared = match runtime.as_mut() {
        Some(sched) => sched.prepare_sleep(num_quantums),
        None => Err(ThreadError::NotInitialized),
    };
    let outgoing = report(prepared)?;
    dispatch(runtime, outgoing);
    Ok(())
}

/// Id of the calling thread.
pub fn current_thread() -> Result<ThreadId> {
    let _guard = PreemptGuard::new();
    let runtime = RUNTIME.lock();
    let result = match runtime.as_ref() {
        Some(sched) => Ok(sched.running()),
        None => Err(ThreadError::NotInitialized),
    };
    report(result)
}

/// Total number of dispatch ticks since `init`, the initial one included.
pub fn total_quantums() -> Result<u64> {
    let _guard = PreemptGuard::new();
    let runtime = RUNTIME.lock();
    let result = match runtime.as_ref() {
        Some(sched) => Ok(sched.total_quantums()),
        None => Err(ThreadError::NotInitialized),
    };
    report(result)
}

/// Number of dispatch ticks during which thread `tid` was running.
pub fn quantums(tid: ThreadId) -> Result<u64> {
    let _guard = PreemptGuard::new();
    let runtime = RUNTIME.lock();
    let result = match runtime.as_ref() {
        Some(sched) => sched.quantums(tid),
        None => Err(ThreadError::NotInitialized),
    };
    report(result)
}
