// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! End-to-end exercise of the thread library on a live virtual timer.
//!
//! Built with `harness = false`: the library multiplexes its green threads
//! onto the OS thread that calls `init`, and `SIGVTALRM` must be delivered
//! to that same thread, so the test owns the process's real main thread
//! instead of running on a libtest worker.
//!
//! The process exits 0 through `terminate(0)` on success and exits 1 at the
//! first failed check.

use std::process;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use uthreads::ThreadError;

/// Quantum length for the whole run, in microseconds of virtual CPU time.
const QUANTUM_USECS: i64 = 10_000;

/// Upper bound on dispatch ticks before declaring the run wedged.
const TICK_BUDGET: u64 = 3_000;

static WORKER_A_DONE: AtomicBool = AtomicBool::new(false);
static WORKER_B_DONE: AtomicBool = AtomicBool::new(false);
static BLOCKER_PARKED: AtomicBool = AtomicBool::new(false);
static BLOCKER_DONE: AtomicBool = AtomicBool::new(false);
static SLEEPER_DELTA: AtomicU64 = AtomicU64::new(0);
static SLEEPER_DONE: AtomicBool = AtomicBool::new(false);

fn check(cond: bool, what: &str) {
    if cond {
        eprintln!("ok: {what}");
    } else {
        eprintln!("FAILED: {what}");
        process::exit(1);
    }
}

/// Spin until `done` reports true, failing the run if the tick budget is
/// exhausted first.
fn await_flag(done: &AtomicBool, what: &str) {
    while !done.load(Ordering::SeqCst) {
        let ticks = match uthreads::total_quantums() {
            Ok(ticks) => ticks,
            Err(_) => {
                check(false, what);
                return;
            }
        };
        if ticks > TICK_BUDGET {
            check(false, what);
            return;
        }
    }
    check(true, what);
}

/// Burns CPU until it has been preempted into a few quantums of its own,
/// then terminates itself.
fn worker(done: &AtomicBool) {
    let me = uthreads::current_thread().unwrap();
    while uthreads::quantums(me).unwrap() < 3 {}
    done.store(true, Ordering::SeqCst);
    uthreads::terminate(me).unwrap();
}

fn worker_a() {
    worker(&WORKER_A_DONE);
}

fn worker_b() {
    worker(&WORKER_B_DONE);
}

/// Blocks itself; the main thread resumes it and it finishes.
fn blocker() {
    let me = uthreads::current_thread().unwrap();
    BLOCKER_PARKED.store(true, Ordering::SeqCst);
    uthreads::block(me).unwrap();
    // Only reached after an explicit resume and a re-dispatch.
    BLOCKER_DONE.store(true, Ordering::SeqCst);
    uthreads::terminate(me).unwrap();
}

/// Sleeps for three quantums and records how many ticks actually elapsed.
fn sleeper() {
    let me = uthreads::current_thread().unwrap();
    let before = uthreads::total_quantums().unwrap();
    uthreads::sleep(3).unwrap();
    let after = uthreads::total_quantums().unwrap();
    SLEEPER_DELTA.store(after - before, Ordering::SeqCst);
    SLEEPER_DONE.store(true, Ordering::SeqCst);
    uthreads::terminate(me).unwrap();
}

fn main() {
    env_logger::init();

    // Every lifecycle call fails before init.
    check(
        uthreads::current_thread() == Err(ThreadError::NotInitialized),
        "current_thread before init is rejected",
    );
    check(
        uthreads::spawn(worker_a) == Err(ThreadError::NotInitialized),
        "spawn before init is rejected",
    );
    check(
        uthreads::total_quantums() == Err(ThreadError::NotInitialized),
        "total_quantums before init is rejected",
    );

    // The quantum must be positive.
    check(
        uthreads::init(0) == Err(ThreadError::NonPositiveQuantum(0)),
        "init(0) is rejected",
    );
    check(
        uthreads::init(-250) == Err(ThreadError::NonPositiveQuantum(-250)),
        "init(-250) is rejected",
    );

    check(uthreads::init(QUANTUM_USECS).is_ok(), "init succeeds");
    check(
        uthreads::init(QUANTUM_USECS) == Err(ThreadError::AlreadyInitialized),
        "second init is rejected",
    );

    // The calling flow is thread 0, mid-quantum from the moment init
    // returned.
    check(
        uthreads::current_thread() == Ok(0),
        "caller becomes thread 0",
    );
    check(
        uthreads::total_quantums().unwrap() >= 1,
        "the initial quantum is counted",
    );
    check(
        uthreads::quantums(0).unwrap() >= 1,
        "thread 0 owns the initial quantum",
    );

    // Recoverable errors, none of which may disturb the scheduler.
    check(
        uthreads::block(0) == Err(ThreadError::BlockMain),
        "blocking the main thread is rejected",
    );
    check(
        uthreads::block(55) == Err(ThreadError::NotFound(55)),
        "blocking an unknown id is rejected",
    );
    check(
        uthreads::resume(55) == Err(ThreadError::NotFound(55)),
        "resuming an unknown id is rejected",
    );
    check(
        uthreads::terminate(55) == Err(ThreadError::NotFound(55)),
        "terminating an unknown id is rejected",
    );
    check(
        uthreads::sleep(0) == Err(ThreadError::NonPositiveSleep(0)),
        "sleep(0) is rejected",
    );
    check(
        uthreads::sleep(5) == Err(ThreadError::SleepMain),
        "the main thread cannot sleep",
    );
    check(
        uthreads::quantums(uthreads::MAX_THREADS)
            == Err(ThreadError::IdOutOfRange(uthreads::MAX_THREADS)),
        "quantums above the id ceiling is rejected",
    );

    // Ids are handed out smallest-first and reused after termination.
    check(uthreads::spawn(worker_a) == Ok(1), "first spawn gets id 1");
    check(uthreads::spawn(worker_b) == Ok(2), "second spawn gets id 2");
    check(uthreads::terminate(1).is_ok(), "terminating a ready thread");
    check(uthreads::spawn(worker_a) == Ok(1), "freed id 1 is reused");

    // Block and resume are idempotent on already-settled threads.
    check(uthreads::block(2).is_ok(), "blocking a ready thread");
    check(uthreads::block(2).is_ok(), "re-blocking is a no-op");
    check(uthreads::resume(2).is_ok(), "resuming a blocked thread");
    check(uthreads::resume(2).is_ok(), "re-resuming is a no-op");

    // Both workers run under preemption alone: the main thread never
    // yields, so their progress proves the timer path works.
    await_flag(&WORKER_A_DONE, "worker a was preempted into running");
    await_flag(&WORKER_B_DONE, "worker b was preempted into running");

    // A thread that blocks itself stays parked until resumed. The resume is
    // retried because the blocker may be preempted between raising its flag
    // and actually blocking; a resume landing in that window is a no-op.
    let blocker_id = uthreads::spawn(blocker).unwrap();
    await_flag(&BLOCKER_PARKED, "blocker reached its self-block");
    while !BLOCKER_DONE.load(Ordering::SeqCst) {
        let _ = uthreads::resume(blocker_id);
        if uthreads::total_quantums().unwrap() > TICK_BUDGET {
            check(false, "blocker finished after resume");
        }
    }
    check(true, "blocker finished after resume");

    // sleep(3) keeps the thread off the CPU for at least three ticks.
    uthreads::spawn(sleeper).unwrap();
    await_flag(&SLEEPER_DONE, "sleeper woke up and finished");
    check(
        SLEEPER_DELTA.load(Ordering::SeqCst) >= 3,
        "sleep(3) spanned at least three quantums",
    );

    eprintln!("all checks passed");
    let _ = uthreads::terminate(0);
    // terminate(0) ends the process; reaching here is a failure.
    process::exit(1);
}
