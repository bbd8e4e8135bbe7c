// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler core
//!
//! Owns every piece of shared scheduling state: the registry of live
//! threads, the FIFO ready queue, the blocked set, the sleep countdowns,
//! the free-id pool, the running thread and the global quantum counter.
//!
//! The scheduler itself never touches signals or timers; callers are
//! required to invoke it only while preemption delivery is paused (from the
//! API surface) or serialized (from the signal handler). Methods therefore
//! mutate state and *describe* the context switch to perform; the caller
//! executes it after releasing its lock on this structure.
//!
//! The timer-signal path (`prepare_tick` with [`Outgoing::Yield`]) performs
//! no heap allocation: every queue and map reserves capacity for
//! `MAX_THREADS` up front and the retired-thread slot is only replaced on
//! voluntary calls.

use super::state::{apply, ReadyQueue, Request, ThreadState, Transition};
use super::thread::{EntryPoint, Thread, ThreadId, MAX_THREADS};
use crate::arch::Context;
use crate::error::{Result, ThreadError};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Where the outgoing thread goes when a dispatch tick switches away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outgoing {
    /// Back to the tail of the ready queue (timer preemption).
    Yield,
    /// Into the blocked set (the running thread blocked itself).
    Block,
    /// Into the sleep countdowns for this many future ticks.
    Sleep(u64),
    /// Blocked and counting down at once.
    BlockAndSleep(u64),
    /// Destroyed; the id returns to the pool.
    Terminate,
}

/// What the caller of [`Scheduler::prepare_tick`] must do next.
#[derive(Debug)]
pub enum Tick {
    /// No other thread is ready; the running thread continues.
    Continue,
    /// Transfer control from `from` to `to`. `prev` is `None` when the
    /// outgoing thread was terminated (its context is parked, never resumed).
    Switch {
        prev: Option<ThreadId>,
        next: ThreadId,
        from: *mut Context,
        to: *const Context,
    },
}

/// Outcome of a terminate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminate {
    /// The target was destroyed in place; the caller keeps running.
    Done,
    /// The caller asked to terminate itself; it must run a dispatch tick
    /// with [`Outgoing::Terminate`], which will not return.
    DispatchSelf,
    /// The main thread was terminated; every other thread has been torn
    /// down and the caller must end the process.
    ExitProcess,
}

/// The scheduler core. One instance exists per process, created by the
/// library-init call and alive until process exit.
#[derive(Debug)]
pub struct Scheduler {
    /// Every live thread, the running one included.
    registry: HashMap<ThreadId, Box<Thread>>,
    /// Threads eligible to run, oldest first.
    ready: ReadyQueue,
    /// Ids of explicitly blocked threads (sleeping-and-blocked included).
    blocked: HashSet<ThreadId>,
    /// Remaining dispatch ticks per sleeping thread.
    sleeping: HashMap<ThreadId, u64>,
    /// Unused ids, smallest first.
    free_ids: BinaryHeap<Reverse<ThreadId>>,
    /// The currently executing thread.
    running: ThreadId,
    /// Dispatch ticks since initialization.
    total_quantums: u64,
    /// A thread that terminated itself keeps its stack alive here until the
    /// next voluntary call; control still stands on that stack when the
    /// terminating switch executes.
    retired: Option<Box<Thread>>,
    /// Save target for a terminating switch; never switched back into.
    parked: Context,
    /// Scratch for ids whose countdown expired, reused every tick.
    wake_scratch: Vec<ThreadId>,
}

impl Scheduler {
    /// Create a scheduler whose only thread is the running main thread.
    pub fn new() -> Self {
        let mut registry = HashMap::with_capacity(MAX_THREADS);
        registry.insert(0, Box::new(Thread::main()));
        let mut free_ids = BinaryHeap::with_capacity(MAX_THREADS);
        for id in 1..MAX_THREADS {
            free_ids.push(Reverse(id));
        }
        Self {
            registry,
            ready: ReadyQueue::with_capacity(MAX_THREADS),
            blocked: HashSet::with_capacity(MAX_THREADS),
            sleeping: HashMap::with_capacity(MAX_THREADS),
            free_ids,
            running: 0,
            total_quantums: 0,
            retired: None,
            parked: Context::default(),
            wake_scratch: Vec::with_capacity(MAX_THREADS),
        }
    }

    /// Id of the running thread.
    pub fn running(&self) -> ThreadId {
        self.running
    }

    /// Dispatch ticks since initialization.
    pub fn total_quantums(&self) -> u64 {
        self.total_quantums
    }

    /// Entry function of the running thread (`None` for the main thread).
    pub fn current_entry(&self) -> Option<EntryPoint> {
        self.registry.get(&self.running).and_then(|t| t.entry())
    }

    /// Per-thread run count.
    pub fn quantums(&self, tid: ThreadId) -> Result<u64> {
        if tid >= MAX_THREADS {
            return Err(ThreadError::IdOutOfRange(tid));
        }
        self.registry
            .get(&tid)
            .map(|t| t.quantum_count())
            .ok_or(ThreadError::NotFound(tid))
    }

    /// Create a new thread with the smallest free id; it starts at the tail
    /// of the ready queue.
    pub fn spawn(&mut self, entry: EntryPoint, start: extern "C" fn() -> !) -> Result<ThreadId> {
        self.retired = None;
        let Reverse(id) = self.free_ids.pop().ok_or(ThreadError::Exhausted)?;
        self.registry.insert(id, Box::new(Thread::new(id, entry, start)));
        self.ready.push(id);
        Ok(id)
    }

    /// Terminate a thread.
    ///
    /// Terminating the main thread (id 0) tears down every other live
    /// thread and reports [`Terminate::ExitProcess`]; terminating the
    /// running thread reports [`Terminate::DispatchSelf`]; any other target
    /// is destroyed in place.
    pub fn terminate(&mut self, tid: ThreadId) -> Result<Terminate> {
        self.retired = None;
        if tid == 0 {
            self.shutdown();
            return Ok(Terminate::ExitProcess);
        }
        if !self.registry.contains_key(&tid) {
            return Err(ThreadError::NotFound(tid));
        }
        if tid == self.running {
            if self.ready.is_empty() {
                // The main thread can never be blocked or asleep, so a
                // running non-main thread always coexists with a ready one.
                return Err(ThreadError::Inconsistent(tid));
            }
            return Ok(Terminate::DispatchSelf);
        }

        let thread = match self.registry.remove(&tid) {
            Some(thread) => thread,
            None => return Err(ThreadError::NotFound(tid)),
        };
        match thread.state() {
            ThreadState::Ready => {
                self.ready.remove(tid);
            }
            ThreadState::Blocked => {
                self.blocked.remove(&tid);
            }
            ThreadState::Sleeping => {
                self.sleeping.remove(&tid);
            }
            ThreadState::BlockedAndSleeping => {
                self.blocked.remove(&tid);
                self.sleeping.remove(&tid);
            }
            ThreadState::Running | ThreadState::Terminated => {}
        }
        self.free_ids.push(Reverse(tid));
        Ok(Terminate::Done)
        // `thread` drops here, releasing its stack.
    }

    /// Block a thread. Returns whether the caller must run a dispatch tick
    /// (only when a thread blocks itself; no other thread can be running).
    pub fn block(&mut self, tid: ThreadId) -> Result<bool> {
        self.retired = None;
        if tid == 0 {
            return Err(ThreadError::BlockMain);
        }
        let state = match self.registry.get(&tid) {
            Some(thread) => thread.state(),
            None => return Err(ThreadError::NotFound(tid)),
        };
        match apply(state, Request::Block) {
            Transition::To(ThreadState::Blocked) => {
                self.ready.remove(tid);
                self.blocked.insert(tid);
                self.set_state(tid, ThreadState::Blocked);
                Ok(false)
            }
            Transition::To(ThreadState::BlockedAndSleeping) => {
                self.blocked.insert(tid);
                self.set_state(tid, ThreadState::BlockedAndSleeping);
                Ok(false)
            }
            Transition::Unchanged => Ok(false),
            Transition::Dispatch => Ok(true),
            Transition::To(_) | Transition::Invalid => Err(ThreadError::Inconsistent(tid)),
        }
    }

    /// Clear a thread's blocked condition. A no-op on threads that are
    /// ready, running or sleeping without a block.
    pub fn resume(&mut self, tid: ThreadId) -> Result<()> {
        self.retired = None;
        let state = match self.registry.get(&tid) {
            Some(thread) => thread.state(),
            None => return Err(ThreadError::NotFound(tid)),
        };
        match apply(state, Request::Resume) {
            Transition::To(ThreadState::Ready) => {
                if !self.blocked.remove(&tid) {
                    return Err(ThreadError::Inconsistent(tid));
                }
                self.set_state(tid, ThreadState::Ready);
                self.ready.push(tid);
                Ok(())
            }
            Transition::To(ThreadState::Sleeping) => {
                if !self.blocked.remove(&tid) {
                    return Err(ThreadError::Inconsistent(tid));
                }
                self.set_state(tid, ThreadState::Sleeping);
                Ok(())
            }
            Transition::Unchanged => Ok(()),
            Transition::To(_) | Transition::Dispatch | Transition::Invalid => {
                Err(ThreadError::Inconsistent(tid))
            }
        }
    }

    /// Validate a sleep request from the running thread and describe the
    /// outgoing state for the dispatch tick that puts it to sleep.
    pub fn prepare_sleep(&mut self, num_quantums: i64) -> Result<Outgoing> {
        self.retired = None;
        if num_quantums <= 0 {
            return Err(ThreadError::NonPositiveSleep(num_quantums));
        }
        if self.running == 0 {
            return Err(ThreadError::SleepMain);
        }
        let ticks = num_quantums as u64;
        if self.blocked.contains(&self.running) {
            Ok(Outgoing::BlockAndSleep(ticks))
        } else {
            Ok(Outgoing::Sleep(ticks))
        }
    }

    /// Run one dispatch tick.
    ///
    /// Order matters: sleep countdowns are decremented first, so a sleeper
    /// filed by this very tick (the `Sleep`/`BlockAndSleep` outgoing states)
    /// only starts counting on the *next* tick — `sleep(1)` wakes exactly
    /// one tick after the call took effect. Then the global counter ticks,
    /// and either the running thread continues (empty queue) or the FIFO
    /// head is dispatched.
    pub fn prepare_tick(&mut self, outgoing: Outgoing) -> Tick {
        self.wake_sleepers();
        self.total_quantums += 1;

        let next = match self.ready.pop() {
            Some(next) if self.registry.contains_key(&next) => next,
            _ => {
                // Nothing else can run; the running thread keeps its CPU and
                // still accounts for the quantum.
                if let Some(thread) = self.registry.get_mut(&self.running) {
                    thread.increment_quantum();
                }
                return Tick::Continue;
            }
        };

        let prev = self.running;
        let prev_id = match outgoing {
            Outgoing::Yield => {
                self.set_state(prev, ThreadState::Ready);
                self.ready.push(prev);
                Some(prev)
            }
            Outgoing::Block => {
                self.set_state(prev, ThreadState::Blocked);
                self.blocked.insert(prev);
                Some(prev)
            }
            Outgoing::Sleep(ticks) => {
                self.set_state(prev, ThreadState::Sleeping);
                self.sleeping.insert(prev, ticks);
                Some(prev)
            }
            Outgoing::BlockAndSleep(ticks) => {
                self.set_state(prev, ThreadState::BlockedAndSleeping);
                self.blocked.insert(prev);
                self.sleeping.insert(prev, ticks);
                Some(prev)
            }
            Outgoing::Terminate => {
                if let Some(mut thread) = self.registry.remove(&prev) {
                    thread.set_state(ThreadState::Terminated);
                    self.free_ids.push(Reverse(prev));
                    // Control still stands on this stack; hold the buffer
                    // until the next voluntary call.
                    self.retired = Some(thread);
                }
                None
            }
        };

        self.running = next;
        let to = match self.registry.get_mut(&next) {
            Some(thread) => {
                thread.set_state(ThreadState::Running);
                thread.increment_quantum();
                thread.context_ptr()
            }
            // Unreachable: presence was checked when popping.
            None => return Tick::Continue,
        };
        let from = match prev_id {
            Some(id) => match self.registry.get_mut(&id) {
                Some(thread) => thread.context_mut_ptr(),
                None => &mut self.parked as *mut Context,
            },
            None => &mut self.parked as *mut Context,
        };
        Tick::Switch {
            prev: prev_id,
            next,
            from,
            to,
        }
    }

    /// Decrement every sleep countdown; threads reaching zero become ready
    /// (or merely blocked, if an explicit block is still in force).
    fn wake_sleepers(&mut self) {
        self.wake_scratch.clear();
        for (id, remaining) in self.sleeping.iter_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.wake_scratch.push(*id);
            }
        }
        for i in 0..self.wake_scratch.len() {
            let id = self.wake_scratch[i];
            self.sleeping.remove(&id);
            let state = match self.registry.get(&id) {
                Some(thread) => thread.state(),
                None => continue,
            };
            match apply(state, Request::WakeExpired) {
                Transition::To(ThreadState::Ready) => {
                    self.set_state(id, ThreadState::Ready);
                    self.ready.push(id);
                }
                Transition::To(ThreadState::Blocked) => {
                    self.set_state(id, ThreadState::Blocked);
                }
                // A countdown on a thread in any other state is stale
                // bookkeeping; dropping the entry is the safe repair.
                _ => {}
            }
        }
    }

    /// Tear down every thread other than the caller's in preparation for
    /// process exit. The caller's own allocation is intentionally leaked
    /// when it is not the main thread: control still stands on its stack.
    fn shutdown(&mut self) {
        let current = self.running;
        self.ready.clear();
        self.blocked.clear();
        self.sleeping.clear();
        for (id, thread) in self.registry.drain() {
            if id == current {
                std::mem::forget(thread);
            }
        }
    }

    fn set_state(&mut self, tid: ThreadId, state: ThreadState) {
        if let Some(thread) = self.registry.get_mut(&tid) {
            thread.set_state(state);
        }
    }

    #[cfg(test)]
    fn state_of(&self, tid: ThreadId) -> Option<ThreadState> {
        self.registry.get(&tid).map(|t| t.state())
    }

    #[cfg(test)]
    fn is_sleeping(&self, tid: ThreadId) -> Option<u64> {
        self.sleeping.get(&tid).copied()
    }

    #[cfg(test)]
    fn live_threads(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
