// Copyright 2026 The Uthreads Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread state machine and ready queue
//!
//! States form a small lattice: a thread can be withheld from execution by
//! an explicit block, by a sleep countdown, or by both at once. The
//! transition table in [`apply`] is the single authority for what a request
//! does to a thread that is not currently running; the running thread's own
//! transitions go through the dispatch tick instead.

use super::thread::ThreadId;
use std::collections::VecDeque;

/// Lifecycle states of a thread.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible to run, waiting in the ready queue.
    Ready,
    /// Currently executing. Exactly one thread is in this state.
    Running,
    /// Withheld from execution until explicitly resumed.
    Blocked,
    /// Counting down dispatch ticks before becoming ready again.
    Sleeping,
    /// Both blocked and mid-countdown; both conditions must clear.
    BlockedAndSleeping,
    /// Transient: set on the way to destruction, never observed externally.
    Terminated,
}

/// Requests that can be applied to a thread that is not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Withhold the thread from execution.
    Block,
    /// Clear an explicit block.
    Resume,
    /// A sleep countdown reached zero.
    WakeExpired,
}

/// Outcome of applying a [`Request`] to a [`ThreadState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move the thread to this state (with the matching queue bookkeeping).
    To(ThreadState),
    /// The request is a no-op in this state; the call still succeeds.
    Unchanged,
    /// The request targets the running thread and needs a dispatch tick.
    Dispatch,
    /// The combination cannot occur in a consistent scheduler; reported as
    /// an error, never acted upon.
    Invalid,
}

/// The state-transition table.
pub fn apply(state: ThreadState, request: Request) -> Transition {
    use Request::*;
    use ThreadState::*;
    match (state, request) {
        (Ready, Block) => Transition::To(Blocked),
        (Running, Block) => Transition::Dispatch,
        (Blocked, Block) => Transition::Unchanged,
        (Sleeping, Block) => Transition::To(BlockedAndSleeping),
        (BlockedAndSleeping, Block) => Transition::Unchanged,

        (Ready, Resume) | (Running, Resume) => Transition::Unchanged,
        (Blocked, Resume) => Transition::To(Ready),
        (Sleeping, Resume) => Transition::Unchanged,
        (BlockedAndSleeping, Resume) => Transition::To(Sleeping),

        (Sleeping, WakeExpired) => Transition::To(Ready),
        (BlockedAndSleeping, WakeExpired) => Transition::To(Blocked),
        (Ready, WakeExpired) | (Running, WakeExpired) | (Blocked, WakeExpired) => {
            Transition::Invalid
        }

        (Terminated, _) => Transition::Invalid,
    }
}

/// Strict-FIFO queue of threads eligible to run.
///
/// Capacity is reserved up front so the timer-signal path never allocates.
#[derive(Debug)]
pub struct ReadyQueue {
    queue: VecDeque<ThreadId>,
}

impl ReadyQueue {
    /// Create an empty queue with room for `capacity` threads.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a thread at the tail.
    pub fn push(&mut self, id: ThreadId) {
        self.queue.push_back(id);
    }

    /// Pop the thread that has been ready the longest.
    pub fn pop(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    /// Remove a thread from anywhere in the queue, preserving the order of
    /// the others. Returns whether it was present.
    pub fn remove(&mut self, id: ThreadId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&queued| queued != id);
        self.queue.len() != before
    }

    /// Whether no thread is waiting to run.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of waiting threads.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the thread is queued.
    pub fn contains(&self, id: ThreadId) -> bool {
        self.queue.contains(&id)
    }

    /// Queue contents in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [ThreadState; 6] = [
        ThreadState::Ready,
        ThreadState::Running,
        ThreadState::Blocked,
        ThreadState::Sleeping,
        ThreadState::BlockedAndSleeping,
        ThreadState::Terminated,
    ];

    #[test]
    fn test_transition_table_exhaustive() {
        use Request::*;
        use ThreadState::*;
        use Transition::*;

        let expected = [
            // (state, request, outcome)
            (Ready, Block, To(Blocked)),
            (Running, Block, Dispatch),
            (Blocked, Block, Unchanged),
            (Sleeping, Block, To(BlockedAndSleeping)),
            (BlockedAndSleeping, Block, Unchanged),
            (Terminated, Block, Invalid),
            (Ready, Resume, Unchanged),
            (Running, Resume, Unchanged),
            (Blocked, Resume, To(Ready)),
            (Sleeping, Resume, Unchanged),
            (BlockedAndSleeping, Resume, To(Sleeping)),
            (Terminated, Resume, Invalid),
            (Ready, WakeExpired, Invalid),
            (Running, WakeExpired, Invalid),
            (Blocked, WakeExpired, Invalid),
            (Sleeping, WakeExpired, To(Ready)),
            (BlockedAndSleeping, WakeExpired, To(Blocked)),
            (Terminated, WakeExpired, Invalid),
        ];
        assert_eq!(expected.len(), ALL_STATES.len() * 3);
        for (state, request, outcome) in expected {
            assert_eq!(
                apply(state, request),
                outcome,
                "apply({state:?}, {request:?})"
            );
        }
    }

    #[test]
    fn test_ready_queue_is_fifo() {
        let mut queue = ReadyQueue::with_capacity(8);
        queue.push(3);
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_ready_queue_remove_preserves_order() {
        let mut queue = ReadyQueue::with_capacity(8);
        for id in [4, 7, 9, 2] {
            queue.push(id);
        }
        assert!(queue.remove(9));
        assert!(!queue.remove(9));
        let order: Vec<_> = queue.iter().collect();
        assert_eq!(order, [4, 7, 2]);
    }

    #[test]
    fn test_ready_queue_contains_and_len() {
        let mut queue = ReadyQueue::with_capacity(8);
        assert!(queue.is_empty());
        queue.push(5);
        assert!(queue.contains(5));
        assert!(!queue.contains(6));
        assert_eq!(queue.len(), 1);
    }
}
