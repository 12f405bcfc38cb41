//! Poll outcomes, waker keys, and operation results
//!
//! A poll function reports its progress by *returning* one of the
//! [`PollOutcome`] variants; there is no non-local control transfer, so a
//! poll function that forgets to produce an outcome is a compile error
//! rather than a runtime fault.

use crate::ids::{ChannelId, ScopeId, SocketFd, TaskId};

/// Outcome of polling a task one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The task made progress and wants to run again; it is re-enqueued at
    /// the back of the ready queue (cooperative round-robin).
    Yielded,

    /// The task is blocked until the given key is woken.
    Parked(WakerKey),

    /// The task finished successfully with an opaque 64-bit payload.
    Done(u64),

    /// The task observed cancellation and unwound.
    DoneCancelled,
}

/// Terminal result of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    /// Completed normally with an opaque 64-bit payload.
    Success(u64),

    /// Exited after observing cancellation.
    Cancelled,
}

/// The event a parked task is waiting for.
///
/// Keys serve double duty: a task parks by storing one key, and waiters are
/// grouped in a flat `(key, task)` list that a wake scans for matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakerKey {
    /// Waiting for another task to reach `Done`.
    Join(TaskId),

    /// Waiting for the virtual clock to pass a sleep deadline.
    Timer(TaskId),

    /// Waiting for a blocking job submitted by the given task to finish.
    Blocking(TaskId),

    /// Waiting for buffer space or a receiver on a channel.
    ChanSend(ChannelId),

    /// Waiting for a value or close on a channel.
    ChanRecv(ChannelId),

    /// Scope owner waiting for the last active child to finish.
    Scope(ScopeId),

    /// Waiting for a listener socket to become acceptable.
    NetAccept(SocketFd),

    /// Waiting for a stream socket to become readable.
    NetRead(SocketFd),

    /// Waiting for a stream socket to become writable.
    NetWrite(SocketFd),
}

/// Result of a parking channel send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Value handed to a receiver or buffered.
    Sent,

    /// The calling task was enqueued as a send waiter; the poll function
    /// must return `Parked(ChanSend(chan))`.
    Pending,
}

/// Result of a parking channel receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A value was received.
    Value(u64),

    /// The channel is closed and drained; no value will ever arrive.
    Closed,

    /// The calling task was enqueued as a receive waiter; the poll function
    /// must return `Parked(ChanRecv(chan))`.
    Pending,
}

/// Result of a non-parking channel send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendOutcome {
    /// Value handed to a receiver or buffered.
    Sent,

    /// No receiver and no buffer space; nothing happened.
    Full,

    /// The channel is closed; nothing happened.
    Closed,
}

/// Result of a non-parking channel receive attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvOutcome {
    /// A value was received.
    Value(u64),

    /// No value available right now.
    Empty,

    /// The channel is closed and drained.
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_equality() {
        assert_eq!(PollOutcome::Done(7), PollOutcome::Done(7));
        assert_ne!(PollOutcome::Done(7), PollOutcome::Done(8));
        assert_ne!(PollOutcome::Yielded, PollOutcome::DoneCancelled);
    }

    #[test]
    fn test_waker_key_grouping() {
        let a = WakerKey::Join(TaskId::from_u64(3));
        let b = WakerKey::Join(TaskId::from_u64(3));
        let c = WakerKey::Timer(TaskId::from_u64(3));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
