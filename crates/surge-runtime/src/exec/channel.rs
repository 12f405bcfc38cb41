//! Channels - inter-task communication primitive
//!
//! Rendezvous-first protocol over opaque 64-bit payloads: a send prefers
//! handing the value straight to a parked receiver, then the bounded
//! buffer, then parks the sender. Channel state is plain data under the
//! executor lock; methods report who to wake rather than waking, since
//! wakes need the task table.

use std::collections::VecDeque;
use surge_sdk::TaskId;

/// Outcome of the non-parking half of a send.
pub(crate) enum Offer {
    /// A parked receiver takes the value directly; wake it with the value.
    Handoff(TaskId),
    /// The value went into the buffer.
    Buffered,
    /// No receiver and no buffer space.
    NoRoom,
    /// The channel is closed.
    Closed,
}

/// Outcome of the non-parking half of a receive.
pub(crate) enum Pull {
    /// A buffered value, plus a parked sender whose value was promoted
    /// into the freed slot (wake it as completed).
    Buffered(u64, Option<TaskId>),
    /// A parked sender's value taken directly; wake the sender.
    Handoff(u64, TaskId),
    /// Nothing available.
    Empty,
    /// Closed and drained; nothing will ever arrive.
    Closed,
}

/// One channel: bounded ring plus parked sender/receiver queues.
pub(crate) struct Channel {
    capacity: usize,
    buffer: VecDeque<u64>,
    closed: bool,
    send_waiters: VecDeque<(TaskId, u64)>,
    recv_waiters: VecDeque<TaskId>,
}

impl Channel {
    /// Create a channel; capacity 0 is a pure rendezvous channel.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
            closed: false,
            send_waiters: VecDeque::new(),
            recv_waiters: VecDeque::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Try the immediate paths of a send: direct handoff, then buffer.
    pub(crate) fn offer(&mut self, value: u64) -> Offer {
        if self.closed {
            return Offer::Closed;
        }
        if let Some(receiver) = self.recv_waiters.pop_front() {
            return Offer::Handoff(receiver);
        }
        if self.buffer.len() < self.capacity {
            self.buffer.push_back(value);
            return Offer::Buffered;
        }
        Offer::NoRoom
    }

    /// Park `sender` with its value after `offer` found no room.
    pub(crate) fn enqueue_sender(&mut self, sender: TaskId, value: u64) {
        self.send_waiters.push_back((sender, value));
    }

    /// Try the immediate paths of a receive: buffer (topping it off from a
    /// parked sender), then direct pull from a parked sender.
    pub(crate) fn pull(&mut self) -> Pull {
        if let Some(value) = self.buffer.pop_front() {
            // Eagerly promote one parked sender into the freed slot so the
            // buffer stays topped off.
            let promoted = self.send_waiters.pop_front().map(|(sender, queued)| {
                self.buffer.push_back(queued);
                sender
            });
            return Pull::Buffered(value, promoted);
        }
        if let Some((sender, value)) = self.send_waiters.pop_front() {
            return Pull::Handoff(value, sender);
        }
        if self.closed {
            return Pull::Closed;
        }
        Pull::Empty
    }

    /// Park `receiver` after `pull` came up empty.
    pub(crate) fn enqueue_receiver(&mut self, receiver: TaskId) {
        self.recv_waiters.push_back(receiver);
    }

    /// Close the channel, draining both waiter queues. Returns the parked
    /// receivers (to wake with a closed signal) and parked senders (whose
    /// retries fail fatally). Idempotent.
    pub(crate) fn close(&mut self) -> (Vec<TaskId>, Vec<TaskId>) {
        if self.closed {
            return (Vec::new(), Vec::new());
        }
        self.closed = true;
        let receivers = self.recv_waiters.drain(..).collect();
        let senders = self.send_waiters.drain(..).map(|(task, _)| task).collect();
        (receivers, senders)
    }
}
