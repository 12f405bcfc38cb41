//! Virtual clock and sleep deadlines
//!
//! The executor's time source is a deterministic virtual millisecond
//! counter: it advances by one tick per cooperative yield, or jumps
//! straight to the next armed sleep deadline when the ready queue drains.
//! Wall-clock time never enters here; the network poller is the one place
//! real time touches the runtime.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use surge_sdk::TaskId;

/// Entry in the sleep heap.
struct SleepEntry {
    /// Virtual-millisecond deadline.
    wake_at: u64,
    /// Task to wake.
    task: TaskId,
}

// Reverse ordering for min-heap (earliest deadline first)
impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.wake_at.cmp(&self.wake_at)
    }
}

impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wake_at == other.wake_at && self.task == other.task
    }
}

impl Eq for SleepEntry {}

/// Monotonic virtual clock plus the armed sleep deadlines.
#[derive(Default)]
pub(crate) struct VirtualClock {
    now_ms: u64,
    sleeping: BinaryHeap<SleepEntry>,
}

impl VirtualClock {
    /// Current virtual time in milliseconds.
    pub(crate) fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Arm a sleep deadline for `task`.
    pub(crate) fn arm(&mut self, wake_at: u64, task: TaskId) {
        self.sleeping.push(SleepEntry { wake_at, task });
    }

    /// Advance one tick (a cooperative yield happened) and collect the
    /// tasks whose deadlines have now elapsed.
    pub(crate) fn tick(&mut self) -> Vec<TaskId> {
        self.now_ms += 1;
        self.pop_due()
    }

    /// Jump straight to the earliest armed deadline and collect everything
    /// due there. Returns `None` when no deadline is armed.
    pub(crate) fn advance_to_next(&mut self) -> Option<Vec<TaskId>> {
        let next = self.sleeping.peek()?.wake_at;
        if next > self.now_ms {
            self.now_ms = next;
        }
        Some(self.pop_due())
    }

    /// Whether any deadline is armed.
    pub(crate) fn has_pending(&self) -> bool {
        !self.sleeping.is_empty()
    }

    fn pop_due(&mut self) -> Vec<TaskId> {
        let mut due = Vec::new();
        while let Some(entry) = self.sleeping.peek() {
            if entry.wake_at <= self.now_ms {
                let entry = self.sleeping.pop().unwrap();
                due.push(entry.task);
            } else {
                break;
            }
        }
        due
    }
}
