//! Waiter registry
//!
//! Parked tasks are grouped by waker key in one flat list. Waking a key
//! scans and removes every match, O(waiters) per wake, which is fine for
//! the small waiter sets this runtime sees in practice.

use surge_sdk::{TaskId, WakerKey};

struct Waiter {
    key: WakerKey,
    task: TaskId,
}

/// Flat `(key, task)` waiter list.
#[derive(Default)]
pub(crate) struct WaiterList {
    entries: Vec<Waiter>,
}

impl WaiterList {
    /// Register `task` as waiting on `key`.
    pub(crate) fn park(&mut self, key: WakerKey, task: TaskId) {
        self.entries.push(Waiter { key, task });
    }

    /// Remove and return every task waiting on `key`, in registration order.
    pub(crate) fn take_key(&mut self, key: WakerKey) -> Vec<TaskId> {
        let mut woken = Vec::new();
        self.entries.retain(|w| {
            if w.key == key {
                woken.push(w.task);
                false
            } else {
                true
            }
        });
        woken
    }

    /// Drop every entry for `task` (it was woken through another path).
    pub(crate) fn remove_task(&mut self, task: TaskId) {
        self.entries.retain(|w| w.task != task);
    }

    /// Whether any waiter is parked on an externally-signalled key
    /// (blocking pool or network readiness). These are the only waits that
    /// can make progress without the driving thread doing work.
    pub(crate) fn has_external(&self) -> bool {
        self.entries.iter().any(|w| {
            matches!(
                w.key,
                WakerKey::Blocking(_)
                    | WakerKey::NetAccept(_)
                    | WakerKey::NetRead(_)
                    | WakerKey::NetWrite(_)
            )
        })
    }
}

#[cfg(test)]
impl WaiterList {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(v: u64) -> TaskId {
        TaskId::from_u64(v)
    }

    #[test]
    fn test_take_key_removes_matches_in_order() {
        let mut list = WaiterList::default();
        list.park(WakerKey::Join(tid(1)), tid(10));
        list.park(WakerKey::Timer(tid(2)), tid(11));
        list.park(WakerKey::Join(tid(1)), tid(12));

        let woken = list.take_key(WakerKey::Join(tid(1)));
        assert_eq!(woken, vec![tid(10), tid(12)]);
        assert_eq!(list.len(), 1);
        assert!(list.take_key(WakerKey::Join(tid(1))).is_empty());
    }

    #[test]
    fn test_remove_task() {
        let mut list = WaiterList::default();
        list.park(WakerKey::Scope(surge_sdk::ScopeId::from_u64(1)), tid(5));
        list.park(WakerKey::Timer(tid(5)), tid(5));
        list.remove_task(tid(5));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_has_external() {
        let mut list = WaiterList::default();
        list.park(WakerKey::Join(tid(1)), tid(2));
        assert!(!list.has_external());
        list.park(WakerKey::Blocking(tid(3)), tid(3));
        assert!(list.has_external());
    }
}
