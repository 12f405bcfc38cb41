//! Structured-concurrency scopes
//!
//! A scope groups tasks spawned under one owner so they can be joined or
//! cancelled in bulk. A fail-fast scope reacts to the first child that
//! finishes cancelled by cancelling every sibling and waking the owner.
//! The scope table entry is plain data; the transitions live in the
//! executor, where the task table is in reach.

use surge_sdk::{ScopeId, TaskId};

/// One entry in the executor's scope table.
pub(crate) struct Scope {
    pub(crate) id: ScopeId,
    /// Task that opened the scope; woken by fail-fast and final-child
    /// completion.
    pub(crate) owner: TaskId,
    pub(crate) failfast: bool,
    /// Set once fail-fast cancellation has fired; it fires at most once.
    pub(crate) failfast_triggered: bool,
    /// Registered children that have not reached `Done`. `scope_exit`
    /// requires this to be zero.
    pub(crate) active_children: u32,
    pub(crate) children: Vec<TaskId>,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, owner: TaskId, failfast: bool) -> Self {
        Self {
            id,
            owner,
            failfast,
            failfast_triggered: false,
            active_children: 0,
            children: Vec::new(),
        }
    }
}
