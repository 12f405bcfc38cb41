//! Task table entries
//!
//! A task is one row in the executor's table: its kind-specific driver
//! state, scheduling status, spawn-tree links, and the bookkeeping that
//! ties it into scopes, waker keys, and reference-counted handles.

use crate::exec::blocking::BlockingJob;
use std::sync::Arc;
use surge_sdk::{ScopeId, TaskId, TaskResult, WakerKey};

#[cfg(unix)]
use surge_sdk::SocketFd;

/// What a task does when polled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Driven by a generated poll function through the runtime host.
    User,
    /// Completes after one scheduler round-trip; a fairness/cancellation
    /// observation point.
    Checkpoint,
    /// Completes once the virtual clock passes its deadline.
    Sleep,
    /// Bridges a synchronous foreign call run on the blocking pool.
    Blocking,
    /// Completes when a listener socket yields a connection.
    NetAccept,
    /// Completes when a stream socket yields bytes.
    NetRead,
    /// Completes when a stream socket accepts all queued bytes.
    NetWrite,
}

/// Scheduling status of a task.
///
/// `Ready -> Running -> {Ready | Waiting | Done}`, `Waiting -> Ready` on
/// wake. `Done` is terminal: a done task is never polled again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Queued for the next poll.
    Ready,
    /// Currently being polled by the driving thread.
    Running,
    /// Parked on a waker key.
    Waiting,
    /// Finished; `result` is set.
    Done,
}

/// Kind-specific driver state, owned by the task table entry.
pub(crate) enum TaskWork {
    User {
        poll_fn: u32,
    },
    Checkpoint {
        /// Set after the first poll has yielded once.
        yielded: bool,
    },
    Sleep {
        delay_ms: u64,
        /// Armed on first poll: `now_ms + delay_ms`.
        deadline: Option<u64>,
    },
    Blocking {
        job: Arc<BlockingJob>,
    },
    #[cfg(unix)]
    NetAccept {
        fd: SocketFd,
    },
    #[cfg(unix)]
    NetRead {
        fd: SocketFd,
        max_bytes: usize,
    },
    #[cfg(unix)]
    NetWrite {
        fd: SocketFd,
        data: Vec<u8>,
        written: usize,
    },
}

impl TaskWork {
    pub(crate) fn kind(&self) -> TaskKind {
        match self {
            TaskWork::User { .. } => TaskKind::User,
            TaskWork::Checkpoint { .. } => TaskKind::Checkpoint,
            TaskWork::Sleep { .. } => TaskKind::Sleep,
            TaskWork::Blocking { .. } => TaskKind::Blocking,
            #[cfg(unix)]
            TaskWork::NetAccept { .. } => TaskKind::NetAccept,
            #[cfg(unix)]
            TaskWork::NetRead { .. } => TaskKind::NetRead,
            #[cfg(unix)]
            TaskWork::NetWrite { .. } => TaskKind::NetWrite,
        }
    }
}

/// Payload attached to a wake, consumed by the re-entered operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ResumeSignal {
    /// A channel receive was satisfied with this value.
    Value(u64),
    /// A parked channel send was completed (handed off or buffered).
    SendOk,
    /// The channel closed while parked to receive.
    Closed,
    /// The channel closed while parked to send; the retry fails fatally.
    SendClosed,
}

/// One entry in the executor's task table.
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) status: TaskStatus,
    pub(crate) work: TaskWork,
    pub(crate) result: Option<TaskResult>,
    pub(crate) cancelled: bool,
    /// Spawn-tree children; cancellation recurses through these.
    pub(crate) children: Vec<TaskId>,
    /// Scope this task currently owns (one live scope per task).
    pub(crate) owned_scope: Option<ScopeId>,
    /// Scope this task is registered in as a child.
    pub(crate) parent_scope: Option<ScopeId>,
    /// Guards `scope_register_child` idempotence.
    pub(crate) scope_registered: bool,
    /// The single outstanding key this task is parked on, if Waiting.
    pub(crate) park_key: Option<WakerKey>,
    pub(crate) resume: Option<ResumeSignal>,
    /// Completed network-read bytes, retrievable through the handle.
    pub(crate) payload: Option<Vec<u8>>,
    /// Outstanding handle references; the entry is reaped once Done with
    /// no references left.
    pub(crate) handle_refs: u32,
}

impl Task {
    pub(crate) fn new(id: TaskId, work: TaskWork) -> Self {
        Self {
            id,
            status: TaskStatus::Ready,
            work,
            result: None,
            cancelled: false,
            children: Vec::new(),
            owned_scope: None,
            parent_scope: None,
            scope_registered: false,
            park_key: None,
            resume: None,
            payload: None,
            handle_refs: 1,
        }
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.work.kind()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}
