//! RuntimeHost trait: the executor's only view of generated code
//!
//! The runtime never links user code directly. User poll functions and
//! blocking functions are opaque callbacks identified by integer ids,
//! dispatched through a host object installed on the executor.

use crate::ids::{ChannelId, ScopeId, SocketFd, TaskId};
use crate::outcome::{
    PollOutcome, RecvOutcome, SendOutcome, TaskResult, TryRecvOutcome, TrySendOutcome,
};

/// Executor services exposed to a running poll function.
///
/// Every method operates on the executor that is currently polling the
/// calling task; the implementation lives in `surge-runtime`. Parking
/// operations (`chan_send`, `chan_recv`, `scope_join_all`) do the waiter
/// registration themselves: when they report `Pending`/`false`, the poll
/// function's only remaining obligation is to return the matching
/// [`PollOutcome::Parked`] key.
pub trait TaskContext {
    /// Id of the task being polled.
    fn task_id(&self) -> TaskId;

    /// Whether the task being polled has been cancelled. Poll functions are
    /// expected to check this at suspension points and unwind with
    /// [`PollOutcome::DoneCancelled`].
    fn cancelled(&self) -> bool;

    /// Current virtual time in milliseconds.
    fn now_ms(&self) -> u64;

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    /// Spawn a user task driven by the host poll function `poll_fn`.
    fn spawn_poll(&mut self, poll_fn: u32) -> TaskId;

    /// Spawn a checkpoint task (completes after one scheduler round-trip).
    fn spawn_checkpoint(&mut self) -> TaskId;

    /// Spawn a sleep task that completes `delay_ms` virtual milliseconds
    /// from the time of its first poll.
    fn spawn_sleep(&mut self, delay_ms: u64) -> TaskId;

    /// Spawn a task that runs `fn_id` with `state` on the blocking pool.
    fn spawn_blocking(&mut self, fn_id: u32, state: Box<[u8]>) -> TaskId;

    // ------------------------------------------------------------------
    // Task observation
    // ------------------------------------------------------------------

    /// Whether `task` has reached its terminal state.
    fn task_done(&self, task: TaskId) -> bool;

    /// Terminal result of `task`, if it is done.
    fn task_result(&self, task: TaskId) -> Option<TaskResult>;

    /// Request cancellation of `task` and its spawned descendants.
    fn cancel(&mut self, task: TaskId);

    /// Release the reference this context's spawns hold on `task`. After
    /// the last reference is gone a done task's table entry is reaped.
    fn release(&mut self, task: TaskId);

    /// Take the byte payload of a completed network read.
    fn take_payload(&mut self, task: TaskId) -> Option<Vec<u8>>;

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    /// Open a scope owned by the calling task.
    fn scope_enter(&mut self, failfast: bool) -> ScopeId;

    /// Attach a spawned task as a child of `scope` (idempotent per task).
    fn scope_register_child(&mut self, scope: ScopeId, task: TaskId);

    /// True if every registered child is done; otherwise parks the calling
    /// task on `Scope(scope)` and returns false.
    fn scope_join_all(&mut self, scope: ScopeId) -> bool;

    /// Cancel every registered child of `scope`.
    fn scope_cancel_all(&mut self, scope: ScopeId);

    /// Destroy `scope`. Fatal if any child is still active.
    fn scope_exit(&mut self, scope: ScopeId);

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Create a channel; capacity 0 is a rendezvous channel.
    fn chan_create(&mut self, capacity: usize) -> ChannelId;

    /// Send `value`, parking the calling task if no receiver or buffer
    /// space is available.
    fn chan_send(&mut self, chan: ChannelId, value: u64) -> SendOutcome;

    /// Receive a value, parking the calling task if none is available.
    fn chan_recv(&mut self, chan: ChannelId) -> RecvOutcome;

    /// Send without parking.
    fn chan_try_send(&mut self, chan: ChannelId, value: u64) -> TrySendOutcome;

    /// Receive without parking.
    fn chan_try_recv(&mut self, chan: ChannelId) -> TryRecvOutcome;

    /// Close the channel, waking every parked sender and receiver.
    fn chan_close(&mut self, chan: ChannelId);

    // ------------------------------------------------------------------
    // Network (IPv4, non-blocking)
    // ------------------------------------------------------------------

    /// Bind a listener; returns encoded result bits (fd on success, error
    /// class otherwise; see the runtime's net result encoding).
    fn net_listen(&mut self, addr: &str, port: u16) -> u64;

    /// Close a socket by fd. False for an unknown fd.
    fn net_close(&mut self, fd: SocketFd) -> bool;

    /// Spawn a task that completes with an accepted connection's fd bits.
    fn spawn_net_accept(&mut self, fd: SocketFd) -> TaskId;

    /// Spawn a task that completes with the byte count read; the bytes are
    /// retrieved with [`TaskContext::take_payload`].
    fn spawn_net_read(&mut self, fd: SocketFd, max_bytes: usize) -> TaskId;

    /// Spawn a task that completes once `data` is fully written.
    fn spawn_net_write(&mut self, fd: SocketFd, data: Vec<u8>) -> TaskId;
}

/// Host callbacks installed on an executor at construction.
///
/// `poll_call` re-enters generated code for one step of a user task;
/// `blocking_call` runs a synchronous foreign function on a worker thread
/// and must not touch executor state.
pub trait RuntimeHost: Send + Sync {
    /// Advance the user task driven by `poll_fn` one step.
    fn poll_call(&self, poll_fn: u32, cx: &mut dyn TaskContext) -> PollOutcome;

    /// Run blocking function `fn_id` over `state`, returning result bits.
    fn blocking_call(&self, fn_id: u32, state: &mut [u8]) -> u64;
}

/// Host that knows no functions, for executors that only ever run
/// checkpoint/sleep/channel/net tasks (tests, embedding experiments).
pub struct NoopHost;

impl RuntimeHost for NoopHost {
    fn poll_call(&self, poll_fn: u32, _cx: &mut dyn TaskContext) -> PollOutcome {
        panic!("no runtime host installed: poll function {poll_fn} is unknown");
    }

    fn blocking_call(&self, fn_id: u32, _state: &mut [u8]) -> u64 {
        panic!("no runtime host installed: blocking function {fn_id} is unknown");
    }
}
