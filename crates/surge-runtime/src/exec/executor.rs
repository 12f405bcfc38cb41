//! Executor core — task table, ready queue, and the poll/park/wake loop
//!
//! The executor owns every task, scope, and channel behind one mutex. The
//! driving thread advances the system one poll at a time with
//! [`Executor::run_ready_one`]; blocking workers and the net poller are the
//! only other threads that touch the table, and they do so exclusively
//! through the wake entry points on [`Shared`].

use crate::exec::blocking::{BlockingJob, BlockingPool, JobStatus};
use crate::exec::channel::{Channel, Offer, Pull};
use crate::exec::clock::VirtualClock;
use crate::exec::scope::Scope;
use crate::exec::task::{ResumeSignal, Task, TaskKind, TaskStatus, TaskWork};
use crate::exec::waker::WaiterList;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use surge_sdk::{
    ChannelId, PollOutcome, RecvOutcome, RuntimeHost, ScopeId, SendOutcome, TaskContext, TaskId,
    TaskResult, TryRecvOutcome, TrySendOutcome, WakerKey,
};

#[cfg(unix)]
use crate::exec::net::{
    self, AcceptOutcome, NetError, NetPoller, NetRegistry, ReadOutcome, WriteOutcome,
};
#[cfg(unix)]
use surge_sdk::SocketFd;

/// Executor statistics.
#[derive(Debug, Clone, Default)]
pub struct ExecutorStats {
    /// Total tasks spawned.
    pub tasks_spawned: u64,

    /// Total tasks that reached `Done`.
    pub tasks_completed: u64,

    /// Tasks currently in the table and not yet done.
    pub active_tasks: usize,
}

/// State shared with blocking workers and the net poller.
pub(crate) struct Shared {
    pub(crate) state: Mutex<ExecState>,
    /// Signalled whenever an external thread wakes a task, so a driving
    /// thread blocked in `run_until_done` re-checks the ready queue.
    external_wake: Condvar,
}

impl Shared {
    /// Blocking-pool worker entry point: the job for `task` finished.
    pub(crate) fn wake_blocking(&self, task: TaskId) {
        let mut state = self.state.lock();
        state.wake_key(WakerKey::Blocking(task));
        drop(state);
        self.external_wake.notify_all();
    }

    /// Net-poller entry point: `fd` became ready.
    #[cfg(unix)]
    pub(crate) fn wake_net(&self, fd: SocketFd, readable: bool, writable: bool) {
        let mut state = self.state.lock();
        if readable {
            state.wake_key(WakerKey::NetAccept(fd));
            state.wake_key(WakerKey::NetRead(fd));
        }
        if writable {
            state.wake_key(WakerKey::NetWrite(fd));
        }
        drop(state);
        self.external_wake.notify_all();
    }
}

/// Everything the executor lock guards.
pub(crate) struct ExecState {
    tasks: FxHashMap<TaskId, Task>,
    next_task: u64,
    /// Strict-FIFO ready queue of task ids (lazy deletion of done entries).
    ready: VecDeque<TaskId>,
    waiters: WaiterList,
    scopes: FxHashMap<ScopeId, Scope>,
    next_scope: u64,
    channels: FxHashMap<ChannelId, Channel>,
    next_channel: u64,
    clock: VirtualClock,
    #[cfg(unix)]
    net: NetRegistry,
    tasks_spawned: u64,
    tasks_completed: u64,
}

impl ExecState {
    fn new() -> Self {
        Self {
            tasks: FxHashMap::default(),
            next_task: 1,
            ready: VecDeque::new(),
            waiters: WaiterList::default(),
            scopes: FxHashMap::default(),
            next_scope: 1,
            channels: FxHashMap::default(),
            next_channel: 1,
            clock: VirtualClock::default(),
            #[cfg(unix)]
            net: NetRegistry::default(),
            tasks_spawned: 0,
            tasks_completed: 0,
        }
    }

    // ========================================================================
    // Task lifecycle
    // ========================================================================

    /// Allocate a task id, build its work, and enqueue it ready. The new
    /// task is linked into `parent`'s spawn tree when given.
    fn alloc_task(
        &mut self,
        parent: Option<TaskId>,
        build: impl FnOnce(TaskId) -> TaskWork,
    ) -> TaskId {
        let id = TaskId::from_u64(self.next_task);
        self.next_task += 1;
        self.tasks.insert(id, Task::new(id, build(id)));
        self.ready.push_back(id);
        self.tasks_spawned += 1;
        if let Some(parent) = parent {
            if let Some(task) = self.tasks.get_mut(&parent) {
                task.children.push(id);
            }
        }
        id
    }

    /// Wake one task: remove its waiter entries, attach the resume signal,
    /// and requeue it if it was parked. A signal delivered to a task that
    /// is mid-poll is kept; the park application sees it and keeps the
    /// task runnable instead of parking it.
    fn wake_task(&mut self, id: TaskId, resume: Option<ResumeSignal>) {
        self.waiters.remove_task(id);
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.is_done() {
            return;
        }
        if resume.is_some() {
            task.resume = resume;
        }
        if task.status == TaskStatus::Waiting {
            task.status = TaskStatus::Ready;
            task.park_key = None;
            self.ready.push_back(id);
        }
    }

    /// Wake every waiter registered on `key`.
    pub(crate) fn wake_key(&mut self, key: WakerKey) {
        for id in self.waiters.take_key(key) {
            self.wake_task(id, None);
        }
    }

    /// Terminal transition: store the result, wake join waiters, settle
    /// scope bookkeeping, and reap the entry if nothing references it.
    fn mark_done(&mut self, id: TaskId, result: TaskResult) {
        let parent_scope = {
            let task = self.tasks.get_mut(&id).expect("invalid task handle");
            task.status = TaskStatus::Done;
            task.result = Some(result);
            task.park_key = None;
            if task.scope_registered {
                task.parent_scope
            } else {
                None
            }
        };
        self.tasks_completed += 1;
        self.wake_key(WakerKey::Join(id));
        if let Some(scope_id) = parent_scope {
            self.scope_child_done(scope_id, id, result);
        }
        self.reap_if_unreferenced(id);
    }

    /// Idempotent, transitive cancellation down the spawn tree. A parked
    /// task is woken so its next poll observes the flag.
    fn cancel_task(&mut self, id: TaskId) {
        let children = {
            let Some(task) = self.tasks.get_mut(&id) else {
                return;
            };
            if task.cancelled || task.is_done() {
                return;
            }
            task.cancelled = true;
            task.children.clone()
        };
        self.wake_task(id, None);
        for child in children {
            self.cancel_task(child);
        }
    }

    fn add_ref(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.handle_refs += 1;
        }
    }

    fn release_ref(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.handle_refs = task.handle_refs.saturating_sub(1);
        }
        self.reap_if_unreferenced(id);
    }

    fn reap_if_unreferenced(&mut self, id: TaskId) {
        let reap = self
            .tasks
            .get(&id)
            .is_some_and(|task| task.is_done() && task.handle_refs == 0);
        if reap {
            self.tasks.remove(&id);
        }
    }

    fn take_resume(&mut self, id: TaskId) -> Option<ResumeSignal> {
        self.tasks.get_mut(&id).and_then(|task| task.resume.take())
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn scope_enter(&mut self, owner: TaskId, failfast: bool) -> ScopeId {
        let id = ScopeId::from_u64(self.next_scope);
        self.next_scope += 1;
        self.scopes.insert(id, Scope::new(id, owner, failfast));
        if let Some(task) = self.tasks.get_mut(&owner) {
            // Re-entering while a scope is open overwrites the binding; the
            // generated code is responsible for disciplined nesting.
            task.owned_scope = Some(id);
        }
        id
    }

    fn scope_register_child(&mut self, scope_id: ScopeId, child: TaskId) {
        if !self.scopes.contains_key(&scope_id) {
            panic!("invalid scope handle {}", scope_id.as_u64());
        }
        let (was_done, result) = {
            let task = self.tasks.get_mut(&child).expect("invalid task handle");
            if task.scope_registered {
                return;
            }
            task.scope_registered = true;
            task.parent_scope = Some(scope_id);
            (task.is_done(), task.result)
        };
        let scope = self.scopes.get_mut(&scope_id).unwrap();
        scope.children.push(child);
        if !was_done {
            scope.active_children += 1;
            return;
        }
        // The child finished before its parent got around to registering
        // it; a cancelled result must still trip fail-fast.
        if scope.failfast && !scope.failfast_triggered && result == Some(TaskResult::Cancelled) {
            scope.failfast_triggered = true;
            let owner = scope.owner;
            let siblings = scope.children.clone();
            for sibling in siblings {
                if sibling != child {
                    self.cancel_task(sibling);
                }
            }
            self.wake_task(owner, None);
        }
    }

    /// True when every registered child is done. The caller parks on
    /// `Scope(id)` when this is false.
    fn scope_join_ready(&self, scope_id: ScopeId) -> bool {
        let scope = self
            .scopes
            .get(&scope_id)
            .unwrap_or_else(|| panic!("invalid scope handle {}", scope_id.as_u64()));
        scope.active_children == 0
    }

    fn scope_cancel_all(&mut self, scope_id: ScopeId) {
        let children = self
            .scopes
            .get(&scope_id)
            .unwrap_or_else(|| panic!("invalid scope handle {}", scope_id.as_u64()))
            .children
            .clone();
        for child in children {
            self.cancel_task(child);
        }
    }

    fn scope_exit(&mut self, scope_id: ScopeId) {
        let scope = self
            .scopes
            .get(&scope_id)
            .unwrap_or_else(|| panic!("invalid scope handle {}", scope_id.as_u64()));
        if scope.active_children != 0 {
            panic!(
                "scope {} exited with {} active children",
                scope_id.as_u64(),
                scope.active_children
            );
        }
        let owner = scope.owner;
        self.scopes.remove(&scope_id);
        if let Some(task) = self.tasks.get_mut(&owner) {
            if task.owned_scope == Some(scope_id) {
                task.owned_scope = None;
            }
        }
    }

    /// A registered child reached `Done`: decrement the active count, fire
    /// fail-fast on a cancelled result, and wake the joining owner when
    /// the scope drains.
    fn scope_child_done(&mut self, scope_id: ScopeId, child: TaskId, result: TaskResult) {
        let Some(scope) = self.scopes.get_mut(&scope_id) else {
            return;
        };
        scope.active_children = scope.active_children.saturating_sub(1);
        let drained = scope.active_children == 0;
        let fire_failfast =
            scope.failfast && !scope.failfast_triggered && result == TaskResult::Cancelled;
        let owner = scope.owner;
        if fire_failfast {
            scope.failfast_triggered = true;
            let siblings = scope.children.clone();
            for sibling in siblings {
                if sibling != child {
                    self.cancel_task(sibling);
                }
            }
            self.wake_task(owner, None);
        }
        if drained {
            self.wake_key(WakerKey::Scope(scope_id));
        }
    }

    // ========================================================================
    // Channels
    // ========================================================================

    fn chan_create(&mut self, capacity: usize) -> ChannelId {
        let id = ChannelId::from_u64(self.next_channel);
        self.next_channel += 1;
        self.channels.insert(id, Channel::new(capacity));
        id
    }

    fn channel_mut(&mut self, chan: ChannelId) -> &mut Channel {
        self.channels
            .get_mut(&chan)
            .unwrap_or_else(|| panic!("invalid channel handle {}", chan.as_u64()))
    }

    fn chan_send(&mut self, chan: ChannelId, sender: TaskId, value: u64) -> SendOutcome {
        // A resumed retry consumes the signal its wake carried.
        if let Some(signal) = self.take_resume(sender) {
            match signal {
                ResumeSignal::SendOk => return SendOutcome::Sent,
                ResumeSignal::SendClosed => panic!("send on closed channel"),
                other => panic!("unexpected resume signal for send: {other:?}"),
            }
        }
        match self.channel_mut(chan).offer(value) {
            Offer::Handoff(receiver) => {
                self.wake_task(receiver, Some(ResumeSignal::Value(value)));
                SendOutcome::Sent
            }
            Offer::Buffered => SendOutcome::Sent,
            Offer::Closed => panic!("send on closed channel"),
            Offer::NoRoom => {
                self.channel_mut(chan).enqueue_sender(sender, value);
                SendOutcome::Pending
            }
        }
    }

    fn chan_recv(&mut self, chan: ChannelId, receiver: TaskId) -> RecvOutcome {
        if let Some(signal) = self.take_resume(receiver) {
            match signal {
                ResumeSignal::Value(value) => return RecvOutcome::Value(value),
                ResumeSignal::Closed => return RecvOutcome::Closed,
                other => panic!("unexpected resume signal for recv: {other:?}"),
            }
        }
        match self.channel_mut(chan).pull() {
            Pull::Buffered(value, promoted) => {
                if let Some(sender) = promoted {
                    self.wake_task(sender, Some(ResumeSignal::SendOk));
                }
                RecvOutcome::Value(value)
            }
            Pull::Handoff(value, sender) => {
                self.wake_task(sender, Some(ResumeSignal::SendOk));
                RecvOutcome::Value(value)
            }
            Pull::Closed => RecvOutcome::Closed,
            Pull::Empty => {
                self.channel_mut(chan).enqueue_receiver(receiver);
                RecvOutcome::Pending
            }
        }
    }

    fn chan_try_send(&mut self, chan: ChannelId, value: u64) -> TrySendOutcome {
        match self.channel_mut(chan).offer(value) {
            Offer::Handoff(receiver) => {
                self.wake_task(receiver, Some(ResumeSignal::Value(value)));
                TrySendOutcome::Sent
            }
            Offer::Buffered => TrySendOutcome::Sent,
            Offer::NoRoom => TrySendOutcome::Full,
            Offer::Closed => TrySendOutcome::Closed,
        }
    }

    fn chan_try_recv(&mut self, chan: ChannelId) -> TryRecvOutcome {
        match self.channel_mut(chan).pull() {
            Pull::Buffered(value, promoted) => {
                if let Some(sender) = promoted {
                    self.wake_task(sender, Some(ResumeSignal::SendOk));
                }
                TryRecvOutcome::Value(value)
            }
            Pull::Handoff(value, sender) => {
                self.wake_task(sender, Some(ResumeSignal::SendOk));
                TryRecvOutcome::Value(value)
            }
            Pull::Closed => TryRecvOutcome::Closed,
            Pull::Empty => TryRecvOutcome::Empty,
        }
    }

    fn chan_close(&mut self, chan: ChannelId) {
        let (receivers, senders) = self.channel_mut(chan).close();
        for receiver in receivers {
            self.wake_task(receiver, Some(ResumeSignal::Closed));
        }
        for sender in senders {
            self.wake_task(sender, Some(ResumeSignal::SendClosed));
        }
    }
}

// ============================================================================
// Outcome application
// ============================================================================

/// Act on the outcome of one poll, back under the executor lock.
fn apply_outcome(state: &mut ExecState, id: TaskId, outcome: PollOutcome) {
    match outcome {
        PollOutcome::Done(bits) => state.mark_done(id, TaskResult::Success(bits)),
        PollOutcome::DoneCancelled => state.mark_done(id, TaskResult::Cancelled),
        PollOutcome::Yielded => {
            let task = state.tasks.get_mut(&id).expect("invalid task handle");
            task.status = TaskStatus::Ready;
            state.ready.push_back(id);
            // Yield-driven tick: sleep progress is tied to cooperative
            // yields when nothing else advances the clock.
            for due in state.clock.tick() {
                state.wake_task(due, None);
            }
        }
        PollOutcome::Parked(key) => {
            if let WakerKey::Join(target) = key {
                if target == id {
                    panic!("task {} cannot await itself", id.as_u64());
                }
                // Awaiting a task that already finished (or was reaped)
                // must not park: the join wake has already fired.
                let done = state.tasks.get(&target).map_or(true, |t| t.is_done());
                if done {
                    let task = state.tasks.get_mut(&id).expect("invalid task handle");
                    task.status = TaskStatus::Ready;
                    state.ready.push_back(id);
                    return;
                }
            }
            let task = state.tasks.get_mut(&id).expect("invalid task handle");
            if task.cancelled || task.resume.is_some() {
                // A cancellation or wake landed during the poll; keep the
                // task runnable so it observes it immediately.
                task.status = TaskStatus::Ready;
                state.ready.push_back(id);
            } else {
                task.status = TaskStatus::Waiting;
                task.park_key = Some(key);
                state.waiters.park(key, id);
            }
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// The cooperative task executor.
///
/// An explicit object rather than a process-wide singleton: tests and
/// embedders may run several independent executors. All driving calls
/// (`run_ready_one`, `run_until_done`) belong to one thread.
pub struct Executor {
    shared: Arc<Shared>,
    host: Arc<dyn RuntimeHost>,
    blocking_workers: usize,
    blocking: OnceCell<BlockingPool>,
    #[cfg(unix)]
    net_poller: OnceCell<NetPoller>,
}

impl Executor {
    /// Create an executor with the default blocking-pool size (one worker
    /// per CPU).
    pub fn new(host: Arc<dyn RuntimeHost>) -> Self {
        Self::with_blocking_workers(host, 0)
    }

    /// Create an executor with a fixed blocking-pool size (0 means one
    /// worker per CPU). The pool itself starts lazily on first use.
    pub fn with_blocking_workers(host: Arc<dyn RuntimeHost>, worker_count: usize) -> Self {
        let count = if worker_count == 0 {
            num_cpus::get()
        } else {
            worker_count
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ExecState::new()),
                external_wake: Condvar::new(),
            }),
            host,
            blocking_workers: count,
            blocking: OnceCell::new(),
            #[cfg(unix)]
            net_poller: OnceCell::new(),
        }
    }

    fn blocking_pool(&self) -> &BlockingPool {
        self.blocking.get_or_init(|| {
            BlockingPool::start(self.blocking_workers, self.host.clone(), self.shared.clone())
        })
    }

    #[cfg(unix)]
    fn poller(&self) -> &NetPoller {
        self.net_poller
            .get_or_init(|| NetPoller::start(self.shared.clone()))
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Spawn a user task driven by the host poll function `poll_fn`.
    pub fn spawn_poll(&self, poll_fn: u32) -> TaskHandle {
        self.handle(self.spawn_internal(None, |_| TaskWork::User { poll_fn }))
    }

    /// Spawn a checkpoint task.
    pub fn spawn_checkpoint(&self) -> TaskHandle {
        self.handle(self.spawn_internal(None, |_| TaskWork::Checkpoint { yielded: false }))
    }

    /// Spawn a sleep task for `delay_ms` virtual milliseconds.
    pub fn spawn_sleep(&self, delay_ms: u64) -> TaskHandle {
        self.handle(self.spawn_internal(None, |_| TaskWork::Sleep {
            delay_ms,
            deadline: None,
        }))
    }

    /// Spawn a blocking task running host function `fn_id` over `state`.
    pub fn spawn_blocking(&self, fn_id: u32, state: Box<[u8]>) -> TaskHandle {
        self.handle(self.spawn_blocking_internal(None, fn_id, state))
    }

    fn spawn_internal(
        &self,
        parent: Option<TaskId>,
        build: impl FnOnce(TaskId) -> TaskWork,
    ) -> TaskId {
        self.shared.state.lock().alloc_task(parent, build)
    }

    fn spawn_blocking_internal(
        &self,
        parent: Option<TaskId>,
        fn_id: u32,
        state_bytes: Box<[u8]>,
    ) -> TaskId {
        let mut job_slot: Option<Arc<BlockingJob>> = None;
        let id = self.shared.state.lock().alloc_task(parent, |id| {
            let job = Arc::new(BlockingJob::new(id, fn_id, state_bytes));
            job_slot = Some(job.clone());
            TaskWork::Blocking { job }
        });
        // Submit outside the state lock; the worker takes it to wake us.
        let job = job_slot.expect("blocking job was not built");
        self.blocking_pool().submit(job);
        id
    }

    fn handle(&self, id: TaskId) -> TaskHandle {
        TaskHandle {
            shared: self.shared.clone(),
            id,
        }
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Poll one ready task. Returns false when the ready queue is empty.
    pub fn run_ready_one(&self) -> bool {
        let mut state = self.shared.state.lock();
        let (id, user_poll) = loop {
            let Some(id) = state.ready.pop_front() else {
                return false;
            };
            // Lazy deletion: entries for tasks that finished (or were
            // reaped) while queued are skipped.
            let Some(task) = state.tasks.get_mut(&id) else {
                continue;
            };
            if task.is_done() {
                continue;
            }
            task.status = TaskStatus::Running;
            match task.work {
                TaskWork::User { poll_fn } => break (id, Some(poll_fn)),
                _ => break (id, None),
            }
        };

        match user_poll {
            None => {
                let outcome = self.drive_internal(&mut state, id);
                apply_outcome(&mut state, id, outcome);
            }
            Some(poll_fn) => {
                // The poll function re-enters the executor through the
                // context, so the lock must not be held across the call.
                drop(state);
                let mut ctx = ExecCtx {
                    exec: self,
                    task: id,
                };
                let outcome = self.host.poll_call(poll_fn, &mut ctx);
                let mut state = self.shared.state.lock();
                apply_outcome(&mut state, id, outcome);
            }
        }
        true
    }

    /// Drive until `handle`'s task is done and return its result.
    ///
    /// When the ready queue drains, the clock jumps to the next sleep
    /// deadline; with no timers but outstanding blocking/net waiters the
    /// thread blocks for an external wake. Anything else is a deadlock and
    /// panics.
    pub fn run_until_done(&self, handle: &TaskHandle) -> TaskResult {
        loop {
            {
                let mut state = self.shared.state.lock();
                match state.tasks.get(&handle.id) {
                    Some(task) => {
                        if task.is_done() {
                            return task.result.expect("done task without result");
                        }
                    }
                    None => panic!("invalid task handle {}", handle.id.as_u64()),
                }
                if state.ready.is_empty() {
                    if let Some(due) = state.clock.advance_to_next() {
                        for task in due {
                            state.wake_task(task, None);
                        }
                        continue;
                    }
                    if state.waiters.has_external() {
                        self.shared.external_wake.wait(&mut state);
                        continue;
                    }
                    panic!(
                        "deadlock: no runnable tasks while awaiting task {}",
                        handle.id.as_u64()
                    );
                }
            }
            self.run_ready_one();
        }
    }

    /// Drive until the ready queue is empty and every sleep deadline has
    /// fired. Does not wait for blocking jobs or network readiness.
    pub fn run_until_idle(&self) {
        loop {
            if self.run_ready_one() {
                continue;
            }
            let mut state = self.shared.state.lock();
            match state.clock.advance_to_next() {
                Some(due) => {
                    for task in due {
                        state.wake_task(task, None);
                    }
                }
                None => return,
            }
        }
    }

    /// Poll drivers for the non-user task kinds. Runs under the executor
    /// lock; none of these re-enter the executor.
    ///
    /// The task is lifted out of the table for the duration of the poll so
    /// its work state and the rest of the executor state can be borrowed
    /// together.
    fn drive_internal(&self, state: &mut ExecState, id: TaskId) -> PollOutcome {
        let mut task = state.tasks.remove(&id).expect("invalid task handle");
        let cancelled = task.cancelled;
        let outcome = self.drive_work(state, &mut task, cancelled);
        state.tasks.insert(id, task);
        outcome
    }

    fn drive_work(&self, state: &mut ExecState, task: &mut Task, cancelled: bool) -> PollOutcome {
        let id = task.id;
        match &mut task.work {
            TaskWork::User { .. } => unreachable!("user tasks are polled through the host"),

            TaskWork::Checkpoint { yielded } => {
                if cancelled {
                    PollOutcome::DoneCancelled
                } else if !*yielded {
                    *yielded = true;
                    PollOutcome::Yielded
                } else {
                    PollOutcome::Done(0)
                }
            }

            TaskWork::Sleep { delay_ms, deadline } => {
                if cancelled {
                    return PollOutcome::DoneCancelled;
                }
                match *deadline {
                    None => {
                        let at = state.clock.now_ms() + *delay_ms;
                        *deadline = Some(at);
                        state.clock.arm(at, id);
                        PollOutcome::Parked(WakerKey::Timer(id))
                    }
                    Some(at) => {
                        if state.clock.now_ms() >= at {
                            PollOutcome::Done(0)
                        } else {
                            PollOutcome::Parked(WakerKey::Timer(id))
                        }
                    }
                }
            }

            TaskWork::Blocking { job } => match job.status() {
                // A published result is delivered even when the task was
                // cancelled meanwhile: the foreign call's side effects
                // already happened.
                JobStatus::Done => PollOutcome::Done(job.result_bits()),
                JobStatus::Cancelled => PollOutcome::DoneCancelled,
                JobStatus::Pending => {
                    if cancelled {
                        if job.try_cancel() {
                            PollOutcome::DoneCancelled
                        } else {
                            // The worker published between our status read
                            // and the cancel attempt.
                            PollOutcome::Done(job.result_bits())
                        }
                    } else {
                        PollOutcome::Parked(WakerKey::Blocking(id))
                    }
                }
            },

            #[cfg(unix)]
            TaskWork::NetAccept { fd } => {
                if cancelled {
                    return PollOutcome::DoneCancelled;
                }
                match state.net.accept_once(*fd) {
                    AcceptOutcome::Ready(stream_fd) => {
                        PollOutcome::Done(net::encode_ok(stream_fd as u64))
                    }
                    AcceptOutcome::WouldBlock => {
                        self.poller().watch_read(*fd);
                        PollOutcome::Parked(WakerKey::NetAccept(*fd))
                    }
                    AcceptOutcome::Failed(kind) => PollOutcome::Done(net::encode_error(kind)),
                }
            }

            #[cfg(unix)]
            TaskWork::NetRead { fd, max_bytes } => {
                if cancelled {
                    return PollOutcome::DoneCancelled;
                }
                match state.net.read_once(*fd, *max_bytes) {
                    ReadOutcome::Data(data) => {
                        let count = data.len() as u64;
                        task.payload = Some(data);
                        PollOutcome::Done(net::encode_ok(count))
                    }
                    ReadOutcome::Eof => PollOutcome::Done(net::encode_ok(0)),
                    ReadOutcome::WouldBlock => {
                        self.poller().watch_read(*fd);
                        PollOutcome::Parked(WakerKey::NetRead(*fd))
                    }
                    ReadOutcome::Failed(kind) => PollOutcome::Done(net::encode_error(kind)),
                }
            }

            #[cfg(unix)]
            TaskWork::NetWrite { fd, data, written } => {
                if cancelled {
                    return PollOutcome::DoneCancelled;
                }
                loop {
                    if *written >= data.len() {
                        return PollOutcome::Done(net::encode_ok(*written as u64));
                    }
                    match state.net.write_once(*fd, &data[*written..]) {
                        WriteOutcome::Wrote(n) => {
                            *written += n;
                        }
                        WriteOutcome::WouldBlock => {
                            self.poller().watch_write(*fd);
                            return PollOutcome::Parked(WakerKey::NetWrite(*fd));
                        }
                        WriteOutcome::Failed(kind) => {
                            return PollOutcome::Done(net::encode_error(kind));
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // Observation / control
    // ========================================================================

    /// Request cancellation of a task and its spawned descendants.
    pub fn cancel(&self, handle: &TaskHandle) {
        self.shared.state.lock().cancel_task(handle.id);
    }

    /// Terminal result of a task by id, if it is still in the table and
    /// done.
    pub fn task_result(&self, id: TaskId) -> Option<TaskResult> {
        let state = self.shared.state.lock();
        state.tasks.get(&id).and_then(|task| task.result)
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.shared.state.lock().clock.now_ms()
    }

    /// Executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        let state = self.shared.state.lock();
        ExecutorStats {
            tasks_spawned: state.tasks_spawned,
            tasks_completed: state.tasks_completed,
            active_tasks: state.tasks.values().filter(|t| !t.is_done()).count(),
        }
    }

    // ========================================================================
    // Channels (embedder surface; parking variants live on the context)
    // ========================================================================

    /// Create a channel; capacity 0 is a rendezvous channel.
    pub fn chan_create(&self, capacity: usize) -> ChannelId {
        self.shared.state.lock().chan_create(capacity)
    }

    /// Non-parking send.
    pub fn chan_try_send(&self, chan: ChannelId, value: u64) -> TrySendOutcome {
        self.shared.state.lock().chan_try_send(chan, value)
    }

    /// Non-parking receive.
    pub fn chan_try_recv(&self, chan: ChannelId) -> TryRecvOutcome {
        self.shared.state.lock().chan_try_recv(chan)
    }

    /// Close a channel, waking every parked sender and receiver.
    pub fn chan_close(&self, chan: ChannelId) {
        self.shared.state.lock().chan_close(chan)
    }

    /// Buffered value count.
    pub fn chan_len(&self, chan: ChannelId) -> usize {
        self.shared.state.lock().channel_mut(chan).len()
    }

    /// Buffer capacity (0 for rendezvous channels).
    pub fn chan_capacity(&self, chan: ChannelId) -> usize {
        self.shared.state.lock().channel_mut(chan).capacity()
    }

    /// Whether the channel has been closed.
    pub fn chan_is_closed(&self, chan: ChannelId) -> bool {
        self.shared.state.lock().channel_mut(chan).is_closed()
    }

    // ========================================================================
    // Network (embedder surface)
    // ========================================================================

    /// Bind an IPv4 listener, returning its fd.
    #[cfg(unix)]
    pub fn net_listen(&self, addr: &str, port: u16) -> Result<SocketFd, NetError> {
        self.shared.state.lock().net.listen(addr, port)
    }

    /// Local address of a bound listener (useful with port 0).
    #[cfg(unix)]
    pub fn net_local_addr(&self, fd: SocketFd) -> Result<std::net::SocketAddr, NetError> {
        self.shared.state.lock().net.local_addr(fd)
    }

    /// Register an already-connected stream with the executor.
    #[cfg(unix)]
    pub fn net_adopt_stream(&self, stream: std::net::TcpStream) -> Result<SocketFd, NetError> {
        self.shared.state.lock().net.adopt_stream(stream)
    }

    /// Close a socket by fd.
    #[cfg(unix)]
    pub fn net_close(&self, fd: SocketFd) -> bool {
        let closed = self.shared.state.lock().net.close(fd);
        if closed {
            if let Some(poller) = self.net_poller.get() {
                poller.unwatch(fd);
            }
        }
        closed
    }

    /// Spawn an accept task on a listener fd.
    #[cfg(unix)]
    pub fn spawn_net_accept(&self, fd: SocketFd) -> TaskHandle {
        self.handle(self.spawn_internal(None, |_| TaskWork::NetAccept { fd }))
    }

    /// Spawn a read task on a stream fd.
    #[cfg(unix)]
    pub fn spawn_net_read(&self, fd: SocketFd, max_bytes: usize) -> TaskHandle {
        self.handle(self.spawn_internal(None, |_| TaskWork::NetRead { fd, max_bytes }))
    }

    /// Spawn a write task on a stream fd.
    #[cfg(unix)]
    pub fn spawn_net_write(&self, fd: SocketFd, data: Vec<u8>) -> TaskHandle {
        self.handle(self.spawn_internal(None, |_| TaskWork::NetWrite {
            fd,
            data,
            written: 0,
        }))
    }
}

// ============================================================================
// Task handles
// ============================================================================

/// Reference-counted handle to a task.
///
/// The task's table entry (children list, driver state, result) lives
/// until it is done *and* the last handle reference is gone.
pub struct TaskHandle {
    shared: Arc<Shared>,
    id: TaskId,
}

impl TaskHandle {
    /// The task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Terminal result, if the task is done.
    pub fn result(&self) -> Option<TaskResult> {
        let state = self.shared.state.lock();
        state.tasks.get(&self.id).and_then(|task| task.result)
    }

    /// Whether the task is done.
    pub fn is_done(&self) -> bool {
        let state = self.shared.state.lock();
        state.tasks.get(&self.id).is_some_and(|task| task.is_done())
    }

    /// The task's kind, while its table entry is alive.
    pub fn kind(&self) -> Option<TaskKind> {
        let state = self.shared.state.lock();
        state.tasks.get(&self.id).map(|task| task.kind())
    }

    /// Take the byte payload of a completed network read.
    pub fn take_payload(&self) -> Option<Vec<u8>> {
        let mut state = self.shared.state.lock();
        state
            .tasks
            .get_mut(&self.id)
            .and_then(|task| task.payload.take())
    }
}

impl Clone for TaskHandle {
    fn clone(&self) -> Self {
        self.shared.state.lock().add_ref(self.id);
        Self {
            shared: self.shared.clone(),
            id: self.id,
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.shared.state.lock().release_ref(self.id);
    }
}

// ============================================================================
// Task context (poll-function surface)
// ============================================================================

/// `TaskContext` implementation handed to user poll functions. Each call
/// takes the executor lock; the lock is never held across `poll_call`.
struct ExecCtx<'a> {
    exec: &'a Executor,
    task: TaskId,
}

impl TaskContext for ExecCtx<'_> {
    fn task_id(&self) -> TaskId {
        self.task
    }

    fn cancelled(&self) -> bool {
        let state = self.exec.shared.state.lock();
        state
            .tasks
            .get(&self.task)
            .map_or(false, |task| task.cancelled)
    }

    fn now_ms(&self) -> u64 {
        self.exec.shared.state.lock().clock.now_ms()
    }

    fn spawn_poll(&mut self, poll_fn: u32) -> TaskId {
        self.exec
            .spawn_internal(Some(self.task), |_| TaskWork::User { poll_fn })
    }

    fn spawn_checkpoint(&mut self) -> TaskId {
        self.exec
            .spawn_internal(Some(self.task), |_| TaskWork::Checkpoint { yielded: false })
    }

    fn spawn_sleep(&mut self, delay_ms: u64) -> TaskId {
        self.exec.spawn_internal(Some(self.task), |_| TaskWork::Sleep {
            delay_ms,
            deadline: None,
        })
    }

    fn spawn_blocking(&mut self, fn_id: u32, state: Box<[u8]>) -> TaskId {
        self.exec.spawn_blocking_internal(Some(self.task), fn_id, state)
    }

    fn task_done(&self, task: TaskId) -> bool {
        let state = self.exec.shared.state.lock();
        state.tasks.get(&task).map_or(true, |t| t.is_done())
    }

    fn task_result(&self, task: TaskId) -> Option<TaskResult> {
        let state = self.exec.shared.state.lock();
        state.tasks.get(&task).and_then(|t| t.result)
    }

    fn cancel(&mut self, task: TaskId) {
        self.exec.shared.state.lock().cancel_task(task);
    }

    fn release(&mut self, task: TaskId) {
        self.exec.shared.state.lock().release_ref(task);
    }

    fn take_payload(&mut self, task: TaskId) -> Option<Vec<u8>> {
        let mut state = self.exec.shared.state.lock();
        state.tasks.get_mut(&task).and_then(|t| t.payload.take())
    }

    fn scope_enter(&mut self, failfast: bool) -> ScopeId {
        self.exec.shared.state.lock().scope_enter(self.task, failfast)
    }

    fn scope_register_child(&mut self, scope: ScopeId, task: TaskId) {
        self.exec.shared.state.lock().scope_register_child(scope, task);
    }

    fn scope_join_all(&mut self, scope: ScopeId) -> bool {
        self.exec.shared.state.lock().scope_join_ready(scope)
    }

    fn scope_cancel_all(&mut self, scope: ScopeId) {
        self.exec.shared.state.lock().scope_cancel_all(scope);
    }

    fn scope_exit(&mut self, scope: ScopeId) {
        self.exec.shared.state.lock().scope_exit(scope);
    }

    fn chan_create(&mut self, capacity: usize) -> ChannelId {
        self.exec.shared.state.lock().chan_create(capacity)
    }

    fn chan_send(&mut self, chan: ChannelId, value: u64) -> SendOutcome {
        self.exec.shared.state.lock().chan_send(chan, self.task, value)
    }

    fn chan_recv(&mut self, chan: ChannelId) -> RecvOutcome {
        self.exec.shared.state.lock().chan_recv(chan, self.task)
    }

    fn chan_try_send(&mut self, chan: ChannelId, value: u64) -> TrySendOutcome {
        self.exec.shared.state.lock().chan_try_send(chan, value)
    }

    fn chan_try_recv(&mut self, chan: ChannelId) -> TryRecvOutcome {
        self.exec.shared.state.lock().chan_try_recv(chan)
    }

    fn chan_close(&mut self, chan: ChannelId) {
        self.exec.shared.state.lock().chan_close(chan);
    }

    #[cfg(unix)]
    fn net_listen(&mut self, addr: &str, port: u16) -> u64 {
        match self.exec.shared.state.lock().net.listen(addr, port) {
            Ok(fd) => net::encode_ok(fd as u64),
            Err(err) => net::encode_error(err.kind),
        }
    }

    #[cfg(not(unix))]
    fn net_listen(&mut self, _addr: &str, _port: u16) -> u64 {
        panic!("network is not supported on this platform");
    }

    #[cfg(unix)]
    fn net_close(&mut self, fd: SocketFd) -> bool {
        self.exec.net_close(fd)
    }

    #[cfg(not(unix))]
    fn net_close(&mut self, _fd: surge_sdk::SocketFd) -> bool {
        panic!("network is not supported on this platform");
    }

    #[cfg(unix)]
    fn spawn_net_accept(&mut self, fd: SocketFd) -> TaskId {
        self.exec
            .spawn_internal(Some(self.task), |_| TaskWork::NetAccept { fd })
    }

    #[cfg(not(unix))]
    fn spawn_net_accept(&mut self, _fd: surge_sdk::SocketFd) -> TaskId {
        panic!("network is not supported on this platform");
    }

    #[cfg(unix)]
    fn spawn_net_read(&mut self, fd: SocketFd, max_bytes: usize) -> TaskId {
        self.exec
            .spawn_internal(Some(self.task), |_| TaskWork::NetRead { fd, max_bytes })
    }

    #[cfg(not(unix))]
    fn spawn_net_read(&mut self, _fd: surge_sdk::SocketFd, _max_bytes: usize) -> TaskId {
        panic!("network is not supported on this platform");
    }

    #[cfg(unix)]
    fn spawn_net_write(&mut self, fd: SocketFd, data: Vec<u8>) -> TaskId {
        self.exec.spawn_internal(Some(self.task), |_| TaskWork::NetWrite {
            fd,
            data,
            written: 0,
        })
    }

    #[cfg(not(unix))]
    fn spawn_net_write(&mut self, _fd: surge_sdk::SocketFd, _data: Vec<u8>) -> TaskId {
        panic!("network is not supported on this platform");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_sdk::NoopHost;

    fn executor() -> Executor {
        Executor::with_blocking_workers(Arc::new(NoopHost), 1)
    }

    #[test]
    fn test_checkpoint_completes_in_finite_steps() {
        let exec = executor();
        let handles: Vec<TaskHandle> = (0..10).map(|_| exec.spawn_checkpoint()).collect();

        exec.run_until_idle();

        for handle in &handles {
            assert_eq!(handle.result(), Some(TaskResult::Success(0)));
        }
        let stats = exec.stats();
        assert_eq!(stats.tasks_spawned, 10);
        assert_eq!(stats.tasks_completed, 10);
        assert_eq!(stats.active_tasks, 0);
    }

    #[test]
    fn test_checkpoint_round_robin_is_fifo() {
        // Each checkpoint yields once; the second wave of polls completes
        // them in the same order they were spawned.
        let exec = executor();
        let a = exec.spawn_checkpoint();
        let b = exec.spawn_checkpoint();

        assert!(exec.run_ready_one()); // a yields
        assert!(exec.run_ready_one()); // b yields
        assert!(!a.is_done() && !b.is_done());
        assert!(exec.run_ready_one()); // a completes
        assert!(a.is_done() && !b.is_done());
        assert!(exec.run_ready_one()); // b completes
        assert!(b.is_done());
    }

    #[test]
    fn test_sleep_uses_virtual_time() {
        let exec = executor();
        let sleep = exec.spawn_sleep(500);
        let result = exec.run_until_done(&sleep);
        assert_eq!(result, TaskResult::Success(0));
        // The clock jumped to the deadline instead of waiting.
        assert_eq!(exec.now_ms(), 500);
    }

    #[test]
    fn test_yield_ticks_advance_sleeps() {
        let exec = executor();
        let sleep = exec.spawn_sleep(3);
        // Arm the deadline.
        assert!(exec.run_ready_one());
        // Each checkpoint yield advances the clock by one tick.
        for _ in 0..4 {
            let cp = exec.spawn_checkpoint();
            exec.run_until_done(&cp);
        }
        assert!(exec.now_ms() >= 3);
        assert_eq!(exec.run_until_done(&sleep), TaskResult::Success(0));
    }

    #[test]
    fn test_await_already_done_returns_immediately() {
        let exec = executor();
        let cp = exec.spawn_checkpoint();
        assert_eq!(exec.run_until_done(&cp), TaskResult::Success(0));
        let completed_before = exec.stats().tasks_completed;
        // Second await must not poll anything again.
        assert_eq!(exec.run_until_done(&cp), TaskResult::Success(0));
        assert_eq!(exec.stats().tasks_completed, completed_before);
    }

    #[test]
    fn test_cancel_parked_sleep() {
        let exec = executor();
        let sleep = exec.spawn_sleep(1_000_000);
        assert!(exec.run_ready_one()); // parks on its timer
        exec.cancel(&sleep);
        assert_eq!(exec.run_until_done(&sleep), TaskResult::Cancelled);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let exec = executor();
        let sleep = exec.spawn_sleep(1_000_000);
        assert!(exec.run_ready_one());
        exec.cancel(&sleep);
        exec.cancel(&sleep);
        assert_eq!(exec.run_until_done(&sleep), TaskResult::Cancelled);
        exec.cancel(&sleep); // no-op on a done task
    }

    #[test]
    fn test_handle_reaping() {
        let exec = executor();
        let cp = exec.spawn_checkpoint();
        let id = cp.id();
        exec.run_until_done(&cp);
        assert!(exec.task_result(id).is_some());

        let clone = cp.clone();
        drop(cp);
        // Still referenced by the clone.
        assert!(exec.task_result(id).is_some());
        drop(clone);
        // Last reference gone: the entry is reaped.
        assert!(exec.task_result(id).is_none());
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn test_deadlock_panics() {
        struct ParkForever;
        impl RuntimeHost for ParkForever {
            fn poll_call(&self, _poll_fn: u32, cx: &mut dyn TaskContext) -> PollOutcome {
                let chan = cx.chan_create(0);
                match cx.chan_recv(chan) {
                    RecvOutcome::Pending => PollOutcome::Parked(WakerKey::ChanRecv(chan)),
                    _ => PollOutcome::Done(0),
                }
            }
            fn blocking_call(&self, _fn_id: u32, _state: &mut [u8]) -> u64 {
                0
            }
        }

        let exec = Executor::with_blocking_workers(Arc::new(ParkForever), 1);
        let task = exec.spawn_poll(0);
        exec.run_until_done(&task);
    }

    #[test]
    #[should_panic(expected = "cannot await itself")]
    fn test_await_self_panics() {
        struct AwaitSelf;
        impl RuntimeHost for AwaitSelf {
            fn poll_call(&self, _poll_fn: u32, cx: &mut dyn TaskContext) -> PollOutcome {
                PollOutcome::Parked(WakerKey::Join(cx.task_id()))
            }
            fn blocking_call(&self, _fn_id: u32, _state: &mut [u8]) -> u64 {
                0
            }
        }

        let exec = Executor::with_blocking_workers(Arc::new(AwaitSelf), 1);
        let task = exec.spawn_poll(0);
        exec.run_ready_one();
        drop(task);
    }

    #[test]
    fn test_try_channel_ops_from_embedder() {
        let exec = executor();
        let chan = exec.chan_create(2);
        assert_eq!(exec.chan_capacity(chan), 2);
        assert_eq!(exec.chan_try_send(chan, 1), TrySendOutcome::Sent);
        assert_eq!(exec.chan_try_send(chan, 2), TrySendOutcome::Sent);
        assert_eq!(exec.chan_try_send(chan, 3), TrySendOutcome::Full);
        assert_eq!(exec.chan_len(chan), 2);
        assert_eq!(exec.chan_try_recv(chan), TryRecvOutcome::Value(1));
        assert_eq!(exec.chan_try_recv(chan), TryRecvOutcome::Value(2));
        assert_eq!(exec.chan_try_recv(chan), TryRecvOutcome::Empty);
        exec.chan_close(chan);
        assert!(exec.chan_is_closed(chan));
        assert_eq!(exec.chan_try_send(chan, 4), TrySendOutcome::Closed);
        assert_eq!(exec.chan_try_recv(chan), TryRecvOutcome::Closed);
    }

    #[test]
    fn test_blocking_job_round_trip() {
        struct Doubler;
        impl RuntimeHost for Doubler {
            fn poll_call(&self, _poll_fn: u32, _cx: &mut dyn TaskContext) -> PollOutcome {
                PollOutcome::Done(0)
            }
            fn blocking_call(&self, fn_id: u32, state: &mut [u8]) -> u64 {
                let input = state.first().copied().unwrap_or(0) as u64;
                (fn_id as u64) * 1000 + input * 2
            }
        }

        let exec = Executor::with_blocking_workers(Arc::new(Doubler), 2);
        let task = exec.spawn_blocking(7, Box::new([21]));
        assert_eq!(exec.run_until_done(&task), TaskResult::Success(7042));
    }

    #[test]
    fn test_stats_active_tasks() {
        let exec = executor();
        let sleep = exec.spawn_sleep(100);
        assert_eq!(exec.stats().active_tasks, 1);
        exec.run_until_done(&sleep);
        assert_eq!(exec.stats().active_tasks, 0);
    }
}
