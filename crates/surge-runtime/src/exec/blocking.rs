//! Blocking-job offload
//!
//! A fixed pool of worker threads bridges synchronous foreign calls back
//! into the cooperative scheduler. Each job is shared between the
//! scheduler and exactly one worker; its status moves `Pending -> Done`
//! or `Pending -> Cancelled` by compare-and-swap, so whichever side loses
//! the race observes the winner's decision. The `Arc` holding a job is
//! the refcount that lets either side drop last without a double free.

use crate::exec::executor::Shared;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use surge_sdk::{RuntimeHost, TaskId};

const STATUS_PENDING: u8 = 0;
const STATUS_DONE: u8 = 1;
const STATUS_CANCELLED: u8 = 2;

/// Lifecycle of a blocking job.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum JobStatus {
    /// Queued or running on a worker.
    Pending,
    /// The foreign call finished and the result bits are published.
    Done,
    /// Cancellation won; the result (if any) is discarded.
    Cancelled,
}

/// A foreign call in flight on the blocking pool.
pub(crate) struct BlockingJob {
    /// The scheduler task awaiting this job (also its waker key).
    pub(crate) task: TaskId,
    pub(crate) fn_id: u32,
    /// Opaque state bytes handed to the blocking function.
    state: Mutex<Box<[u8]>>,
    status: AtomicU8,
    /// Advisory flag for long-running foreign calls that poll it.
    cancel_requested: AtomicBool,
    result_bits: AtomicU64,
}

impl BlockingJob {
    pub(crate) fn new(task: TaskId, fn_id: u32, state: Box<[u8]>) -> Self {
        Self {
            task,
            fn_id,
            state: Mutex::new(state),
            status: AtomicU8::new(STATUS_PENDING),
            cancel_requested: AtomicBool::new(false),
            result_bits: AtomicU64::new(0),
        }
    }

    pub(crate) fn status(&self) -> JobStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_DONE => JobStatus::Done,
            STATUS_CANCELLED => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        }
    }

    /// Publish the result. Fails when cancellation already won.
    pub(crate) fn complete(&self, bits: u64) -> bool {
        self.result_bits.store(bits, Ordering::Release);
        self.status
            .compare_exchange(
                STATUS_PENDING,
                STATUS_DONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Request cancellation. Fails when the worker already published a
    /// result, in which case the computed bits must still be delivered.
    pub(crate) fn try_cancel(&self) -> bool {
        self.cancel_requested.store(true, Ordering::Release);
        self.status
            .compare_exchange(
                STATUS_PENDING,
                STATUS_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Result bits; meaningful only after `status()` returned `Done`.
    pub(crate) fn result_bits(&self) -> u64 {
        self.result_bits.load(Ordering::Acquire)
    }

    /// Whether cancellation has been requested (advisory; a long-running
    /// foreign call could poll this if the host ever exposes it).
    #[allow(dead_code)]
    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
}

/// Condvar-guarded FIFO shared by the pool workers.
struct JobQueue {
    jobs: Mutex<VecDeque<Arc<BlockingJob>>>,
    available: Condvar,
    shutdown: AtomicBool,
}

/// Fixed worker-thread pool running blocking foreign calls.
pub(crate) struct BlockingPool {
    queue: Arc<JobQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl BlockingPool {
    /// Start `worker_count` workers (clamped to at least one).
    pub(crate) fn start(
        worker_count: usize,
        host: Arc<dyn RuntimeHost>,
        shared: Arc<Shared>,
    ) -> Self {
        let queue = Arc::new(JobQueue {
            jobs: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let count = worker_count.max(1);
        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let queue = queue.clone();
            let host = host.clone();
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("surge-blocking-{}", i))
                .spawn(move || {
                    Self::worker_loop(queue, host, shared);
                })
                .expect("Failed to spawn blocking worker thread");
            workers.push(handle);
        }

        Self { queue, workers }
    }

    /// Queue a job for the next free worker.
    pub(crate) fn submit(&self, job: Arc<BlockingJob>) {
        self.queue.jobs.lock().push_back(job);
        self.queue.available.notify_one();
    }

    fn worker_loop(queue: Arc<JobQueue>, host: Arc<dyn RuntimeHost>, shared: Arc<Shared>) {
        loop {
            let job = {
                let mut jobs = queue.jobs.lock();
                loop {
                    if queue.shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(job) = jobs.pop_front() {
                        break job;
                    }
                    queue.available.wait(&mut jobs);
                }
            };

            // Cancellation raced ahead of the dequeue: drop the job without
            // running the foreign call.
            if job.status() == JobStatus::Cancelled {
                continue;
            }

            let bits = {
                let mut state = job.state.lock();
                host.blocking_call(job.fn_id, &mut state)
            };

            if job.complete(bits) {
                shared.wake_blocking(job.task);
            }
            // A failed publish means cancellation intervened mid-run; the
            // result is discarded.
        }
    }

    /// Stop the workers. Queued jobs that never ran are dropped.
    pub(crate) fn shutdown(&mut self) {
        self.queue.shutdown.store(true, Ordering::Release);
        self.queue.available.notify_all();

        let timeout = Duration::from_secs(2);
        for handle in self.workers.drain(..) {
            let start = Instant::now();
            loop {
                if handle.is_finished() {
                    let _ = handle.join();
                    break;
                }
                if start.elapsed() > timeout {
                    drop(handle);
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> BlockingJob {
        BlockingJob::new(TaskId::from_u64(1), 0, Box::new([]))
    }

    #[test]
    fn test_complete_wins_over_late_cancel() {
        let j = job();
        assert!(j.complete(42));
        assert_eq!(j.status(), JobStatus::Done);
        // Cancellation after completion loses; the result stays readable.
        assert!(!j.try_cancel());
        assert_eq!(j.status(), JobStatus::Done);
        assert_eq!(j.result_bits(), 42);
        assert!(j.cancel_requested());
    }

    #[test]
    fn test_cancel_wins_over_late_complete() {
        let j = job();
        assert!(j.try_cancel());
        assert_eq!(j.status(), JobStatus::Cancelled);
        // The worker's publish loses and the result is discarded.
        assert!(!j.complete(42));
        assert_eq!(j.status(), JobStatus::Cancelled);
    }

    #[test]
    fn test_status_transitions_once() {
        let j = job();
        assert_eq!(j.status(), JobStatus::Pending);
        assert!(j.complete(1));
        assert!(!j.complete(2));
        assert_eq!(j.status(), JobStatus::Done);
    }
}
