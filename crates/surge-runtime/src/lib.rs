//! Surge language runtime
//!
//! The native support library linked into compiled Surge programs. Two
//! subsystems live here:
//!
//! - the cooperative task executor ([`exec`]): a non-preemptive poll/park/
//!   wake state machine over a single task table, with structured-
//!   concurrency scopes, rendezvous channels, a blocking-work thread pool,
//!   and network-readiness integration;
//! - the arbitrary-precision numeric engine, re-exported from
//!   [`surge_num`].
//!
//! Generated code drives the executor through the [`surge_sdk`] boundary:
//! poll functions return [`surge_sdk::PollOutcome`] values and reach
//! executor services through the [`surge_sdk::TaskContext`] handed to each
//! poll call.

pub mod exec;

pub use exec::{Executor, ExecutorStats, TaskHandle, TaskKind, TaskStatus};

#[cfg(unix)]
pub use exec::net::{NetError, NetErrorKind};

pub use surge_num as num;
pub use surge_sdk as sdk;
