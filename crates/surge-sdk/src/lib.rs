//! Surge SDK - boundary types between the runtime core and generated code
//!
//! This crate defines the types a host (the code generator's output, or a
//! test harness standing in for it) needs in order to drive the Surge
//! runtime, without depending on the runtime's internals: identifier
//! newtypes, the poll-outcome sum type, the waker-key taxonomy, the
//! `RuntimeHost` callback trait, and the fatal-panic protocol.
//!
//! # Example
//!
//! ```ignore
//! use surge_sdk::{PollOutcome, RuntimeHost, TaskContext};
//!
//! struct MyHost;
//!
//! impl RuntimeHost for MyHost {
//!     fn poll_call(&self, poll_fn: u32, cx: &mut dyn TaskContext) -> PollOutcome {
//!         match poll_fn {
//!             0 => PollOutcome::Done(42),
//!             _ => PollOutcome::DoneCancelled,
//!         }
//!     }
//!
//!     fn blocking_call(&self, _fn_id: u32, _state: &mut [u8]) -> u64 {
//!         0
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod fatal;

mod host;
mod ids;
mod outcome;

pub use host::{NoopHost, RuntimeHost, TaskContext};
pub use ids::{ChannelId, ScopeId, SocketFd, TaskId};
pub use outcome::{
    PollOutcome, RecvOutcome, SendOutcome, TaskResult, TryRecvOutcome, TrySendOutcome, WakerKey,
};
