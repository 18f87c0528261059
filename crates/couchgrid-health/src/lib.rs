//! couchgrid-health — readiness polling for cluster nodes.
//!
//! Every "wait until" in couchgrid goes through one primitive: call a
//! check, and if it is not yet satisfied sleep a fixed interval and try
//! again, up to a bounded number of attempts.
//!
//! # Architecture
//!
//! ```text
//! await_condition(target, policy, clock, check)
//!   ├── check() → Ok(true)          done
//!   ├── check() → Ok(false) | Err   clock.sleep(interval), retry
//!   └── max_attempts exhausted      PollError::Timeout { target, attempts, last_error }
//! ```
//!
//! The [`Clock`] is injected so tests can run the full retry schedule
//! without sleeping ([`RecordingClock`]).

pub mod clock;
pub mod poller;

pub use clock::{Clock, RecordingClock, TokioClock};
pub use poller::{PollError, RetryPolicy, await_condition};
