//! plum-scheduler — runs checks and reacts to their results.
//!
//! # Architecture
//!
//! ```text
//! Scheduler::run(shutdown)
//!   ├── dispatch loop (one task)
//!   │     ├── plan(now): due checks marked `scheduled`
//!   │     ├── mpsc work queue (bounded, back-pressure)
//!   │     └── sleep until next due (≤ 1 min with suspended checks, ≤ 1 h)
//!   └── worker pool (N tasks sharing the receiver)
//!         └── run_check
//!               ├── spawn Check::execute under timeout (panic → Failing)
//!               ├── push result into history, clear `scheduled`
//!               └── listeners, in registration order
//!                     ├── HealthListener  (debounce → AlertDispatcher)
//!                     ├── LogListener     (unless quiet)
//!                     └── subscribers     (ResultStream)
//! ```
//!
//! Checks are registered once from a [`ConfigDocument`](plum_core::ConfigDocument)
//! by [`loader::load`] and never removed. [`Scheduler::tombstone`] and
//! [`Scheduler::restore`] carry their status across restarts.

pub mod check;
pub mod error;
pub mod listener;
pub mod loader;
pub mod scheduler;
pub mod tombstone;

pub use check::{CheckInfo, CheckStatus, ScheduledCheck, SuspendOutcome};
pub use error::{SchedulerError, SchedulerResult};
pub use listener::{CheckEvent, CheckListener, HealthListener, ListenerId, Listeners, LogListener, ResultStream};
pub use loader::{Registration, load};
pub use scheduler::{Plan, Scheduler, SchedulerConfig};
