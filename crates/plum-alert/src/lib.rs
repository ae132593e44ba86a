//! plum-alert — routing state transitions to alert destinations.
//!
//! # Architecture
//!
//! ```text
//! AlertDispatcher::raise(target, previous, new)
//!   ├── render AlertDetails text
//!   ├── Group::can_send_alert() per group   (sliding-window throttle)
//!   │     └── any refusal suppresses the alert entirely
//!   └── AlertRouter::matching(patterns)     (wildcard name match)
//!         └── Alert::send() on each match, failures logged
//! ```

pub mod dispatcher;
pub mod error;
pub mod router;
pub mod throttle;

pub use dispatcher::{AlertDispatcher, AlertTarget, RaiseOutcome, render_text};
pub use error::{AlertError, AlertResult};
pub use router::{AlertRouter, NamedAlert, WildcardSet};
pub use throttle::{Group, GroupSettings};
