//! plum-health — debouncing raw check results into a health state.
//!
//! A check's reported state only changes once a consecutive run of
//! identical results reaches the configured threshold for that state.
//! A single contrary result anywhere in the run resets the count, so
//! services that flap between good and failing do not generate a stream
//! of transitions.
//!
//! # Flow
//!
//! ```text
//! ResultHistory ──evaluate(thresholds)──▶ CheckState
//!                                            │
//!            (settled, stored state) ──observe──▶ Transition
//! ```

pub mod checker;

pub use checker::{Thresholds, Transition, evaluate, observe};
