//! # 2Eat Recommendation Client
//!
//! Drives a swipe recommendation feed against the remote ranking service:
//! session lifecycle, prefetch queue, feedback, recovery and finalize.
//!
//! **Architecture:**
//! - `transport`: authenticated JSON calls behind the `RecsApi` trait
//! - `queue` / `ledger` / `recovery`: pure bookkeeping
//! - `state`: feed state machine guarded by the controller
//! - `controller`: the async `RecsController` handle

pub mod controller;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod recovery;
pub mod state;
pub mod transport;

pub use controller::{BootOutcome, IgnoreReason, RecsController, SubmitOutcome};
pub use error::{RecsError, Result};
pub use state::FeedSnapshot;
