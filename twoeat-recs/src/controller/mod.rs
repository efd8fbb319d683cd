//! Recommendation session controller
//!
//! **Module Structure:**
//! - `core.rs`: Handle, shared state, events, snapshot, teardown
//! - `session.rs`: start / ensure_session / boot / restart (single-flight)
//! - `prefetch.rs`: fetch_more and the one-shot recovery cycle
//! - `feedback.rs`: like / pass / super_star
//! - `finalize.rs`: winner submission

mod core;
mod feedback;
mod finalize;
mod prefetch;
mod session;

pub use self::core::{BootOutcome, IgnoreReason, RecsController, SubmitOutcome};
