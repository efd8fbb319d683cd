//! # 2Eat Common Library
//!
//! Shared code for the 2Eat recommendation client including:
//! - Candidate, location and feedback models
//! - Event types (RecsEvent enum) and the EventBus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use models::{BootKey, Candidate, FeedbackAction, Location};
