//! Core types and traits for query-chat
//!
//! This crate provides the chat session model, the query engine contract,
//! the feedback log and the configuration/logging plumbing shared by the
//! server and the CLI.

pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod logging;
pub mod session;
pub mod utils;

pub use engine::{EngineError, QueryEngine, QueryResponse};
pub use error::{Error, Result};
pub use feedback::{CsvFeedbackLog, Feedback, FeedbackRecord, FeedbackStore};
pub use session::{Role, Session, SessionManager, Turn};
