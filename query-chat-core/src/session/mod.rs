//! Chat sessions
//!
//! A session holds the transcript and the feedback flag for one user.
//! Sessions can be mirrored to JSONL files (one metadata line, then one line
//! per turn) so a restarted server picks conversations back up.

pub mod manager;
pub mod store;

pub use manager::{SessionInfo, SessionManager};
pub use store::{Role, Session, Turn, DEFAULT_GREETING};
