//! # ELIZA Core
//!
//! Domain types, traits, and error definitions shared by the ELIZA gateway
//! crates. The rule engine itself lives in `eliza-engine`; this crate only
//! holds what the engine's collaborators (session storage, HTTP gateway,
//! CLI) need to agree on.
//!
//! ## Design Philosophy
//!
//! Storage is defined as a trait here and implemented in `eliza-sessions`,
//! so the gateway can swap the file store for the in-memory one through
//! configuration and tests can run without touching disk.

pub mod error;
pub mod message;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::SessionError;
pub use message::{ChatMessage, Role, last_user_message};
pub use session::{SessionId, SessionMeta, SessionRecord, SessionStore};
