//! Session snapshot stores for the ELIZA gateway.
//!
//! Each store implements [`eliza_core::SessionStore`]. The blobs are opaque
//! conversation snapshots produced by the engine; stores only keep them and
//! report when they were last written, which the [`SessionSweeper`] uses to
//! expire idle conversations.

pub mod file_backend;
pub mod in_memory;
pub mod sweeper;

pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;
pub use sweeper::SessionSweeper;
