//! Error types shared by the session store and its callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid session id: {0}")]
    InvalidId(String),
}
