use thiserror::Error;

use crate::model::{AuthorTrace, CriterionKind, UserId};

#[derive(Debug, Error)]
pub enum ReconError {
    /// Request-forgery token did not verify.
    #[error("Security check failed.")]
    SecurityCheckFailed,
    /// Caller lacks the capability to manage author links.
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    /// Target run asked for with a blank criterion value.
    #[error("No user specified.")]
    NoUserSpecified,
    /// No user matched the requested criterion.
    #[error("No user found with {kind} \"{value}\".")]
    UserNotFound { kind: CriterionKind, value: String },
    /// The target user was found but no author matched it.
    #[error("No matching authors found for user \"{display_name}\".")]
    NoMatchingAuthors {
        user_id: UserId,
        display_name: String,
        trace: Vec<AuthorTrace>,
    },
    /// More than one user shares the looked-up display name.
    #[error("{count} users share the display name \"{value}\"; refusing to guess.")]
    AmbiguousMatch { value: String, count: usize },
    /// Store read failed. Callers usually degrade this to "no result".
    #[error("store read error: {0}")]
    StoreRead(String),
    /// Store rejected a write.
    #[error("store write error: {0}")]
    StoreWrite(String),
    /// Store could not be reached at all; nothing was processed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error.
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Snapshot file could not be decoded or encoded.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconError {
    /// Per-author diagnostics attached to target-mode failures.
    pub fn trace(&self) -> &[AuthorTrace] {
        match self {
            Self::NoMatchingAuthors { trace, .. } => trace,
            _ => &[],
        }
    }
}
