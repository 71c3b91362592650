use thiserror::Error;

use crate::ids::NodeHandle;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The decoder found a `treeNodeTypeKey` with no registered factory.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    /// A required field was missing or had the wrong shape.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
    /// The concrete type's own decode failed; `source` carries the cause.
    #[error("decoding {type_key} failed: {source}")]
    DecodeDelegateFailure {
        type_key: String,
        #[source]
        source: Box<Error>,
    },
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    #[error("stale node handle: {0}")]
    StaleHandle(NodeHandle),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store actor has shut down")]
    ActorClosed,
    #[error("store actor mailbox is full")]
    MailboxFull,
}

impl Error {
    pub(crate) fn delegate(type_key: impl Into<String>, source: Error) -> Self {
        match source {
            // Already wrapped by a nested decode; keep the innermost context.
            err @ Error::DecodeDelegateFailure { .. } => err,
            other => Error::DecodeDelegateFailure {
                type_key: type_key.into(),
                source: Box::new(other),
            },
        }
    }
}
