use thiserror::Error;

/// Errors returned by the relational engine.
///
/// Engine functions return these verbatim; the UI layer turns them into
/// status-line messages.
#[derive(Debug, Error)]
pub enum TedError {
    #[error("connection error: {0}")]
    Connect(String),

    /// Driver or network failure, tagged with the engine operation that issued it.
    #[error("{op}: {message}")]
    Query { op: &'static str, message: String },

    #[error("relation not found: {0}")]
    RelationNotFound(String),

    /// No primary key or NOT NULL unique constraint; the relation can only be read.
    #[error("{0} has no usable lookup key (primary key or NOT NULL unique constraint)")]
    NoKey(String),

    #[error("cannot parse view definition of {name}: {message}")]
    ViewParse { name: String, message: String },

    #[error("view {0} has no derivable key")]
    ViewNotKeyable(String),

    #[error("no rows updated (row was modified or deleted externally)")]
    NoRowsUpdated,

    #[error("no rows deleted (row was modified or deleted externally)")]
    NoRowsDeleted,

    #[error("read-only: {0}")]
    ReadOnly(String),

    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TedError {
    /// Wrap a driver error with the name of the operation that produced it.
    pub fn query(op: &'static str, err: impl std::fmt::Display) -> Self {
        TedError::Query {
            op,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TedError>;
