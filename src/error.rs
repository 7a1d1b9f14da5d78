//! Error taxonomy of the replication core.
//!
//! Plumbing (CLI, config, terminal) uses `anyhow`; everything a view, edit session, or store
//! can report to the operator is a [`ConsoleError`].

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// Network or connection failure. Never retried automatically.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The response violates the paged-result or record contract.
    #[error("unexpected response format: {0}")]
    Format(String),

    /// Local check failed before any request was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-2xx response; `message` is what the server said, verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl ConsoleError {
    pub fn transport(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// HTTP status of a rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
