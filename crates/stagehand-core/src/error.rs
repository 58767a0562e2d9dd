use thiserror::Error;

/// Errors produced by the stagehand protocol and control layers.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("registration failed: {0}")]
    Registration(String),

    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("content store error: {0}")]
    Store(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),

    /// An error annotated with the machine-readable `context` tag that
    /// travels back to the controller in error replies.
    #[error("{source}")]
    Tagged {
        context: String,
        source: Box<StageError>,
    },
}

impl StageError {
    /// Attach a context tag. Re-tagging replaces the outer tag.
    pub fn tagged(self, context: impl Into<String>) -> Self {
        let source = match self {
            StageError::Tagged { source, .. } => source,
            other => Box::new(other),
        };
        StageError::Tagged {
            context: context.into(),
            source,
        }
    }

    /// The context tag, if one was attached.
    pub fn context(&self) -> Option<&str> {
        match self {
            StageError::Tagged { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The error beneath any context tag.
    pub fn root(&self) -> &StageError {
        match self {
            StageError::Tagged { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Tag the error side of a result with a context string.
pub trait ResultExt<T> {
    fn tagged(self, context: &str) -> StageResult<T>;
}

impl<T, E: Into<StageError>> ResultExt<T> for Result<T, E> {
    fn tagged(self, context: &str) -> StageResult<T> {
        self.map_err(|e| e.into().tagged(context))
    }
}

pub type StageResult<T> = Result<T, StageError>;
