use thiserror::Error;

#[derive(Error, Debug)]
pub enum HangarError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Session '{0}' is already attached")]
    AlreadyAttached(String),

    #[error("Session '{0}' is not attached")]
    NotAttached(String),

    #[error("tmux session '{name}' did not appear within {waited_ms}ms")]
    CreationTimeout { name: String, waited_ms: u64 },

    #[error("`{command}` failed: {output}")]
    ExternalTool { command: String, output: String },

    #[error("Registry error: {0}")]
    Persistence(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Git2 library error: {0}")]
    Git2(#[from] git2::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tmux not installed. Install with: brew install tmux")]
    TmuxNotInstalled,

    #[error("{0}")]
    User(String),
}

impl HangarError {
    /// True for failures of the durable registry itself.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Json(_))
    }
}
