use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Decomposition error: {0}")]
    Decomposition(String),

    #[error("VCS {op} failed on '{branch}': {message}")]
    Vcs {
        op: &'static str,
        branch: String,
        message: String,
    },

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Subtask execution failed: {0}")]
    SubtaskExecution(String),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },
}

impl Error {
    /// Wrap a git2 error with the originating VCS operation and branch.
    pub fn vcs(op: &'static str, branch: &str, err: git2::Error) -> Self {
        Error::Vcs {
            op,
            branch: branch.to_string(),
            message: err.message().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
