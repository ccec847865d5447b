use thiserror::Error;

/// Invalid input rejected at the call that supplied it, before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("job name must not be empty")]
    EmptyName,
    #[error("job name {0:?} cannot be used as a directory name")]
    InvalidName(String),
    #[error("a job named {0:?} already exists")]
    DuplicateName(String),
    #[error("interval must be at least 1, got {0}")]
    InvalidInterval(u64),
    #[error("retention limit must be at least 1, got {0}")]
    InvalidRetention(usize),
    #[error("invalid target url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("search term must not be empty")]
    EmptySearchTerm,
}
