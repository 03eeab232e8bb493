use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlacklistError>;

#[derive(Error, Debug)]
pub enum BlacklistError {
    #[error("Storage operation failed: {0}")]
    StorageError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed persisted state: {0}")]
    MalformedState(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Failed to parse environment variable {var_name}: value '{value}' - {error}")]
    EnvParseError {
        var_name: String,
        value: String,
        error: String,
    },

    #[cfg(feature = "redb")]
    #[error("ReDB error: {0}")]
    RedbError(#[from] redb::Error),
}

impl BlacklistError {
    /// Wraps an I/O failure on a durable file with the path it happened on.
    pub(crate) fn storage(
        path: &std::path::Path,
        err: impl std::fmt::Display,
    ) -> Self {
        BlacklistError::StorageError(format!("{}: {}", path.display(), err))
    }

    /// True for failures of the durable layer, which abort only the
    /// triggering request.
    pub fn is_storage(&self) -> bool {
        match self {
            BlacklistError::StorageError(_) | BlacklistError::Io(_) => true,
            #[cfg(feature = "redb")]
            BlacklistError::RedbError(_) => true,
            _ => false,
        }
    }
}
