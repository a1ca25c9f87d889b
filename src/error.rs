use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogsiftError {
    #[error("Unknown comparator: {0}")]
    UnknownComparator(String),
    #[error("Invalid field reference: {0}")]
    InvalidFieldReference(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl LogsiftError {
    /// True for errors caused by the caller's filter input rather than by the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownComparator(_) | Self::InvalidFieldReference(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LogsiftError>;

// Helper conversions
impl From<rusqlite::Error> for LogsiftError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for LogsiftError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
