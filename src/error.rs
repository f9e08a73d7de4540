use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cannot read file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not available: {}", path.display())]
    Unavailable { path: PathBuf },

    #[error("Remote share unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Not enough space on remote share: {required} bytes required, {available} bytes free")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("Ledger error: {0}")]
    Ledger(#[from] rocksdb::Error),

    #[error("Ledger corruption: {0}")]
    LedgerCorruption(String),

    #[error("Upload of {} failed: {source}", path.display())]
    UploadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Session-level errors abort the whole orchestration run. Everything else
    /// is scoped to a single file.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::RemoteUnavailable(_)
                | Error::InsufficientSpace { .. }
                | Error::Ledger(_)
                | Error::LedgerCorruption(_)
        )
    }
}

