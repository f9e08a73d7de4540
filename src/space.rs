use crate::config::AppConfig;
use crate::error::Error;
use crate::platform;
use crate::remote::RemoteStore;
use crate::scanner::{self, FileRecord};
use std::fmt;
use std::path::Path;
use tracing::debug;

const MB: f64 = 1024.0 * 1024.0;

/// Remote capacity as far as it can be determined. `Unknown` never blocks an
/// upload on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSpace {
    Known(u64),
    Unknown,
}

impl RemoteSpace {
    pub fn can_hold(&self, bytes: u64) -> bool {
        match self {
            RemoteSpace::Known(free) => *free >= bytes,
            RemoteSpace::Unknown => true,
        }
    }
}

impl fmt::Display for RemoteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSpace::Known(bytes) => write!(f, "{:.1}MB", *bytes as f64 / MB),
            RemoteSpace::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Snapshot handed to `ProgressReporter::on_storage_estimate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub local_free: u64,
    pub pending: u64,
    pub remote_free: RemoteSpace,
}

impl fmt::Display for StorageEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SD Free={:.1}MB | To Upload={:.1}MB | Share Free={}",
            self.local_free as f64 / MB,
            self.pending as f64 / MB,
            self.remote_free
        )
    }
}

pub fn local_free(path: &Path) -> Result<u64, Error> {
    if !path.exists() {
        return Err(Error::Unavailable {
            path: path.to_path_buf(),
        });
    }
    Ok(platform::free_space(path)?)
}

/// Total size of every policy-enabled file currently under `source_root`.
pub fn pending_upload_size(config: &AppConfig) -> Result<u64, Error> {
    let records = scanner::collect_candidates(
        &config.source_root,
        &config.allowed_extensions,
        &config.ignore_patterns,
    )?;
    Ok(total_size(&records))
}

pub fn total_size(records: &[FileRecord]) -> u64 {
    records.iter().map(|r| r.size).sum()
}

pub fn remote_free(remote: &dyn RemoteStore) -> RemoteSpace {
    remote.free_space()
}

/// Pre-flight gate: a known shortfall aborts the session before any transfer.
pub fn check_space(pending: u64, remote: RemoteSpace) -> Result<(), Error> {
    match remote {
        RemoteSpace::Known(available) if available < pending => {
            Err(Error::InsufficientSpace {
                required: pending,
                available,
            })
        }
        _ => Ok(()),
    }
}

/// Best-effort figures for display. A missing source volume reads as zero.
pub fn estimate_storage(config: &AppConfig, remote: &dyn RemoteStore) -> StorageEstimate {
    let local_free = local_free(&config.source_root).unwrap_or_else(|e| {
        debug!("Local free space unavailable: {}", e);
        0
    });
    let pending = pending_upload_size(config).unwrap_or_else(|e| {
        debug!("Pending upload size unavailable: {}", e);
        0
    });
    StorageEstimate {
        local_free,
        pending,
        remote_free: remote_free(remote),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_insufficient_known_space_blocks() {
        let err = check_space(500 * MIB, RemoteSpace::Known(100 * MIB)).unwrap_err();
        match err {
            Error::InsufficientSpace { required, available } => {
                assert_eq!(required, 500 * MIB);
                assert_eq!(available, 100 * MIB);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_space_never_blocks() {
        assert!(check_space(500 * MIB, RemoteSpace::Unknown).is_ok());
        assert!(check_space(u64::MAX, RemoteSpace::Unknown).is_ok());
    }

    #[test]
    fn test_exact_fit_passes() {
        assert!(check_space(100, RemoteSpace::Known(100)).is_ok());
        assert!(RemoteSpace::Known(100).can_hold(100));
        assert!(!RemoteSpace::Known(99).can_hold(100));
    }

    #[test]
    fn test_local_free_missing_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = local_free(&dir.path().join("no_card")).unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }

    #[test]
    fn test_display() {
        assert_eq!(RemoteSpace::Unknown.to_string(), "Unknown");
        assert_eq!(RemoteSpace::Known(3 * MIB / 2).to_string(), "1.5MB");
    }
}
