use super::Ledger;
use crate::error::Error;
use crate::remote::{partial_path, RemoteStore};
use tracing::{debug, info};

/// Crash recovery, run once before any new transfer. Every in-flight entry is
/// either a finished copy whose completion never got recorded or a partial
/// file, so neither is trusted: the remote destination (and its `.part`
/// sibling) is deleted best-effort and the entry dropped. The fingerprint is
/// then absent from both tables and eligible for a fresh upload.
///
/// Returns the number of entries cleaned up.
pub fn recover_in_flight(ledger: &Ledger, remote: &dyn RemoteStore) -> Result<usize, Error> {
    let entries = ledger.list_in_flight()?;
    for (fp, dest_path) in &entries {
        for path in [dest_path.clone(), partial_path(dest_path)] {
            if let Err(e) = remote.remove_file(&path) {
                debug!("Recovery cleanup of {} skipped: {}", path.display(), e);
            }
        }
        ledger.remove_in_flight(fp)?;
        debug!("Dropped interrupted upload {} -> {}", fp.prefix(), dest_path.display());
    }
    if !entries.is_empty() {
        info!("Recovered {} interrupted uploads", entries.len());
    }
    Ok(entries.len())
}
