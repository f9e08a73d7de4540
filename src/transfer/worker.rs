use crate::error::Error;
use crate::hasher::{self, Fingerprint};
use crate::progress::{Counters, ProgressReporter};
use crate::remote::{self, RemoteStore};
use crate::storage::Ledger;
use dashmap::DashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One file to copy and where it lands on the share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub local_path: PathBuf,
    pub dest_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable,
    AlreadyUploaded,
    /// Another worker in this session owns the same content.
    ClaimedByPeer,
}

#[derive(Debug)]
pub enum TransferOutcome {
    Uploaded { bytes: u64 },
    Skipped(SkipReason),
    /// Per-file failure. Siblings keep going and the in-flight entry is left
    /// for recovery on the next run.
    Failed(Error),
    /// Ledger failure. The session cannot continue without dedup truth.
    Fatal(Error),
}

/// Everything a worker shares with its siblings for one session.
pub struct TransferContext<'a> {
    pub ledger: &'a Ledger,
    pub remote: &'a dyn RemoteStore,
    pub counters: &'a Counters,
    pub reporter: &'a dyn ProgressReporter,
    pub claims: DashSet<Fingerprint>,
}

impl<'a> TransferContext<'a> {
    pub fn new(
        ledger: &'a Ledger,
        remote: &'a dyn RemoteStore,
        counters: &'a Counters,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            ledger,
            remote,
            counters,
            reporter,
            claims: DashSet::new(),
        }
    }

    fn skip(&self, reason: SkipReason) -> TransferOutcome {
        let snapshot = self.counters.record_skipped();
        self.reporter.on_progress(&snapshot);
        TransferOutcome::Skipped(reason)
    }

    fn fail(&self, path: &Path, fp: &Fingerprint, source: std::io::Error) -> TransferOutcome {
        error!(
            "Upload failed for {} ({}): {}",
            path.display(),
            fp.prefix(),
            source
        );
        self.reporter
            .on_log(&format!("Error uploading {}: {}", display_name(path), source));
        TransferOutcome::Failed(Error::UploadFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Transfer a single file end to end under ledger bookkeeping:
/// fingerprint, dedup check, pick a free destination, mark in flight, create
/// parent, copy, mark completed.
pub fn transfer_one(job: &TransferJob, ctx: &TransferContext) -> TransferOutcome {
    let path = job.local_path.as_path();

    let fp = match hasher::fingerprint_file(path) {
        Ok(fp) => fp,
        Err(e) => {
            warn!("{}", e);
            ctx.reporter
                .on_log(&format!("Cannot read file: {} - {}", path.display(), e));
            return ctx.skip(SkipReason::Unreadable);
        }
    };

    // Dedup fast path, before any network I/O.
    match ctx.ledger.is_completed(&fp) {
        Ok(true) => {
            debug!("Already uploaded {} ({})", path.display(), fp.prefix());
            ctx.reporter
                .on_log(&format!("Skipping (already uploaded): {}", display_name(path)));
            return ctx.skip(SkipReason::AlreadyUploaded);
        }
        Ok(false) => {}
        Err(e) => return TransferOutcome::Fatal(e),
    }

    if !ctx.claims.insert(fp.clone()) {
        debug!("Same content already in progress: {} ({})", path.display(), fp.prefix());
        ctx.reporter
            .on_log(&format!("Skipping (duplicate content): {}", display_name(path)));
        return ctx.skip(SkipReason::ClaimedByPeer);
    }

    let dest = match remote::unique_destination(&job.dest_path, |p| ctx.remote.exists(p)) {
        Ok(dest) => dest,
        Err(e) => return ctx.fail(path, &fp, e),
    };
    if dest != job.dest_path {
        debug!("{} is taken, uploading as {}", job.dest_path.display(), dest.display());
    }

    if let Err(e) = ctx.ledger.mark_in_flight(&fp, &dest) {
        return TransferOutcome::Fatal(e);
    }

    if let Some(parent) = dest.parent() {
        if let Err(e) = ctx.remote.create_dir_all(parent) {
            return ctx.fail(path, &fp, e);
        }
    }

    info!("Uploading {} to {}", path.display(), dest.display());
    ctx.reporter
        .on_log(&format!("Uploading {} to {}", path.display(), dest.display()));
    let bytes = match ctx.remote.copy_file(path, &dest) {
        Ok(bytes) => bytes,
        Err(e) => return ctx.fail(path, &fp, e),
    };

    if let Err(e) = ctx.ledger.mark_completed(&fp) {
        return TransferOutcome::Fatal(e);
    }

    let snapshot = ctx.counters.record_uploaded();
    ctx.reporter.on_log(&format!("Uploaded: {}", display_name(path)));
    ctx.reporter.on_progress(&snapshot);
    TransferOutcome::Uploaded { bytes }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
