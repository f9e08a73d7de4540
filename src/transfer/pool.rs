use super::worker::{transfer_one, TransferContext, TransferJob, TransferOutcome};
use crate::error::Error;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, error};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Totals for one Transferring stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub submitted: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
}

/// Fixed-size pool of transfer workers. Each worker runs one file end to end.
pub struct TransferPool {
    pool: ThreadPool,
    concurrency: usize,
}

impl TransferPool {
    pub fn new(concurrency: usize) -> Result<Self, Error> {
        let concurrency = concurrency.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("transfer-{}", i))
            .build()
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;
        Ok(Self { pool, concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `op` with this pool's workers as the rayon context.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Run every job and block until all of them finish. Per-file failures are
    /// counted and never stop siblings. A ledger failure stops new jobs from
    /// starting, lets running ones drain, then surfaces as the error.
    pub fn run(&self, jobs: &[TransferJob], ctx: &TransferContext) -> Result<TransferSummary, Error> {
        self.run_with(jobs, |job| transfer_one(job, ctx))
    }

    /// [`TransferPool::run`] with the per-job step supplied by the caller.
    pub fn run_with<F>(&self, jobs: &[TransferJob], transfer: F) -> Result<TransferSummary, Error>
    where
        F: Fn(&TransferJob) -> TransferOutcome + Sync,
    {
        let abort = AtomicBool::new(false);
        let fatal: Mutex<Option<Error>> = Mutex::new(None);
        debug!("Dispatching {} transfers on {} workers", jobs.len(), self.concurrency);

        let outcomes: Vec<Option<TransferOutcome>> = self.pool.install(|| {
            jobs.par_iter()
                .with_max_len(1)
                .map(|job| {
                    if abort.load(Ordering::SeqCst) {
                        return None;
                    }
                    match transfer(job) {
                        TransferOutcome::Fatal(e) => {
                            error!("Ledger failure, aborting session: {}", e);
                            abort.store(true, Ordering::SeqCst);
                            let mut slot = fatal.lock().unwrap_or_else(|p| p.into_inner());
                            slot.get_or_insert(e);
                            None
                        }
                        outcome => Some(outcome),
                    }
                })
                .collect()
        });

        if let Some(e) = fatal.into_inner().unwrap_or_else(|p| p.into_inner()) {
            return Err(e);
        }

        let mut summary = TransferSummary {
            submitted: jobs.len(),
            ..TransferSummary::default()
        };
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                TransferOutcome::Uploaded { bytes } => {
                    summary.uploaded += 1;
                    summary.bytes += bytes;
                }
                TransferOutcome::Skipped(_) => summary.skipped += 1,
                TransferOutcome::Failed(_) => summary.failed += 1,
                TransferOutcome::Fatal(_) => {}
            }
        }
        Ok(summary)
    }
}
