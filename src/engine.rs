use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher::{self, Fingerprint};
use crate::progress::{CounterSnapshot, Counters, ProgressReporter};
use crate::remote::{self, MountedShare, RemoteStore};
use crate::scanner::{self, FileRecord};
use crate::space::{self, RemoteSpace, StorageEstimate};
use crate::storage::{self, Ledger};
use crate::transfer::{TransferContext, TransferJob, TransferPool, TransferSummary};
use chrono::{Local, NaiveDate};
use dashmap::DashSet;
use rayon::prelude::*;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where the orchestrator is within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Scanning,
    SpaceCheck,
    Transferring,
    Draining,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Scanning => "scanning",
            SessionPhase::SpaceCheck => "space check",
            SessionPhase::Transferring => "transferring",
            SessionPhase::Draining => "draining",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub counters: CounterSnapshot,
    pub transfer: TransferSummary,
    pub recovered: usize,
    pub pending_bytes: u64,
    pub remote_free: RemoteSpace,
    pub scan_duration: Duration,
    pub transfer_duration: Duration,
}

/// Upload orchestrator. Owns the ledger, the share and the worker pool and
/// runs one session per call to [`UploadEngine::run_session`]. Sessions are
/// serialized: a second caller blocks until the first has drained.
pub struct UploadEngine {
    config: RwLock<Arc<AppConfig>>,
    ledger: Arc<Ledger>,
    remote: Arc<dyn RemoteStore>,
    pool: Mutex<Arc<TransferPool>>,
    counters: Counters,
    phase: Mutex<SessionPhase>,
    session_lock: Mutex<()>,
    session_date: Option<NaiveDate>,
}

impl UploadEngine {
    pub fn new(
        config: AppConfig,
        ledger: Arc<Ledger>,
        remote: Arc<dyn RemoteStore>,
    ) -> Result<Self, Error> {
        let pool = Arc::new(TransferPool::new(config.concurrency())?);
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            ledger,
            remote,
            pool: Mutex::new(pool),
            counters: Counters::new(),
            phase: Mutex::new(SessionPhase::Idle),
            session_lock: Mutex::new(()),
            session_date: None,
        })
    }

    /// Open the ledger and the mounted share named by `config`.
    pub fn open(config: AppConfig) -> Result<Self, Error> {
        let ledger = Arc::new(Ledger::open(&config.ledger_path)?);
        let remote: Arc<dyn RemoteStore> = Arc::new(MountedShare::from_config(&config.remote));
        Self::new(config, ledger, remote)
    }

    /// Pin the date folder instead of using today's local date.
    pub fn with_session_date(mut self, date: NaiveDate) -> Self {
        self.session_date = Some(date);
        self
    }

    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Swap in a new settings snapshot. A running session keeps the one it
    /// started with; the next session picks up every field, worker count
    /// included.
    pub fn replace_config(&self, config: AppConfig) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(config);
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Worker count of the pool the last (or next) session runs on.
    pub fn concurrency(&self) -> usize {
        self.pool.lock().unwrap_or_else(|e| e.into_inner()).concurrency()
    }

    /// Pool sized for `config`, rebuilt when the worker count changed.
    fn pool_for(&self, config: &AppConfig) -> Result<Arc<TransferPool>, Error> {
        let mut pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        if pool.concurrency() != config.concurrency() {
            info!(
                "Resizing transfer pool from {} to {} workers",
                pool.concurrency(),
                config.concurrency()
            );
            *pool = Arc::new(TransferPool::new(config.concurrency())?);
        }
        Ok(Arc::clone(&*pool))
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: SessionPhase) {
        debug!("Session phase: {}", phase);
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// One full session: connect, recover, scan, space check, transfer, drain.
    ///
    /// Per-file problems are counted and logged. Session-level problems
    /// (share unreachable, not enough space, ledger failure) abort the run
    /// and are returned; the in-flight table stays consistent for recovery.
    pub fn run_session(&self, reporter: &dyn ProgressReporter) -> Result<SessionReport, Error> {
        let _session = self.session_lock.lock().unwrap_or_else(|e| e.into_inner());
        let config = self.config();
        let snapshot = self.counters.reset();
        reporter.on_progress(&snapshot);

        let result = self
            .pool_for(&config)
            .and_then(|pool| self.run_phases(&config, &pool, reporter));
        if let Err(e) = &result {
            error!("Upload session aborted: {}", e);
            reporter.on_log(&format!("Upload failed: {}", e));
        }
        self.set_phase(SessionPhase::Idle);
        result
    }

    fn run_phases(
        &self,
        config: &AppConfig,
        pool: &TransferPool,
        reporter: &dyn ProgressReporter,
    ) -> Result<SessionReport, Error> {
        self.remote.probe()?;
        let recovered = storage::recover_in_flight(&self.ledger, self.remote.as_ref())?;

        // Scanning
        self.set_phase(SessionPhase::Scanning);
        let scan_start = Instant::now();
        let records = scanner::collect_candidates(
            &config.source_root,
            &config.allowed_extensions,
            &config.ignore_patterns,
        )?;
        self.count_pending(pool, &records)?;
        let scan_duration = scan_start.elapsed();
        let snapshot = self.counters.snapshot();
        info!(
            "Scan completed in {:.2}s: {} candidates, {} not yet uploaded",
            scan_duration.as_secs_f64(),
            records.len(),
            snapshot.detected
        );
        reporter.on_progress(&snapshot);

        let pending_bytes = space::total_size(&records);
        let remote_free = space::remote_free(self.remote.as_ref());
        let local_free = space::local_free(&config.source_root).unwrap_or(0);
        reporter.on_storage_estimate(&StorageEstimate {
            local_free,
            pending: pending_bytes,
            remote_free,
        });

        // SpaceCheck
        self.set_phase(SessionPhase::SpaceCheck);
        if let Err(e) = space::check_space(pending_bytes, remote_free) {
            self.set_phase(SessionPhase::Draining);
            return Err(e);
        }

        // Transferring, then Draining once every worker has returned
        self.set_phase(SessionPhase::Transferring);
        let folder = remote::session_folder(
            self.remote.root(),
            self.session_date.unwrap_or_else(|| Local::now().date_naive()),
        );
        let jobs: Vec<TransferJob> = records
            .iter()
            .map(|record| TransferJob {
                local_path: record.path.clone(),
                dest_path: remote::destination_for(&folder, &config.source_root, &record.path),
            })
            .collect();

        let transfer_start = Instant::now();
        let ctx = TransferContext::new(&self.ledger, self.remote.as_ref(), &self.counters, reporter);
        let transfer = pool.run(&jobs, &ctx);
        self.set_phase(SessionPhase::Draining);
        let transfer = transfer?;
        let transfer_duration = transfer_start.elapsed();

        let counters = self.counters.snapshot();
        info!(
            "Transfer completed in {:.2}s: {} uploaded, {} skipped, {} failed",
            transfer_duration.as_secs_f64(),
            transfer.uploaded,
            transfer.skipped,
            transfer.failed
        );
        if transfer.failed > 0 {
            warn!("{} uploads failed and will be retried next session", transfer.failed);
        }
        reporter.on_log("Upload complete.");
        reporter.on_progress(&counters);

        Ok(SessionReport {
            counters,
            transfer,
            recovered,
            pending_bytes,
            remote_free,
            scan_duration,
            transfer_duration,
        })
    }

    /// Hash every candidate up front and count each distinct content not yet
    /// completed once. Unreadable files are left out and come back next
    /// session.
    fn count_pending(&self, pool: &TransferPool, records: &[FileRecord]) -> Result<(), Error> {
        let ledger = &self.ledger;
        let counters = &self.counters;
        let seen: DashSet<Fingerprint> = DashSet::new();
        pool.install(|| {
            records.par_iter().try_for_each(|record| {
                let fp = match hasher::fingerprint_file(&record.path) {
                    Ok(fp) => fp,
                    Err(e) => {
                        warn!("{}", e);
                        return Ok(());
                    }
                };
                if !ledger.is_completed(&fp)? && seen.insert(fp) {
                    counters.record_detected();
                }
                Ok::<_, Error>(())
            })
        })
    }
}
