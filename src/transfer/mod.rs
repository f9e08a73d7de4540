pub mod pool;
pub mod worker;

pub use pool::{TransferPool, TransferSummary, DEFAULT_CONCURRENCY};
pub use worker::{transfer_one, SkipReason, TransferContext, TransferJob, TransferOutcome};
