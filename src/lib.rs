pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod monitor;
pub mod platform;
pub mod progress;
pub mod remote;
pub mod scanner;
pub mod space;
pub mod storage;
pub mod transfer;

pub use config::{AppConfig, ExtensionPolicy};
pub use engine::{SessionPhase, SessionReport, UploadEngine};
pub use error::Error;
pub use hasher::Fingerprint;
pub use monitor::{EdgeDetector, VolumeEvent, VolumeMonitor};
pub use progress::{CounterSnapshot, Counters, ProgressReporter, SilentReporter};
pub use remote::{MountedShare, RemoteStore};
pub use space::{RemoteSpace, StorageEstimate};
pub use storage::Ledger;
