use super::models::{CompletedEntry, InFlightEntry};
use crate::error::Error;
use crate::hasher::Fingerprint;
use rocksdb::{ColumnFamily, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CF_COMPLETED: &str = "completed";
const CF_IN_FLIGHT: &str = "in_flight";

/// Durable record of which fingerprints finished uploading and which are
/// mid-transfer. Backed by one rocksdb database with a column family per
/// table; every mutation is a synced write so it survives a crash.
///
/// The handle is `Send + Sync`. Workers share it through an `Arc` and rely on
/// rocksdb's write serialization instead of an in-process lock.
pub struct Ledger {
    db: DB,
    path: PathBuf,
}

impl Ledger {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut db_options = Options::default();
        db_options.create_if_missing(true);
        db_options.create_missing_column_families(true);
        let db = DB::open_cf(&db_options, path, [CF_COMPLETED, CF_IN_FLIGHT])?;
        debug!("Opened upload ledger at {}", path.display());
        Ok(Ledger {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, Error> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::LedgerCorruption(format!("missing column family '{}'", name)))
    }

    fn write_options() -> WriteOptions {
        let mut options = WriteOptions::default();
        options.set_sync(true);
        options
    }

    pub fn is_completed(&self, fp: &Fingerprint) -> Result<bool, Error> {
        let cf = self.cf(CF_COMPLETED)?;
        Ok(self.db.get_pinned_cf(cf, fp.as_str())?.is_some())
    }

    /// Record that an upload of `fp` to `dest_path` has started. Re-marking
    /// replaces the previous destination.
    pub fn mark_in_flight(&self, fp: &Fingerprint, dest_path: &Path) -> Result<(), Error> {
        let cf = self.cf(CF_IN_FLIGHT)?;
        let entry = InFlightEntry::new(dest_path);
        let value = encode(&entry)?;
        self.db
            .put_cf_opt(cf, fp.as_str(), value, &Self::write_options())?;
        Ok(())
    }

    /// Move `fp` from in-flight to completed in a single atomic batch. Marking
    /// an already completed fingerprint leaves the set unchanged.
    pub fn mark_completed(&self, fp: &Fingerprint) -> Result<(), Error> {
        let in_flight = self.cf(CF_IN_FLIGHT)?;
        let completed = self.cf(CF_COMPLETED)?;
        let value = encode(&CompletedEntry::now())?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(in_flight, fp.as_str());
        batch.put_cf(completed, fp.as_str(), value);
        self.db.write_opt(batch, &Self::write_options())?;
        Ok(())
    }

    pub fn remove_in_flight(&self, fp: &Fingerprint) -> Result<(), Error> {
        let cf = self.cf(CF_IN_FLIGHT)?;
        self.db
            .delete_cf_opt(cf, fp.as_str(), &Self::write_options())?;
        Ok(())
    }

    pub fn list_in_flight(&self) -> Result<Vec<(Fingerprint, PathBuf)>, Error> {
        let cf = self.cf(CF_IN_FLIGHT)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let fp = decode_key(&key)?;
            let entry: InFlightEntry = decode(&value)?;
            entries.push((fp, entry.dest_path));
        }
        Ok(entries)
    }

    pub fn completed_count(&self) -> Result<usize, Error> {
        let cf = self.cf(CF_COMPLETED)?;
        let mut count = 0usize;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Empty both tables. Remote files are not touched.
    pub fn clear_all(&self) -> Result<(), Error> {
        let mut batch = WriteBatch::default();
        for name in [CF_COMPLETED, CF_IN_FLIGHT] {
            let cf = self.cf(name)?;
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                let (key, _) = item?;
                batch.delete_cf(cf, key);
            }
        }
        self.db.write_opt(batch, &Self::write_options())?;
        info!("Upload ledger cleared");
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    bincode::serialize(value)
        .map_err(|e| Error::LedgerCorruption(format!("Serialize error: {}", e)))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    bincode::deserialize(bytes)
        .map_err(|e| Error::LedgerCorruption(format!("Deserialize error: {}", e)))
}

fn decode_key(key: &[u8]) -> Result<Fingerprint, Error> {
    std::str::from_utf8(key)
        .ok()
        .and_then(Fingerprint::from_hex)
        .ok_or_else(|| {
            Error::LedgerCorruption(format!("invalid fingerprint key {:?}", String::from_utf8_lossy(key)))
        })
}
