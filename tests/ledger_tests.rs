use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use sd_uploader::hasher::fingerprint_reader;
use sd_uploader::storage::{recover_in_flight, Ledger};
use sd_uploader::{Error, Fingerprint, MountedShare};

fn fp(content: &[u8]) -> Fingerprint {
    fingerprint_reader(content).unwrap()
}

/// Write a key that is not a fingerprint straight into the in-flight table.
fn plant_bad_in_flight_key(path: &Path) {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    let db = rocksdb::DB::open_cf(&opts, path, ["completed", "in_flight"]).unwrap();
    let cf = db.cf_handle("in_flight").unwrap();
    db.put_cf(cf, b"not-a-fingerprint", b"junk").unwrap();
}

#[test]
fn test_in_flight_then_completed() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger")).unwrap();
    let f = fp(b"photo");
    let dest = PathBuf::from("/share/2024-05-01/DSC0001.ARW");

    assert!(!ledger.is_completed(&f).unwrap());

    ledger.mark_in_flight(&f, &dest).unwrap();
    assert_eq!(ledger.list_in_flight().unwrap(), vec![(f.clone(), dest.clone())]);
    assert!(!ledger.is_completed(&f).unwrap());

    ledger.mark_completed(&f).unwrap();
    assert!(ledger.is_completed(&f).unwrap());
    assert!(ledger.list_in_flight().unwrap().is_empty());
}

#[test]
fn test_mark_in_flight_is_upsert() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger")).unwrap();
    let f = fp(b"photo");

    ledger.mark_in_flight(&f, &PathBuf::from("/share/a")).unwrap();
    ledger.mark_in_flight(&f, &PathBuf::from("/share/b")).unwrap();

    assert_eq!(
        ledger.list_in_flight().unwrap(),
        vec![(f, PathBuf::from("/share/b"))]
    );
}

#[test]
fn test_second_mark_completed_is_noop() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger")).unwrap();
    let f = fp(b"photo");

    ledger.mark_completed(&f).unwrap();
    ledger.mark_completed(&f).unwrap();

    assert_eq!(ledger.completed_count().unwrap(), 1);
}

#[test]
fn test_tables_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger");
    let done = fp(b"done");
    let pending = fp(b"pending");

    {
        let ledger = Ledger::open(&path).unwrap();
        ledger.mark_in_flight(&done, &PathBuf::from("/share/done")).unwrap();
        ledger.mark_completed(&done).unwrap();
        ledger.mark_in_flight(&pending, &PathBuf::from("/share/pending")).unwrap();
    }

    let ledger = Ledger::open(&path).unwrap();
    assert!(ledger.is_completed(&done).unwrap());
    assert!(!ledger.is_completed(&pending).unwrap());
    assert_eq!(
        ledger.list_in_flight().unwrap(),
        vec![(pending, PathBuf::from("/share/pending"))]
    );
}

#[test]
fn test_recovery_after_crash_between_in_flight_and_completed() {
    let dir = tempdir().unwrap();
    let share_root = dir.path().join("share");
    let day = share_root.join("2024-05-01");
    fs::create_dir_all(&day).unwrap();
    let ledger_path = dir.path().join("ledger");

    let f = fp(b"interrupted photo");
    let dest = day.join("DSC0002.ARW");
    {
        let ledger = Ledger::open(&ledger_path).unwrap();
        ledger.mark_in_flight(&f, &dest).unwrap();
        // Process dies here with a partial copy on the share.
        fs::write(dest.with_file_name("DSC0002.ARW.part"), b"interr").unwrap();
        fs::write(&dest, b"interr").unwrap();
    }

    let ledger = Ledger::open(&ledger_path).unwrap();
    let share = MountedShare::new(&share_root);
    let recovered = recover_in_flight(&ledger, &share).unwrap();

    assert_eq!(recovered, 1);
    assert!(ledger.list_in_flight().unwrap().is_empty());
    assert!(!ledger.is_completed(&f).unwrap());
    assert!(!dest.exists());
    assert!(!day.join("DSC0002.ARW.part").exists());
}

#[test]
fn test_recovery_ignores_missing_remote_files() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger")).unwrap();
    let f = fp(b"never copied");
    ledger
        .mark_in_flight(&f, &dir.path().join("share/nothing/here.ARW"))
        .unwrap();

    let share = MountedShare::new(dir.path().join("share"));
    assert_eq!(recover_in_flight(&ledger, &share).unwrap(), 1);
    assert!(ledger.list_in_flight().unwrap().is_empty());
}

#[test]
fn test_clear_all_leaves_remote_files() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::open(&dir.path().join("ledger")).unwrap();
    let remote_file = dir.path().join("uploaded.ARW");
    fs::write(&remote_file, b"uploaded").unwrap();

    let a = fp(b"a");
    let b = fp(b"b");
    ledger.mark_completed(&a).unwrap();
    ledger.mark_in_flight(&b, &remote_file).unwrap();

    ledger.clear_all().unwrap();

    assert!(!ledger.is_completed(&a).unwrap());
    assert_eq!(ledger.completed_count().unwrap(), 0);
    assert!(ledger.list_in_flight().unwrap().is_empty());
    assert!(remote_file.exists());
}

#[test]
fn test_bad_in_flight_key_is_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger");
    plant_bad_in_flight_key(&path);

    let ledger = Ledger::open(&path).unwrap();
    let err = ledger.list_in_flight().unwrap_err();

    assert!(matches!(err, Error::LedgerCorruption(_)));
    assert!(err.is_session_fatal());

    let share = MountedShare::new(dir.path().join("share"));
    assert!(matches!(
        recover_in_flight(&ledger, &share),
        Err(Error::LedgerCorruption(_))
    ));
}
