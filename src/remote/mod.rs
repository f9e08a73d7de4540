pub mod share;

pub use share::MountedShare;

use crate::error::Error;
use crate::space::RemoteSpace;
use chrono::NaiveDate;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Operations the upload pipeline needs from the network share.
///
/// Implementations must be callable from several workers at once.
pub trait RemoteStore: Send + Sync {
    fn root(&self) -> &Path;

    /// Initial connection check made once per session before any transfer.
    fn probe(&self) -> Result<(), Error>;

    /// Recursive and idempotent.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Copy `local` to `dest`, replacing whatever is there. Returns bytes copied.
    fn copy_file(&self, local: &Path, dest: &Path) -> io::Result<u64>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Best-effort; anything that cannot be determined in time is `Unknown`.
    fn free_space(&self) -> RemoteSpace;
}

/// `<remote root>/<YYYY-MM-DD>` for the session started on `date`.
pub fn session_folder(remote_root: &Path, date: NaiveDate) -> PathBuf {
    remote_root.join(date.format("%Y-%m-%d").to_string())
}

/// Destination of `local_path` inside the session folder. The path relative to
/// the source root is kept so camera folders with clashing file names stay
/// apart; the same source file always maps to the same destination.
pub fn destination_for(session_folder: &Path, source_root: &Path, local_path: &Path) -> PathBuf {
    match local_path.strip_prefix(source_root) {
        Ok(relative) if !relative.as_os_str().is_empty() => session_folder.join(relative),
        _ => match local_path.file_name() {
            Some(name) => session_folder.join(name),
            None => session_folder.to_path_buf(),
        },
    }
}

/// `dest` if nothing is there yet, otherwise the first free `name (n).ext`
/// sibling. A different photo that reuses a camera file name never replaces
/// one already on the share.
pub fn unique_destination<F>(dest: &Path, mut exists: F) -> io::Result<PathBuf>
where
    F: FnMut(&Path) -> io::Result<bool>,
{
    if !exists(dest)? {
        return Ok(dest.to_path_buf());
    }
    let stem = dest
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(OsString::new);
    let extension = dest.extension();
    let mut n: u32 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!(" ({})", n));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }
        let candidate = dest.with_file_name(name);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Sibling path a copy is written to before it is renamed into place.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(".part");
    dest.with_file_name(name)
}

/// Run `f` on a helper thread and give up after `timeout`. A call that hangs
/// on an unresponsive share is abandoned rather than joined.
pub(crate) fn with_timeout<T, F>(timeout: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_folder_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            session_folder(Path::new("/share/photos"), date),
            PathBuf::from("/share/photos/2024-03-09")
        );
    }

    #[test]
    fn test_destination_keeps_relative_layout() {
        let folder = Path::new("/share/2024-03-09");
        let a = destination_for(folder, Path::new("/card"), Path::new("/card/DCIM/100MSDCF/DSC0001.ARW"));
        let b = destination_for(folder, Path::new("/card"), Path::new("/card/DCIM/101MSDCF/DSC0001.ARW"));
        assert_eq!(a, PathBuf::from("/share/2024-03-09/DCIM/100MSDCF/DSC0001.ARW"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_destination_outside_source_root_uses_file_name() {
        let folder = Path::new("/share/2024-03-09");
        let dest = destination_for(folder, Path::new("/card"), Path::new("/elsewhere/x.JPEG"));
        assert_eq!(dest, PathBuf::from("/share/2024-03-09/x.JPEG"));
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/share/d/DSC0001.ARW")),
            PathBuf::from("/share/d/DSC0001.ARW.part")
        );
    }

    #[test]
    fn test_unique_destination_numbers_taken_names() {
        let taken = [
            PathBuf::from("/share/d/DSC0001.ARW"),
            PathBuf::from("/share/d/DSC0001 (1).ARW"),
        ];
        let exists = |p: &Path| Ok(taken.iter().any(|t| t == p));

        assert_eq!(
            unique_destination(Path::new("/share/d/DSC0002.ARW"), exists).unwrap(),
            PathBuf::from("/share/d/DSC0002.ARW")
        );
        assert_eq!(
            unique_destination(Path::new("/share/d/DSC0001.ARW"), exists).unwrap(),
            PathBuf::from("/share/d/DSC0001 (2).ARW")
        );
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let dest = unique_destination(Path::new("/share/d/README"), |p: &Path| {
            Ok(p == Path::new("/share/d/README"))
        })
        .unwrap();
        assert_eq!(dest, PathBuf::from("/share/d/README (1)"));
    }

    #[test]
    fn test_with_timeout_gives_up() {
        let result = with_timeout(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert_eq!(result, None);
        assert_eq!(with_timeout(Duration::from_secs(1), || 7), Some(7));
    }
}
