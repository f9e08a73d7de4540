#[cfg(target_os = "windows")]
pub mod windows;

use std::io;
use std::path::Path;

/// Bytes available to this user on the filesystem holding `path`.
#[cfg(target_os = "windows")]
pub fn free_space(path: &Path) -> io::Result<u64> {
    windows::free_space(path)
}

#[cfg(unix)]
pub fn free_space(path: &Path) -> io::Result<u64> {
    let stat = rustix::fs::statvfs(path).map_err(io::Error::from)?;
    Ok(stat.f_bavail * stat.f_frsize)
}
