use super::Fingerprint;
use crate::error::Error;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

pub const HASH_CHUNK_SIZE: usize = 8 * 1024; // 8KB

/// Stream a file through BLAKE3 in fixed-size chunks. Memory use is bounded
/// by the chunk size regardless of file size.
///
/// Open and read failures both surface as `Error::Unreadable`; the caller
/// skips the file for this session and it is picked up again next time.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, Error> {
    let unreadable = |source: io::Error| Error::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(unreadable)?;
    let fingerprint = fingerprint_reader(file).map_err(unreadable)?;
    trace!("Hashed {} -> {}", path.display(), fingerprint.prefix());
    Ok(fingerprint)
}

pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().into())
}
