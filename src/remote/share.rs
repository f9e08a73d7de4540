use super::{partial_path, with_timeout, RemoteStore};
use crate::config::RemoteConfig;
use crate::error::Error;
use crate::platform;
use crate::space::RemoteSpace;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const SMB_PORT: u16 = 445;

/// A network share reached through the operating system: a mount point on
/// unix, a UNC path on Windows. Authentication belongs to the mount.
pub struct MountedShare {
    root: PathBuf,
    server: Option<String>,
    timeout: Duration,
}

impl MountedShare {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            server: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            root: config.root.clone(),
            server: config.server.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn probe_server(server: &str, timeout: Duration) -> Result<(), Error> {
        let target = if server.contains(':') {
            server.to_string()
        } else {
            format!("{}:{}", server, SMB_PORT)
        };
        let addrs = target
            .to_socket_addrs()
            .map_err(|e| Error::RemoteUnavailable(format!("cannot resolve {}: {}", target, e)))?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(_) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(Error::RemoteUnavailable(match last_err {
            Some(e) => format!("cannot reach {}: {}", target, e),
            None => format!("no address for {}", target),
        }))
    }
}

impl RemoteStore for MountedShare {
    fn root(&self) -> &Path {
        &self.root
    }

    fn probe(&self) -> Result<(), Error> {
        if let Some(server) = &self.server {
            Self::probe_server(server, self.timeout)?;
        }
        let root = self.root.clone();
        match with_timeout(self.timeout, move || fs::metadata(&root).map(|m| m.is_dir())) {
            Some(Ok(true)) => Ok(()),
            Some(Ok(false)) => Err(Error::RemoteUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Some(Err(e)) => Err(Error::RemoteUnavailable(format!(
                "{}: {}",
                self.root.display(),
                e
            ))),
            None => Err(Error::RemoteUnavailable(format!(
                "{} did not respond within {:?}",
                self.root.display(),
                self.timeout
            ))),
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn copy_file(&self, local: &Path, dest: &Path) -> io::Result<u64> {
        let part = partial_path(dest);
        let result = (|| {
            let mut reader = File::open(local)?;
            let mut writer = BufWriter::new(File::create(&part)?);
            let bytes = io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok::<_, io::Error>(bytes)
        })();
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&part);
                return Err(e);
            }
        };
        fs::rename(&part, dest)?;
        debug!("Published {} ({} bytes)", dest.display(), bytes);
        Ok(bytes)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn free_space(&self) -> RemoteSpace {
        let root = self.root.clone();
        match with_timeout(self.timeout, move || platform::free_space(&root)) {
            Some(Ok(bytes)) => RemoteSpace::Known(bytes),
            Some(Err(e)) => {
                debug!("Remote free space unknown for {}: {}", self.root.display(), e);
                RemoteSpace::Unknown
            }
            None => {
                warn!("Remote free space query timed out for {}", self.root.display());
                RemoteSpace::Unknown
            }
        }
    }
}
