use crate::config::ExtensionPolicy;
use crate::error::Error;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{error, trace};
use walkdir::WalkDir;

/// A source file that passed the extension policy. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
}

/// Walk `root` and return every regular file whose extension the policy
/// enables, sorted by path. Entries that cannot be read are logged and
/// skipped; a missing root is `Error::Unavailable`.
pub fn collect_candidates(
    root: &Path,
    policy: &ExtensionPolicy,
    ignore_globs: &[String],
) -> Result<Vec<FileRecord>, Error> {
    if !root.is_dir() {
        return Err(Error::Unavailable {
            path: root.to_path_buf(),
        });
    }

    let ignore_patterns = compile_patterns(ignore_globs);
    let mut records = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error walking {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !policy.allows(entry.path()) {
            continue;
        }
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                error!("Error reading metadata for {}: {}", entry.path().display(), err);
                continue;
            }
        };
        let extension = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        trace!("Candidate {}", entry.path().display());
        records.push(FileRecord {
            path: entry.into_path(),
            extension,
            size,
        });
    }

    records.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(records)
}

fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}
