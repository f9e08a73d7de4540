use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "Config";

#[cfg(target_os = "windows")]
const DEFAULT_SOURCE_ROOT: &str = "F:\\";
#[cfg(not(target_os = "windows"))]
const DEFAULT_SOURCE_ROOT: &str = "/media/sdcard";

/// Immutable settings snapshot for one session. Edits produce a new value that
/// takes effect on the next session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_root: PathBuf,
    pub ledger_path: PathBuf,
    pub concurrency: usize,
    pub poll_interval_secs: u64,
    pub ignore_patterns: Vec<String>,
    pub remote: RemoteConfig,
    pub allowed_extensions: ExtensionPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Mounted share root or UNC path, e.g. `//192.168.1.254/Media/Path`.
    pub root: PathBuf,
    pub timeout_secs: u64,
    /// Host probed on the SMB port before a session starts.
    pub server: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            ledger_path: PathBuf::from("uploaded_files.db"),
            concurrency: 4,
            poll_interval_secs: 5,
            ignore_patterns: Vec::new(),
            remote: RemoteConfig::default(),
            allowed_extensions: ExtensionPolicy::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("//192.168.1.254/Media/Path"),
            timeout_secs: 5,
            server: None,
        }
    }
}

impl AppConfig {
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(DEFAULT_CONFIG_NAME)
}

/// Layer `<name>.toml` (optional) under `SD_UPLOADER__*` environment variables.
pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(Environment::with_prefix("SD_UPLOADER").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Write the default settings as TOML, leaving an existing file untouched.
/// Returns whether a file was written.
pub fn write_default_configuration(path: &Path) -> Result<bool, crate::Error> {
    if path.exists() {
        return Ok(false);
    }
    let text = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| ConfigError::Message(format!("Cannot serialize defaults: {}", e)))?;
    std::fs::write(path, text)?;
    Ok(true)
}

/// Case-insensitive per-extension allow-list. Unknown extensions are excluded.
///
/// Keys are stored upper-case without the leading dot, so `.arw`, `ARW` and
/// `.ARW` all name the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "BTreeMap<String, bool>", into = "BTreeMap<String, bool>")]
pub struct ExtensionPolicy {
    entries: BTreeMap<String, bool>,
}

impl ExtensionPolicy {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(ext, enabled)| (normalize_extension(ext.as_ref()), enabled))
                .collect(),
        }
    }

    pub fn is_enabled(&self, extension: &str) -> bool {
        self.entries
            .get(&normalize_extension(extension))
            .copied()
            .unwrap_or(false)
    }

    pub fn allows(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => self.is_enabled(&ext.to_string_lossy()),
            None => false,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self::new([("ARW", true), ("JPEG", true), ("MP4", false)])
    }
}

impl From<BTreeMap<String, bool>> for ExtensionPolicy {
    fn from(map: BTreeMap<String, bool>) -> Self {
        Self::new(map)
    }
}

impl From<ExtensionPolicy> for BTreeMap<String, bool> {
    fn from(policy: ExtensionPolicy) -> Self {
        policy.entries
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_policy_is_case_insensitive() {
        let policy = ExtensionPolicy::new([(".ARW", true), (".JPEG", true), (".MP4", false)]);
        assert!(policy.allows(Path::new("/card/a.ARW")));
        assert!(policy.allows(Path::new("/card/b.jpeg")));
        assert!(!policy.allows(Path::new("/card/c.mp4")));
        assert!(!policy.allows(Path::new("/card/d.txt")));
        assert!(!policy.allows(Path::new("/card/no_extension")));
    }

    #[test]
    fn test_extension_policy_normalizes_keys() {
        let policy = ExtensionPolicy::new([("arw", true)]);
        assert!(policy.is_enabled(".ARW"));
        assert!(policy.is_enabled("Arw"));
        let keys: Vec<_> = policy.entries().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["ARW".to_string()]);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.concurrency, 4);
        assert_eq!(parsed.poll_interval_secs, 5);
        assert_eq!(parsed.allowed_extensions, ExtensionPolicy::default());
    }

    #[test]
    fn test_concurrency_never_zero() {
        let config = AppConfig {
            concurrency: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = AppConfig {
            poll_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_configuration_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Uploader.toml");
        std::fs::write(
            &path,
            "source_root = \"/mnt/card\"\nconcurrency = 2\n\n[allowed_extensions]\nCR3 = true\n",
        )
        .unwrap();

        let name = dir.path().join("Uploader");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.source_root, PathBuf::from("/mnt/card"));
        assert_eq!(config.concurrency, 2);
        assert!(config.allowed_extensions.is_enabled(".cr3"));
        assert!(!config.allowed_extensions.is_enabled(".ARW"));
        assert_eq!(config.poll_interval_secs, 5);
    }
}
