//! Configuration loading and management
//!
//! Handles parsing of `daybook.toml`. Every field has a default, so a missing
//! file (or a file with only some sections) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::storage::STORE_FILE;

/// Config file name inside the platform config directory
pub const CONFIG_FILE: &str = "daybook.toml";

const MAX_HISTORY_DEPTH: usize = 1000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Undo/redo configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Rollover of unfinished tasks
    #[serde(default)]
    pub rollover: RolloverConfig,

    /// Markdown daily-note export
    #[serde(default)]
    pub export: ExportConfig,

    /// GitHub reconciliation
    #[serde(default)]
    pub github: GithubConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store file; defaults to `<data_dir>/daybook/store.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Snapshots kept on each of the undo and redo stacks
    #[serde(default = "default_history_depth")]
    pub max_depth: usize,
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_history_depth(),
        }
    }
}

/// Rollover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverConfig {
    /// Run rollover when a session opens on today's date
    #[serde(default = "default_true")]
    pub on_open: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self { on_open: true }
    }
}

/// Export configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Write a markdown note after every save
    #[serde(default)]
    pub enabled: bool,

    /// Directory receiving the notes (required when enabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// GitHub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Refresh linked tasks from GitHub
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// GitHub CLI binary
    #[serde(default = "default_gh_bin")]
    pub gh_bin: String,

    /// Per-lookup timeout (e.g. "20s", "1m")
    #[serde(default = "default_gh_timeout")]
    pub timeout: String,
}

fn default_gh_bin() -> String {
    "gh".to_string()
}

fn default_gh_timeout() -> String {
    "20s".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gh_bin: default_gh_bin(),
            timeout: default_gh_timeout(),
        }
    }
}

impl GithubConfig {
    pub fn timeout_duration(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration if present, falling back to defaults.
    ///
    /// An unreadable or invalid file is logged and ignored.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Self::default(),
            },
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Store file: explicit override, then config, then the platform data dir.
    pub fn store_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.storage.path {
            return Ok(path.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join(STORE_FILE))
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "cannot determine a data directory; set storage.path".to_string(),
                )
            })
    }

    fn validate(&self) -> Result<()> {
        if self.history.max_depth == 0 || self.history.max_depth > MAX_HISTORY_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "history.max_depth must be between 1 and {MAX_HISTORY_DEPTH}"
            )));
        }

        if self.export.enabled && self.export.dir.is_none() {
            return Err(Error::InvalidConfig(
                "export.dir is required when export.enabled = true".to_string(),
            ));
        }

        if self.github.gh_bin.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "github.gh_bin cannot be empty".to_string(),
            ));
        }

        self.github
            .timeout_duration()
            .map_err(|err| Error::InvalidConfig(format!("github.timeout: {err}")))?;

        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "daybook")
}

/// `<config_dir>/daybook/daybook.toml`
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Parse `<n>[s|m|h]` (bare numbers are seconds).
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::InvalidArgument("duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s, "s"),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid duration number: {num_str}")))?;

    let seconds = match unit.to_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => num,
        "m" | "min" | "mins" | "minute" | "minutes" => num * 60,
        "h" | "hr" | "hour" | "hours" => num * 3600,
        _ => {
            return Err(Error::InvalidArgument(format!(
                "invalid duration unit '{unit}' (expected s, m, h)"
            )));
        }
    };

    if seconds == 0 {
        return Err(Error::InvalidArgument("duration must be > 0".to_string()));
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert!(cfg.storage.path.is_none());
        assert_eq!(cfg.history.max_depth, 50);
        assert!(cfg.rollover.on_open);
        assert!(!cfg.export.enabled);
        assert!(cfg.export.dir.is_none());
        assert!(cfg.github.enabled);
        assert_eq!(cfg.github.gh_bin, "gh");
        assert_eq!(cfg.github.timeout_duration().unwrap(), Duration::from_secs(20));
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[storage]
path = "/tmp/daybook/store.json"

[history]
max_depth = 5

[rollover]
on_open = false

[export]
enabled = true
dir = "/tmp/notes"

[github]
enabled = false
gh_bin = "/usr/local/bin/gh"
timeout = "2m"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(
            cfg.storage.path.as_deref(),
            Some(Path::new("/tmp/daybook/store.json"))
        );
        assert_eq!(cfg.history.max_depth, 5);
        assert!(!cfg.rollover.on_open);
        assert!(cfg.export.enabled);
        assert_eq!(cfg.export.dir.as_deref(), Some(Path::new("/tmp/notes")));
        assert!(!cfg.github.enabled);
        assert_eq!(cfg.github.gh_bin, "/usr/local/bin/gh");
        assert_eq!(cfg.github.timeout_duration().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn export_without_dir_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[export]\nenabled = true\n").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn zero_history_depth_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[history]\nmax_depth = 0\n").expect("write config");

        assert!(matches!(
            Config::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_or_default_ignores_missing_and_invalid_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.toml");
        assert_eq!(Config::load_or_default(Some(&missing)).history.max_depth, 50);

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "history = [not valid").expect("write config");
        assert_eq!(Config::load_or_default(Some(&broken)).history.max_depth, 50);
    }

    #[test]
    fn store_path_prefers_override() {
        let mut cfg = Config::default();
        cfg.storage.path = Some(PathBuf::from("/data/store.json"));
        assert_eq!(
            cfg.store_path(Some(Path::new("/override.json"))).unwrap(),
            PathBuf::from("/override.json")
        );
        assert_eq!(cfg.store_path(None).unwrap(), PathBuf::from("/data/store.json"));
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("max_depth = 50"));
        assert!(written.contains("gh_bin = \"gh\""));
    }

    #[test]
    fn durations_parse_units() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("1 h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("").is_err());
    }
}
