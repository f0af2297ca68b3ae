use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How to settle a board whose `base` profile is provided by more than one
/// private overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivateBasePolicy {
    /// The private overlay processed last (in path order) wins.
    #[default]
    LastWins,
    /// Fail with [`Error::ConflictingBaseProfile`].
    Reject,
}

/// What a `-*` token in a profile's `USE` means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinusStarPolicy {
    /// Like any other `-` token: a disabled flag named `*`.
    #[default]
    Literal,
    /// Portage incremental semantics: drop every flag seen so far.
    Clear,
}

/// Settings for one exploration run.
///
/// Overlay globs are relative to `source_root`. Every field except
/// `source_root` has a default, so a minimal TOML file is just:
///
/// ```
/// use portage_explorer::ExplorerConfig;
///
/// let config = ExplorerConfig::from_toml_str("source_root = \"/mnt/host/source\"").unwrap();
/// assert_eq!(config.private_overlay_globs, vec!["src/private-overlays/*"]);
/// assert_eq!(config.shell_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Root of the checkout holding all overlays.
    pub source_root: PathBuf,
    /// Globs matching public overlay directories.
    pub public_overlay_globs: Vec<String>,
    /// Globs matching private overlay directories.
    pub private_overlay_globs: Vec<String>,
    /// Worker threads for per-item stages. `None` uses all cores.
    pub jobs: Option<usize>,
    /// Upper bound for a single `make.defaults` evaluation.
    pub shell_timeout_secs: u64,
    /// Shell used by [`ShellEvaluator`](crate::ShellEvaluator).
    pub shell: String,
    /// Tie-break between private base profiles of the same board.
    pub private_base_policy: PrivateBasePolicy,
    /// Handling of `-*` in `make.defaults`.
    pub minus_star: MinusStarPolicy,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            source_root: PathBuf::new(),
            public_overlay_globs: vec![
                "src/overlays/*".to_string(),
                "src/third_party/chromiumos-overlay".to_string(),
                "src/third_party/eclass-overlay".to_string(),
                "src/third_party/portage-stable".to_string(),
            ],
            private_overlay_globs: vec!["src/private-overlays/*".to_string()],
            jobs: None,
            shell_timeout_secs: 30,
            shell: "bash".to_string(),
            private_base_policy: PrivateBasePolicy::default(),
            minus_star: MinusStarPolicy::default(),
        }
    }
}

impl ExplorerConfig {
    /// Default settings rooted at `source_root`.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        ExplorerConfig {
            source_root: source_root.into(),
            ..ExplorerConfig::default()
        }
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: ExplorerConfig =
            toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }
        if self.shell_timeout_secs == 0 {
            return Err(Error::Config(
                "shell_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.shell.trim().is_empty() {
            return Err(Error::Config("shell must not be empty".to_string()));
        }
        Ok(())
    }

    /// `shell_timeout_secs` as a [`Duration`].
    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }
}
