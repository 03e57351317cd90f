//! Supervisor configuration parsing and validation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::{AppError, Result};

fn default_cwd() -> PathBuf {
    PathBuf::from(".")
}

fn default_kill_grace() -> Duration {
    Duration::from_secs(5)
}

/// Read `kill_grace_seconds` as whole or fractional seconds.
fn deserialize_grace_seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|err| D::Error::custom(format!("invalid kill_grace_seconds {seconds}: {err}")))
}

fn default_max_line_bytes() -> usize {
    1_048_576
}

/// Construction parameters for one supervised engine process.
///
/// Loaded from TOML by [`load_from_path`](Self::load_from_path) or built in
/// code with [`new`](Self::new) and the `with_*` helpers:
///
/// ```toml
/// path = "/usr/bin/stockfish"
/// args = []
/// warn_words = ["error", "illegal"]
/// cwd = "/tmp"
/// kill_grace_seconds = 2.5
///
/// [env]
/// PATH = "/usr/bin"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorConfig {
    /// Executable to launch.
    pub path: PathBuf,
    /// Arguments passed after the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Substrings that raise the log severity of a matching output line.
    #[serde(default)]
    pub warn_words: Vec<String>,
    /// Replacement environment; `None` inherits the supervisor's environment.
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
    /// Working directory of the child process.
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
    /// Time to wait for exit after `SIGTERM` before force-killing.
    ///
    /// Read from `kill_grace_seconds`, which accepts fractions.
    #[serde(
        rename = "kill_grace_seconds",
        default = "default_kill_grace",
        deserialize_with = "deserialize_grace_seconds"
    )]
    pub kill_grace: Duration,
    /// Longest accepted stdout line; longer lines are discarded.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl SupervisorConfig {
    /// Configuration for `path` with no arguments and default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            warn_words: Vec::new(),
            env: None,
            cwd: default_cwd(),
            kill_grace: default_kill_grace(),
            max_line_bytes: default_max_line_bytes(),
        }
    }

    /// Replace the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the warn-word list.
    #[must_use]
    pub fn with_warn_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warn_words = words.into_iter().map(Into::into).collect();
        self
    }

    /// Run the child with exactly this environment.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Run the child in `cwd`.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Change the termination grace period.
    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants that deserialization alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AppError::Config("path must not be empty".into()));
        }

        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if self.kill_grace.is_zero() {
            return Err(AppError::Config(
                "kill_grace_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
