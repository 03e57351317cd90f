//! Human-readable task labels for correlating log output.

use std::fmt::{Display, Formatter};
use std::path::Path;

use chrono::{DateTime, Local};

/// Identifier attached as the `task` field of every log record emitted on
/// behalf of one supervised process.
///
/// Built from the executable's base name and the launch time, so two
/// instances of the same engine remain distinguishable in interleaved logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLabel {
    name: String,
    started: String,
}

impl TaskLabel {
    /// Label for `path` stamped with the current local time.
    #[must_use]
    pub fn for_executable(path: &Path) -> Self {
        Self::with_timestamp(path, Local::now())
    }

    /// Label for `path` stamped with `at`.
    #[must_use]
    pub fn with_timestamp(path: &Path, at: DateTime<Local>) -> Self {
        let base = path.file_name().map_or_else(
            || path.to_string_lossy().into_owned(),
            |name| name.to_string_lossy().into_owned(),
        );

        Self {
            name: capitalize(&base),
            started: at.format("%H:%M:%S%.3f").to_string(),
        }
    }

    /// Display name derived from the executable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Launch time formatted as `HH:MM:SS.mmm`.
    #[must_use]
    pub fn started(&self) -> &str {
        &self.started
    }
}

impl Display for TaskLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.started)
    }
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
