use serde::Serialize;
use std::fmt;

/// Build identity reported by the `version` command.
///
/// Built once in `main` and handed to the command; nothing reads it globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub git: String,
    pub rustc: String,
}

impl VersionInfo {
    /// Version from the manifest, git revision from `GIT_COMMIT` at build
    /// time, rustc from the running binary.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git: option_env!("GIT_COMMIT").unwrap_or("undefined").to_string(),
            rustc: rustc_version_runtime::version().to_string(),
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plugin Version:\t{}", self.version)?;
        writeln!(f, "Git:\t\t{}", self.git)?;
        writeln!(f, "Rust:\t\t{}", self.rustc)
    }
}
