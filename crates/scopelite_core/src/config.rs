//! Connection configuration.

use libsqlite3_sys as ffi;
use std::ffi::c_int;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where a connection's database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A database file on disk (created if missing, unless configured otherwise).
    File(PathBuf),
    /// A private, engine-managed in-memory image (`":memory:"`).
    Memory,
}

impl Location {
    /// The engine's sentinel name for in-memory databases.
    pub const MEMORY: &'static str = ":memory:";

    /// Creates a file location.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Returns true for in-memory locations.
    pub fn is_memory(&self) -> bool {
        matches!(self, Location::Memory)
    }

    /// Returns the name handed to the engine's open call.
    pub(crate) fn engine_name(&self) -> String {
        match self {
            Location::File(path) => path.to_string_lossy().into_owned(),
            Location::Memory => Self::MEMORY.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory => f.write_str(Self::MEMORY),
        }
    }
}

/// Configuration for opening a connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to open the database read-only.
    pub read_only: bool,

    /// Whether the location may be a `file:` URI.
    pub uri: bool,

    /// Whether errors report extended result codes.
    pub extended_result_codes: bool,

    /// How long the engine retries on a locked database (zero = fail immediately).
    pub busy_timeout: Duration,

    /// Whether to open through the UTF-16 entry point.
    ///
    /// The database's default text encoding becomes UTF-16. The UTF-16 open
    /// call accepts no flags, so `create_if_missing`, `read_only` and `uri`
    /// do not apply; it always opens read-write and creates.
    pub wide: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            uri: false,
            extended_result_codes: true,
            busy_timeout: Duration::ZERO,
            wide: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to open read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether `file:` URIs are interpreted.
    #[must_use]
    pub const fn uri(mut self, value: bool) -> Self {
        self.uri = value;
        self
    }

    /// Sets whether extended result codes are reported.
    #[must_use]
    pub const fn extended_result_codes(mut self, value: bool) -> Self {
        self.extended_result_codes = value;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to open through the UTF-16 entry point.
    #[must_use]
    pub const fn wide(mut self, value: bool) -> Self {
        self.wide = value;
        self
    }

    /// Computes the flags passed to `sqlite3_open_v2`.
    pub(crate) fn open_flags(&self) -> c_int {
        let mut flags = if self.read_only {
            ffi::SQLITE_OPEN_READONLY
        } else {
            ffi::SQLITE_OPEN_READWRITE
        };
        if self.create_if_missing && !self.read_only {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.read_only);
        assert!(config.extended_result_codes);
        assert_eq!(config.busy_timeout, Duration::ZERO);
        assert!(!config.wide);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .busy_timeout(Duration::from_millis(500))
            .wide(true);

        assert!(!config.create_if_missing);
        assert_eq!(config.busy_timeout, Duration::from_millis(500));
        assert!(config.wide);
    }

    #[test]
    fn open_flags() {
        let flags = Config::default().open_flags();
        assert_eq!(
            flags,
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        );

        let flags = Config::new().read_only(true).open_flags();
        assert_eq!(flags, ffi::SQLITE_OPEN_READONLY);

        let flags = Config::new().create_if_missing(false).uri(true).open_flags();
        assert_eq!(flags, ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_URI);
    }

    #[test]
    fn location_names() {
        assert_eq!(Location::Memory.engine_name(), ":memory:");
        assert_eq!(Location::file("things.db").to_string(), "things.db");
        assert!(Location::Memory.is_memory());
        assert!(!Location::file("a.db").is_memory());
    }
}
