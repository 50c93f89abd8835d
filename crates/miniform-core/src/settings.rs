//! Settings for miniform.
//!
//! This module provides the [`Settings`] struct, which holds all library
//! configuration, and [`LazySettings`], a globally-accessible,
//! lazily-initialized settings instance. Everything has a sensible default so
//! forms work without any configuration at all.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{MiniformError, MiniformResult};

/// Default in-memory limit for uploaded request bodies (2.5 MB).
pub const DEFAULT_UPLOAD_MAX_MEMORY_SIZE: usize = 2_621_440;

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine (e.g. `sqlite`).
    pub engine: String,
    /// The database name (file path or `:memory:` for `SQLite`).
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: ":memory:".to_string(),
        }
    }
}

/// The complete set of miniform settings.
///
/// Use [`SETTINGS`] to access the global instance.
///
/// # Examples
///
/// ```
/// use miniform_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.password_hash_cost, 12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// The log level (e.g. "info", "debug", "warn").
    pub log_level: String,

    // ── Database ─────────────────────────────────────────────────────

    /// Database configurations, keyed by alias (e.g. "default").
    pub databases: HashMap<String, DatabaseSettings>,

    // ── Media ────────────────────────────────────────────────────────

    /// Directory that uploaded files are written under.
    pub media_root: PathBuf,
    /// URL prefix for uploaded files.
    pub media_url: String,
    /// Largest request body, in bytes, accepted when reading form data.
    pub upload_max_memory_size: usize,

    // ── Forms ────────────────────────────────────────────────────────

    /// The bcrypt cost used when hashing password fields.
    pub password_hash_cost: u32,
    /// Indentation used by `form_json` when none is given.
    pub form_json_indent: usize,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert("default".to_string(), DatabaseSettings::default());

        Self {
            debug: true,
            log_level: "info".to_string(),
            databases,
            media_root: PathBuf::from("media"),
            media_url: "/media/".to_string(),
            upload_max_memory_size: DEFAULT_UPLOAD_MAX_MEMORY_SIZE,
            password_hash_cost: 12,
            form_json_indent: 2,
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the `default` database configuration.
    pub fn default_database(&self) -> MiniformResult<&DatabaseSettings> {
        self.databases.get("default").ok_or_else(|| {
            MiniformError::ImproperlyConfigured("No 'default' database configured".to_string())
        })
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup. Library code
/// reads through [`get_or_default`](LazySettings::get_or_default) so that an
/// unconfigured process still behaves with the defaults.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Only the first call succeeds.
    pub fn configure(&self, settings: Settings) -> MiniformResult<()> {
        self.inner.set(settings).map_err(|_| {
            MiniformError::ImproperlyConfigured("Settings have already been configured".to_string())
        })
    }

    /// Returns the configured settings, if any.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns the configured settings, or the defaults when unconfigured.
    pub fn get_or_default(&self) -> &Settings {
        static DEFAULTS: OnceLock<Settings> = OnceLock::new();
        self.inner
            .get()
            .unwrap_or_else(|| DEFAULTS.get_or_init(Settings::default))
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert_eq!(s.media_url, "/media/");
        assert_eq!(s.media_root, PathBuf::from("media"));
        assert_eq!(s.upload_max_memory_size, 2_621_440);
        assert_eq!(s.password_hash_cost, 12);
        assert_eq!(s.form_json_indent, 2);
        assert!(s.extra.is_empty());
    }

    #[test]
    fn test_default_database() {
        let s = Settings::default();
        let db = s.default_database().unwrap();
        assert_eq!(db.engine, "sqlite");
        assert_eq!(db.name, ":memory:");
    }

    #[test]
    fn test_missing_default_database() {
        let mut s = Settings::default();
        s.databases.clear();
        assert!(matches!(
            s.default_database(),
            Err(MiniformError::ImproperlyConfigured(_))
        ));
    }

    #[test]
    fn test_lazy_settings_configure_and_get() {
        let lazy = LazySettings::new();
        assert!(!lazy.is_configured());
        assert!(lazy.try_get().is_none());
        assert_eq!(lazy.get_or_default().password_hash_cost, 12);

        let mut settings = Settings::default();
        settings.debug = false;
        settings.password_hash_cost = 4;

        lazy.configure(settings).unwrap();
        assert!(lazy.is_configured());
        assert!(!lazy.get_or_default().debug);
        assert_eq!(lazy.try_get().unwrap().password_hash_cost, 4);
    }

    #[test]
    fn test_lazy_settings_configure_twice() {
        let lazy = LazySettings::new();
        lazy.configure(Settings::default()).unwrap();
        assert!(lazy.configure(Settings::default()).is_err());
    }
}
