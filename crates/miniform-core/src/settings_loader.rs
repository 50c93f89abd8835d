//! Settings loading from configuration files.
//!
//! Loads [`Settings`] from TOML or JSON and applies environment variable
//! overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `MINIFORM_DEBUG` | `debug` |
//! | `MINIFORM_LOG_LEVEL` | `log_level` |
//! | `MINIFORM_DATABASE_ENGINE` | `databases.default.engine` |
//! | `MINIFORM_DATABASE_NAME` | `databases.default.name` |
//! | `MINIFORM_MEDIA_ROOT` | `media_root` |
//! | `MINIFORM_MEDIA_URL` | `media_url` |
//! | `MINIFORM_UPLOAD_MAX_MEMORY_SIZE` | `upload_max_memory_size` |
//! | `MINIFORM_PASSWORD_HASH_COST` | `password_hash_cost` |
//! | `MINIFORM_FORM_JSON_INDENT` | `form_json_indent` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use miniform_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/miniform.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::MiniformError;
use crate::settings::{DatabaseSettings, Settings};

const ENV_PREFIX: &str = "MINIFORM_";

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, MiniformError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| MiniformError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_into_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, MiniformError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, MiniformError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<Settings, MiniformError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| MiniformError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_into_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, MiniformError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, MiniformError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `MINIFORM_*` environment variable overrides to a settings struct.
///
/// Numeric variables that fail to parse are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(format!("{ENV_PREFIX}{key}")).ok());
}

/// Applies overrides from an arbitrary lookup keyed by the unprefixed name
/// (e.g. `DEBUG`).
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("LOG_LEVEL") {
        settings.log_level = val;
    }

    let engine = lookup("DATABASE_ENGINE");
    let name = lookup("DATABASE_NAME");
    if engine.is_some() || name.is_some() {
        let db = settings
            .databases
            .entry("default".to_string())
            .or_insert_with(DatabaseSettings::default);
        if let Some(engine) = engine {
            db.engine = engine;
        }
        if let Some(name) = name {
            db.name = name;
        }
    }

    if let Some(val) = lookup("MEDIA_ROOT") {
        settings.media_root = PathBuf::from(val);
    }

    if let Some(val) = lookup("MEDIA_URL") {
        settings.media_url = val;
    }

    if let Some(size) = lookup("UPLOAD_MAX_MEMORY_SIZE").and_then(|v| v.parse().ok()) {
        settings.upload_max_memory_size = size;
    }

    if let Some(cost) = lookup("PASSWORD_HASH_COST").and_then(|v| v.parse().ok()) {
        settings.password_hash_cost = cost;
    }

    if let Some(indent) = lookup("FORM_JSON_INDENT").and_then(|v| v.parse().ok()) {
        settings.form_json_indent = indent;
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, MiniformError> {
    std::fs::read_to_string(path).map_err(|e| {
        MiniformError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_into_defaults(value: serde_json::Value, format: &str) -> Result<Settings, MiniformError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        MiniformError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        MiniformError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
