//! # miniform-db-backends
//!
//! Database drivers for miniform. The [`SqliteBackend`] (feature `sqlite`,
//! on by default) wraps `rusqlite`; [`connect`] picks a backend from the
//! configured engine name.

pub mod base;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use miniform_core::{DatabaseSettings, MiniformError, MiniformResult};
use miniform_db::DbExecutor;

pub use base::DatabaseBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

/// Opens a database session for `settings`.
///
/// # Errors
///
/// Returns [`MiniformError::ImproperlyConfigured`] for an unknown engine or
/// one whose feature is disabled, and the backend's error if opening fails.
pub fn connect(settings: &DatabaseSettings) -> MiniformResult<Arc<dyn DbExecutor>> {
    match settings.engine.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" | "sqlite3" => {
            tracing::info!(name = %settings.name, "opening sqlite database");
            Ok(Arc::new(SqliteBackend::open(&settings.name)?))
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" | "sqlite3" => Err(MiniformError::ImproperlyConfigured(
            "The sqlite engine requires the `sqlite` feature".to_string(),
        )),
        other => Err(MiniformError::ImproperlyConfigured(format!(
            "Unknown database engine: {other}"
        ))),
    }
}
