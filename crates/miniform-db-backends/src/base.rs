//! Base database backend trait.
//!
//! [`DatabaseBackend`] is the driver-facing interface. Every backend also
//! implements [`DbExecutor`](miniform_db::DbExecutor), which is what forms
//! and transactions consume.

use miniform_core::MiniformError;
use miniform_db::query::compiler::{DatabaseBackendType, SqlCompiler};
use miniform_db::value::Value;
use miniform_db::Row;

/// The core trait for database backends.
///
/// All methods are async. Backends built on synchronous drivers (like
/// `rusqlite`) run their work in `spawn_blocking`.
#[async_trait::async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Returns the vendor name (e.g. "sqlite").
    fn vendor(&self) -> &str;

    /// Returns the backend type for use with the SQL compiler.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Executes a statement that does not return rows.
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, MiniformError>;

    /// Executes a query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, MiniformError>;

    /// Executes a query and returns exactly one row.
    ///
    /// Returns [`MiniformError::DoesNotExist`] if no rows are returned, or
    /// [`MiniformError::MultipleObjectsReturned`] if more than one is.
    async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Row, MiniformError>;

    /// Begins a new database transaction.
    async fn begin_transaction(&self) -> Result<(), MiniformError>;

    /// Commits the current transaction.
    async fn commit(&self) -> Result<(), MiniformError>;

    /// Rolls back the current transaction.
    async fn rollback(&self) -> Result<(), MiniformError>;

    /// Returns a SQL compiler for this backend's dialect.
    fn compiler(&self) -> SqlCompiler {
        SqlCompiler::new(self.backend_type())
    }
}
