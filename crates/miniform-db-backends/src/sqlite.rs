//! SQLite database backend using `rusqlite`.
//!
//! [`SqliteBackend`] implements both [`DatabaseBackend`] and
//! [`DbExecutor`], running every statement in `tokio::task::spawn_blocking`.
//! One connection is shared behind an async mutex, so statements from one
//! session are serialized.
//!
//! Transactions go through [`DbExecutor::reserve`]: the reserved handle
//! holds the session's gate until it is dropped, and statements from every
//! other handle wait on that gate. Work from other tasks therefore never
//! lands inside someone else's open transaction.
//!
//! Booleans are stored as integers and temporal values as ISO-8601 text,
//! which [`Row::get`](miniform_db::Row::get) parses back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miniform_core::MiniformError;
use miniform_db::query::compiler::DatabaseBackendType;
use miniform_db::value::Value;
use miniform_db::{DbExecutor, Row};
use rusqlite::types::ValueRef;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::base::DatabaseBackend;

/// A SQLite database backend.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
    gate: Arc<Mutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl SqliteBackend {
    /// Opens a database at `path`; `:memory:` gives an in-memory database.
    ///
    /// WAL journaling and foreign key enforcement are switched on.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MiniformError> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| MiniformError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| MiniformError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            gate: Arc::new(Mutex::new(())),
            held: None,
        })
    }

    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> Result<Self, MiniformError> {
        Self::open(":memory:")
    }

    /// The database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<(), MiniformError> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, i64::from(*b)),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Bytes(b) => stmt.raw_bind_parameter(idx, b.as_slice()),
                Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                    stmt.raw_bind_parameter(idx, param.to_form_string())
                }
                Value::Json(_) | Value::List(_) => {
                    stmt.raw_bind_parameter(idx, param.to_json().to_string())
                }
            }
            .map_err(map_error)?;
        }
        Ok(())
    }

    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values = (0..column_names.len())
            .map(|i| match sqlite_row.get_ref(i).unwrap_or(ValueRef::Null) {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => Value::Int(v),
                ValueRef::Real(v) => Value::Float(v),
                ValueRef::Text(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
                ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
            })
            .collect();
        Row::new(column_names.to_vec(), values)
    }

    /// Returns `true` for a handle that holds the transaction gate.
    pub const fn is_reserved(&self) -> bool {
        self.held.is_some()
    }

    /// Runs `f` against the connection on the blocking pool.
    ///
    /// Waits for any reserved handle to be dropped first, unless this is it.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, MiniformError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, MiniformError> + Send + 'static,
    {
        let _gate = if self.is_reserved() {
            None
        } else {
            Some(self.gate.lock().await)
        };
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| MiniformError::DatabaseError(format!("Task join error: {e}")))?
    }
}

/// Maps driver errors, singling out constraint violations.
fn map_error(e: rusqlite::Error) -> MiniformError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            MiniformError::IntegrityError(msg.unwrap_or_else(|| err.to_string()))
        }
        other => MiniformError::DatabaseError(other.to_string()),
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for SqliteBackend {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, MiniformError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        tracing::trace!(sql = %sql, "sqlite execute");
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(map_error)?;
            Self::bind_params(&mut stmt, &params)?;
            let count = stmt.raw_execute().map_err(map_error)?;
            Ok(u64::try_from(count).unwrap_or(u64::MAX))
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, MiniformError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        tracing::trace!(sql = %sql, "sqlite query");
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(map_error)?;
            let column_names: Vec<String> =
                stmt.column_names().into_iter().map(String::from).collect();
            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();
            let mut rows = Vec::new();
            while let Some(row) = raw_rows.next().map_err(map_error)? {
                rows.push(Self::convert_row(row, &column_names));
            }
            Ok(rows)
        })
        .await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Row, MiniformError> {
        let mut rows = DatabaseBackend::query(self, sql, params).await?;
        match rows.len() {
            0 => Err(MiniformError::DoesNotExist("No rows returned".to_string())),
            1 => Ok(rows.remove(0)),
            n => Err(MiniformError::MultipleObjectsReturned(format!(
                "Expected 1 row, got {n}"
            ))),
        }
    }

    async fn begin_transaction(&self) -> Result<(), MiniformError> {
        self.execute("BEGIN", &[]).await.map(|_| ())
    }

    async fn commit(&self) -> Result<(), MiniformError> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    async fn rollback(&self) -> Result<(), MiniformError> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<u64, MiniformError> {
        self.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, MiniformError> {
        DatabaseBackend::query(self, sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Row, MiniformError> {
        DatabaseBackend::query_one(self, sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> Result<Value, MiniformError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(map_error)?;
            Self::bind_params(&mut stmt, &params)?;
            stmt.raw_execute().map_err(map_error)?;
            Ok(Value::Int(conn.last_insert_rowid()))
        })
        .await
    }

    async fn reserve(&self) -> Result<Option<Box<dyn DbExecutor>>, MiniformError> {
        if self.is_reserved() {
            return Ok(None);
        }
        let held = Arc::clone(&self.gate).lock_owned().await;
        tracing::trace!(path = %self.path.display(), "sqlite session reserved");
        Ok(Some(Box::new(Self {
            path: self.path.clone(),
            conn: Arc::clone(&self.conn),
            gate: Arc::clone(&self.gate),
            held: Some(held),
        })))
    }
}
