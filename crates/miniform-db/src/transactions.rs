//! Transactions for form saves.
//!
//! A [`TransactionManager`] wraps a [`DbExecutor`] and tracks nesting depth.
//! The outermost `begin` issues `BEGIN`; nested ones create savepoints.
//! Callbacks can be queued to run once the outermost transaction commits
//! or rolls back. Forms use them to remove replaced uploads only after the
//! new row is durable, and to remove fresh uploads when a save fails.
//!
//! [`atomic()`] is the usual entry point. It asks the executor to
//! [`reserve`](DbExecutor::reserve) a connection first, so concurrent saves
//! on one shared session never run inside each other's transaction:
//!
//! ```ignore
//! use miniform_db::transactions::atomic;
//!
//! let id = atomic(db, |txn| async move {
//!     insert_row(&*txn, "notes", &[("body", "hi".into())]).await
//! })
//! .await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use miniform_core::{MiniformError, MiniformResult};
use tokio::sync::Mutex;

use crate::executor::DbExecutor;
use crate::query::compiler::{DatabaseBackendType, Row};
use crate::value::Value;

static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

type Callbacks = Vec<Box<dyn FnOnce() + Send + 'static>>;

#[derive(Default)]
struct TxnState {
    depth: u32,
    savepoints: Vec<String>,
    on_commit: Callbacks,
    on_rollback: Callbacks,
}

enum Session<'a> {
    Shared(&'a dyn DbExecutor),
    Reserved(Box<dyn DbExecutor>),
}

/// Tracks transaction state for one database session.
pub struct TransactionManager<'a> {
    session: Session<'a>,
    state: Arc<Mutex<TxnState>>,
}

impl<'a> TransactionManager<'a> {
    /// Creates a manager over `db` with no open transaction.
    pub fn new(db: &'a dyn DbExecutor) -> Self {
        Self::with_session(Session::Shared(db))
    }

    /// Creates a manager that owns a reserved executor.
    pub fn reserved(db: Box<dyn DbExecutor>) -> Self {
        Self::with_session(Session::Reserved(db))
    }

    fn with_session(session: Session<'a>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(TxnState::default())),
        }
    }

    fn db(&self) -> &dyn DbExecutor {
        match &self.session {
            Session::Shared(db) => *db,
            Session::Reserved(db) => db.as_ref(),
        }
    }

    /// Current nesting depth. Zero means no transaction is open.
    pub async fn depth(&self) -> u32 {
        self.state.lock().await.depth
    }

    /// Returns `true` while a transaction is open.
    pub async fn in_transaction(&self) -> bool {
        self.depth().await > 0
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &dyn DbExecutor {
        self.db()
    }

    /// Opens a transaction, or a savepoint when one is already open.
    pub async fn begin(&self) -> MiniformResult<()> {
        let mut state = self.state.lock().await;
        if state.depth == 0 {
            self.db().execute_sql("BEGIN", &[]).await?;
        } else {
            let name = format!("sp_{}", SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed));
            self.db().execute_sql(&format!("SAVEPOINT {name}"), &[]).await?;
            state.savepoints.push(name);
        }
        state.depth += 1;
        tracing::trace!(depth = state.depth, "transaction begin");
        Ok(())
    }

    /// Commits the outermost transaction or releases the innermost savepoint.
    pub async fn commit(&self) -> MiniformResult<()> {
        let mut state = self.state.lock().await;
        match state.depth {
            0 => {
                return Err(MiniformError::DatabaseError(
                    "Cannot commit: not in a transaction".to_string(),
                ))
            }
            1 => {
                if let Err(e) = self.db().execute_sql("COMMIT", &[]).await {
                    // A failed COMMIT can leave the transaction open.
                    state.depth = 0;
                    state.on_commit.clear();
                    let callbacks = std::mem::take(&mut state.on_rollback);
                    drop(state);
                    if let Err(rollback_err) = self.db().execute_sql("ROLLBACK", &[]).await {
                        tracing::warn!(error = %rollback_err, "rollback after failed commit failed");
                    }
                    for callback in callbacks {
                        callback();
                    }
                    return Err(e);
                }
                state.depth = 0;
                state.on_rollback.clear();
                let callbacks = std::mem::take(&mut state.on_commit);
                drop(state);
                for callback in callbacks {
                    callback();
                }
            }
            _ => {
                if let Some(name) = state.savepoints.pop() {
                    self.db()
                        .execute_sql(&format!("RELEASE SAVEPOINT {name}"), &[])
                        .await?;
                }
                state.depth -= 1;
            }
        }
        Ok(())
    }

    /// Rolls back the outermost transaction or the innermost savepoint.
    pub async fn rollback(&self) -> MiniformResult<()> {
        let mut state = self.state.lock().await;
        match state.depth {
            0 => {
                return Err(MiniformError::DatabaseError(
                    "Cannot rollback: not in a transaction".to_string(),
                ))
            }
            1 => {
                state.depth = 0;
                state.on_commit.clear();
                let callbacks = std::mem::take(&mut state.on_rollback);
                drop(state);
                let result = self.db().execute_sql("ROLLBACK", &[]).await;
                for callback in callbacks {
                    callback();
                }
                result?;
            }
            _ => {
                if let Some(name) = state.savepoints.pop() {
                    self.db()
                        .execute_sql(&format!("ROLLBACK TO SAVEPOINT {name}"), &[])
                        .await?;
                }
                state.depth -= 1;
            }
        }
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    /// Queues `callback` for after the outermost commit.
    ///
    /// Runs immediately when no transaction is open. Discarded on rollback.
    pub async fn on_commit<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock().await;
        if state.depth == 0 {
            drop(state);
            callback();
        } else {
            state.on_commit.push(Box::new(callback));
        }
    }

    /// Queues `callback` for after the outermost rollback.
    ///
    /// Dropped without running when no transaction is open or on commit.
    pub async fn on_rollback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock().await;
        if state.depth > 0 {
            state.on_rollback.push(Box::new(callback));
        }
    }

    /// Number of queued commit callbacks.
    pub async fn pending_callbacks(&self) -> usize {
        self.state.lock().await.on_commit.len()
    }
}

#[async_trait::async_trait]
impl DbExecutor for TransactionManager<'_> {
    fn backend_type(&self) -> DatabaseBackendType {
        self.db().backend_type()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> MiniformResult<u64> {
        self.db().execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> MiniformResult<Vec<Row>> {
        self.db().query(sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> MiniformResult<Row> {
        self.db().query_one(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> MiniformResult<Value> {
        self.db().insert_returning_id(sql, params).await
    }
}

/// Runs `f` inside a transaction.
///
/// `Ok` commits and `Err` rolls back. The closure's error is returned even
/// when the rollback itself fails. A failed commit rolls back too and
/// returns the commit error.
pub async fn atomic<'a, F, Fut, T>(db: &'a dyn DbExecutor, f: F) -> MiniformResult<T>
where
    F: FnOnce(Arc<TransactionManager<'a>>) -> Fut,
    Fut: std::future::Future<Output = MiniformResult<T>>,
{
    let txn = match db.reserve().await? {
        Some(reserved) => TransactionManager::reserved(reserved),
        None => TransactionManager::new(db),
    };
    let txn = Arc::new(txn);
    txn.begin().await?;

    match f(Arc::clone(&txn)).await {
        Ok(result) => {
            txn.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}
