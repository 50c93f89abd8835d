//! Database executor trait and row-level CRUD helpers.
//!
//! [`DbExecutor`] is the minimal async interface forms need from a database
//! session. It lives here so forms can be written against it without
//! depending on a concrete backend; `miniform-db-backends` implements it.
//!
//! The free functions below compile and run the handful of statements forms
//! issue: primary-key lookups, option lists, uniqueness checks, inserts,
//! updates, and deletes.

use miniform_core::{MiniformError, MiniformResult};

use crate::model::Model;
use crate::query::compiler::{DatabaseBackendType, Query, Row, SqlCompiler, WhereNode};
use crate::value::Value;

/// Minimal async database executor trait.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend type for SQL compilation.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> MiniformResult<u64>;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> MiniformResult<Vec<Row>>;

    /// Runs a SQL query and returns exactly one row.
    /// Returns `DoesNotExist` if no rows, `MultipleObjectsReturned` if more than one.
    async fn query_one(&self, sql: &str, params: &[Value]) -> MiniformResult<Row> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(MiniformError::DoesNotExist(
                "Query returned no rows".to_string(),
            )),
            1 => Ok(rows.remove(0)),
            n => Err(MiniformError::MultipleObjectsReturned(format!(
                "Query returned {n} rows"
            ))),
        }
    }

    /// Reserves the session for one transaction.
    ///
    /// Statements sent through the returned executor run on the reserved
    /// connection, and every other caller of `self` waits until it is
    /// dropped. `None` means the session has nothing to reserve and
    /// transactions run on `self` directly.
    async fn reserve(&self) -> MiniformResult<Option<Box<dyn DbExecutor>>> {
        Ok(None)
    }

    /// Executes an INSERT and returns the new row's primary key.
    ///
    /// The default implementation asks `SQLite` for `last_insert_rowid()`;
    /// backends should override it when they can do better.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> MiniformResult<Value> {
        self.execute_sql(sql, params).await?;
        let rows = self.query("SELECT last_insert_rowid() AS id", &[]).await?;
        match rows.into_iter().next() {
            Some(row) => row.get::<Value>("id"),
            None => Err(MiniformError::DatabaseError(
                "Failed to retrieve last inserted ID".to_string(),
            )),
        }
    }
}

// ── Row helpers ────────────────────────────────────────────────────────

/// Fetches the row whose primary key equals `pk`, if any.
pub async fn fetch_by_pk(
    db: &dyn DbExecutor,
    table: &str,
    pk_column: &str,
    pk: &Value,
) -> MiniformResult<Option<Row>> {
    let query = Query::new(table)
        .filter(WhereNode::eq(pk_column, pk.clone()))
        .limit(1);
    Ok(fetch_all(db, &query).await?.into_iter().next())
}

/// Runs a SELECT and returns every row.
pub async fn fetch_all(db: &dyn DbExecutor, query: &Query) -> MiniformResult<Vec<Row>> {
    let (sql, params) = SqlCompiler::new(db.backend_type()).compile_select(query);
    tracing::debug!(sql = %sql, "fetching rows");
    db.query(&sql, &params).await
}

/// Returns `true` if any row of `table` matches `where_clause`.
pub async fn exists(db: &dyn DbExecutor, table: &str, where_clause: &WhereNode) -> MiniformResult<bool> {
    let (sql, params) = SqlCompiler::new(db.backend_type()).compile_exists(table, where_clause);
    Ok(!db.query(&sql, &params).await?.is_empty())
}

/// Inserts a row and returns its primary key.
pub async fn insert_row(
    db: &dyn DbExecutor,
    table: &str,
    fields: &[(&str, Value)],
) -> MiniformResult<Value> {
    let (sql, params) = SqlCompiler::new(db.backend_type()).compile_insert(table, fields);
    tracing::debug!(sql = %sql, "inserting row");
    db.insert_returning_id(&sql, &params).await
}

/// Updates the row whose primary key equals `pk`. Returns the rows affected.
pub async fn update_row(
    db: &dyn DbExecutor,
    table: &str,
    pk_column: &str,
    pk: &Value,
    fields: &[(&str, Value)],
) -> MiniformResult<u64> {
    if fields.is_empty() {
        return Ok(0);
    }
    let (sql, params) = SqlCompiler::new(db.backend_type()).compile_update(
        table,
        fields,
        &WhereNode::eq(pk_column, pk.clone()),
    );
    tracing::debug!(sql = %sql, "updating row");
    db.execute_sql(&sql, &params).await
}

/// Deletes the row whose primary key equals `pk`. Returns the rows affected.
pub async fn delete_row(
    db: &dyn DbExecutor,
    table: &str,
    pk_column: &str,
    pk: &Value,
) -> MiniformResult<u64> {
    let (sql, params) = SqlCompiler::new(db.backend_type())
        .compile_delete(table, &WhereNode::eq(pk_column, pk.clone()));
    db.execute_sql(&sql, &params).await
}

// ── Model helpers ──────────────────────────────────────────────────────

/// Loads a model instance by primary key.
pub async fn get_model<M: Model>(db: &dyn DbExecutor, pk: impl Into<Value>) -> MiniformResult<M> {
    let pk = pk.into();
    let row = fetch_by_pk(db, M::table_name(), M::pk_field_name(), &pk)
        .await?
        .ok_or_else(|| {
            MiniformError::DoesNotExist(format!("{} with pk {pk}", M::meta().model_name))
        })?;
    M::from_row(&row)
}

/// Saves a model instance.
///
/// With a primary key set this UPDATEs every other column; otherwise it
/// INSERTs and stores the generated key on the instance.
pub async fn save_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> MiniformResult<()> {
    let fields = model.non_pk_field_values();
    if let Some(pk) = model.pk() {
        update_row(db, M::table_name(), M::pk_field_name(), &pk, &fields).await?;
    } else {
        let pk = insert_row(db, M::table_name(), &fields).await?;
        model.set_pk(pk);
    }
    Ok(())
}

/// Deletes a model instance. Returns the rows affected.
pub async fn delete_model<M: Model>(model: &M, db: &dyn DbExecutor) -> MiniformResult<u64> {
    let pk = model.pk().ok_or_else(|| {
        MiniformError::DatabaseError("Cannot delete a model without a primary key".to_string())
    })?;
    delete_row(db, M::table_name(), M::pk_field_name(), &pk).await
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use tokio::sync::Mutex;

    use super::*;
    use crate::fields::{FieldDef, FieldType};
    use crate::model::ModelMeta;

    /// Records statements and answers queries from a canned row list.
    struct MockDb {
        statements: Mutex<Vec<(String, Vec<Value>)>>,
        rows: Vec<Row>,
    }

    impl MockDb {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                statements: Mutex::new(Vec::new()),
                rows,
            }
        }

        async fn statements(&self) -> Vec<(String, Vec<Value>)> {
            self.statements.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for MockDb {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn execute_sql(&self, sql: &str, params: &[Value]) -> MiniformResult<u64> {
            self.statements
                .lock()
                .await
                .push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        async fn query(&self, sql: &str, params: &[Value]) -> MiniformResult<Vec<Row>> {
            self.statements
                .lock()
                .await
                .push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }
    }

    struct Note {
        id: Option<i64>,
        body: String,
    }

    impl Model for Note {
        fn meta() -> &'static ModelMeta {
            static META: LazyLock<ModelMeta> = LazyLock::new(|| {
                ModelMeta::new(
                    "Note",
                    "notes",
                    vec![
                        FieldDef::new("id", FieldType::AutoField).primary_key(),
                        FieldDef::new("body", FieldType::TextField),
                    ],
                )
            });
            &META
        }

        fn pk(&self) -> Option<Value> {
            self.id.map(Value::Int)
        }

        fn set_pk(&mut self, value: Value) {
            self.id = value.as_i64();
        }

        fn field_values(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.into()), ("body", self.body.as_str().into())]
        }

        fn from_row(row: &Row) -> MiniformResult<Self> {
            Ok(Self {
                id: row.get("id")?,
                body: row.get("body")?,
            })
        }
    }

    fn note_row(id: i64, body: &str) -> Row {
        Row::new(
            vec!["id".into(), "body".into()],
            vec![Value::Int(id), Value::from(body)],
        )
    }

    fn _assert_object_safe(_: &dyn DbExecutor) {}

    #[tokio::test]
    async fn test_query_one_default() {
        let db = MockDb::new(vec![]);
        let err = db.query_one("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, MiniformError::DoesNotExist(_)));

        let db = MockDb::new(vec![note_row(1, "a"), note_row(2, "b")]);
        let err = db.query_one("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, MiniformError::MultipleObjectsReturned(_)));
    }

    #[tokio::test]
    async fn test_save_model_inserts_without_pk() {
        let db = MockDb::new(vec![Row::new(vec!["id".into()], vec![Value::Int(11)])]);
        let mut note = Note {
            id: None,
            body: "hello".into(),
        };
        save_model(&mut note, &db).await.unwrap();
        assert_eq!(note.id, Some(11));

        let stmts = db.statements().await;
        assert_eq!(stmts[0].0, "INSERT INTO \"notes\" (\"body\") VALUES (?)");
        assert_eq!(stmts[0].1, vec![Value::from("hello")]);
        assert_eq!(stmts[1].0, "SELECT last_insert_rowid() AS id");
    }

    #[tokio::test]
    async fn test_save_model_updates_with_pk() {
        let db = MockDb::new(vec![]);
        let mut note = Note {
            id: Some(3),
            body: "edited".into(),
        };
        save_model(&mut note, &db).await.unwrap();
        let stmts = db.statements().await;
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].0, "UPDATE \"notes\" SET \"body\" = ? WHERE \"id\" = ?");
        assert_eq!(stmts[0].1, vec![Value::from("edited"), Value::Int(3)]);
    }

    #[tokio::test]
    async fn test_get_model() {
        let db = MockDb::new(vec![note_row(5, "found")]);
        let note: Note = get_model(&db, 5).await.unwrap();
        assert_eq!(note.body, "found");

        let empty = MockDb::new(vec![]);
        let err = get_model::<Note>(&empty, 5).await.err().unwrap();
        assert_eq!(err.to_string(), "Object does not exist: Note with pk 5");
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let db = MockDb::new(vec![note_row(1, "x")]);
        assert!(exists(&db, "notes", &WhereNode::eq("body", "x")).await.unwrap());
        let note = Note {
            id: Some(1),
            body: "x".into(),
        };
        assert_eq!(delete_model(&note, &db).await.unwrap(), 1);
        let stmts = db.statements().await;
        assert_eq!(stmts[1].0, "DELETE FROM \"notes\" WHERE \"id\" = ?");
    }

    #[tokio::test]
    async fn test_update_row_without_fields_is_noop() {
        let db = MockDb::new(vec![]);
        let affected = update_row(&db, "notes", "id", &Value::Int(1), &[]).await.unwrap();
        assert_eq!(affected, 0);
        assert!(db.statements().await.is_empty());
    }
}
