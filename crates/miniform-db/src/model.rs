//! Model trait and metadata.
//!
//! The [`Model`] trait is implemented by every struct that maps onto a table.
//! It exposes the column metadata that forms are derived from, the current
//! column values, and construction from database rows.

use miniform_core::MiniformResult;

use crate::fields::FieldDef;
use crate::value::Value;

pub use crate::query::compiler::Row;

/// The core trait for all models.
///
/// # Examples
///
/// ```
/// use std::sync::LazyLock;
///
/// use miniform_core::MiniformResult;
/// use miniform_db::fields::{FieldDef, FieldType};
/// use miniform_db::model::{Model, ModelMeta, Row};
/// use miniform_db::value::Value;
///
/// struct Article {
///     id: Option<i64>,
///     title: String,
/// }
///
/// impl Model for Article {
///     fn meta() -> &'static ModelMeta {
///         static META: LazyLock<ModelMeta> = LazyLock::new(|| {
///             ModelMeta::new("Article", "articles", vec![
///                 FieldDef::new("id", FieldType::AutoField).primary_key(),
///                 FieldDef::new("title", FieldType::CharField).max_length(200),
///             ])
///         });
///         &META
///     }
///
///     fn pk(&self) -> Option<Value> { self.id.map(Value::Int) }
///     fn set_pk(&mut self, value: Value) { self.id = value.as_i64(); }
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", self.id.into()), ("title", self.title.as_str().into())]
///     }
///     fn from_row(row: &Row) -> MiniformResult<Self> {
///         Ok(Self { id: row.get("id")?, title: row.get("title")? })
///     }
/// }
///
/// assert_eq!(Article::table_name(), "articles");
/// assert_eq!(Article::pk_field_name(), "id");
/// ```
pub trait Model: Send + Sync + Sized + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta;

    /// Returns the database table name.
    fn table_name() -> &'static str {
        Self::meta().db_table.as_str()
    }

    /// Returns the primary key column name.
    fn pk_field_name() -> &'static str {
        Self::meta().pk_field().map_or("id", |f| f.column.as_str())
    }

    /// Returns the primary key, or `None` for an unsaved instance.
    fn pk(&self) -> Option<Value>;

    /// Sets the primary key after an insert.
    fn set_pk(&mut self, value: Value);

    /// Returns every column value as `(field name, value)` pairs.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Returns the column values without the primary key.
    fn non_pk_field_values(&self) -> Vec<(&'static str, Value)> {
        let pk_name = Self::meta().pk_field().map(|f| f.name);
        self.field_values()
            .into_iter()
            .filter(|(name, _)| Some(*name) != pk_name)
            .collect()
    }

    /// Constructs an instance from a database row.
    fn from_row(row: &Row) -> MiniformResult<Self>;
}

/// Table-level metadata: the model name, table, and ordered columns.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// The model's type name, used in messages.
    pub model_name: &'static str,
    /// The database table name.
    pub db_table: String,
    /// Column definitions in declaration order.
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    /// Creates metadata for `model_name` stored in `db_table`.
    pub fn new(model_name: &'static str, db_table: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            model_name,
            db_table: db_table.into(),
            fields,
        }
    }

    /// Looks up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the primary key field.
    pub fn pk_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Returns the primary key column name, defaulting to `id`.
    pub fn pk_column(&self) -> &str {
        self.pk_field().map_or("id", |f| f.column.as_str())
    }

    /// Builds a `CREATE TABLE IF NOT EXISTS` statement for `SQLite`.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self.fields.iter().map(FieldDef::sqlite_column_sql).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            self.db_table,
            columns.join(", ")
        )
    }
}
