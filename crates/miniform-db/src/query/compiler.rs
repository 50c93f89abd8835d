//! SQL query AST and compiler.
//!
//! This module defines the [`Query`] AST used to read rows, the [`Row`] type
//! rows come back as, and the [`SqlCompiler`] that translates queries and
//! writes into parameterized SQL with `SQLite` `?` placeholders.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use miniform_core::MiniformError;

use super::lookups::Lookup;
use crate::value::Value;

/// The type of database backend, used by the compiler to generate
/// backend-specific SQL syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackendType {
    /// SQLite (uses `?` placeholders).
    SQLite,
}

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A node in a WHERE clause tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// A single column comparison.
    Condition {
        /// The column name.
        column: String,
        /// The comparison to apply.
        lookup: Lookup,
    },
    /// All children must hold.
    And(Vec<WhereNode>),
    /// Any child must hold.
    Or(Vec<WhereNode>),
    /// The child must not hold.
    Not(Box<WhereNode>),
}

impl WhereNode {
    /// Shorthand for `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Condition {
            column: column.into(),
            lookup: Lookup::Exact(value.into()),
        }
    }

    /// Negates this node.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// A SELECT query against a single table.
#[derive(Debug, Clone)]
pub struct Query {
    /// The table to read from.
    pub table: String,
    /// Selected columns; empty selects `*`.
    pub columns: Vec<String>,
    /// Optional filter.
    pub where_clause: Option<WhereNode>,
    /// Ordering, applied in sequence.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a `SELECT *` query for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Restricts the selected columns.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the WHERE clause.
    #[must_use]
    pub fn filter(mut self, node: WhereNode) -> Self {
        self.where_clause = Some(node);
        self
    }

    /// Appends an ordering.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A single result row from a database query.
///
/// `Row` holds a list of column names and their corresponding values. It
/// provides typed access via the [`get`](Row::get) method.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, MiniformError> {
        let value = self.get_value(column).ok_or_else(|| {
            MiniformError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw Value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
///
/// `SQLite` has no native boolean or temporal types, so booleans are also
/// read from integers and dates/times are also parsed from text.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> Result<Self, MiniformError>;
}

fn type_error(expected: &str, value: &Value) -> MiniformError {
    MiniformError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(type_error("Int", value)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::Int(i) => i32::try_from(*i).map_err(|e| {
                MiniformError::DatabaseError(format!("Int value out of i32 range: {e}"))
            }),
            _ => Err(type_error("Int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        value.as_f64().ok_or_else(|| type_error("Float", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        value.as_bool().ok_or_else(|| type_error("Bool", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(type_error("String", value)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::String(s) => {
                Self::parse_from_str(s, "%Y-%m-%d").map_err(|_| type_error("Date", value))
            }
            _ => Err(type_error("Date", value)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::String(s) => Self::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| Self::parse_from_str(s, "%H:%M"))
                .map_err(|_| type_error("Time", value)),
            _ => Err(type_error("Time", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => Self::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| Self::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|_| type_error("DateTime", value)),
            _ => Err(type_error("DateTime", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, MiniformError> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

/// The SQL compiler translates queries and writes into parameterized SQL.
pub struct SqlCompiler {
    backend: DatabaseBackendType,
}

impl SqlCompiler {
    /// Creates a new compiler for the given backend type.
    pub const fn new(backend: DatabaseBackendType) -> Self {
        Self { backend }
    }

    /// Returns the parameter placeholder for this backend.
    const fn placeholder(&self) -> &'static str {
        match self.backend {
            DatabaseBackendType::SQLite => "?",
        }
    }

    /// Compiles a SELECT query into SQL and parameters.
    pub fn compile_select(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params: Vec<Value> = Vec::new();
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            query
                .columns
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM \"{}\"", query.table);

        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params);
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { "DESC" } else { "ASC" };
                    format!("\"{}\" {dir}", o.column)
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        (sql, params)
    }

    /// Compiles a `SELECT 1 ... LIMIT 1` existence check.
    pub fn compile_exists(&self, table: &str, where_clause: &WhereNode) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT 1 FROM \"{table}\" WHERE ");
        self.compile_where_node(where_clause, &mut sql, &mut params);
        sql.push_str(" LIMIT 1");
        (sql, params)
    }

    /// Compiles an INSERT statement.
    pub fn compile_insert(&self, table: &str, fields: &[(&str, Value)]) -> (String, Vec<Value>) {
        if fields.is_empty() {
            return (format!("INSERT INTO \"{table}\" DEFAULT VALUES"), Vec::new());
        }
        let columns: Vec<String> = fields.iter().map(|(name, _)| format!("\"{name}\"")).collect();
        let placeholders = vec![self.placeholder(); fields.len()];
        let params = fields.iter().map(|(_, val)| val.clone()).collect();

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, params)
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(
        &self,
        table: &str,
        fields: &[(&str, Value)],
        where_clause: &WhereNode,
    ) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_parts: Vec<String> = fields
            .iter()
            .map(|(name, val)| {
                params.push(val.clone());
                format!("\"{name}\" = {}", self.placeholder())
            })
            .collect();

        let mut sql = format!("UPDATE \"{}\" SET {} WHERE ", table, set_parts.join(", "));
        self.compile_where_node(where_clause, &mut sql, &mut params);

        (sql, params)
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(&self, table: &str, where_clause: &WhereNode) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM \"{table}\" WHERE ");
        self.compile_where_node(where_clause, &mut sql, &mut params);
        (sql, params)
    }

    /// Compiles a `WhereNode` into SQL, appending to the provided string.
    fn compile_where_node(&self, node: &WhereNode, sql: &mut String, params: &mut Vec<Value>) {
        match node {
            WhereNode::Condition { column, lookup } => {
                self.compile_lookup(column, lookup, sql, params);
            }
            WhereNode::And(children) => {
                self.compile_children(children, " AND ", "1=1", sql, params);
            }
            WhereNode::Or(children) => {
                self.compile_children(children, " OR ", "1=0", sql, params);
            }
            WhereNode::Not(inner) => {
                sql.push_str("NOT (");
                self.compile_where_node(inner, sql, params);
                sql.push(')');
            }
        }
    }

    fn compile_children(
        &self,
        children: &[WhereNode],
        joiner: &str,
        empty: &str,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        if children.is_empty() {
            sql.push_str(empty);
            return;
        }
        sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                sql.push_str(joiner);
            }
            self.compile_where_node(child, sql, params);
        }
        sql.push(')');
    }

    /// Compiles a single lookup into SQL.
    fn compile_lookup(&self, column: &str, lookup: &Lookup, sql: &mut String, params: &mut Vec<Value>) {
        let bind = |params: &mut Vec<Value>, val: &Value| {
            params.push(val.clone());
            self.placeholder()
        };
        match lookup {
            Lookup::Exact(val) if val.is_null() => {
                sql.push_str(&format!("\"{column}\" IS NULL"));
            }
            Lookup::Exact(val) => {
                let ph = bind(params, val);
                sql.push_str(&format!("\"{column}\" = {ph}"));
            }
            Lookup::IExact(val) => {
                let ph = bind(params, val);
                sql.push_str(&format!("LOWER(\"{column}\") = LOWER({ph})"));
            }
            Lookup::In(vals) if vals.is_empty() => sql.push_str("1=0"),
            Lookup::In(vals) => {
                let placeholders: Vec<&str> = vals.iter().map(|v| bind(params, v)).collect();
                sql.push_str(&format!("\"{column}\" IN ({})", placeholders.join(", ")));
            }
            Lookup::Gt(val) => {
                let ph = bind(params, val);
                sql.push_str(&format!("\"{column}\" > {ph}"));
            }
            Lookup::Gte(val) => {
                let ph = bind(params, val);
                sql.push_str(&format!("\"{column}\" >= {ph}"));
            }
            Lookup::Lt(val) => {
                let ph = bind(params, val);
                sql.push_str(&format!("\"{column}\" < {ph}"));
            }
            Lookup::Lte(val) => {
                let ph = bind(params, val);
                sql.push_str(&format!("\"{column}\" <= {ph}"));
            }
            Lookup::IsNull(true) => sql.push_str(&format!("\"{column}\" IS NULL")),
            Lookup::IsNull(false) => sql.push_str(&format!("\"{column}\" IS NOT NULL")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite() -> SqlCompiler {
        SqlCompiler::new(DatabaseBackendType::SQLite)
    }

    // ── SELECT ──────────────────────────────────────────────────────

    #[test]
    fn test_select_all() {
        let (sql, params) = sqlite().compile_select(&Query::new("users"));
        assert_eq!(sql, "SELECT * FROM \"users\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_columns_order_limit() {
        let query = Query::new("authors")
            .columns(["id", "name"])
            .order_by(OrderBy::asc("id"))
            .limit(10);
        let (sql, _) = sqlite().compile_select(&query);
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"authors\" ORDER BY \"id\" ASC LIMIT 10"
        );
    }

    #[test]
    fn test_select_where_placeholders() {
        let query = Query::new("users").filter(WhereNode::And(vec![
            WhereNode::eq("email", "a@b.c"),
            WhereNode::eq("id", 5).negate(),
        ]));
        let (sql, params) = sqlite().compile_select(&query);
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE (\"email\" = ? AND NOT (\"id\" = ?))"
        );
        assert_eq!(params, vec![Value::from("a@b.c"), Value::Int(5)]);
    }

    #[test]
    fn test_exact_null_is_null() {
        let query = Query::new("t").filter(WhereNode::Condition {
            column: "deleted".into(),
            lookup: Lookup::Exact(Value::Null),
        });
        let (sql, params) = sqlite().compile_select(&query);
        assert_eq!(sql, "SELECT * FROM \"t\" WHERE \"deleted\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_and_ranges() {
        let node = WhereNode::Or(vec![
            WhereNode::Condition {
                column: "id".into(),
                lookup: Lookup::In(vec![Value::Int(1), Value::Int(2)]),
            },
            WhereNode::Condition {
                column: "age".into(),
                lookup: Lookup::Gte(Value::Int(18)),
            },
            WhereNode::Condition {
                column: "nick".into(),
                lookup: Lookup::IExact(Value::from("Bob")),
            },
        ]);
        let (sql, params) = sqlite().compile_select(&Query::new("p").filter(node));
        assert_eq!(
            sql,
            "SELECT * FROM \"p\" WHERE (\"id\" IN (?, ?) OR \"age\" >= ? OR LOWER(\"nick\") = LOWER(?))"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let node = WhereNode::Condition {
            column: "id".into(),
            lookup: Lookup::In(vec![]),
        };
        let (sql, _) = sqlite().compile_select(&Query::new("p").filter(node));
        assert_eq!(sql, "SELECT * FROM \"p\" WHERE 1=0");
    }

    #[test]
    fn test_exists() {
        let (sql, params) = sqlite().compile_exists("users", &WhereNode::eq("email", "x"));
        assert_eq!(sql, "SELECT 1 FROM \"users\" WHERE \"email\" = ? LIMIT 1");
        assert_eq!(params.len(), 1);
    }

    // ── Writes ──────────────────────────────────────────────────────

    #[test]
    fn test_insert() {
        let (sql, params) = sqlite().compile_insert(
            "users",
            &[("name", Value::from("Ann")), ("age", Value::Int(30))],
        );
        assert_eq!(sql, "INSERT INTO \"users\" (\"name\", \"age\") VALUES (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_insert_default_values() {
        let (sql, params) = sqlite().compile_insert("users", &[]);
        assert_eq!(sql, "INSERT INTO \"users\" DEFAULT VALUES");
        assert!(params.is_empty());
    }

    #[test]
    fn test_update_params_continue_into_where() {
        let (sql, params) = sqlite().compile_update(
            "users",
            &[("name", Value::from("Bo"))],
            &WhereNode::eq("id", 4),
        );
        assert_eq!(sql, "UPDATE \"users\" SET \"name\" = ? WHERE \"id\" = ?");
        assert_eq!(params, vec![Value::from("Bo"), Value::Int(4)]);
    }

    #[test]
    fn test_delete() {
        let (sql, _) = sqlite().compile_delete("users", &WhereNode::eq("id", 1));
        assert_eq!(sql, "DELETE FROM \"users\" WHERE \"id\" = ?");
    }

    // ── Row ─────────────────────────────────────────────────────────

    #[test]
    fn test_row_typed_access() {
        let row = Row::new(
            vec!["id".into(), "active".into(), "born".into(), "note".into()],
            vec![
                Value::Int(7),
                Value::Int(1),
                Value::from("1990-05-17"),
                Value::Null,
            ],
        );
        assert_eq!(row.get::<i64>("id").unwrap(), 7);
        assert!(row.get::<bool>("active").unwrap());
        assert_eq!(
            row.get::<NaiveDate>("born").unwrap(),
            NaiveDate::from_ymd_opt(1990, 5, 17).unwrap()
        );
        assert_eq!(row.get::<Option<String>>("note").unwrap(), None);
        assert!(row.get::<String>("missing").is_err());
        assert!(row.get::<String>("id").is_err());
    }

    #[test]
    fn test_row_temporal_text() {
        let row = Row::new(
            vec!["t".into(), "dt".into()],
            vec![Value::from("08:30"), Value::from("2024-02-29T23:59:01")],
        );
        assert_eq!(
            row.get::<NaiveTime>("t").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert_eq!(
            row.get::<NaiveDateTime>("dt").unwrap().to_string(),
            "2024-02-29 23:59:01"
        );
    }

    #[test]
    fn test_row_iter() {
        let row = Row::new(vec!["a".into()], vec![Value::Int(1)]);
        let pairs: Vec<(&str, &Value)> = row.iter().collect();
        assert_eq!(pairs, vec![("a", &Value::Int(1))]);
    }
}
