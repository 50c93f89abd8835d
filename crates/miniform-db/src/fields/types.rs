//! Field type definitions and the [`FieldDef`] struct.
//!
//! [`FieldType`] enumerates the column types forms understand. [`FieldDef`]
//! captures the complete definition of a column including nullability,
//! uniqueness, and defaults.

use crate::fields::files::FileConfig;
use crate::value::Value;

/// Enumerates the column types a model can declare.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Auto-incrementing integer primary key.
    AutoField,
    /// Integer.
    IntegerField,
    /// Floating-point number.
    FloatField,
    /// Fixed-precision decimal, stored as a float.
    DecimalField {
        /// Total number of digits.
        max_digits: u32,
        /// Number of digits after the decimal point.
        decimal_places: u32,
    },
    /// Short string (`VARCHAR`).
    CharField,
    /// Unlimited text.
    TextField,
    /// Email address string.
    EmailField,
    /// Boolean (true/false).
    BooleanField,
    /// Date without time.
    DateField,
    /// Time without date.
    TimeField,
    /// Date and time.
    DateTimeField,
    /// One of a fixed set of choices, stored by name.
    EnumField {
        /// `(name, label)` pairs in declaration order.
        choices: Vec<(String, String)>,
    },
    /// Many-to-one relationship to another table.
    ForeignKey {
        /// The referenced table name.
        to: String,
        /// Behavior when the referenced row is deleted.
        on_delete: OnDelete,
    },
    /// Uploaded file, stored as a relative path.
    FileField(FileConfig),
    /// Uploaded image, stored as a relative path.
    ImageField(FileConfig),
    /// Password, stored as a bcrypt hash.
    PasswordField {
        /// Minimum raw password length.
        min_length: usize,
        /// Maximum raw password length.
        max_length: usize,
    },
}

/// Behavior when a referenced row is deleted (ON DELETE action).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete all related rows (CASCADE).
    Cascade,
    /// Prevent deletion if related rows exist (RESTRICT).
    Protect,
    /// Set the foreign key to NULL.
    SetNull,
    /// Take no action (may cause integrity errors).
    DoNothing,
}

/// A Rust enum that can back an [`FieldType::EnumField`] column.
///
/// # Examples
///
/// ```
/// use miniform_db::fields::{EnumChoices, FieldType};
///
/// enum Status { Draft, Published }
///
/// impl EnumChoices for Status {
///     fn choices() -> Vec<(String, String)> {
///         vec![
///             ("Draft".into(), "draft".into()),
///             ("Published".into(), "published".into()),
///         ]
///     }
/// }
///
/// let field_type = FieldType::enumeration::<Status>();
/// assert!(matches!(field_type, FieldType::EnumField { .. }));
/// ```
pub trait EnumChoices {
    /// Returns `(name, label)` pairs in declaration order.
    fn choices() -> Vec<(String, String)>;
}

impl FieldType {
    /// Builds an enum column type from an [`EnumChoices`] implementor.
    pub fn enumeration<E: EnumChoices>() -> Self {
        Self::EnumField {
            choices: E::choices(),
        }
    }

    /// Builds a foreign key to `table` that cascades on delete.
    pub fn foreign_key(table: impl Into<String>) -> Self {
        Self::ForeignKey {
            to: table.into(),
            on_delete: OnDelete::Cascade,
        }
    }

    /// Builds a password column with the default length limits (0..=256).
    pub const fn password() -> Self {
        Self::PasswordField {
            min_length: 0,
            max_length: 256,
        }
    }

    /// Returns the upload configuration of file and image columns.
    pub const fn file_config(&self) -> Option<&FileConfig> {
        match self {
            Self::FileField(config) | Self::ImageField(config) => Some(config),
            _ => None,
        }
    }

    /// Returns the SQL column type used when creating `SQLite` tables.
    pub fn sqlite_column_type(&self) -> &'static str {
        match self {
            Self::AutoField | Self::IntegerField | Self::BooleanField => "INTEGER",
            Self::ForeignKey { .. } => "INTEGER",
            Self::FloatField | Self::DecimalField { .. } => "REAL",
            Self::CharField
            | Self::EmailField
            | Self::EnumField { .. }
            | Self::FileField(_)
            | Self::ImageField(_)
            | Self::PasswordField { .. } => "VARCHAR",
            Self::TextField => "TEXT",
            Self::DateField => "DATE",
            Self::TimeField => "TIME",
            Self::DateTimeField => "DATETIME",
        }
    }

    /// Validates a raw password against this column's length limits.
    ///
    /// Returns `None` for non-password columns or when the length is
    /// acceptable.
    pub fn password_error(&self, raw: &str) -> Option<String> {
        let Self::PasswordField {
            min_length,
            max_length,
        } = self
        else {
            return None;
        };
        let len = raw.chars().count();
        if len > *max_length {
            return Some(format!("Maximum password length {max_length} characters"));
        }
        if len < *min_length {
            return Some(format!("Minimum password length {min_length} characters"));
        }
        None
    }
}

/// Complete definition of a model column, including metadata and constraints.
///
/// Usually constructed once per model inside a static `ModelMeta`.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The attribute name of this field (also the form field name).
    pub name: &'static str,
    /// The database column name (may differ from `name`).
    pub column: String,
    /// The type of this field.
    pub field_type: FieldType,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether NULL is allowed in the database.
    pub null: bool,
    /// Whether a UNIQUE constraint is applied.
    pub unique: bool,
    /// Maximum character length (for `CharField` and similar).
    pub max_length: Option<usize>,
    /// Default value for new instances.
    pub default: Option<Value>,
    /// Default applied by the database itself, as SQL text.
    pub server_default: Option<String>,
}

impl FieldDef {
    /// Creates a new `FieldDef` with sensible defaults.
    ///
    /// Only the field name and type are required. Columns are non-null and
    /// non-unique until told otherwise.
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column: name.to_string(),
            field_type,
            primary_key: false,
            null: false,
            unique: false,
            max_length: None,
            default: None,
            server_default: None,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Sets the maximum character length.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Marks this field as having a UNIQUE constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value for this field.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a database-side default, given as SQL text.
    #[must_use]
    pub fn server_default(mut self, sql: impl Into<String>) -> Self {
        self.server_default = Some(sql.into());
        self
    }

    /// Returns `true` if this field references another table.
    pub const fn is_relation(&self) -> bool {
        matches!(self.field_type, FieldType::ForeignKey { .. })
    }

    /// Returns the value a new row starts with: the default, else the server
    /// default as a string, else NULL.
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        self.server_default
            .as_deref()
            .map_or(Value::Null, |sql| Value::String(sql.trim_matches('\'').to_string()))
    }

    /// Renders the column clause of a `CREATE TABLE` statement for `SQLite`.
    pub fn sqlite_column_sql(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.column, self.field_type.sqlite_column_type());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if matches!(self.field_type, FieldType::AutoField) {
                sql.push_str(" AUTOINCREMENT");
            }
        } else if !self.null {
            sql.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.server_default {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        if let FieldType::ForeignKey { to, on_delete } = &self.field_type {
            let action = match on_delete {
                OnDelete::Cascade => "CASCADE",
                OnDelete::Protect => "RESTRICT",
                OnDelete::SetNull => "SET NULL",
                OnDelete::DoNothing => "NO ACTION",
            };
            sql.push_str(&format!(" REFERENCES \"{to}\" ON DELETE {action}"));
        }
        sql
    }
}
