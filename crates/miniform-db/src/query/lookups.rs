//! Field-level lookups used in WHERE clauses.
//!
//! # Examples
//!
//! ```
//! use miniform_db::query::lookups::Lookup;
//! use miniform_db::value::Value;
//!
//! let by_email = Lookup::IExact(Value::from("Ann@Example.com"));
//! let adults = Lookup::Gte(Value::from(18));
//! assert_ne!(by_email, adults);
//! ```

use crate::value::Value;

/// A field-level lookup operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Exact match (`field = value`, or `IS NULL` for NULL).
    Exact(Value),
    /// Case-insensitive exact match (`LOWER(field) = LOWER(value)`).
    IExact(Value),
    /// Membership test (`field IN (values...)`).
    In(Vec<Value>),
    /// Greater than (`field > value`).
    Gt(Value),
    /// Greater than or equal (`field >= value`).
    Gte(Value),
    /// Less than (`field < value`).
    Lt(Value),
    /// Less than or equal (`field <= value`).
    Lte(Value),
    /// NULL test (`field IS NULL` or `field IS NOT NULL`).
    IsNull(bool),
}
