//! Query building and SQL compilation.
//!
//! - [`lookups`] - Field-level comparison operators
//! - [`compiler`] - The [`Query`] AST, [`Row`] results, and [`SqlCompiler`]

pub mod compiler;
pub mod lookups;

pub use compiler::{DatabaseBackendType, FromValue, OrderBy, Query, Row, SqlCompiler, WhereNode};
pub use lookups::Lookup;
