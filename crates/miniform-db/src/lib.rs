//! # miniform-db
//!
//! Persistence layer for miniform. Provides the [`Model`](model::Model) trait
//! and [`ModelMeta`](model::ModelMeta) column descriptions that forms inspect,
//! a small SQL [`Query`](query::Query) AST with its
//! [`SqlCompiler`](query::SqlCompiler), the async
//! [`DbExecutor`](executor::DbExecutor) session interface, and
//! [`TransactionManager`](transactions::TransactionManager).
//!
//! ## Module Overview
//!
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`fields`] - Column definitions ([`FieldDef`](fields::FieldDef)) and upload settings
//! - [`model`] - The [`Model`](model::Model) trait and [`ModelMeta`](model::ModelMeta)
//! - [`registry`] - Table-name lookup used to resolve foreign keys
//! - [`query`] - Query AST, lookups, and compilation
//! - [`executor`] - The executor trait and row helpers
//! - [`transactions`] - Transactions, savepoints, and commit callbacks

// These clippy lints are intentionally allowed for the persistence crate:
// - struct_excessive_bools: FieldDef carries several column flags
// - result_large_err: MiniformError is the workspace error type and is used consistently
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - return_self_not_must_use: builder pattern methods are self-documenting
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
// significant_drop_tightening: false positives with async Mutex guards
#![allow(clippy::significant_drop_tightening)]

pub mod executor;
pub mod fields;
pub mod model;
pub mod query;
pub mod registry;
pub mod transactions;
pub mod value;

pub use executor::DbExecutor;
pub use fields::{FieldDef, FieldType, FileConfig, OnDelete};
pub use model::{Model, ModelMeta};
pub use query::{DatabaseBackendType, Lookup, Query, Row, SqlCompiler, WhereNode};
pub use registry::{model_meta_for_table, register_meta, register_model};
pub use transactions::{atomic, TransactionManager};
pub use value::Value;
