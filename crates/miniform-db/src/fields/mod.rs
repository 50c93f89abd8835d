//! Column definitions for models.
//!
//! This module provides the [`FieldDef`] struct and [`FieldType`] enum that
//! describe model columns, plus the upload configuration carried by file and
//! image columns.

pub mod files;
pub mod types;

pub use files::{expand_extensions, FileConfig, EXTENSION_GROUPS};
pub use types::{EnumChoices, FieldDef, FieldType, OnDelete};
