//! # miniform
//!
//! Model-driven HTML forms for Rust.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `miniform` to get everything, or on the individual crates for
//! finer-grained control.

/// Settings, errors, and logging.
pub use miniform_core as core;

/// Values, column definitions, queries, and transactions.
#[cfg(feature = "db")]
pub use miniform_db as db;

/// Database session drivers.
pub use miniform_db_backends as db_backends;

/// Submitted form data, multipart uploads, and the axum extractor.
#[cfg(feature = "http")]
pub use miniform_http as http;

/// Widgets, forms, model forms, and form sets.
#[cfg(feature = "forms")]
pub use miniform_forms as forms;

// Third-party re-exports
pub use async_trait;
pub use axum;
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;

/// The most commonly used items in one import.
pub mod prelude {
    pub use miniform_core::logging::setup_logging;
    pub use miniform_core::{MiniformError, MiniformResult, Settings, ValidationError, SETTINGS};
    pub use miniform_db_backends::connect;

    #[cfg(feature = "db")]
    pub use miniform_db::{FieldDef, FieldType, FileConfig, Model, ModelMeta, Value};

    #[cfg(feature = "http")]
    pub use miniform_http::{FormData, UploadedFile};

    #[cfg(feature = "forms")]
    pub use miniform_forms::{
        BaseForm, FieldUpdate, FileStorage, Form, FormSet, ModelForm, ModelFormConfig, Widget,
        WidgetCore, WidgetKind,
    };
}
