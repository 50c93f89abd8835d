//! Global table-name registry.
//!
//! Foreign key columns name their target by table. Forms resolve that name to
//! the target model's metadata through this registry when they load select
//! options.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use miniform_core::{MiniformError, MiniformResult};

use crate::model::{Model, ModelMeta};

fn global_registry() -> &'static RwLock<HashMap<String, &'static ModelMeta>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, &'static ModelMeta>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a model so its table can be resolved by name.
pub fn register_model<M: Model>() {
    register_meta(M::meta());
}

/// Registers table metadata directly.
pub fn register_meta(meta: &'static ModelMeta) {
    let mut registry = global_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    registry.insert(meta.db_table.clone(), meta);
}

/// Returns the metadata registered for `table`.
pub fn model_meta_for_table(table: &str) -> MiniformResult<&'static ModelMeta> {
    let registry = global_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    registry.get(table).copied().ok_or_else(|| {
        MiniformError::ImproperlyConfigured(format!(
            "The class with table name \"{table}\" not found."
        ))
    })
}
