//! Forms generated from a table's column definitions.
//!
//! A [`ModelForm`] builds one widget per column of a [`ModelMeta`]. The
//! widget kind is inferred from the column type (see [`infer_kind`]), labels
//! default to column names, `required` follows nullability, and initial
//! values come from the bound object or the column defaults. Foreign keys
//! become selects over the referenced table, loaded through the session.
//!
//! After [`is_valid`](Form::is_valid) succeeds, [`ModelForm::save`] writes
//! the cleaned values in one transaction: an update when the primary key
//! names an existing row, an insert otherwise. Passwords are hashed, uploads
//! are written through [`FileStorage`], and a failed save rolls back and
//! removes the files it wrote.
//!
//! ```ignore
//! let mut form = ModelForm::for_model::<User>()
//!     .config(ModelFormConfig::new().extend_protect(["pin"]))
//!     .session(db.clone())
//!     .build()
//!     .await?;
//! form.bind(&data);
//! if form.is_valid().await {
//!     let pk = form.save().await?;
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use miniform_core::error::{MiniformError, MiniformResult, ValidationError};
use miniform_core::logging::form_span;
use miniform_db::executor::{exists, fetch_by_pk, get_model, insert_row, update_row};
use miniform_db::{DbExecutor, FieldDef, FieldType, Model, ModelMeta, Row, TransactionManager, Value, WhereNode};
use miniform_http::FormData;
use tracing::Instrument;

use crate::form::{clean_fields, model_options, CleanedData, Form, FormErrors};
use crate::hashers::hash_password;
use crate::storage::FileStorage;
use crate::widgets::{FieldValue, Validator, Widget, WidgetCore, WidgetKind};

// ── Field groups ─────────────────────────────────────────────────────

/// A list of field names with per-form adjustments.
///
/// `replace` wins over `base` and `extend`; otherwise the group is `base`
/// followed by `extend`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldGroup {
    base: Vec<String>,
    extend: Vec<String>,
    replace: Option<Vec<String>>,
}

fn names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

impl FieldGroup {
    pub fn new<I, S>(base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: names(base),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn extend<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend.extend(names(extra));
        self
    }

    #[must_use]
    pub fn replace<I, S>(mut self, names_: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace = Some(names(names_));
        self
    }

    /// The effective names.
    pub fn resolve(&self) -> Vec<String> {
        if let Some(replace) = &self.replace {
            return replace.clone();
        }
        let mut out = self.base.clone();
        for name in &self.extend {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve().iter().any(|n| n == name)
    }
}

/// Generates `with_*`, `extend_*` and `replace_*` builders for a group.
macro_rules! group_builders {
    ($($group:ident: $with:ident, $extend:ident, $replace:ident;)*) => {
        $(
            #[doc = concat!("Sets the base `", stringify!($group), "` names.")]
            #[must_use]
            pub fn $with<I, S>(mut self, names: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.$group.base = names.into_iter().map(Into::into).collect();
                self
            }

            #[doc = concat!("Adds names to `", stringify!($group), "`.")]
            #[must_use]
            pub fn $extend<I, S>(mut self, names: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.$group = self.$group.extend(names);
                self
            }

            #[doc = concat!("Replaces `", stringify!($group), "` outright.")]
            #[must_use]
            pub fn $replace<I, S>(mut self, names: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.$group = self.$group.replace(names);
                self
            }
        )*
    };
}

/// How a [`ModelForm`] treats individual columns.
///
/// - `disabled`: rendered disabled, never read from submissions.
/// - `exclude`: no widget at all.
/// - `protect`: rendered as a password input (not for foreign keys or
///   booleans).
/// - `hidden` and `readonly`: the matching widget flags.
#[derive(Debug, Clone, Default)]
pub struct ModelFormConfig {
    pub disabled: FieldGroup,
    pub exclude: FieldGroup,
    pub protect: FieldGroup,
    pub hidden: FieldGroup,
    pub readonly: FieldGroup,
    /// Name prefix for every widget.
    pub prefix: Option<String>,
}

impl ModelFormConfig {
    pub fn new() -> Self {
        Self::default()
    }

    group_builders! {
        disabled: with_disabled, extend_disabled, replace_disabled;
        exclude: with_exclude, extend_exclude, replace_exclude;
        protect: with_protect, extend_protect, replace_protect;
        hidden: with_hidden, extend_hidden, replace_hidden;
        readonly: with_readonly, extend_readonly, replace_readonly;
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

// ── Inference ────────────────────────────────────────────────────────

/// The widget kind for a column.
///
/// Protected columns become password inputs unless they are foreign keys
/// or booleans.
pub const fn infer_kind(field_type: &FieldType, protected: bool) -> WidgetKind {
    let relation = matches!(field_type, FieldType::ForeignKey { .. });
    let boolean = matches!(field_type, FieldType::BooleanField);
    if protected && !relation && !boolean {
        return WidgetKind::Password;
    }
    match field_type {
        FieldType::ForeignKey { .. } | FieldType::EnumField { .. } => WidgetKind::Select,
        FieldType::PasswordField { .. } => WidgetKind::Password,
        FieldType::CharField => WidgetKind::Text,
        FieldType::TextField => WidgetKind::TextArea,
        FieldType::EmailField => WidgetKind::Email,
        FieldType::AutoField | FieldType::IntegerField => WidgetKind::Integer,
        FieldType::FloatField | FieldType::DecimalField { .. } => WidgetKind::Float,
        FieldType::BooleanField => WidgetKind::Checkbox,
        FieldType::FileField(_) => WidgetKind::File,
        FieldType::ImageField(_) => WidgetKind::Image,
        FieldType::DateField => WidgetKind::Date,
        FieldType::TimeField => WidgetKind::Time,
        FieldType::DateTimeField => WidgetKind::DateTime,
    }
}

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// Brings a value into the native type of a column.
///
/// Backends that store dates, times and booleans as text or integers hand
/// them back in that form; this parses them again. Values that do not
/// parse are returned unchanged.
pub fn column_value(field_type: &FieldType, value: Value) -> Value {
    match (field_type, value) {
        (FieldType::BooleanField, Value::Int(i)) => Value::Bool(i != 0),
        (FieldType::BooleanField, Value::String(s)) => Value::Bool(truthy(&s)),
        (
            FieldType::AutoField | FieldType::IntegerField | FieldType::ForeignKey { .. },
            Value::String(s),
        ) => s.trim().parse().map_or(Value::String(s), Value::Int),
        (FieldType::FloatField | FieldType::DecimalField { .. }, Value::Int(i)) => {
            Value::Int(i).as_f64().map_or(Value::Null, Value::Float)
        }
        (FieldType::FloatField | FieldType::DecimalField { .. }, Value::String(s)) => {
            s.trim().parse().map_or(Value::String(s), Value::Float)
        }
        (FieldType::DateField, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_or(Value::String(s), Value::Date),
        (FieldType::TimeField, Value::String(s)) => TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(s.trim(), f).ok())
            .map_or(Value::String(s), Value::Time),
        (FieldType::DateTimeField, Value::String(s)) => DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(s.trim(), f).ok())
            .map_or(Value::String(s), Value::DateTime),
        (_, value) => value,
    }
}

/// Maps a row onto field names, converting each column to its native type.
pub fn object_from_row(meta: &ModelMeta, row: &Row) -> BTreeMap<String, Value> {
    meta.fields
        .iter()
        .filter_map(|field| {
            let value = row.get_value(&field.column)?.clone();
            Some((field.name.to_string(), column_value(&field.field_type, value)))
        })
        .collect()
}

// ── Field updates ────────────────────────────────────────────────────

/// Changes applied to one generated field by [`ModelForm::update_field`].
#[derive(Clone, Default)]
pub struct FieldUpdate {
    /// Widget kind; inferred from the column when unset.
    pub kind: Option<WidgetKind>,
    pub label: Option<String>,
    pub extra_attrs: BTreeMap<String, String>,
    /// Column of the referenced table shown in foreign-key options.
    pub options_visible: Option<String>,
    pub validator: Option<Validator>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn kind(mut self, kind: WidgetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra_attrs.insert(key.into(), value.to_string());
        self
    }

    #[must_use]
    pub fn options_visible(mut self, column: impl Into<String>) -> Self {
        self.options_visible = Some(column.into());
        self
    }

    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Collects what a [`ModelForm`] is built from.
#[derive(Clone)]
pub struct ModelFormBuilder {
    pub(crate) meta: &'static ModelMeta,
    pub(crate) config: ModelFormConfig,
    pub(crate) session: Option<Arc<dyn DbExecutor>>,
    object: Option<BTreeMap<String, Value>>,
    load_pk: Option<Value>,
    storage: Option<FileStorage>,
}

impl ModelFormBuilder {
    #[must_use]
    pub fn config(mut self, config: ModelFormConfig) -> Self {
        self.config = config;
        self
    }

    /// The database session used for options, unique checks, and saving.
    #[must_use]
    pub fn session(mut self, session: Arc<dyn DbExecutor>) -> Self {
        self.session = Some(session);
        self
    }

    /// Initial values by field name, for editing an existing row.
    #[must_use]
    pub fn object<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.object = Some(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Initial values taken from a model instance.
    #[must_use]
    pub fn instance<M: Model>(self, model: &M) -> Self {
        self.object(model.field_values())
    }

    /// Loads the initial values from the row with this primary key when
    /// the form is built.
    #[must_use]
    pub fn pk(mut self, pk: impl Into<Value>) -> Self {
        self.load_pk = Some(pk.into());
        self
    }

    /// Storage for file columns; defaults to the configured media root.
    #[must_use]
    pub fn storage(mut self, storage: FileStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Builds the form, loading select options through the session.
    pub async fn build(self) -> MiniformResult<ModelForm> {
        let mut object = self.object;
        if let Some(pk) = self.load_pk {
            let session = self.session.as_deref().ok_or_else(|| {
                MiniformError::ImproperlyConfigured(format!(
                    "Loading a model {} object into a form is impossible without a session.",
                    self.meta.model_name
                ))
            })?;
            let row = fetch_by_pk(session, &self.meta.db_table, self.meta.pk_column(), &pk)
                .await?
                .ok_or_else(|| {
                    MiniformError::DoesNotExist(format!(
                        "{} matching pk {} does not exist.",
                        self.meta.model_name,
                        pk.to_form_string()
                    ))
                })?;
            object = Some(object_from_row(self.meta, &row));
        }

        let mut form = ModelForm {
            meta: self.meta,
            config: self.config,
            session: self.session,
            object,
            storage: self.storage.unwrap_or_default(),
            fields: Vec::new(),
            data: None,
            errors: FormErrors::new(),
            cleaned_data: CleanedData::new(),
        };
        let meta = form.meta;
        let excluded = form.config.exclude.resolve();
        for field in &meta.fields {
            if excluded.iter().any(|n| n == field.name) {
                continue;
            }
            let widget = form.build_widget(field, &FieldUpdate::default()).await?;
            form.fields.push(widget);
        }
        tracing::debug!(model = form.meta.model_name, fields = form.fields.len(), "model form built");
        Ok(form)
    }
}

pub(crate) fn no_session(meta: &ModelMeta) -> MiniformError {
    MiniformError::ImproperlyConfigured(format!(
        "Saving a model {} object from a form is impossible without a session.",
        meta.model_name
    ))
}

// ── ModelForm ────────────────────────────────────────────────────────

/// The outcome of one row write, applied to the form after commit.
#[derive(Debug, Clone)]
pub(crate) struct Saved {
    pub(crate) pk: Value,
    values: Vec<(&'static str, Value)>,
}

/// A form whose widgets are generated from a model's columns.
pub struct ModelForm {
    meta: &'static ModelMeta,
    config: ModelFormConfig,
    session: Option<Arc<dyn DbExecutor>>,
    object: Option<BTreeMap<String, Value>>,
    storage: FileStorage,
    fields: Vec<Box<dyn Widget>>,
    data: Option<FormData>,
    errors: FormErrors,
    cleaned_data: CleanedData,
}

impl ModelForm {
    /// Starts building a form for the given table metadata.
    pub fn builder(meta: &'static ModelMeta) -> ModelFormBuilder {
        ModelFormBuilder {
            meta,
            config: ModelFormConfig::default(),
            session: None,
            object: None,
            load_pk: None,
            storage: None,
        }
    }

    /// Starts building a form for `M`.
    pub fn for_model<M: Model>() -> ModelFormBuilder {
        Self::builder(M::meta())
    }

    pub const fn meta(&self) -> &'static ModelMeta {
        self.meta
    }

    pub const fn config(&self) -> &ModelFormConfig {
        &self.config
    }

    /// The bound object: initial values, then what was last saved.
    pub const fn object(&self) -> Option<&BTreeMap<String, Value>> {
        self.object.as_ref()
    }

    pub fn session(&self) -> Option<&Arc<dyn DbExecutor>> {
        self.session.as_ref()
    }

    fn pk_name(&self) -> &'static str {
        self.meta.pk_field().map_or("id", |f| f.name)
    }

    /// The primary key this form edits: the submitted one, else the bound
    /// object's.
    pub fn current_pk(&self) -> Option<Value> {
        let name = self.pk_name();
        let submitted = self
            .cleaned_data
            .get(name)
            .and_then(FieldValue::as_value)
            .filter(|v| !v.is_empty());
        let stored = self
            .object
            .as_ref()
            .and_then(|o| o.get(name))
            .filter(|v| !v.is_empty());
        let pk = submitted.or(stored)?.clone();
        Some(match self.meta.pk_field() {
            Some(field) => column_value(&field.field_type, pk),
            None => pk,
        })
    }

    fn initial_value(&self, field: &FieldDef) -> Value {
        let raw = match &self.object {
            Some(object) => object.get(field.name).cloned().unwrap_or(Value::Null),
            None => field.initial_value(),
        };
        column_value(&field.field_type, raw)
    }

    async fn options_for(
        &self,
        field: &FieldDef,
        visible: Option<&str>,
    ) -> MiniformResult<Vec<(String, String)>> {
        match &field.field_type {
            FieldType::EnumField { choices } => Ok(choices.clone()),
            FieldType::ForeignKey { to, .. } => match &self.session {
                Some(session) => model_options(&**session, to, visible).await,
                None => Ok(Vec::new()),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn build_widget(
        &self,
        field: &FieldDef,
        update: &FieldUpdate,
    ) -> MiniformResult<Box<dyn Widget>> {
        let config = &self.config;
        let kind = update
            .kind
            .unwrap_or_else(|| infer_kind(&field.field_type, config.protect.contains(field.name)));
        let editing = self.current_pk().is_some();
        let required = !field.null
            && !field.primary_key
            && !matches!(field.field_type, FieldType::BooleanField)
            && !(kind == WidgetKind::Password && editing);

        let mut core = WidgetCore::new(field.name)
            .label(update.label.clone().unwrap_or_else(|| field.name.to_string()))
            .with_validator(update.validator.clone());
        core.required = required;
        core.readonly = config.readonly.contains(field.name);
        core.hidden = config.hidden.contains(field.name);
        core.disabled = config.disabled.contains(field.name);
        core.prefix.clone_from(&config.prefix);

        match &field.field_type {
            FieldType::CharField | FieldType::EmailField => {
                if let Some(max) = field.max_length {
                    core.set_attr("maxlength", max);
                }
            }
            FieldType::PasswordField {
                min_length,
                max_length,
            } => {
                core.set_attr("minlength", min_length);
                core.set_attr("maxlength", max_length);
            }
            FieldType::FileField(files) | FieldType::ImageField(files) => {
                core.extensions.clone_from(&files.allowed_extensions);
            }
            _ => {}
        }
        for (key, value) in &update.extra_attrs {
            core.set_attr(key.clone(), value);
        }

        if kind != WidgetKind::Password {
            core.value = self.initial_value(field);
        }
        let options = self.options_for(field, update.options_visible.as_deref()).await?;
        core.set_options(options);
        Ok(kind.build(core))
    }

    /// Rebuilds one field with new settings.
    ///
    /// The field keeps its position; a field that was excluded is appended.
    pub async fn update_field(&mut self, name: &str, update: FieldUpdate) -> MiniformResult<()> {
        let field = self
            .meta
            .get_field(name)
            .ok_or_else(|| MiniformError::FieldNotFound(format!("{}.{name}", self.meta.model_name)))?;
        let widget = self.build_widget(field, &update).await?;
        match self.fields.iter_mut().find(|w| w.name() == name) {
            Some(slot) => *slot = widget,
            None => self.fields.push(widget),
        }
        Ok(())
    }

    /// Records an error on a field and drops its cleaned value.
    fn reject(&mut self, name: &str, message: String) {
        if let Some(widget) = self.fields.iter_mut().find(|w| w.name() == name) {
            let core = widget.core_mut();
            core.errors.push(message);
            self.errors.insert(name.to_string(), core.errors.join(", "));
        } else {
            self.errors.insert(name.to_string(), message);
        }
        self.cleaned_data.remove(name);
    }

    /// Column-level rules the widgets cannot see: password length limits
    /// and upload size and name rules.
    fn column_error(field: &FieldDef, value: &FieldValue) -> Option<String> {
        match (&field.field_type, value) {
            (FieldType::PasswordField { .. }, FieldValue::Value(Value::String(raw))) if !raw.is_empty() => {
                field.field_type.password_error(raw)
            }
            (FieldType::FileField(config) | FieldType::ImageField(config), FieldValue::File(upload))
                if !upload.is_empty() =>
            {
                if let Err(message) = config.check_size(upload.size) {
                    return Some(message);
                }
                if upload.size == 0 {
                    return None;
                }
                match FileStorage::validate_filename(config, &upload.name) {
                    Ok(_) => None,
                    Err(MiniformError::Upload(message)) => Some(message),
                    Err(other) => Some(other.to_string()),
                }
            }
            _ => None,
        }
    }

    async fn is_unique(&self, field: &FieldDef, value: Value) -> MiniformResult<bool> {
        let Some(session) = self.session.as_deref() else {
            return Err(MiniformError::ImproperlyConfigured(
                "no database session".to_string(),
            ));
        };
        let same_value = WhereNode::eq(field.column.clone(), value);
        let condition = match self.current_pk() {
            Some(pk) => WhereNode::And(vec![
                same_value,
                WhereNode::eq(self.meta.pk_column(), pk).negate(),
            ]),
            None => same_value,
        };
        Ok(!exists(session, &self.meta.db_table, &condition).await?)
    }

    /// Runs column rules and unique checks over the cleaned values.
    async fn check_columns(&mut self) {
        let names: Vec<String> = self.cleaned_data.keys().cloned().collect();
        for name in names {
            let Some(field) = self.meta.get_field(&name) else {
                continue;
            };
            let Some(value) = self.cleaned_data.get(&name).cloned() else {
                continue;
            };
            if let Some(message) = Self::column_error(field, &value) {
                self.reject(&name, message);
                continue;
            }
            if !field.unique || field.primary_key || value.is_empty() {
                continue;
            }
            let Some(value) = value.as_value().cloned() else {
                continue;
            };
            if self.session.is_none() {
                self.reject(&name, "Unique check failed: no database session".to_string());
                continue;
            }
            match self.is_unique(field, column_value(&field.field_type, value)).await {
                Ok(true) => {}
                Ok(false) => self.reject(&name, "Value must be unique".to_string()),
                Err(e) => self.reject(&name, format!("Unique check failed: {e}")),
            }
        }
    }

    fn widget_kind(&self, name: &str) -> Option<WidgetKind> {
        self.fields.iter().find(|w| w.name() == name).map(|w| w.kind())
    }

    /// Writes the cleaned values through `txn`, plus any `fixed` column
    /// values. Uploads written here are removed if the transaction rolls
    /// back; files they replace are removed once it commits.
    pub(crate) async fn write(
        &self,
        txn: &TransactionManager<'_>,
        fixed: &[(&'static str, Value)],
    ) -> MiniformResult<Saved> {
        let meta = self.meta;
        let pk_column = meta.pk_column();
        let pk = self.current_pk();
        let mut values: Vec<(&'static str, Value)> = Vec::new();

        for field in &meta.fields {
            if field.primary_key {
                continue;
            }
            let Some(cleaned) = self.cleaned_data.get(field.name) else {
                continue;
            };
            let value = match (&field.field_type, cleaned) {
                (FieldType::FileField(config) | FieldType::ImageField(config), FieldValue::File(upload)) => {
                    let Some(stored) = self.storage.save(config, upload).await? else {
                        continue;
                    };
                    if !stored.is_empty() {
                        let storage = self.storage.clone();
                        let fresh = stored.clone();
                        txn.on_rollback(move || storage.discard(&fresh)).await;
                    }
                    let previous = self
                        .object
                        .as_ref()
                        .and_then(|o| o.get(field.name))
                        .and_then(Value::as_str)
                        .filter(|p| !p.is_empty() && *p != stored)
                        .map(str::to_string);
                    if let Some(previous) = previous {
                        let storage = self.storage.clone();
                        txn.on_commit(move || storage.discard(&previous)).await;
                    }
                    Value::String(stored)
                }
                // An untouched upload keeps the stored file.
                (FieldType::FileField(_) | FieldType::ImageField(_), FieldValue::Value(_)) => continue,
                (_, FieldValue::File(_)) => continue,
                (field_type, FieldValue::Value(value)) => {
                    if self.widget_kind(field.name) == Some(WidgetKind::Password) {
                        // An empty password keeps the stored one.
                        if value.is_empty() {
                            continue;
                        }
                        if matches!(field_type, FieldType::PasswordField { .. }) {
                            let raw = value.to_form_string();
                            if let Some(message) = field_type.password_error(&raw) {
                                let errors = BTreeMap::from([(field.name.to_string(), message)]);
                                return Err(MiniformError::ValidationError(
                                    ValidationError::with_field_errors(errors),
                                ));
                            }
                            Value::String(hash_password(&raw).await?)
                        } else {
                            value.clone()
                        }
                    } else {
                        column_value(field_type, value.clone())
                    }
                }
            };
            values.push((field.column.as_str(), value));
        }
        for (name, value) in fixed {
            if let Some(field) = meta.get_field(name) {
                values.retain(|(column, _)| *column != field.column);
                values.push((field.column.as_str(), value.clone()));
            }
        }

        if let Some(pk) = pk {
            if fetch_by_pk(txn, &meta.db_table, pk_column, &pk).await?.is_some() {
                update_row(txn, &meta.db_table, pk_column, &pk, &values).await?;
                tracing::info!(model = meta.model_name, pk = %pk.to_form_string(), "updated row");
                return Ok(Saved { pk, values });
            }
            tracing::debug!(model = meta.model_name, pk = %pk.to_form_string(), "row missing, inserting");
        }

        // Defaults fill in for values the form left empty.
        let mut insert: Vec<(&str, Value)> = Vec::new();
        for field in &meta.fields {
            if field.primary_key {
                continue;
            }
            match values.iter().find(|(column, _)| *column == field.column) {
                Some((column, value)) if !value.is_null() => insert.push((*column, value.clone())),
                _ => {
                    if let Some(default) = &field.default {
                        insert.push((field.column.as_str(), default.clone()));
                    } else if field.server_default.is_none()
                        && values.iter().any(|(column, _)| *column == field.column)
                    {
                        insert.push((field.column.as_str(), Value::Null));
                    }
                }
            }
        }
        let pk = insert_row(txn, &meta.db_table, &insert).await?;
        tracing::info!(model = meta.model_name, pk = %pk.to_form_string(), "inserted row");
        Ok(Saved { pk, values })
    }

    /// Updates the bound object and widgets after a committed write.
    pub(crate) fn apply_saved(&mut self, saved: &Saved) {
        let pk_name = self.pk_name();
        let object = self.object.get_or_insert_with(BTreeMap::new);
        for field in &self.meta.fields {
            if let Some((_, value)) = saved.values.iter().find(|(c, _)| *c == field.column) {
                if !matches!(field.field_type, FieldType::PasswordField { .. }) {
                    object.insert(field.name.to_string(), value.clone());
                }
            }
        }
        object.insert(pk_name.to_string(), saved.pk.clone());
        if self.cleaned_data.contains_key(pk_name) {
            self.cleaned_data
                .insert(pk_name.to_string(), FieldValue::Value(saved.pk.clone()));
        }
        for widget in &mut self.fields {
            let name = widget.name().to_string();
            let is_upload = matches!(widget.kind(), WidgetKind::File | WidgetKind::Image);
            if name == pk_name || is_upload {
                if let Some(value) = object.get(&name) {
                    widget.core_mut().value = value.clone();
                }
            }
        }
    }

    /// Saves the validated data and returns the row's primary key.
    ///
    /// Runs in a transaction on the form's session; any error rolls it
    /// back and is returned.
    pub async fn save(&mut self) -> MiniformResult<Value> {
        let session = self.session.clone().ok_or_else(|| no_session(self.meta))?;
        let span = form_span(self.meta.model_name);
        let this = &*self;
        let saved = miniform_db::atomic(&*session, |txn| async move { this.write(&txn, &[]).await })
            .instrument(span)
            .await?;
        self.apply_saved(&saved);
        Ok(saved.pk)
    }

    /// Loads the saved row as a model instance.
    pub async fn instance<M: Model>(&self) -> MiniformResult<M> {
        let session = self.session.as_deref().ok_or_else(|| no_session(self.meta))?;
        let pk = self.current_pk().ok_or_else(|| {
            MiniformError::DoesNotExist(format!("{} has not been saved.", self.meta.model_name))
        })?;
        get_model::<M>(session, pk).await
    }
}

#[async_trait]
impl Form for ModelForm {
    fn fields(&self) -> &[Box<dyn Widget>] {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut [Box<dyn Widget>] {
        &mut self.fields
    }

    fn prefix(&self) -> Option<&str> {
        self.config.prefix.as_deref()
    }

    fn bind(&mut self, data: &FormData) {
        self.data = Some(data.clone());
        self.errors.clear();
        self.cleaned_data.clear();
    }

    fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    async fn is_valid(&mut self) -> bool {
        let Some(data) = self.data.take() else {
            return false;
        };
        let span = form_span(self.meta.model_name);
        let (errors, cleaned) = {
            let _guard = span.enter();
            clean_fields(&mut self.fields, &data)
        };
        self.data = Some(data);
        self.errors = errors;
        self.cleaned_data = cleaned;
        self.check_columns().instrument(span).await;

        if self.errors.is_empty() {
            if let Err(form_errors) = self.clean().await {
                self.errors.extend(form_errors);
            }
        }
        self.errors.is_empty()
    }

    fn errors(&self) -> &FormErrors {
        &self.errors
    }

    fn cleaned_data(&self) -> &CleanedData {
        &self.cleaned_data
    }
}
