//! The [`Form`] trait and [`BaseForm`].
//!
//! A form owns an ordered list of widgets. Binding stores the submitted
//! [`FormData`]; `is_valid()` converts and validates every enabled field,
//! collecting one joined error string per failing field. Validation is async
//! so implementations can reach the database (model forms check unique
//! columns there).
//!
//! [`BaseForm`] is the hand-written form: widgets are added one by one.
//!
//! ```
//! use miniform_forms::form::{BaseForm, Form};
//! use miniform_forms::widgets::{IntegerWidget, TextWidget, WidgetCore};
//! use miniform_http::FormData;
//!
//! # tokio_test_block(async {
//! let mut form = BaseForm::new("signup")
//!     .with_field(TextWidget::new(WidgetCore::new("name").required()))
//!     .with_field(IntegerWidget::named("age"));
//! form.bind(&FormData::from_pairs([("name", "Ann"), ("age", "31")]));
//! assert!(form.is_valid().await);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use miniform_core::error::{MiniformError, MiniformResult};
use miniform_core::logging::form_span;
use miniform_core::settings::SETTINGS;
use miniform_db::executor::fetch_all;
use miniform_db::fields::EnumChoices;
use miniform_db::query::compiler::OrderBy;
use miniform_db::registry::model_meta_for_table;
use miniform_db::{DbExecutor, Query, Value};
use miniform_http::FormData;
use serde::Serialize;

use crate::widgets::{FieldValue, Widget};

/// Field name to joined error text.
pub type FormErrors = BTreeMap<String, String>;

/// Field name to converted, valid value.
pub type CleanedData = BTreeMap<String, FieldValue>;

/// The core form trait.
#[async_trait]
pub trait Form: Send + Sync {
    /// The widgets, in render order.
    fn fields(&self) -> &[Box<dyn Widget>];

    fn fields_mut(&mut self) -> &mut [Box<dyn Widget>];

    /// The name prefix shared by every field, if any.
    fn prefix(&self) -> Option<&str>;

    /// Stores submitted data for the next [`is_valid`](Form::is_valid).
    fn bind(&mut self, data: &FormData);

    fn is_bound(&self) -> bool;

    /// Converts and validates the bound data. Unbound forms are invalid.
    async fn is_valid(&mut self) -> bool;

    /// Errors from the last validation; messages of one field are joined
    /// with `", "`.
    fn errors(&self) -> &FormErrors;

    /// Values that passed validation, keyed by field name.
    fn cleaned_data(&self) -> &CleanedData;

    /// Cross-field validation hook, run after every field is valid.
    async fn clean(&self) -> Result<(), FormErrors> {
        Ok(())
    }

    /// Looks up a widget by field name.
    fn field(&self, name: &str) -> Option<&dyn Widget> {
        self.fields()
            .iter()
            .find(|w| w.name() == name)
            .map(Box::as_ref)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Box<dyn Widget>> {
        self.fields_mut().iter_mut().find(|w| w.name() == name)
    }

    /// Renders every field inside a `<fieldset>`.
    fn render(&self) -> String {
        let mut html = String::from("<fieldset>\n");
        for widget in self.fields() {
            html.push_str(&widget.render());
        }
        html.push_str("</fieldset>\n");
        html
    }

    /// Merges the widget dictionaries. When any field has errors, only the
    /// failing fields are reported.
    fn form_dict(&self) -> serde_json::Value {
        let mut valid = serde_json::Map::new();
        let mut failed = serde_json::Map::new();
        for widget in self.fields() {
            let target = if widget.errors().is_empty() {
                &mut valid
            } else {
                &mut failed
            };
            if let serde_json::Value::Object(entry) = widget.to_dict() {
                target.extend(entry);
            }
        }
        if failed.is_empty() {
            valid.into()
        } else {
            failed.into()
        }
    }

    /// [`form_dict`](Form::form_dict) as pretty JSON. Non-ASCII text is
    /// kept as is. `indent` defaults to `Settings::form_json_indent`.
    fn form_json(&self, indent: Option<usize>) -> MiniformResult<String> {
        let width = indent.unwrap_or(SETTINGS.get_or_default().form_json_indent);
        let indent = " ".repeat(width);
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.form_dict().serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|e| MiniformError::SerializationError(e.to_string()))
    }
}

/// Reads each enabled field's submitted value, then converts and validates it.
///
/// Inputs are looked up by their prefixed names; a missing input counts as
/// empty, which is what browsers do for unchecked boxes. Uploads are
/// preferred over text under the same name.
pub(crate) fn clean_fields(
    fields: &mut [Box<dyn Widget>],
    data: &FormData,
) -> (FormErrors, CleanedData) {
    let mut errors = FormErrors::new();
    let mut cleaned = CleanedData::new();
    for widget in fields.iter_mut() {
        if widget.core().disabled {
            continue;
        }
        let key = widget.core().html_name();
        let raw = match data.get_file(&key) {
            Some(file) => FieldValue::File(file.clone()),
            None => FieldValue::from(data.get(&key).unwrap_or_default()),
        };
        match widget.clean(raw) {
            Some(value) => {
                cleaned.insert(widget.name().to_string(), value);
            }
            None => {
                tracing::debug!(field = %widget.name(), errors = ?widget.errors(), "field invalid");
                errors.insert(widget.name().to_string(), widget.errors().join(", "));
            }
        }
    }
    (errors, cleaned)
}

// ── BaseForm ─────────────────────────────────────────────────────────

/// A general-purpose form built from individual widgets.
#[derive(Debug, Clone)]
pub struct BaseForm {
    name: String,
    fields: Vec<Box<dyn Widget>>,
    prefix: Option<String>,
    data: Option<FormData>,
    errors: FormErrors,
    cleaned_data: CleanedData,
}

impl BaseForm {
    /// Creates an empty form. `name` identifies it in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            prefix: None,
            data: None,
            errors: FormErrors::new(),
            cleaned_data: CleanedData::new(),
        }
    }

    /// Sets the prefix on the form and every widget, including ones added
    /// later.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        for widget in &mut self.fields {
            widget.core_mut().prefix = Some(prefix.clone());
        }
        self.prefix = Some(prefix);
        self
    }

    /// Appends a widget.
    #[must_use]
    pub fn with_field(mut self, widget: impl Widget + 'static) -> Self {
        self.push_field(Box::new(widget));
        self
    }

    /// Sets initial values by field name. Unknown names are ignored.
    #[must_use]
    pub fn with_initial<I, K, V>(mut self, initial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in initial {
            if let Some(widget) = self.field_mut(name.as_ref()) {
                widget.core_mut().value = value.into();
            }
        }
        self
    }

    /// Appends a boxed widget.
    pub fn push_field(&mut self, mut widget: Box<dyn Widget>) {
        if let Some(prefix) = &self.prefix {
            widget.core_mut().prefix = Some(prefix.clone());
        }
        self.fields.push(widget);
    }

    /// The form name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Form for BaseForm {
    fn fields(&self) -> &[Box<dyn Widget>] {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut [Box<dyn Widget>] {
        &mut self.fields
    }

    fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
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
        let span = form_span(&self.name);
        let (errors, cleaned) = {
            let _guard = span.enter();
            clean_fields(&mut self.fields, &data)
        };
        self.data = Some(data);
        self.errors = errors;
        self.cleaned_data = cleaned;

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

// ── Options ──────────────────────────────────────────────────────────

/// Select options listing every row of `table`, ordered by primary key.
///
/// Option values are primary keys. The visible text is the `visible`
/// column, or the primary key itself.
pub async fn model_options(
    db: &dyn DbExecutor,
    table: &str,
    visible: Option<&str>,
) -> MiniformResult<Vec<(String, String)>> {
    let meta = model_meta_for_table(table)?;
    let pk = meta.pk_column();
    let query = Query::new(table).order_by(OrderBy::asc(pk));
    let rows = fetch_all(db, &query).await?;
    Ok(rows
        .iter()
        .map(|row| {
            let key = row.get_value(pk).map(Value::to_form_string).unwrap_or_default();
            let text = visible
                .and_then(|column| row.get_value(column))
                .map_or_else(|| key.clone(), Value::to_form_string);
            (key, text)
        })
        .collect())
}

/// Select options from an [`EnumChoices`] type: `(name, label)` pairs.
pub fn enum_options<E: EnumChoices>() -> Vec<(String, String)> {
    E::choices()
}
