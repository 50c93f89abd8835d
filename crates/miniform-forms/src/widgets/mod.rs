//! Form widgets.
//!
//! A widget renders one form field as HTML, converts the submitted string
//! into a typed value, validates it, and describes its state as a JSON
//! dictionary. Every kind implements the [`Widget`] trait; the state all
//! kinds share (name, label, flags, extra attributes, value, options,
//! errors) lives in [`WidgetCore`].
//!
//! | Kind | `type` attribute |
//! |---|---|
//! | [`TextWidget`] | `text` |
//! | [`TextAreaWidget`] | `textarea` |
//! | [`EmailWidget`] | `email` |
//! | [`PasswordWidget`] | `password` |
//! | [`IntegerWidget`] | `number` |
//! | [`FloatWidget`] | `number` |
//! | [`RangeWidget`] | `range` |
//! | [`TimeWidget`] | `time` |
//! | [`DateWidget`] | `date` |
//! | [`DateTimeWidget`] | `datetime-local` |
//! | [`SelectWidget`] | `select` |
//! | [`CheckboxWidget`] | `checkbox` |
//! | [`FileWidget`] | `file` |
//! | [`ImageWidget`] | `file` |

mod choice;
mod file;
mod numeric;
mod temporal;
mod text;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use miniform_core::utils::html::escape;
use miniform_db::Value;
use miniform_http::UploadedFile;
use regex::Regex;

pub use choice::{CheckboxWidget, SelectWidget};
pub use file::{FileWidget, ImageWidget};
pub use numeric::{FloatWidget, IntegerWidget, RangeWidget, RANGE_JS};
pub use temporal::{DateTimeWidget, DateWidget, TimeWidget};
pub use text::{EmailWidget, PasswordWidget, TextAreaWidget, TextWidget};

/// Attribute names that are controlled by widget flags and never accepted
/// as extra attributes.
pub const RESERVED_ATTRS: [&str; 5] = ["disabled", "required", "hidden", "readonly", "value"];

// ── Kinds ────────────────────────────────────────────────────────────

/// Enumerates the widget kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Text,
    TextArea,
    Email,
    Password,
    Integer,
    Float,
    Range,
    Time,
    Date,
    DateTime,
    Select,
    Checkbox,
    File,
    Image,
}

impl WidgetKind {
    /// The HTML `type` of the rendered input (or the tag name for
    /// `textarea` and `select`).
    pub const fn html_type(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TextArea => "textarea",
            Self::Email => "email",
            Self::Password => "password",
            Self::Integer | Self::Float => "number",
            Self::Range => "range",
            Self::Time => "time",
            Self::Date => "date",
            Self::DateTime => "datetime-local",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::File | Self::Image => "file",
        }
    }

    /// The pattern submitted text must fully match, if the kind has one.
    pub const fn pattern(self) -> Option<&'static str> {
        match self {
            Self::Text | Self::TextArea => Some(r"^[a-zA-Zа-яА-Я0-9\s.,\-_!№:?()*]+$"),
            Self::Email => Some(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$"),
            Self::Password => Some(r"^[a-zA-Zа-яА-Я0-9\s.,_!@#?*№-]+$"),
            Self::Integer => Some(r"^-?\d+$"),
            Self::Float => Some(r"^-?\d+\.\d+$"),
            Self::Range => Some(r"^-?\d+(\.\d+)?$"),
            _ => None,
        }
    }

    /// The compiled [`pattern`](Self::pattern).
    pub fn regex(self) -> Option<&'static Regex> {
        static TEXT: OnceLock<Regex> = OnceLock::new();
        static EMAIL: OnceLock<Regex> = OnceLock::new();
        static PASSWORD: OnceLock<Regex> = OnceLock::new();
        static INTEGER: OnceLock<Regex> = OnceLock::new();
        static FLOAT: OnceLock<Regex> = OnceLock::new();
        static RANGE: OnceLock<Regex> = OnceLock::new();

        let cell = match self {
            Self::Text | Self::TextArea => &TEXT,
            Self::Email => &EMAIL,
            Self::Password => &PASSWORD,
            Self::Integer => &INTEGER,
            Self::Float => &FLOAT,
            Self::Range => &RANGE,
            _ => return None,
        };
        let pattern = self.pattern()?;
        Some(cell.get_or_init(|| Regex::new(pattern).expect("widget patterns are valid")))
    }

    /// Builds a boxed widget of this kind around `core`.
    pub fn build(self, core: WidgetCore) -> Box<dyn Widget> {
        match self {
            Self::Text => Box::new(TextWidget::new(core)),
            Self::TextArea => Box::new(TextAreaWidget::new(core)),
            Self::Email => Box::new(EmailWidget::new(core)),
            Self::Password => Box::new(PasswordWidget::new(core)),
            Self::Integer => Box::new(IntegerWidget::new(core)),
            Self::Float => Box::new(FloatWidget::new(core)),
            Self::Range => Box::new(RangeWidget::new(core)),
            Self::Time => Box::new(TimeWidget::new(core)),
            Self::Date => Box::new(DateWidget::new(core)),
            Self::DateTime => Box::new(DateTimeWidget::new(core)),
            Self::Select => Box::new(SelectWidget::new(core)),
            Self::Checkbox => Box::new(CheckboxWidget::new(core)),
            Self::File => Box::new(FileWidget::new(core)),
            Self::Image => Box::new(ImageWidget::new(core)),
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "TextWidget",
            Self::TextArea => "TextAreaWidget",
            Self::Email => "EmailWidget",
            Self::Password => "PasswordWidget",
            Self::Integer => "IntegerWidget",
            Self::Float => "FloatWidget",
            Self::Range => "RangeWidget",
            Self::Time => "TimeWidget",
            Self::Date => "DateWidget",
            Self::DateTime => "DateTimeWidget",
            Self::Select => "SelectWidget",
            Self::Checkbox => "CheckboxWidget",
            Self::File => "FileWidget",
            Self::Image => "ImageWidget",
        };
        write!(f, "{name}")
    }
}

// ── Values ───────────────────────────────────────────────────────────

/// A submitted or converted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A scalar value (text before conversion, typed after).
    Value(Value),
    /// An uploaded file.
    File(UploadedFile),
}

impl FieldValue {
    /// Returns `true` for null, empty strings, and untouched uploads.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Value(v) => v.is_empty(),
            Self::File(f) => f.is_empty(),
        }
    }

    /// Returns the scalar value, if this is not an upload.
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::File(_) => None,
        }
    }

    /// Returns the upload, if this is one.
    pub const fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(f) => Some(f),
            Self::Value(_) => None,
        }
    }

    /// The value as it would appear in a form: text for scalars, the file
    /// name for uploads.
    pub fn text(&self) -> String {
        match self {
            Self::Value(v) => v.to_form_string(),
            Self::File(f) => f.name.clone(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<UploadedFile> for FieldValue {
    fn from(file: UploadedFile) -> Self {
        Self::File(file)
    }
}

/// A custom validator replacing a widget's default rules.
///
/// Receives the converted value; an `Err` message is recorded on the widget.
pub type Validator = Arc<dyn Fn(&FieldValue) -> Result<(), String> + Send + Sync>;

// ── Shared state ─────────────────────────────────────────────────────

/// State shared by every widget kind.
///
/// Built with chained methods:
///
/// ```
/// use miniform_forms::widgets::{TextWidget, Widget, WidgetCore};
///
/// let widget = TextWidget::new(
///     WidgetCore::new("title")
///         .label("Title")
///         .required()
///         .attr("maxlength", 20),
/// );
/// assert!(widget.render().contains(r#"maxlength="20""#));
/// ```
#[derive(Clone, Default)]
pub struct WidgetCore {
    /// Field name; also the dictionary key.
    pub name: String,
    /// Label text.
    pub label: String,
    pub readonly: bool,
    pub hidden: bool,
    pub required: bool,
    pub disabled: bool,
    /// Additional HTML attributes, kept sorted by name.
    pub extra_attrs: BTreeMap<String, String>,
    /// Current value (initial, then the last submitted one).
    pub value: Value,
    /// Select options as `(value, visible text)` pairs.
    pub options: Vec<(String, String)>,
    /// Accepted file extensions or extension groups.
    pub extensions: Vec<String>,
    /// Name prefix used when several forms share a page.
    pub prefix: Option<String>,
    /// Errors from the last validation.
    pub errors: Vec<String>,
    validator: Option<Validator>,
}

impl fmt::Debug for WidgetCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetCore")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("readonly", &self.readonly)
            .field("hidden", &self.hidden)
            .field("required", &self.required)
            .field("disabled", &self.disabled)
            .field("extra_attrs", &self.extra_attrs)
            .field("value", &self.value)
            .field("options", &self.options)
            .field("extensions", &self.extensions)
            .field("prefix", &self.prefix)
            .field("errors", &self.errors)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl WidgetCore {
    /// Creates state for a field called `name`, labelled with its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Adds an extra attribute. Reserved names are ignored.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.set_options(options);
        self
    }

    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Replaces the default validation rules with `validator`.
    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Option<Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// The name used in the HTML `name`/`id` attributes: `{prefix}_{name}`
    /// when a prefix is set.
    pub fn html_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Sets an extra attribute. Returns `false` for reserved names.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl ToString) -> bool {
        let key = key.into();
        if RESERVED_ATTRS.contains(&key.as_str()) {
            return false;
        }
        self.extra_attrs.insert(key, value.to_string());
        true
    }

    /// Looks up an extra attribute.
    pub fn attr_value(&self, key: &str) -> Option<&str> {
        self.extra_attrs.get(key).map(String::as_str)
    }

    /// Replaces the select options, keeping the first entry for repeated keys.
    pub fn set_options<I, K, V>(&mut self, options: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.clear();
        for (key, visible) in options {
            let key = key.into();
            if !self.options.iter().any(|(k, _)| *k == key) {
                self.options.push((key, visible.into()));
            }
        }
    }

    /// Returns `true` if `key` is one of the option values.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k == key)
    }

    /// The custom validator, if one was set.
    pub fn custom_validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    /// Reads a numeric length limit from the extra attributes.
    pub(crate) fn attr_usize(&self, key: &str, default: usize) -> usize {
        self.attr_value(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(default, |v| usize::try_from(v.unsigned_abs()).unwrap_or(usize::MAX))
    }

    /// Applies an [`AttrsUpdate`].
    pub fn apply(&mut self, update: AttrsUpdate) {
        if let Some(label) = update.label {
            self.label = label;
        }
        for (key, value) in update.extra_attrs {
            self.set_attr(key, value);
        }
        if let Some(value) = update.value {
            self.value = value;
        }
        if let Some(prefix) = update.prefix {
            self.prefix = Some(prefix);
        }
        if let Some(options) = update.options {
            self.set_options(options);
        }
        if let Some(readonly) = update.readonly {
            self.readonly = readonly;
        }
        if let Some(hidden) = update.hidden {
            self.hidden = hidden;
        }
        if let Some(required) = update.required {
            self.required = required;
        }
        if let Some(disabled) = update.disabled {
            self.disabled = disabled;
        }
    }
}

/// A set of changes applied to a widget after construction.
#[derive(Debug, Clone, Default)]
pub struct AttrsUpdate {
    pub label: Option<String>,
    pub extra_attrs: BTreeMap<String, String>,
    pub value: Option<Value>,
    pub prefix: Option<String>,
    pub options: Option<Vec<(String, String)>>,
    pub readonly: Option<bool>,
    pub hidden: Option<bool>,
    pub required: Option<bool>,
    pub disabled: Option<bool>,
}

impl AttrsUpdate {
    pub fn new() -> Self {
        Self::default()
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
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn options(mut self, options: Vec<(String, String)>) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub const fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    #[must_use]
    pub const fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }
}

// ── Widget trait ─────────────────────────────────────────────────────

/// One form field: rendering, conversion, validation, and serialization.
///
/// Implementors supply the kind, access to their [`WidgetCore`], the
/// conversion of submitted values, and the default rules in
/// [`check`](Widget::check). Rendering and dictionary output have shared
/// defaults that kinds override where their markup differs.
pub trait Widget: Send + Sync + fmt::Debug {
    /// Returns the widget kind.
    fn kind(&self) -> WidgetKind;

    /// Shared state.
    fn core(&self) -> &WidgetCore;

    /// Mutable shared state.
    fn core_mut(&mut self) -> &mut WidgetCore;

    /// Clones this widget behind a new box.
    fn clone_box(&self) -> Box<dyn Widget>;

    /// Converts a submitted value to this widget's native type.
    ///
    /// Empty text becomes [`Value::Null`]. An `Err` carries a message that
    /// is recorded as the field's only error.
    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Ok(match raw {
            FieldValue::Value(v) if v.is_empty() => FieldValue::Value(Value::Null),
            other => other,
        })
    }

    /// The default validation rules. Returns one message per violation.
    fn check(&self, value: &FieldValue) -> Vec<String>;

    /// Text placed in the `value` attribute.
    fn input_text(&self) -> String {
        self.core().value.to_form_string()
    }

    /// The input element, required marker, and trailing line break.
    fn render_input(&self) -> String {
        let core = self.core();
        input_tag(core, self.kind().html_type(), &value_attr(&self.input_text()), "")
    }

    /// The value reported in dictionary output.
    fn dict_value(&self) -> serde_json::Value {
        json_value(&self.core().value)
    }

    /// Stores a validated value so the next render shows it.
    fn record(&mut self, value: &FieldValue) {
        if let FieldValue::Value(v) = value {
            self.core_mut().value = v.clone();
        }
    }

    /// The field name.
    fn name(&self) -> &str {
        &self.core().name
    }

    /// Errors from the last validation.
    fn errors(&self) -> &[String] {
        &self.core().errors
    }

    /// Renders the complete form group.
    fn render(&self) -> String {
        let core = self.core();
        let mut html = String::from(if core.hidden {
            "<div class=\"form-group\" hidden>\n"
        } else {
            "<div class=\"form-group\">\n"
        });
        html.push_str(&render_label(core));
        html.push_str(&self.render_input());
        html.push_str(&render_errors(core));
        html.push_str("</div>\n");
        html
    }

    /// Describes the widget as `{name: {...}}`.
    ///
    /// A valid widget reports `type`, `name`, `label`, `value`, `attrs` and,
    /// when present, `options`. A widget with errors reports
    /// `{"type": "error", "value", "detail"}` instead.
    fn to_dict(&self) -> serde_json::Value {
        let core = self.core();
        let mut entry = serde_json::Map::new();
        if core.errors.is_empty() {
            entry.insert("type".into(), self.kind().html_type().into());
            entry.insert("name".into(), core.html_name().into());
            entry.insert("label".into(), core.label.clone().into());
            entry.insert("value".into(), self.dict_value());
            entry.insert("attrs".into(), dict_attrs(core));
            if !core.options.is_empty() {
                let options: serde_json::Map<String, serde_json::Value> = core
                    .options
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                entry.insert("options".into(), options.into());
            }
        } else {
            entry.insert("type".into(), "error".into());
            entry.insert("value".into(), self.dict_value());
            entry.insert("detail".into(), core.errors.concat().into());
        }
        let mut dict = serde_json::Map::new();
        dict.insert(core.name.clone(), entry.into());
        dict.into()
    }

    /// Records `value` and validates it with the custom validator, if set,
    /// or the default rules. Returns `true` when no errors were found.
    fn validate(&mut self, value: &FieldValue) -> bool {
        self.record(value);
        let errors = match self.core().custom_validator().cloned() {
            Some(validator) => validator(value).err().into_iter().collect(),
            None => self.check(value),
        };
        let valid = errors.is_empty();
        self.core_mut().errors = errors;
        valid
    }

    /// Converts then validates a submitted value. Returns the converted
    /// value when it is valid.
    fn clean(&mut self, raw: FieldValue) -> Option<FieldValue> {
        match self.convert(raw.clone()) {
            Ok(value) => self.validate(&value).then_some(value),
            Err(message) => {
                self.record(&raw);
                self.core_mut().errors = vec![message];
                None
            }
        }
    }

    /// Applies changes made after construction.
    fn update_attrs(&mut self, update: AttrsUpdate) {
        self.core_mut().apply(update);
    }
}

impl Clone for Box<dyn Widget> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Declares a widget struct wrapping a [`WidgetCore`].
macro_rules! widget_struct {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            core: $crate::widgets::WidgetCore,
        }

        impl $name {
            /// Wraps prepared state.
            pub const fn new(core: $crate::widgets::WidgetCore) -> Self {
                Self { core }
            }

            /// Creates a widget named `name` with default state.
            pub fn named(name: impl Into<String>) -> Self {
                Self::new($crate::widgets::WidgetCore::new(name))
            }
        }
    };
}

/// The accessor methods every `Widget` impl repeats.
macro_rules! widget_accessors {
    () => {
        fn core(&self) -> &$crate::widgets::WidgetCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut $crate::widgets::WidgetCore {
            &mut self.core
        }

        fn clone_box(&self) -> Box<dyn $crate::widgets::Widget> {
            Box::new(self.clone())
        }
    };
}

pub(crate) use widget_accessors;
pub(crate) use widget_struct;

// ── Rendering helpers ────────────────────────────────────────────────

pub(crate) fn render_label(core: &WidgetCore) -> String {
    format!(
        "<label for=\"{}\">{}</label>\n",
        core.html_name(),
        escape(&core.label)
    )
}

pub(crate) fn render_errors(core: &WidgetCore) -> String {
    core.errors
        .iter()
        .map(|e| format!(" <small class=\"error\">error: {}</small>\n", escape(e)))
        .collect()
}

/// ` readonly`, ` required` and ` disabled`, as set.
pub(crate) fn flag_attrs(core: &WidgetCore) -> String {
    let mut attrs = String::new();
    if core.readonly {
        attrs.push_str(" readonly");
    }
    if core.required {
        attrs.push_str(" required");
    }
    if core.disabled {
        attrs.push_str(" disabled");
    }
    attrs
}

/// Extra attributes in name order; empty values are skipped.
pub(crate) fn extra_attrs_html(core: &WidgetCore) -> String {
    core.extra_attrs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!(" {k}=\"{}\"", escape(v)))
        .collect()
}

pub(crate) const fn required_marker(core: &WidgetCore) -> &'static str {
    if core.required {
        " <em>*</em>"
    } else {
        ""
    }
}

/// ` value="..."`, or nothing for empty values.
pub(crate) fn value_attr(text: &str) -> String {
    if text.is_empty() || text == "None" {
        String::new()
    } else {
        format!(" value=\"{}\"", escape(text))
    }
}

/// `<input .../>` followed by the required marker, `trailer`, and `<br>`.
pub(crate) fn input_tag(core: &WidgetCore, html_type: &str, value: &str, trailer: &str) -> String {
    let name = core.html_name();
    format!(
        "<input type=\"{html_type}\" name=\"{name}\" id=\"{name}\"{}{value}{} />{}{trailer}<br>\n",
        flag_attrs(core),
        extra_attrs_html(core),
        required_marker(core),
    )
}

// ── Dictionary helpers ───────────────────────────────────────────────

/// Dictionary form of a value: null becomes `""`.
pub(crate) fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::String(String::new()),
        other => other.to_json(),
    }
}

fn attr_json(value: &str) -> serde_json::Value {
    if let Ok(i) = value.parse::<i64>() {
        return i.into();
    }
    if let Ok(f) = value.parse::<f64>() {
        if f.is_finite() {
            return f.into();
        }
    }
    value.into()
}

fn dict_attrs(core: &WidgetCore) -> serde_json::Value {
    let mut attrs: serde_json::Map<String, serde_json::Value> = core
        .extra_attrs
        .iter()
        .map(|(k, v)| (k.clone(), attr_json(v)))
        .collect();
    for (flag, set) in [
        ("hidden", core.hidden),
        ("readonly", core.readonly),
        ("required", core.required),
        ("disabled", core.disabled),
    ] {
        if set {
            attrs.insert(flag.into(), true.into());
        }
    }
    if !core.extensions.is_empty() {
        attrs.insert("extensions".into(), core.extensions.clone().into());
    }
    attrs.into()
}

// ── Message helpers ──────────────────────────────────────────────────

/// Formats an optional bound the way messages show it (`None` when unset).
pub(crate) fn bound_text<T: fmt::Display>(bound: Option<T>) -> String {
    bound.map_or_else(|| "None".to_string(), |b| b.to_string())
}
