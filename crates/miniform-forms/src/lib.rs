//! # miniform-forms
//!
//! HTML forms for miniform. Widgets render and validate single fields,
//! [`BaseForm`] groups them, [`ModelForm`] derives its widgets from a
//! [`ModelMeta`](miniform_db::ModelMeta) and saves the cleaned values
//! through a database session, and [`FormSet`] edits a parent row together
//! with the rows that point at it through a foreign key.
//!
//! ## Module Overview
//!
//! - [`widgets`] - The [`Widget`] trait and one implementation per input kind
//! - [`form`] - The [`Form`] trait, [`BaseForm`], and option helpers
//! - [`model_form`] - [`ModelForm`], its builder, and field groups
//! - [`formset`] - Parent form plus foreign-key linked child forms
//! - [`storage`] - Filesystem storage for uploaded files
//! - [`hashers`] - Bcrypt hashing for password columns

// These clippy lints are intentionally allowed for the forms crate:
// - result_large_err: MiniformError is the workspace error type and is used consistently
// - format_push_string: format! with push_str is clearer than write! for HTML generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - return_self_not_must_use: builder pattern methods are self-documenting
// - struct_excessive_bools: widget flags mirror HTML boolean attributes
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]

pub mod form;
pub mod formset;
pub mod hashers;
pub mod model_form;
pub mod storage;
pub mod widgets;

pub use form::{enum_options, model_options, BaseForm, CleanedData, Form, FormErrors};
pub use formset::{FormSet, FormSetBuilder, MAX_FORMS};
pub use hashers::{check_password, hash_password, BcryptHasher, PasswordHasher};
pub use model_form::{
    column_value, infer_kind, FieldGroup, FieldUpdate, ModelForm, ModelFormBuilder,
    ModelFormConfig,
};
pub use storage::FileStorage;
pub use widgets::{
    AttrsUpdate, CheckboxWidget, DateTimeWidget, DateWidget, EmailWidget, FieldValue,
    FileWidget, FloatWidget, ImageWidget, IntegerWidget, PasswordWidget, RangeWidget,
    SelectWidget, TextAreaWidget, TextWidget, TimeWidget, Validator, Widget, WidgetCore,
    WidgetKind,
};
