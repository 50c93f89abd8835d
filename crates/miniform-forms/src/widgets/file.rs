//! Upload widgets.
//!
//! The widget value is the saved file path (if any); a new upload is only
//! carried through cleaning and written by the model form.

use miniform_core::utils::html::escape;
use miniform_db::fields::expand_extensions;
use miniform_db::Value;

use super::{
    extra_attrs_html, required_marker, widget_accessors, widget_struct, FieldValue, Widget,
    WidgetCore, WidgetKind,
};

widget_struct!(
    /// A document upload. Accepts `document/*` unless extensions are set.
    FileWidget
);

widget_struct!(
    /// An image upload. Accepts `image/*` unless extensions are set.
    ImageWidget
);

fn accepted(core: &WidgetCore, default_group: &str) -> Vec<String> {
    if core.extensions.is_empty() {
        expand_extensions(&[default_group])
    } else {
        expand_extensions(&core.extensions)
    }
}

fn saved_path(core: &WidgetCore) -> Option<&str> {
    core.value.as_str().filter(|s| !s.is_empty())
}

/// A zero-byte upload binds as no file at all. The "File must be not
/// empty" rule in [`FileStorage::save`](crate::FileStorage::save) is only
/// reached by callers that store files directly.
fn convert_upload(raw: FieldValue) -> FieldValue {
    match raw {
        FieldValue::File(file) if file.size == 0 => FieldValue::Value(Value::Null),
        FieldValue::Value(v) if v.is_empty() => FieldValue::Value(Value::Null),
        other => other,
    }
}

fn check_upload(core: &WidgetCore, default_group: &str, value: &FieldValue) -> Vec<String> {
    match value {
        v if v.is_empty() => {
            if core.required && saved_path(core).is_none() {
                vec![format!(" {} cannot be empty.", core.name)]
            } else {
                Vec::new()
            }
        }
        FieldValue::Value(_) => vec![format!(" {} is invalid: data type is unknown.", core.name)],
        FieldValue::File(file) => {
            let name = file.name.to_lowercase();
            let supported = accepted(core, default_group)
                .iter()
                .any(|ext| name.len() > ext.len() && name.ends_with(&ext.to_lowercase()));
            if supported {
                Vec::new()
            } else {
                vec![format!(
                    " The selected file: {} type is not supported.",
                    file.name
                )]
            }
        }
    }
}

fn render_upload(core: &WidgetCore, default_group: &str) -> String {
    let name = core.html_name();
    let mut flags = String::new();
    if core.required {
        flags.push_str(" required");
    }
    if core.disabled {
        flags.push_str(" disabled");
    }
    let saved = saved_path(core).map_or_else(String::new, |path| {
        format!("<small class=\"file\" id=\"{name}\">saved file: {}</small>", escape(path))
    });
    format!(
        "<input type=\"file\" name=\"{name}\" id=\"{name}\"{flags} accept=\"{}\"{} />{}{saved}<br>\n",
        accepted(core, default_group).join(", "),
        extra_attrs_html(core),
        required_marker(core),
    )
}

impl Widget for FileWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::File
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Ok(convert_upload(raw))
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        check_upload(&self.core, "document/*", value)
    }

    fn render_input(&self) -> String {
        render_upload(&self.core, "document/*")
    }

    /// The saved path stays until the model form replaces it.
    fn record(&mut self, _value: &FieldValue) {}
}

impl ImageWidget {
    /// An `<img>` tag showing the saved image, if there is one.
    pub fn preview(&self) -> Option<String> {
        saved_path(&self.core).map(|path| format!("<img src=\"{}\" alt=\"Image\">", escape(path)))
    }
}

impl Widget for ImageWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Image
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Ok(convert_upload(raw))
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        check_upload(&self.core, "image/*", value)
    }

    fn render_input(&self) -> String {
        render_upload(&self.core, "image/*")
    }

    fn record(&mut self, _value: &FieldValue) {}
}
