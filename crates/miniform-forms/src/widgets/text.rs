//! Free-text widgets: text, text area, email, and password.

use miniform_core::utils::html::escape;
use miniform_core::utils::text::allowed_specials;
use miniform_db::Value;

use super::{
    extra_attrs_html, flag_attrs, input_tag, required_marker, widget_accessors, widget_struct,
    FieldValue, Widget, WidgetCore, WidgetKind,
};

widget_struct!(
    /// A single-line text input.
    TextWidget
);

widget_struct!(
    /// A multi-line `<textarea>`.
    TextAreaWidget
);

widget_struct!(
    /// An email input.
    EmailWidget
);

widget_struct!(
    /// A password input. The value is never rendered or reported.
    PasswordWidget
);

/// Length and character rules shared by text and text area.
fn check_text(core: &WidgetCore, kind: WidgetKind, value: &FieldValue) -> Vec<String> {
    let mut errors = Vec::new();
    let text = value.text();
    if text.is_empty() {
        if core.required {
            errors.push(" Field cannot be empty".to_string());
        }
        return errors;
    }

    let min = core.attr_usize("minlength", 0);
    let max = core.attr_usize("maxlength", 256);
    let len = text.chars().count();
    if len < min || len > max {
        errors.push(format!(
            " The value must be longer than {min} and shorter than {max}."
        ));
    }
    if let (Some(re), Some(pattern)) = (kind.regex(), kind.pattern()) {
        if !re.is_match(&text) {
            errors.push(format!(
                " Field value contains invalid characters. Use letters, numbers and {}",
                allowed_specials(pattern)
            ));
        }
    }
    errors
}

impl Widget for TextWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Text
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        check_text(&self.core, self.kind(), value)
    }
}

impl Widget for TextAreaWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::TextArea
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        check_text(&self.core, self.kind(), value)
    }

    fn render_input(&self) -> String {
        let core = &self.core;
        let name = core.html_name();
        format!(
            "<textarea name=\"{name}\" id=\"{name}\"{}{}>{}</textarea>{}<br>\n",
            flag_attrs(core),
            extra_attrs_html(core),
            escape(&core.value.to_form_string()),
            required_marker(core),
        )
    }
}

impl Widget for EmailWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Email
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        let text = value.text();
        if text.is_empty() {
            return if self.core.required {
                vec![" Field cannot be empty".to_string()]
            } else {
                Vec::new()
            };
        }
        match self.kind().regex() {
            Some(re) if !re.is_match(&text) => {
                vec![" The value does not meet the requirements for an email address.".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

impl PasswordWidget {
    /// Effective `(min, max)` length: `minlength` defaults to 4 when the
    /// field is required and 0 otherwise, `maxlength` to 128.
    pub fn length_bounds(&self) -> (usize, usize) {
        let min_default = if self.core.required { 4 } else { 0 };
        (
            self.core.attr_usize("minlength", min_default),
            self.core.attr_usize("maxlength", 128),
        )
    }
}

impl Widget for PasswordWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Password
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        let text = value.text();
        if text.is_empty() {
            return if self.core.required {
                vec![" Value cannot be empty".to_string()]
            } else {
                Vec::new()
            };
        }

        let mut errors = Vec::new();
        let (min, max) = self.length_bounds();
        let len = text.chars().count();
        if len < min || len > max {
            errors.push(format!(
                " Content should be longer than {min} and shorter than {max}."
            ));
        }
        if let (Some(re), Some(pattern)) = (self.kind().regex(), self.kind().pattern()) {
            if !re.is_match(&text) {
                errors.push(format!(
                    " Contains invalid characters. Use letters, numbers and {}",
                    allowed_specials(pattern)
                ));
            }
        }
        errors
    }

    fn render_input(&self) -> String {
        input_tag(&self.core, self.kind().html_type(), "", "")
    }

    fn dict_value(&self) -> serde_json::Value {
        serde_json::Value::String(String::new())
    }

    /// Submitted passwords are not kept for re-rendering.
    fn record(&mut self, _value: &FieldValue) {
        self.core.value = Value::Null;
    }
}
