//! Choice widgets: select and checkbox.

use miniform_core::utils::html::escape;
use miniform_db::Value;

use super::{
    extra_attrs_html, input_tag, required_marker, widget_accessors, widget_struct, FieldValue,
    Widget, WidgetKind,
};

widget_struct!(
    /// A `<select>` over the widget's options.
    ///
    /// Submitted values must be one of the option keys.
    SelectWidget
);

widget_struct!(
    /// A checkbox holding a boolean.
    CheckboxWidget
);

impl SelectWidget {
    fn render_options(&self) -> String {
        let core = &self.core;
        if core.options.is_empty() {
            return String::new();
        }
        let selected = core.value.to_form_string();
        let mut html = format!(
            "\n<optgroup label=\"{}\">\n<option value=\"\" hidden>---select---</option>\n",
            escape(&core.label)
        );
        for (key, visible) in &core.options {
            html.push_str(&format!(
                "<option value=\"{}\"{}>{}</option>\n",
                escape(key),
                if *key == selected { " selected" } else { "" },
                escape(visible),
            ));
        }
        html.push_str("</optgroup>\n");
        html
    }
}

impl Widget for SelectWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Select
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        if value.is_empty() {
            return if self.core.required {
                vec![" Field cannot be empty".to_string()]
            } else {
                Vec::new()
            };
        }
        if self.core.has_option(&value.text()) {
            Vec::new()
        } else {
            vec![format!(" Invalid value for {}", self.core.name)]
        }
    }

    /// Selects are read-only through a class; the browser ignores the
    /// `readonly` attribute on them.
    fn render_input(&self) -> String {
        let core = &self.core;
        let name = core.html_name();
        let mut flags = String::new();
        if core.readonly {
            flags.push_str(" class=\"readonly\"");
        }
        if core.required {
            flags.push_str(" required");
        }
        if core.disabled {
            flags.push_str(" disabled");
        }
        format!(
            "<select name=\"{name}\" id=\"{name}\"{flags}{}>{}</select>{}<br>\n",
            extra_attrs_html(core),
            self.render_options(),
            required_marker(core),
        )
    }
}

fn truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

impl CheckboxWidget {
    fn checked(&self) -> bool {
        self.core.value.as_bool().unwrap_or(false)
    }
}

impl Widget for CheckboxWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Checkbox
    }

    /// Browsers omit unchecked boxes, so anything but a truthy word is
    /// `false`.
    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        let checked = match &raw {
            FieldValue::Value(Value::String(s)) => truthy(s),
            FieldValue::Value(v) => v.as_bool().unwrap_or(false),
            FieldValue::File(_) => false,
        };
        Ok(FieldValue::Value(Value::Bool(checked)))
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        let checked = value.as_value().and_then(Value::as_bool).unwrap_or(false);
        if self.core.required && !checked {
            vec![format!(" {} cannot be empty.", self.core.name)]
        } else {
            Vec::new()
        }
    }

    fn render_input(&self) -> String {
        let checked = if self.checked() { " checked" } else { "" };
        input_tag(&self.core, self.kind().html_type(), checked, "")
    }

    fn dict_value(&self) -> serde_json::Value {
        serde_json::Value::Bool(self.checked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::WidgetCore;

    fn colors() -> SelectWidget {
        SelectWidget::new(
            WidgetCore::new("color")
                .label("Color")
                .options([("r", "Red"), ("g", "Green")]),
        )
    }

    #[test]
    fn test_select_render() {
        let widget = SelectWidget::new(
            WidgetCore::new("color")
                .label("Color")
                .required()
                .readonly()
                .value("g")
                .options([("r", "Red"), ("g", "Green")]),
        );
        assert_eq!(
            widget.render_input(),
            "<select name=\"color\" id=\"color\" class=\"readonly\" required>\n\
             <optgroup label=\"Color\">\n\
             <option value=\"\" hidden>---select---</option>\n\
             <option value=\"r\">Red</option>\n\
             <option value=\"g\" selected>Green</option>\n\
             </optgroup>\n\
             </select> <em>*</em><br>\n"
        );
    }

    #[test]
    fn test_select_without_options() {
        let widget = SelectWidget::named("color");
        assert_eq!(
            widget.render_input(),
            "<select name=\"color\" id=\"color\"></select><br>\n"
        );
    }

    #[test]
    fn test_select_validation() {
        let mut widget = colors();
        assert_eq!(widget.clean(FieldValue::from("r")), Some(FieldValue::from("r")));
        assert!(widget.render_input().contains("<option value=\"r\" selected>"));

        assert!(widget.clean(FieldValue::from("b")).is_none());
        assert_eq!(widget.errors(), [" Invalid value for color"]);

        assert_eq!(
            widget.clean(FieldValue::from("")),
            Some(FieldValue::Value(Value::Null))
        );
    }

    #[test]
    fn test_select_required() {
        let mut widget = SelectWidget::new(WidgetCore::new("color").required().options([("r", "Red")]));
        assert!(widget.clean(FieldValue::from("")).is_none());
        assert_eq!(widget.errors(), [" Field cannot be empty"]);
    }

    #[test]
    fn test_select_integer_value_matches_key() {
        let mut widget = SelectWidget::new(WidgetCore::new("owner").options([("1", "Ann"), ("2", "Bob")]));
        assert!(widget.validate(&FieldValue::Value(Value::Int(2))));
        assert!(widget.render_input().contains("<option value=\"2\" selected>Bob</option>"));
    }

    #[test]
    fn test_select_dict_options() {
        let widget = colors();
        assert_eq!(
            widget.to_dict(),
            serde_json::json!({
                "color": {
                    "type": "select",
                    "name": "color",
                    "label": "Color",
                    "value": "",
                    "attrs": {},
                    "options": {"r": "Red", "g": "Green"}
                }
            })
        );
    }

    #[test]
    fn test_checkbox_convert() {
        let widget = CheckboxWidget::named("active");
        for (raw, expected) in [("on", true), ("TRUE", true), ("1", true), ("yes", true), ("off", false), ("", false)] {
            assert_eq!(
                widget.convert(FieldValue::from(raw)).unwrap(),
                FieldValue::Value(Value::Bool(expected)),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_checkbox_render() {
        let mut widget = CheckboxWidget::named("active");
        assert_eq!(
            widget.render_input(),
            "<input type=\"checkbox\" name=\"active\" id=\"active\" /><br>\n"
        );
        widget.clean(FieldValue::from("on"));
        assert_eq!(
            widget.render_input(),
            "<input type=\"checkbox\" name=\"active\" id=\"active\" checked /><br>\n"
        );
        assert_eq!(widget.to_dict()["active"]["value"], true);
    }

    #[test]
    fn test_checkbox_required() {
        let mut widget = CheckboxWidget::new(WidgetCore::new("terms").required());
        assert!(widget.clean(FieldValue::from("")).is_none());
        assert_eq!(widget.errors(), [" terms cannot be empty."]);
        assert!(widget.clean(FieldValue::from("on")).is_some());
    }
}
