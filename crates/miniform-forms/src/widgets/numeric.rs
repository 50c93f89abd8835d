//! Numeric widgets: integer, float, and range.

use miniform_db::Value;

use super::{bound_text, widget_accessors, widget_struct, FieldValue, Widget, WidgetCore, WidgetKind};

/// Script that shows a value bubble next to every `input[type="range"]`.
///
/// Serve it alongside pages that render a [`RangeWidget`].
pub const RANGE_JS: &str = include_str!("../../static/js/range.js");

widget_struct!(
    /// A whole-number input.
    IntegerWidget
);

widget_struct!(
    /// A decimal-number input.
    FloatWidget
);

widget_struct!(
    /// A slider. Validates like [`FloatWidget`] but also accepts whole numbers.
    RangeWidget
);

fn parse_attr<T: std::str::FromStr>(core: &WidgetCore, key: &str) -> Option<T> {
    core.attr_value(key).and_then(|v| v.trim().parse().ok())
}

fn convert_number(raw: FieldValue, parse: impl Fn(&str) -> Option<Value>) -> FieldValue {
    match raw {
        FieldValue::Value(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                FieldValue::Value(Value::Null)
            } else {
                // Unparseable input is kept as text so the pattern rule reports it.
                FieldValue::Value(parse(trimmed).unwrap_or(Value::String(s)))
            }
        }
        other => other,
    }
}

fn float_text(f: f64) -> String {
    Value::Float(f).to_form_string()
}

/// Rules shared by float and range inputs.
fn check_float(core: &WidgetCore, kind: WidgetKind, value: &FieldValue) -> Vec<String> {
    if value.is_empty() {
        return if core.required {
            vec![" Field cannot be empty.".to_string()]
        } else {
            Vec::new()
        };
    }

    let mut errors = Vec::new();
    let min: Option<f64> = parse_attr(core, "min");
    let max: Option<f64> = parse_attr(core, "max");
    if let Some(n) = value.as_value().and_then(Value::as_f64) {
        if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
            errors.push(format!(
                " Length must be between {} and {}",
                bound_text(min.map(float_text)),
                bound_text(max.map(float_text)),
            ));
        }
    }

    let text = value.text();
    let min_len = core.attr_usize("minlength", 0);
    let max_len = core.attr_usize("maxlength", 256);
    let len = text.chars().count();
    if len < min_len || len > max_len {
        errors.push(format!("Length must be between {min_len} and {max_len} chars"));
    }
    if kind.regex().is_some_and(|re| !re.is_match(&text)) {
        errors.push("Invalid format".to_string());
    }
    errors
}

impl Widget for IntegerWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Integer
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Ok(convert_number(raw, |s| s.parse::<i64>().ok().map(Value::Int)))
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        if value.is_empty() {
            return if self.core.required {
                vec![" Field cannot be empty.".to_string()]
            } else {
                Vec::new()
            };
        }

        let mut errors = Vec::new();
        let min: Option<i64> = parse_attr(&self.core, "min");
        let max: Option<i64> = parse_attr(&self.core, "max");
        if let Some(n) = value.as_value().and_then(Value::as_i64) {
            if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                errors.push(format!(
                    " Field must be greater than {} and less than {}",
                    bound_text(min),
                    bound_text(max),
                ));
            }
        }

        let text = value.text();
        let min_len = self.core.attr_usize("minlength", 0);
        let max_len = self.core.attr_usize("maxlength", 256);
        let len = text.chars().count();
        if len < min_len || len > max_len {
            errors.push(format!(
                " The number of characters must be greater than {min_len} and less than {max_len}"
            ));
        }
        // Text that survived conversion did not fit an i64, even when it is all digits.
        let unparsed = matches!(value.as_value(), Some(Value::String(_)));
        if unparsed || self.kind().regex().is_some_and(|re| !re.is_match(&text)) {
            errors.push(" Value does not meet requirements.".to_string());
        }
        errors
    }
}

fn parse_float(s: &str) -> Option<Value> {
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

impl Widget for FloatWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Float
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Ok(convert_number(raw, parse_float))
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        check_float(&self.core, self.kind(), value)
    }
}

impl Widget for RangeWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Range
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Ok(convert_number(raw, parse_float))
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        check_float(&self.core, self.kind(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(widget: &mut dyn Widget, raw: &str) -> Option<FieldValue> {
        widget.clean(FieldValue::from(raw))
    }

    #[test]
    fn test_integer_convert() {
        let widget = IntegerWidget::named("age");
        assert_eq!(
            widget.convert(FieldValue::from(" 42 ")).unwrap(),
            FieldValue::Value(Value::Int(42))
        );
        assert_eq!(
            widget.convert(FieldValue::from("")).unwrap(),
            FieldValue::Value(Value::Null)
        );
        assert_eq!(
            widget.convert(FieldValue::from("4.5")).unwrap(),
            FieldValue::from("4.5")
        );
    }

    #[test]
    fn test_integer_valid() {
        let mut widget = IntegerWidget::new(WidgetCore::new("age").attr("min", 0).attr("max", 150));
        assert_eq!(clean(&mut widget, "42"), Some(FieldValue::Value(Value::Int(42))));
        assert_eq!(widget.core().value, Value::Int(42));
    }

    #[test]
    fn test_integer_range() {
        let mut widget = IntegerWidget::new(WidgetCore::new("age").attr("min", 18));
        assert!(clean(&mut widget, "7").is_none());
        assert_eq!(
            widget.errors(),
            [" Field must be greater than 18 and less than None"]
        );
    }

    #[test]
    fn test_integer_not_a_number() {
        let mut widget = IntegerWidget::named("age");
        assert!(clean(&mut widget, "abc").is_none());
        assert_eq!(widget.errors(), [" Value does not meet requirements."]);
    }

    #[test]
    fn test_integer_out_of_range() {
        let mut widget = IntegerWidget::named("count");
        assert!(clean(&mut widget, "99999999999999999999").is_none());
        assert_eq!(widget.errors(), [" Value does not meet requirements."]);

        let mut widget = IntegerWidget::named("count");
        assert_eq!(
            clean(&mut widget, "-9223372036854775808"),
            Some(FieldValue::Value(Value::Int(i64::MIN)))
        );
    }

    #[test]
    fn test_integer_length() {
        let mut widget = IntegerWidget::new(WidgetCore::new("pin").attr("maxlength", 4));
        assert!(clean(&mut widget, "123456").is_none());
        assert_eq!(
            widget.errors(),
            [" The number of characters must be greater than 0 and less than 4"]
        );
    }

    #[test]
    fn test_integer_required() {
        let mut widget = IntegerWidget::new(WidgetCore::new("age").required());
        assert!(clean(&mut widget, "").is_none());
        assert_eq!(widget.errors(), [" Field cannot be empty."]);

        let mut optional = IntegerWidget::named("age");
        assert_eq!(clean(&mut optional, ""), Some(FieldValue::Value(Value::Null)));
    }

    #[test]
    fn test_integer_render() {
        let widget = IntegerWidget::new(WidgetCore::new("age").value(7).attr("min", 1));
        assert_eq!(
            widget.render_input(),
            "<input type=\"number\" name=\"age\" id=\"age\" value=\"7\" min=\"1\" /><br>\n"
        );
    }

    #[test]
    fn test_float_valid() {
        let mut widget = FloatWidget::new(WidgetCore::new("price").attr("min", 0));
        assert_eq!(clean(&mut widget, "9.99"), Some(FieldValue::Value(Value::Float(9.99))));
        // Whole numbers are shown with a trailing `.0` and still match.
        assert!(clean(&mut widget, "3").is_some());
    }

    #[test]
    fn test_float_bounds_message() {
        let mut widget = FloatWidget::new(WidgetCore::new("price").attr("min", 1).attr("max", 2.5));
        assert!(clean(&mut widget, "3.5").is_none());
        assert_eq!(widget.errors(), [" Length must be between 1.0 and 2.5"]);
    }

    #[test]
    fn test_float_invalid_format() {
        let mut widget = FloatWidget::named("price");
        assert!(clean(&mut widget, "1,5").is_none());
        assert_eq!(widget.errors(), ["Invalid format"]);
        assert!(clean(&mut widget, "nan").is_none());
    }

    #[test]
    fn test_float_length() {
        let mut widget = FloatWidget::new(WidgetCore::new("price").attr("maxlength", 3));
        assert!(clean(&mut widget, "12.25").is_none());
        assert_eq!(widget.errors(), ["Length must be between 0 and 3 chars"]);
    }

    #[test]
    fn test_float_required() {
        let mut widget = FloatWidget::new(WidgetCore::new("price").required());
        assert!(clean(&mut widget, "").is_none());
        assert_eq!(widget.errors(), [" Field cannot be empty."]);
    }

    #[test]
    fn test_range() {
        let mut widget = RangeWidget::new(
            WidgetCore::new("level")
                .attr("min", 0)
                .attr("max", 10)
                .attr("step", 0.5),
        );
        assert!(clean(&mut widget, "5").is_some());
        assert!(clean(&mut widget, "11").is_none());
        assert_eq!(widget.errors(), [" Length must be between 0.0 and 10.0"]);
        assert!(widget
            .render_input()
            .starts_with("<input type=\"range\" name=\"level\" id=\"level\" value=\"11.0\" max=\"10\" min=\"0\" step=\"0.5\""));
    }

    #[test]
    fn test_range_script_bundled() {
        assert!(RANGE_JS.contains("input[type=\"range\"]"));
        assert!(RANGE_JS.contains("range-bubble"));
    }
}
