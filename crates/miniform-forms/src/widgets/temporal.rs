//! Date and time widgets.
//!
//! Bounds come from the `min`/`max` extra attributes, written in the same
//! format the browser submits.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use miniform_db::Value;

use super::{widget_accessors, widget_struct, FieldValue, Widget, WidgetCore, WidgetKind};

widget_struct!(
    /// A time-of-day input (`HH:MM[:SS]`).
    TimeWidget
);

widget_struct!(
    /// A calendar date input (`YYYY-MM-DD`).
    DateWidget
);

widget_struct!(
    /// A local date-time input (`YYYY-MM-DDTHH:MM[:SS]`).
    DateTimeWidget
);

#[derive(Clone, Copy)]
enum Moment {
    Time,
    Date,
    DateTime,
}

impl Moment {
    fn parse(self, s: &str) -> Option<Value> {
        match self {
            Self::Time => ["%H:%M:%S%.f", "%H:%M"]
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
                .map(Value::Time),
            Self::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date),
            Self::DateTime => [
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%dT%H:%M",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%d %H:%M",
            ]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Value::DateTime),
        }
    }

    fn format_error(self, s: &str) -> String {
        match self {
            Self::Time => format!("Invalid time format: {s}. Expected 'HH:MM:SS'."),
            Self::Date => format!("Invalid date format: {s}. Expected 'YYYY-MM-DD'."),
            Self::DateTime => {
                format!("Invalid datetime format: {s}. Expected 'YYYY-MM-DDTHH:MM:SS'.")
            }
        }
    }

    fn convert(self, raw: FieldValue) -> Result<FieldValue, String> {
        match raw {
            FieldValue::Value(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(FieldValue::Value(Value::Null));
                }
                self.parse(trimmed)
                    .map(FieldValue::Value)
                    .ok_or_else(|| self.format_error(trimmed))
            }
            FieldValue::File(file) => Err(self.format_error(&file.name)),
            other => Ok(other),
        }
    }

    fn bound(self, core: &WidgetCore, key: &str) -> Result<Option<Value>, String> {
        match core.attr_value(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => self.parse(s).map(Some).ok_or_else(|| self.format_error(s)),
        }
    }

    fn check(self, core: &WidgetCore, value: &FieldValue, empty_message: String) -> Vec<String> {
        let Some(value) = value.as_value().filter(|v| !v.is_empty()) else {
            return if core.required {
                vec![empty_message]
            } else {
                Vec::new()
            };
        };

        let bounds = self
            .bound(core, "min")
            .and_then(|min| self.bound(core, "max").map(|max| (min, max)));
        let (min, max) = match bounds {
            Ok(bounds) => bounds,
            Err(e) => return vec![format!("Invalid range values: {e}")],
        };

        let mut errors = Vec::new();
        if let Some(min) = min {
            if compare(value, &min) == Some(Ordering::Less) {
                errors.push(format!(" Value must be after {}", min.to_form_string()));
            }
        }
        if let Some(max) = max {
            if compare(value, &max) == Some(Ordering::Greater) {
                errors.push(format!(" Value must be before {}", max.to_form_string()));
            }
        }
        errors
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl Widget for TimeWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Time
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Moment::Time.convert(raw)
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        Moment::Time.check(&self.core, value, format!("{} cannot be empty", self.core.name))
    }
}

impl Widget for DateWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::Date
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Moment::Date.convert(raw)
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        Moment::Date.check(&self.core, value, " Field cannot be empty".to_string())
    }
}

impl Widget for DateTimeWidget {
    widget_accessors!();

    fn kind(&self) -> WidgetKind {
        WidgetKind::DateTime
    }

    fn convert(&self, raw: FieldValue) -> Result<FieldValue, String> {
        Moment::DateTime.convert(raw)
    }

    fn check(&self, value: &FieldValue) -> Vec<String> {
        Moment::DateTime.check(&self.core, value, " Field cannot be empty".to_string())
    }

    /// Browsers expect the `T` separator in `datetime-local` values.
    fn input_text(&self) -> String {
        match &self.core.value {
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            other => other.to_form_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_convert() {
        let widget = DateWidget::named("born");
        assert_eq!(
            widget.convert(FieldValue::from("2024-02-29")).unwrap(),
            FieldValue::Value(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(
            widget.convert(FieldValue::from("2023-02-29")).unwrap_err(),
            "Invalid date format: 2023-02-29. Expected 'YYYY-MM-DD'."
        );
        assert_eq!(
            widget.convert(FieldValue::from("")).unwrap(),
            FieldValue::Value(Value::Null)
        );
    }

    #[test]
    fn test_date_clean_records_bad_input() {
        let mut widget = DateWidget::named("born");
        assert!(widget.clean(FieldValue::from("yesterday")).is_none());
        assert_eq!(
            widget.errors(),
            ["Invalid date format: yesterday. Expected 'YYYY-MM-DD'."]
        );
        assert!(widget.render().contains("value=\"yesterday\""));
    }

    #[test]
    fn test_date_bounds() {
        let mut widget = DateWidget::new(
            WidgetCore::new("born")
                .attr("min", "2000-01-01")
                .attr("max", "2010-12-31"),
        );
        assert!(widget.clean(FieldValue::from("2005-06-15")).is_some());
        assert!(widget.clean(FieldValue::from("1999-12-31")).is_none());
        assert_eq!(widget.errors(), [" Value must be after 2000-01-01"]);
        assert!(widget.clean(FieldValue::from("2011-01-01")).is_none());
        assert_eq!(widget.errors(), [" Value must be before 2010-12-31"]);
    }

    #[test]
    fn test_date_bad_bounds() {
        let mut widget = DateWidget::new(WidgetCore::new("born").attr("min", "soon"));
        assert!(widget.clean(FieldValue::from("2005-06-15")).is_none());
        assert_eq!(
            widget.errors(),
            ["Invalid range values: Invalid date format: soon. Expected 'YYYY-MM-DD'."]
        );
    }

    #[test]
    fn test_date_required() {
        let mut widget = DateWidget::new(WidgetCore::new("born").required());
        assert!(widget.clean(FieldValue::from("")).is_none());
        assert_eq!(widget.errors(), [" Field cannot be empty"]);
    }

    #[test]
    fn test_time() {
        let mut widget = TimeWidget::new(
            WidgetCore::new("opens")
                .required()
                .attr("min", "08:00")
                .attr("max", "18:30:00"),
        );
        assert_eq!(
            widget.clean(FieldValue::from("09:15")),
            Some(FieldValue::Value(Value::Time(NaiveTime::from_hms_opt(9, 15, 0).unwrap())))
        );
        assert!(widget.render_input().contains("value=\"09:15:00\""));
        assert!(widget.clean(FieldValue::from("07:59:59")).is_none());
        assert_eq!(widget.errors(), [" Value must be after 08:00:00"]);
        assert!(widget.clean(FieldValue::from("")).is_none());
        assert_eq!(widget.errors(), ["opens cannot be empty"]);
        assert!(widget.clean(FieldValue::from("25:00")).is_none());
        assert_eq!(
            widget.errors(),
            ["Invalid time format: 25:00. Expected 'HH:MM:SS'."]
        );
    }

    #[test]
    fn test_datetime() {
        let mut widget = DateTimeWidget::new(WidgetCore::new("starts").attr("max", "2030-01-01T00:00"));
        let value = widget.clean(FieldValue::from("2025-05-01T10:30")).unwrap();
        assert_eq!(value.text(), "2025-05-01 10:30:00");
        assert_eq!(
            widget.render_input(),
            "<input type=\"datetime-local\" name=\"starts\" id=\"starts\" value=\"2025-05-01T10:30:00\" max=\"2030-01-01T00:00\" /><br>\n"
        );
        assert_eq!(widget.to_dict()["starts"]["value"], "2025-05-01 10:30:00");

        assert!(widget.clean(FieldValue::from("2031-01-01 00:00:00")).is_none());
        assert_eq!(widget.errors(), [" Value must be before 2030-01-01 00:00:00"]);
    }

    #[test]
    fn test_datetime_bad_format() {
        let widget = DateTimeWidget::named("starts");
        assert_eq!(
            widget.convert(FieldValue::from("01/05/2025")).unwrap_err(),
            "Invalid datetime format: 01/05/2025. Expected 'YYYY-MM-DDTHH:MM:SS'."
        );
    }
}
