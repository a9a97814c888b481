//! Field type coercion and document validation

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};

use crate::error::ValidationError;
use crate::schema::{FieldConfig, FieldType, FlattenedSchema};

/// Default marker asking for the current timestamp on date fields
pub const NOW_DEFAULT: &str = "now";

/// Coerce `value` to the field's declared type.
///
/// Returns the normalized value: numeric strings become numbers and dates
/// become RFC 3339 strings.
pub fn coerce(path: &str, config: &FieldConfig, value: &Value) -> Result<Value, ValidationError> {
    match config.field_type {
        FieldType::Number => coerce_number(path, value),
        FieldType::String => match value {
            Value::String(s) => {
                if !config.enum_values.is_empty() && !config.enum_values.iter().any(|e| e == s) {
                    return Err(ValidationError::invalid(
                        path,
                        format!("must be one of [{}]", config.enum_values.join(", ")),
                    ));
                }
                Ok(value.clone())
            }
            _ => Err(ValidationError::invalid(path, "expected a string")),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(ValidationError::invalid(path, "expected a boolean")),
        },
        FieldType::Array => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(ValidationError::invalid(path, "expected an array")),
        },
        FieldType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(ValidationError::invalid(path, "expected an object")),
        },
        FieldType::Date => coerce_date(path, value),
    }
}

fn coerce_number(path: &str, value: &Value) -> Result<Value, ValidationError> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(value.clone()),
            _ => Err(ValidationError::invalid(path, "expected a finite number")),
        },
        Value::String(s) => {
            let trimmed = s.trim();
            let parsed = trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| !trimmed.is_empty() && f.is_finite())
                .ok_or_else(|| ValidationError::invalid(path, format!("'{}' is not a number", s)))?;
            if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
                return Ok(Value::from(parsed as i64));
            }
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| ValidationError::invalid(path, format!("'{}' is not a number", s)))
        }
        _ => Err(ValidationError::invalid(path, "expected a number")),
    }
}

fn coerce_date(path: &str, value: &Value) -> Result<Value, ValidationError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => parse_date(s)
            .map(|d| Value::String(d.to_rfc3339()))
            .ok_or_else(|| ValidationError::invalid(path, format!("'{}' is not a valid date", s))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|d| Value::String(d.to_rfc3339()))
            .ok_or_else(|| ValidationError::invalid(path, "timestamp out of range")),
        _ => Err(ValidationError::invalid(path, "expected a date")),
    }
}

/// Parse RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Value injected for a missing field, if any
fn default_for(config: &FieldConfig) -> Option<Value> {
    match (&config.default, config.field_type) {
        (Some(Value::String(s)), FieldType::Date) if s == NOW_DEFAULT => {
            Some(Value::String(Utc::now().to_rfc3339()))
        }
        (Some(value), _) => Some(value.clone()),
        (None, FieldType::Date) => Some(Value::String(Utc::now().to_rfc3339())),
        (None, _) => None,
    }
}

/// Validate a whole document against a flattened schema.
///
/// Injects defaults for missing fields and writes coerced values back in
/// place. Every failure is collected.
pub fn validate_document(
    flattened: &FlattenedSchema,
    doc: &mut Map<String, Value>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (path, config) in flattened {
        let segments: Vec<&str> = path.split('.').collect();
        match lookup(doc, &segments) {
            Some(value) => match coerce(path, config, value) {
                Ok(coerced) => insert(doc, &segments, coerced),
                Err(e) => errors.push(e),
            },
            None => match default_for(config) {
                Some(value) => insert(doc, &segments, value),
                None if config.required => errors.push(ValidationError::MissingField(path.clone())),
                None => {}
            },
        }
    }

    errors
}

fn lookup<'a>(doc: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = doc.get(*first)?;
    for segment in rest {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

fn insert(doc: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = doc;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_coercion() {
        let config = FieldConfig::new(FieldType::Number);
        assert_eq!(coerce("n", &config, &json!(3)).unwrap(), json!(3));
        assert_eq!(coerce("n", &config, &json!("42")).unwrap(), json!(42));
        assert_eq!(coerce("n", &config, &json!(" 2.5 ")).unwrap(), json!(2.5));
        assert!(coerce("n", &config, &json!("abc")).is_err());
        assert!(coerce("n", &config, &json!("NaN")).is_err());
        assert!(coerce("n", &config, &json!("")).is_err());
        assert!(coerce("n", &config, &json!(true)).is_err());
    }

    #[test]
    fn test_string_enum() {
        let config = FieldConfig::new(FieldType::String).with_enum(&["pending", "done"]);
        assert!(coerce("status", &config, &json!("done")).is_ok());
        let err = coerce("status", &config, &json!("cancelled")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_date_coercion() {
        let config = FieldConfig::new(FieldType::Date);
        assert_eq!(coerce("d", &config, &Value::Null).unwrap(), Value::Null);
        assert_eq!(
            coerce("d", &config, &json!("2024-03-01")).unwrap(),
            json!("2024-03-01T00:00:00+00:00")
        );
        assert!(coerce("d", &config, &json!("2024-03-01T10:00:00Z")).is_ok());
        assert!(coerce("d", &config, &json!(1_700_000_000_000i64)).is_ok());
        assert!(coerce("d", &config, &json!("not a date")).is_err());
        assert!(coerce("d", &config, &json!(["2024-03-01"])).is_err());
    }

    #[test]
    fn test_literal_types() {
        assert!(coerce("a", &FieldConfig::new(FieldType::Array), &json!("x")).is_err());
        assert!(coerce("a", &FieldConfig::new(FieldType::Array), &json!([1])).is_ok());
        assert!(coerce("o", &FieldConfig::new(FieldType::Object), &json!([])).is_err());
        assert!(coerce("o", &FieldConfig::new(FieldType::Object), &json!({})).is_ok());
        assert!(coerce("b", &FieldConfig::new(FieldType::Boolean), &json!("true")).is_err());
    }

    #[test]
    fn test_validate_document_injects_defaults() {
        let mut flattened = FlattenedSchema::new();
        flattened.insert(
            "status".to_string(),
            FieldConfig::new(FieldType::String).with_default(json!("pending")),
        );
        flattened.insert(
            "meta.createdOn".to_string(),
            FieldConfig::new(FieldType::Date).required(),
        );
        flattened.insert(
            "count".to_string(),
            FieldConfig::new(FieldType::Number),
        );

        let mut doc = json!({"count": "7"}).as_object().cloned().unwrap();
        let errors = validate_document(&flattened, &mut doc);
        assert!(errors.is_empty());
        assert_eq!(doc["status"], json!("pending"));
        assert_eq!(doc["count"], json!(7));
        assert!(doc["meta"]["createdOn"].is_string());
    }

    #[test]
    fn test_optional_date_without_default_is_stamped() {
        let mut flattened = FlattenedSchema::new();
        flattened.insert("dueOn".to_string(), FieldConfig::new(FieldType::Date));
        flattened.insert("note".to_string(), FieldConfig::new(FieldType::String));

        let mut doc = Map::new();
        let errors = validate_document(&flattened, &mut doc);
        assert!(errors.is_empty());
        let stamped = doc["dueOn"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok());
        assert!(!doc.contains_key("note"));
    }

    #[test]
    fn test_validate_document_reports_missing_required() {
        let mut flattened = FlattenedSchema::new();
        flattened.insert(
            "name".to_string(),
            FieldConfig::new(FieldType::String).required(),
        );
        let mut doc = Map::new();
        let errors = validate_document(&flattened, &mut doc);
        assert_eq!(errors, vec![ValidationError::MissingField("name".to_string())]);
    }
}
