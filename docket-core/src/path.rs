//! Path-addressed partial updates
//!
//! A [`PathContext`] is the ordered rule table governing which dot paths of a
//! collection may be mutated and how. Declared rules come first, followed by
//! rules derived from every `allowUpdate` field of the flattened schema.
//! Evaluation is first match wins; derived rules whose pattern duplicates a
//! declared one are dropped when the context is built, so a path never has
//! two candidate rules with the same pattern.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::coerce::coerce;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::schema::{CollectionSchema, FieldType, FlattenedSchema, OperationKind};

/// Trailing segment marking an array element for removal
pub const REMOVE_MARKER: &str = "$remove";

const IDENT: &str = r"[A-Za-z_][A-Za-z0-9_]*";

/// Where a rule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    Declared,
    Derived,
}

/// A compiled update rule
#[derive(Debug, Clone)]
pub struct PathRule {
    pattern: String,
    matcher: Regex,
    pub operation: OperationKind,
    pub allowed_values: Vec<Value>,
    pub origin: RuleOrigin,
}

impl PathRule {
    /// Compile a rule. The pattern is anchored on both ends.
    pub fn new(
        pattern: &str,
        operation: OperationKind,
        allowed_values: Vec<Value>,
        origin: RuleOrigin,
    ) -> CoreResult<Self> {
        let matcher = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            CoreError::Pattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            operation,
            allowed_values,
            origin,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Capture groups when `path` matches
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        self.matcher.captures(path).map(|caps| {
            caps.iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().to_string())
                .collect()
        })
    }
}

/// Ordered rule table for one collection
#[derive(Debug, Clone, Default)]
pub struct PathContext {
    rules: Vec<PathRule>,
}

impl PathContext {
    /// Build the effective context: declared rules, then derived rules
    pub fn build(collection: &CollectionSchema, flattened: &FlattenedSchema) -> CoreResult<Self> {
        let mut rules = Vec::new();
        for def in &collection.rules {
            rules.push(PathRule::new(
                &def.pattern,
                def.operation,
                def.allowed_values.clone(),
                RuleOrigin::Declared,
            )?);
        }

        for (path, config) in flattened {
            if !config.allow_update {
                continue;
            }
            let field = regex::escape(path);
            let derived: Vec<(String, OperationKind)> = match config.field_type {
                FieldType::Array => vec![
                    (field.clone(), OperationKind::VectorAdd),
                    (
                        format!(r"{}\.(\d+)\.{}", field, regex::escape(REMOVE_MARKER)),
                        OperationKind::VectorRm,
                    ),
                    (format!(r"{}\.(\d+)", field), OperationKind::Scalar),
                    (
                        format!(r"{}\.(\d+)\.({}(?:\.{})*)", field, IDENT, IDENT),
                        OperationKind::Scalar,
                    ),
                ],
                FieldType::Object => vec![
                    (field.clone(), OperationKind::Scalar),
                    (
                        format!(r"{}\.({}(?:\.{})*)", field, IDENT, IDENT),
                        OperationKind::Scalar,
                    ),
                ],
                _ => vec![(field, OperationKind::Scalar)],
            };

            for (pattern, operation) in derived {
                if rules.iter().any(|r: &PathRule| r.pattern == pattern) {
                    continue;
                }
                rules.push(PathRule::new(&pattern, operation, Vec::new(), RuleOrigin::Derived)?);
            }
        }

        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<PathRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// First rule matching `path`, with its capture groups
    pub fn find(&self, path: &str) -> Option<(&PathRule, Vec<String>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.captures(path).map(|params| (rule, params)))
    }
}

/// A single `{path, value}` update as received from a client.
///
/// An explicit `null` value is present; only an absent key is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathUpdate {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl PathUpdate {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: Some(path.into()),
            value: Some(value),
        }
    }
}

/// An update that passed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedUpdate {
    pub path: String,
    pub value: Value,
    pub operation: OperationKind,
    pub context_path: String,
    pub context_params: Vec<String>,
}

/// Outcome of applying one update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AppliedResult {
    Scalar {
        path: String,
        value: Value,
    },
    VectorAdd {
        element: Value,
        index: usize,
    },
    VectorRm {
        #[serde(rename = "removedCount")]
        removed_count: usize,
        index: usize,
    },
}

/// Validate an update against a rule table and a flattened schema.
///
/// Type coercion applies to scalar updates whose path has a schema entry;
/// for object values each sub-field with an entry is coerced as well.
/// Vector operations carry elements, not whole arrays, and are not coerced.
pub fn validate(
    update: &PathUpdate,
    context: &PathContext,
    flattened: &FlattenedSchema,
) -> Result<ValidatedUpdate, ValidationError> {
    let path = match update.path.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Err(ValidationError::MissingField("path".to_string())),
    };
    let value = update
        .value
        .as_ref()
        .ok_or_else(|| ValidationError::MissingField("value".to_string()))?;

    let (rule, context_params) = context
        .find(path)
        .ok_or_else(|| ValidationError::NoMatchingPath(path.to_string()))?;

    if !rule.allowed_values.is_empty() && !rule.allowed_values.contains(value) {
        return Err(ValidationError::invalid(path, "value is not allowed"));
    }

    let mut value = value.clone();
    if rule.operation == OperationKind::Scalar {
        if let Some(config) = flattened.get(path) {
            value = coerce(path, config, &value)?;
        } else if let Value::Object(fields) = &mut value {
            for (key, field_value) in fields.iter_mut() {
                let sub_path = format!("{}.{}", path, key);
                if let Some(config) = flattened.get(&sub_path) {
                    *field_value = coerce(&sub_path, config, field_value)?;
                }
            }
        }
    }

    Ok(ValidatedUpdate {
        path: path.to_string(),
        value,
        operation: rule.operation,
        context_path: rule.pattern().to_string(),
        context_params,
    })
}

/// Apply a validated update to an entity in place
pub fn apply(entity: &mut Value, update: &ValidatedUpdate) -> Result<AppliedResult, ValidationError> {
    let path = update.path.as_str();
    let segments: Vec<&str> = path.split('.').collect();

    match update.operation {
        OperationKind::Scalar => {
            let target = slot(entity, &segments, path)?;
            match &update.value {
                Value::Object(fields) => {
                    if !target.is_object() {
                        *target = Value::Object(Map::new());
                    }
                    if let Value::Object(existing) = &mut *target {
                        for (key, value) in fields {
                            existing.insert(key.clone(), value.clone());
                        }
                    }
                }
                other => *target = other.clone(),
            }
            Ok(AppliedResult::Scalar {
                path: path.to_string(),
                value: target.clone(),
            })
        }
        OperationKind::VectorAdd => {
            let target = slot(entity, &segments, path)?;
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            match target {
                Value::Array(items) => {
                    items.push(update.value.clone());
                    Ok(AppliedResult::VectorAdd {
                        element: update.value.clone(),
                        index: items.len() - 1,
                    })
                }
                _ => Err(ValidationError::invalid(path, "target is not an array")),
            }
        }
        OperationKind::VectorRm => {
            let (index, parent) = match segments.split_last() {
                Some((last, rest)) if *last == REMOVE_MARKER => match rest.split_last() {
                    Some((index, parent)) if !parent.is_empty() => (*index, parent),
                    _ => return Err(ValidationError::invalid(path, "missing element index")),
                },
                _ => return Err(ValidationError::invalid(path, "missing removal marker")),
            };
            let index: usize = index
                .parse()
                .map_err(|_| ValidationError::invalid(path, "element index is not numeric"))?;

            match slot(entity, parent, path)? {
                Value::Array(items) if index < items.len() => {
                    items.remove(index);
                    Ok(AppliedResult::VectorRm {
                        removed_count: 1,
                        index,
                    })
                }
                Value::Array(items) => Err(ValidationError::invalid(
                    path,
                    format!("index {} out of range ({} elements)", index, items.len()),
                )),
                _ => Err(ValidationError::invalid(path, "target is not an array")),
            }
        }
    }
}

/// Walk to the value at `segments`, creating objects along the way.
/// Numeric segments index into existing arrays.
fn slot<'a>(root: &'a mut Value, segments: &[&str], path: &str) -> Result<&'a mut Value, ValidationError> {
    let mut current = root;
    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| ValidationError::invalid(path, format!("'{}' is not an index", segment)))?;
                let len = items.len();
                items.get_mut(index).ok_or_else(|| {
                    ValidationError::invalid(path, format!("index {} out of range ({} elements)", index, len))
                })?
            }
            _ => return Err(ValidationError::invalid(path, "cannot descend into a scalar value")),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{flatten, FieldConfig, PathRuleDef};
    use serde_json::json;

    fn company() -> (PathContext, FlattenedSchema) {
        let schema = CollectionSchema::new("company")
            .with_field(
                "status",
                FieldConfig::new(FieldType::String)
                    .with_enum(&["pending", "done"])
                    .updatable(),
            )
            .with_field("employees", FieldConfig::new(FieldType::Number).updatable())
            .with_field("tags", FieldConfig::new(FieldType::Array).updatable())
            .with_field("settings", FieldConfig::new(FieldType::Object).updatable())
            .with_field("name", FieldConfig::new(FieldType::String))
            .with_rule(PathRuleDef {
                pattern: r"stage".to_string(),
                operation: OperationKind::Scalar,
                allowed_values: vec![json!("draft"), json!("live")],
            });
        let flattened = flatten(&schema.properties);
        let context = PathContext::build(&schema, &flattened).unwrap();
        (context, flattened)
    }

    #[test]
    fn test_declared_rules_come_first() {
        let (context, _) = company();
        assert_eq!(context.rules()[0].pattern(), "stage");
        assert_eq!(context.rules()[0].origin, RuleOrigin::Declared);
        assert!(context.rules()[1..].iter().all(|r| r.origin == RuleOrigin::Derived));
    }

    #[test]
    fn test_duplicate_derived_rule_is_dropped() {
        let schema = CollectionSchema::new("c")
            .with_field("status", FieldConfig::new(FieldType::String).updatable())
            .with_rule(PathRuleDef {
                pattern: "status".to_string(),
                operation: OperationKind::Scalar,
                allowed_values: vec![json!("open")],
            });
        let flattened = flatten(&schema.properties);
        let context = PathContext::build(&schema, &flattened).unwrap();
        assert_eq!(context.rules().len(), 1);

        let err = validate(&PathUpdate::new("status", json!("closed")), &context, &flattened)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_enum_example() {
        let (context, flattened) = company();
        assert!(validate(&PathUpdate::new("status", json!("done")), &context, &flattened).is_ok());
        let err = validate(&PathUpdate::new("status", json!("cancelled")), &context, &flattened)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_and_unmatched() {
        let (context, flattened) = company();
        let no_value: PathUpdate = serde_json::from_value(json!({"path": "status"})).unwrap();
        assert_eq!(
            validate(&no_value, &context, &flattened).unwrap_err(),
            ValidationError::MissingField("value".to_string())
        );
        let no_path: PathUpdate = serde_json::from_value(json!({"value": 1})).unwrap();
        assert_eq!(
            validate(&no_path, &context, &flattened).unwrap_err(),
            ValidationError::MissingField("path".to_string())
        );
        // Not updatable
        assert_eq!(
            validate(&PathUpdate::new("name", json!("x")), &context, &flattened).unwrap_err(),
            ValidationError::NoMatchingPath("name".to_string())
        );
    }

    #[test]
    fn test_explicit_null_is_present() {
        let update: PathUpdate = serde_json::from_value(json!({"path": "a", "value": null})).unwrap();
        assert_eq!(update.value, Some(Value::Null));
    }

    #[test]
    fn test_allowed_values_and_coercion() {
        let (context, flattened) = company();
        assert!(validate(&PathUpdate::new("stage", json!("live")), &context, &flattened).is_ok());
        assert!(validate(&PathUpdate::new("stage", json!("gone")), &context, &flattened).is_err());

        let validated =
            validate(&PathUpdate::new("employees", json!("12")), &context, &flattened).unwrap();
        assert_eq!(validated.value, json!(12));
        assert!(validate(&PathUpdate::new("employees", json!("many")), &context, &flattened).is_err());
    }

    #[test]
    fn test_context_params_from_captures() {
        let (context, flattened) = company();
        let validated = validate(
            &PathUpdate::new("tags.3.$remove", json!(true)),
            &context,
            &flattened,
        )
        .unwrap();
        assert_eq!(validated.operation, OperationKind::VectorRm);
        assert_eq!(validated.context_params, vec!["3".to_string()]);

        let validated = validate(
            &PathUpdate::new("tags.1.label", json!("x")),
            &context,
            &flattened,
        )
        .unwrap();
        assert_eq!(validated.operation, OperationKind::Scalar);
        assert_eq!(validated.context_params, vec!["1".to_string(), "label".to_string()]);
    }

    #[test]
    fn test_vector_add_then_remove_round_trip() {
        let (context, flattened) = company();
        let mut entity = json!({"tags": ["a", "b"]});

        let add = validate(&PathUpdate::new("tags", json!("c")), &context, &flattened).unwrap();
        let index = match apply(&mut entity, &add).unwrap() {
            AppliedResult::VectorAdd { element, index } => {
                assert_eq!(element, json!("c"));
                index
            }
            other => panic!("unexpected result {:?}", other),
        };
        assert_eq!(entity["tags"].as_array().unwrap().len(), 3);

        let rm = validate(
            &PathUpdate::new(format!("tags.{}.{}", index, REMOVE_MARKER), json!(true)),
            &context,
            &flattened,
        )
        .unwrap();
        assert_eq!(
            apply(&mut entity, &rm).unwrap(),
            AppliedResult::VectorRm {
                removed_count: 1,
                index
            }
        );
        assert_eq!(entity["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_vector_add_creates_array() {
        let (context, flattened) = company();
        let mut entity = json!({});
        let add = validate(&PathUpdate::new("tags", json!({"k": 1})), &context, &flattened).unwrap();
        apply(&mut entity, &add).unwrap();
        assert_eq!(entity["tags"], json!([{"k": 1}]));
    }

    #[test]
    fn test_vector_rm_out_of_range() {
        let (context, flattened) = company();
        let mut entity = json!({"tags": ["a"]});
        let rm = validate(&PathUpdate::new("tags.5.$remove", json!(true)), &context, &flattened)
            .unwrap();
        assert!(matches!(
            apply(&mut entity, &rm).unwrap_err(),
            ValidationError::InvalidValue { .. }
        ));
        assert_eq!(entity["tags"], json!(["a"]));
    }

    #[test]
    fn test_scalar_object_updates_merge() {
        let (context, flattened) = company();
        let mut entity = json!({"settings": {"theme": "dark"}});

        for value in [json!({"a": 1}), json!({"b": 2})] {
            let update = validate(&PathUpdate::new("settings", value), &context, &flattened).unwrap();
            apply(&mut entity, &update).unwrap();
        }
        assert_eq!(entity["settings"], json!({"theme": "dark", "a": 1, "b": 2}));
    }

    #[test]
    fn test_scalar_array_value_replaces() {
        let (context, flattened) = company();
        let mut entity = json!({"settings": {"list": [1, 2, 3]}});
        let update = validate(
            &PathUpdate::new("settings.list", json!([9])),
            &context,
            &flattened,
        )
        .unwrap();
        let result = apply(&mut entity, &update).unwrap();
        assert_eq!(
            result,
            AppliedResult::Scalar {
                path: "settings.list".to_string(),
                value: json!([9])
            }
        );
    }

    #[test]
    fn test_indexed_scalar_update() {
        let (context, flattened) = company();
        let mut entity = json!({"tags": [{"label": "a"}, {"label": "b"}]});
        let update = validate(&PathUpdate::new("tags.1.label", json!("z")), &context, &flattened)
            .unwrap();
        apply(&mut entity, &update).unwrap();
        assert_eq!(entity["tags"][1]["label"], json!("z"));
        assert_eq!(entity["tags"][0]["label"], json!("a"));
    }
}
