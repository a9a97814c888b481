//! Collection schemas
//!
//! A tenant schema is an ordered list of collection definitions. Each
//! collection carries a nested property tree whose leaves are field configs,
//! plus optional declared update rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};

/// A tenant's full schema
pub type Schema = Vec<CollectionSchema>;

/// Dot path -> leaf config, one entry per true leaf
pub type FlattenedSchema = BTreeMap<String, FieldConfig>;

/// Field value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

/// Leaf property declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldConfig {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub allow_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldConfig {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            enum_values: Vec::new(),
            required: false,
            default: None,
            allow_update: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn updatable(mut self) -> Self {
        self.allow_update = true;
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A node of the property tree.
///
/// Leaves are tried first: any object with a `type` key naming a field type
/// is a leaf, everything else is a branch of named children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyNode {
    Leaf(FieldConfig),
    Branch(BTreeMap<String, PropertyNode>),
}

/// How a matched path update is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Scalar,
    VectorAdd,
    VectorRm,
}

/// Declared business update rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRuleDef {
    pub pattern: String,
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<Value>,
}

/// One collection's definition within a tenant schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PathRuleDef>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, config: FieldConfig) -> Self {
        self.properties
            .insert(name.to_string(), PropertyNode::Leaf(config));
        self
    }

    pub fn with_node(mut self, name: &str, node: PropertyNode) -> Self {
        self.properties.insert(name.to_string(), node);
        self
    }

    pub fn with_rule(mut self, rule: PathRuleDef) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Flatten a property tree into dot path -> leaf config.
///
/// Walks depth first. An empty branch has no schema-shaped children and is
/// recorded as an `object` leaf.
pub fn flatten(properties: &BTreeMap<String, PropertyNode>) -> FlattenedSchema {
    let mut flattened = FlattenedSchema::new();
    let mut path = Vec::new();
    walk(properties, &mut path, &mut flattened);
    flattened
}

fn walk<'a>(
    properties: &'a BTreeMap<String, PropertyNode>,
    path: &mut Vec<&'a str>,
    out: &mut FlattenedSchema,
) {
    for (key, node) in properties {
        path.push(key.as_str());
        match node {
            PropertyNode::Leaf(config) => {
                out.insert(path.join("."), config.clone());
            }
            PropertyNode::Branch(children) if children.is_empty() => {
                out.insert(path.join("."), FieldConfig::new(FieldType::Object));
            }
            PropertyNode::Branch(children) => walk(children, path, out),
        }
        path.pop();
    }
}

/// Merge the built-in schema into a tenant schema.
///
/// Tenant collections keep their order and every tenant-declared field
/// survives; core fields and rules are only added where the tenant has none.
/// Core collections the tenant lacks are appended whole.
pub fn merge(core: &[CollectionSchema], tenant: &[CollectionSchema]) -> Schema {
    let mut merged: Schema = tenant.to_vec();

    for core_collection in core {
        match merged.iter_mut().find(|c| c.name == core_collection.name) {
            Some(existing) => {
                merge_properties(&mut existing.properties, &core_collection.properties);
                for rule in &core_collection.rules {
                    if !existing.rules.iter().any(|r| r.pattern == rule.pattern) {
                        existing.rules.push(rule.clone());
                    }
                }
            }
            None => merged.push(core_collection.clone()),
        }
    }

    merged
}

fn merge_properties(
    target: &mut BTreeMap<String, PropertyNode>,
    core: &BTreeMap<String, PropertyNode>,
) {
    for (key, core_node) in core {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), core_node.clone());
            }
            Some(PropertyNode::Branch(children)) => {
                if let PropertyNode::Branch(core_children) = core_node {
                    merge_properties(children, core_children);
                }
            }
            // Tenant leaf wins
            Some(PropertyNode::Leaf(_)) => {}
        }
    }
}

const BUILTIN_SCHEMA: &str = include_str!("builtin_schema.json");

/// Load the built-in collection definitions shared by every tenant
pub fn builtin_schema() -> CoreResult<Schema> {
    serde_json::from_str(BUILTIN_SCHEMA)
        .map_err(|e| CoreError::Schema(format!("Failed to parse built-in schema: {}", e)))
}
