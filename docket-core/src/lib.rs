//! Docket Core
//!
//! Core types and pure logic for the Docket document API:
//! - Tenants, tokens, activities and document metadata
//! - Collection schemas: flattening and additive merging
//! - The path-addressed partial update engine
//! - Per-worker schema registry
//! - Token authorization rules

pub mod auth;
pub mod coerce;
pub mod error;
pub mod logging;
pub mod path;
pub mod registry;
pub mod schema;
pub mod types;

pub use auth::{authorize, check_origin};
pub use error::{AuthError, CoreError, CoreResult, ValidationError};
pub use path::{
    apply, validate, AppliedResult, PathContext, PathRule, PathUpdate, ValidatedUpdate,
    REMOVE_MARKER,
};
pub use registry::{CollectionDescriptor, SchemaRegistry, TenantDescriptors, ValidationReport};
pub use schema::{
    builtin_schema, flatten, merge, CollectionSchema, FieldConfig, FieldType, FlattenedSchema,
    OperationKind, PathRuleDef, PropertyNode, Schema,
};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
