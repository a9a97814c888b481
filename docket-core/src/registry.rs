//! Per-worker schema registry
//!
//! Maps tenant -> compiled collection descriptors. Entries are installed at
//! startup or on first lookup and only change through [`SchemaRegistry::install`]
//! and [`SchemaRegistry::invalidate`].

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::coerce::validate_document;
use crate::error::{CoreResult, ValidationError};
use crate::path::PathContext;
use crate::schema::{flatten, CollectionSchema, FlattenedSchema, Schema};
use crate::types::TenantId;

/// A collection schema with its derived lookup structures
#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    pub schema: CollectionSchema,
    pub flattened: FlattenedSchema,
    pub context: PathContext,
}

impl CollectionDescriptor {
    pub fn compile(schema: CollectionSchema) -> CoreResult<Self> {
        let flattened = flatten(&schema.properties);
        let context = PathContext::build(&schema, &flattened)?;
        Ok(Self {
            schema,
            flattened,
            context,
        })
    }
}

/// All compiled collections of one tenant
#[derive(Debug, Clone, Default)]
pub struct TenantDescriptors {
    collections: HashMap<String, Arc<CollectionDescriptor>>,
}

impl TenantDescriptors {
    pub fn compile(schema: &Schema) -> CoreResult<Self> {
        let mut collections = HashMap::new();
        for collection in schema {
            let descriptor = CollectionDescriptor::compile(collection.clone())?;
            collections.insert(collection.name.clone(), Arc::new(descriptor));
        }
        Ok(Self { collections })
    }

    pub fn collection(&self, name: &str) -> Option<Arc<CollectionDescriptor>> {
        self.collections.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Result of validating a document's app properties
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// First error, if any
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Schema registry owned by one worker
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    tenants: RwLock<HashMap<TenantId, Arc<TenantDescriptors>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and install a tenant's schema, replacing any previous entry
    pub async fn install(&self, tenant: &TenantId, schema: &Schema) -> CoreResult<Arc<TenantDescriptors>> {
        let descriptors = Arc::new(TenantDescriptors::compile(schema)?);
        self.tenants
            .write()
            .await
            .insert(tenant.clone(), descriptors.clone());
        Ok(descriptors)
    }

    /// Drop a tenant's cached descriptors. Returns whether an entry existed.
    pub async fn invalidate(&self, tenant: &TenantId) -> bool {
        self.tenants.write().await.remove(tenant).is_some()
    }

    pub async fn get(&self, tenant: &TenantId) -> Option<Arc<TenantDescriptors>> {
        self.tenants.read().await.get(tenant).cloned()
    }

    pub async fn contains(&self, tenant: &TenantId) -> bool {
        self.tenants.read().await.contains_key(tenant)
    }

    pub async fn collection(&self, tenant: &TenantId, name: &str) -> Option<Arc<CollectionDescriptor>> {
        self.get(tenant).await.and_then(|t| t.collection(name))
    }

    pub async fn tenant_count(&self) -> usize {
        self.tenants.read().await.len()
    }

    /// Validate a document for create/replace.
    ///
    /// A collection without a registered schema is always valid.
    pub async fn validate_document(
        &self,
        tenant: &TenantId,
        collection: &str,
        doc: &mut Map<String, Value>,
    ) -> ValidationReport {
        match self.collection(tenant, collection).await {
            Some(descriptor) => ValidationReport::from_errors(validate_document(&descriptor.flattened, doc)),
            None => ValidationReport::valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldConfig, FieldType};
    use serde_json::json;

    fn schema() -> Schema {
        vec![CollectionSchema::new("company")
            .with_field("name", FieldConfig::new(FieldType::String).required())
            .with_field("status", FieldConfig::new(FieldType::String).updatable())]
    }

    #[tokio::test]
    async fn test_install_and_invalidate() {
        let registry = SchemaRegistry::new();
        let tenant = TenantId::from("acme");

        registry.install(&tenant, &schema()).await.unwrap();
        assert!(registry.contains(&tenant).await);
        let descriptor = registry.collection(&tenant, "company").await.unwrap();
        assert_eq!(descriptor.flattened.len(), 2);
        assert_eq!(descriptor.context.rules().len(), 1);

        assert!(registry.invalidate(&tenant).await);
        assert!(!registry.contains(&tenant).await);
        assert!(!registry.invalidate(&tenant).await);
    }

    #[tokio::test]
    async fn test_unconfigured_collection_is_valid() {
        let registry = SchemaRegistry::new();
        let tenant = TenantId::from("acme");
        registry.install(&tenant, &schema()).await.unwrap();

        let mut doc = Map::new();
        let report = registry.validate_document(&tenant, "invoice", &mut doc).await;
        assert!(report.is_valid);

        let report = registry
            .validate_document(&TenantId::from("unknown"), "company", &mut doc)
            .await;
        assert!(report.is_valid);
    }

    #[tokio::test]
    async fn test_configured_collection_is_checked() {
        let registry = SchemaRegistry::new();
        let tenant = TenantId::from("acme");
        registry.install(&tenant, &schema()).await.unwrap();

        let mut doc = json!({"status": "x"}).as_object().cloned().unwrap();
        let report = registry.validate_document(&tenant, "company", &mut doc).await;
        assert!(!report.is_valid);
        assert_eq!(
            report.into_result().unwrap_err(),
            ValidationError::MissingField("name".to_string())
        );
    }

    #[tokio::test]
    async fn test_invalid_document_reports_errors() {
        let registry = SchemaRegistry::new();
        let tenant = TenantId::from("acme");
        registry.install(&tenant, &schema()).await.unwrap();

        let mut doc = json!({"status": 5}).as_object().cloned().unwrap();
        let report = registry.validate_document(&tenant, "company", &mut doc).await;
        assert!(!report.is_valid);
        assert!(report.errors.contains(&ValidationError::MissingField("name".to_string())));
        assert!(report.clone().into_result().is_err());
    }
}
