//! Docket Database Layer
//!
//! Storage for the Docket document API:
//! - `DocumentStore` trait with memory and sled backends
//! - Repositories for tenants, tokens, activities and documents
//! - Services: token cache, schema loading, document operations, tenant admin

pub mod error;
pub mod repos;
pub mod services;
pub mod store;

pub use error::{DbError, DbResult};
pub use repos::*;
pub use services::*;
pub use store::{
    BulkOp, BulkResult, Datastore, DocumentStore, Filter, ListQuery, MemoryStore, SledStore,
    StorageConfig,
};
