//! Docket services built on the repositories

mod document_service;
mod schema_service;
mod tenant_service;
mod token_cache;

pub use document_service::*;
pub use schema_service::*;
pub use tenant_service::*;
pub use token_cache::*;
