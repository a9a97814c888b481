//! Docket API Server
//!
//! REST API for tenant documents. All routes live under `/api/v1`; every
//! route except health requires a token (`?token=` or `Authorization: Bearer`).
//!
//! ## Endpoints
//!
//! ### Documents
//! - GET /:collection - List documents (equality filters, skip, limit)
//! - POST /:collection - Create document
//! - GET /:collection/:id - Get document
//! - PUT /:collection/:id - Replace document
//! - PATCH /:collection/:id - Apply path updates
//! - DELETE /:collection/:id - Delete document
//! - POST /:collection/bulk/add|delete|load - Bulk operations
//!
//! ### Metadata
//! - GET /:collection/:id/metadata - List metadata
//! - GET|PUT|DELETE /:collection/:id/metadata/:key - Read, set, remove a key
//!
//! ### Administration
//! - GET /schema - Caller's tenant schema
//! - GET|POST /tenant - List / create tenants (SUPER)
//! - PUT /tenant/:tenant_id/schema - Replace a tenant schema (SUPER)
//! - GET|POST /token, DELETE /token/:value - Tokens (ADMIN)
//! - GET|DELETE /activity - List / purge activities (ADMIN)
//! - GET /health - Health check

pub mod activity;
pub mod dto;
pub mod error;
pub mod gate;
pub mod routes;
pub mod server;
pub mod state;

pub use activity::{ActivityRecorder, Announcement, RecordOutcome};
pub use dto::*;
pub use error::*;
pub use gate::{RequestContext, RouteSpec};
pub use routes::create_router;
pub use server::*;
pub use state::*;
