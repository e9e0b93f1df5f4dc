/// Blob Storage Service
///
/// Content-addressed blob storage behind pluggable connectors, with a
/// metadata entry service and a REST API on top.

pub mod api;
pub mod blob_store;
pub mod config;
pub mod context;
pub mod db;
pub mod entity_store;
pub mod error;
pub mod hashing;
pub mod json_ld;
pub mod metrics;
pub mod mime;
pub mod server;
pub mod urn;
pub mod vault;
