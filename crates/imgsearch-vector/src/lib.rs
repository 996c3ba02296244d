pub mod client;
pub mod http;
pub mod lance;
pub mod schema;
pub mod service;
pub mod table;

pub use client::{UpsertSummary, VectorIndexClient, UPSERT_CHUNK_SIZE};
pub use http::{HttpIndexConfig, HttpIndexService};
pub use lance::LanceIndexService;
pub use service::{IndexService, QueryRequest};
