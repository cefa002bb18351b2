pub mod artifact_cache;
pub mod db;
pub mod error;
pub mod ingest;
pub mod insights;
pub mod ledger;

pub use artifact_cache::ArtifactCache;
pub use error::StoreError;
pub use ingest::IngestBatch;
pub use ledger::{Ledger, SortOrder};
