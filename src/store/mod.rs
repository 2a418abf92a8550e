//! Document store
//!
//! Holds composite results per ticker, raw sub-service documents and audit
//! records. Postgres when a database URL is configured, otherwise in-memory.

mod memory;
mod postgres;

pub use memory::InMemoryInsightStore;
pub use postgres::PostgresInsightStore;

use crate::config::AppConfig;
use crate::models::{AuditRecord, CategoryOutput, PromptInference, RawDocument};
use crate::Result;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait InsightStore: Send + Sync {
    /// Replace any stored composite for the same ticker in one write
    async fn upsert_inference(&self, inference: &PromptInference) -> Result<()>;

    async fn find_inference(&self, ticker: &str) -> Result<Option<PromptInference>>;

    /// Insert unless a structurally-equal document exists; `false` on duplicate
    async fn insert_raw_if_absent(&self, doc: &RawDocument) -> Result<bool>;

    async fn record_audit(&self, record: &AuditRecord) -> Result<()>;

    /// Drain connections on shutdown
    async fn close(&self) {}
}

/// SHA-256 over the serialized output; equal documents share a fingerprint
pub fn fingerprint(output: &CategoryOutput) -> String {
    let mut hasher = Sha256::new();

    // Stream JSON straight into the hasher
    if serde_json::to_writer(&mut HashWriter(&mut hasher), output).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Postgres if configured and the URL parses, else in-memory
pub fn build_store(config: &AppConfig) -> Arc<dyn InsightStore> {
    if let Some(url) = config.database_url.as_deref() {
        match PostgresInsightStore::connect_lazy(url) {
            Ok(store) => {
                info!("Insight store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Insight store backend: in-memory");
    Arc::new(InMemoryInsightStore::new())
}
