use super::{fingerprint, InsightStore};
use crate::models::{AuditRecord, PromptInference, RawDocument};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store for development and tests
pub struct InMemoryInsightStore {
    inferences: Arc<RwLock<HashMap<String, PromptInference>>>,
    raw_documents: Arc<RwLock<HashMap<String, RawDocument>>>, // fingerprint → document
    audits: Arc<RwLock<Vec<AuditRecord>>>,
}

impl InMemoryInsightStore {
    pub fn new() -> Self {
        Self {
            inferences: Arc::new(RwLock::new(HashMap::new())),
            raw_documents: Arc::new(RwLock::new(HashMap::new())),
            audits: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.audits.read().await.clone()
    }

    pub async fn raw_document_count(&self) -> usize {
        self.raw_documents.read().await.len()
    }
}

impl Default for InMemoryInsightStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InsightStore for InMemoryInsightStore {
    async fn upsert_inference(&self, inference: &PromptInference) -> Result<()> {
        let mut inferences = self.inferences.write().await;
        inferences.insert(inference.ticker.clone(), inference.clone());
        Ok(())
    }

    async fn find_inference(&self, ticker: &str) -> Result<Option<PromptInference>> {
        let inferences = self.inferences.read().await;
        Ok(inferences.get(ticker).cloned())
    }

    async fn insert_raw_if_absent(&self, doc: &RawDocument) -> Result<bool> {
        let key = fingerprint(&doc.output);
        let mut raw = self.raw_documents.write().await;

        if raw.contains_key(&key) {
            return Ok(false);
        }
        raw.insert(key, doc.clone());
        Ok(true)
    }

    async fn record_audit(&self, record: &AuditRecord) -> Result<()> {
        self.audits.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryOutput};

    #[tokio::test]
    async fn test_upsert_replaces_by_ticker() {
        let store = InMemoryInsightStore::new();

        let mut first = PromptInference::empty("AAPL");
        first.news_summary = "old".into();
        store.upsert_inference(&first).await.unwrap();

        let mut second = PromptInference::empty("AAPL");
        second.news_summary = "new".into();
        store.upsert_inference(&second).await.unwrap();

        let found = store.find_inference("AAPL").await.unwrap().unwrap();
        assert_eq!(found.news_summary, "new");
        assert!(store.find_inference("MSFT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_documents_deduplicate() {
        let store = InMemoryInsightStore::new();
        let doc = RawDocument {
            category: Category::Financials,
            ticker: "AAPL".into(),
            output: CategoryOutput {
                result: "The balance sheet for AAPL is ...".into(),
            },
        };

        assert!(store.insert_raw_if_absent(&doc).await.unwrap());
        assert!(!store.insert_raw_if_absent(&doc).await.unwrap());
        assert_eq!(store.raw_document_count().await, 1);
    }
}
