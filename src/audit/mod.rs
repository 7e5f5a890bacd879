//! Audit trail of result envelopes
//!
//! Every terminal envelope is recorded with a hash of the context it was
//! produced under, so a record can be fetched and integrity-checked later.
//! The trail is bounded: once full, the oldest record is evicted.

use crate::context::ExecutionContext;
use crate::models::{EnvelopeStatus, ResultEnvelope};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub request_id: Uuid,
    pub status: EnvelopeStatus,
    pub envelope: ResultEnvelope,
    pub context_hash: String,
    pub recorded_at: DateTime<Utc>,
}

/// Records kept when no capacity is configured
pub const DEFAULT_MAX_RECORDS: usize = 1_000;

#[derive(Default)]
struct AuditStore {
    records: HashMap<Uuid, AuditRecord>,
    /// Insertion order, oldest first
    order: VecDeque<Uuid>,
}

/// In-process audit trail storage
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<RwLock<AuditStore>>,
    max_records: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECORDS)
    }

    /// Keep at most `max_records` envelopes (at least one)
    pub fn with_capacity(max_records: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(AuditStore::default())),
            max_records: max_records.max(1),
        }
    }

    /// Store an envelope, keyed by its request id
    pub async fn record(&self, envelope: &ResultEnvelope) -> Result<Uuid> {
        let request_id = envelope.request_id;
        let record = AuditRecord {
            request_id,
            status: envelope.status,
            context_hash: compute_context_hash(envelope.context.as_ref()),
            envelope: envelope.clone(),
            recorded_at: Utc::now(),
        };

        let mut store = self.store.write().await;
        if store.records.insert(request_id, record).is_none() {
            store.order.push_back(request_id);
        }
        while store.order.len() > self.max_records {
            if let Some(evicted) = store.order.pop_front() {
                store.records.remove(&evicted);
                debug!(request_id = %evicted, "Audit record evicted");
            }
        }
        debug!(request_id = %request_id, "Envelope recorded");
        Ok(request_id)
    }

    pub async fn get(&self, request_id: Uuid) -> Result<Option<AuditRecord>> {
        let store = self.store.read().await;
        Ok(store.records.get(&request_id).cloned())
    }

    /// Request ids sorted by record time
    pub async fn list(&self) -> Result<Vec<Uuid>> {
        let store = self.store.read().await;

        let mut items: Vec<_> = store
            .records
            .values()
            .map(|record| (record.request_id, record.recorded_at))
            .collect();
        items.sort_by_key(|(_, recorded_at)| *recorded_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Verify a record's integrity via hash
    pub async fn verify_integrity(&self, request_id: Uuid) -> Result<bool> {
        let store = self.store.read().await;

        match store.records.get(&request_id) {
            Some(record) => Ok(compute_context_hash(record.envelope.context.as_ref()) == record.context_hash),
            None => Ok(false),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of the serialized context, streamed into the hasher
pub fn compute_context_hash(context: Option<&ExecutionContext>) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), &context).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<H: Digest> Write for HashWriter<'_, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::models::{Intent, QueryPlan};
    use crate::workers::WorkerResults;

    fn envelope(context: Option<ExecutionContext>) -> ResultEnvelope {
        ResultEnvelope {
            request_id: Uuid::new_v4(),
            status: EnvelopeStatus::Approved,
            query: "AAPL price".to_string(),
            intent: Intent::MarketPrices,
            context,
            results: WorkerResults::new(),
            workers_executed: vec![],
            confidence: None,
            fallback: None,
            reason: None,
            error_type: None,
            warnings: vec![],
            execution_time_ms: 5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_verify() {
        let log = AuditLog::new();
        let context = ContextBuilder::default()
            .build(&QueryPlan::new(Intent::MarketPrices, "AAPL price"))
            .unwrap();
        let env = envelope(Some(context));

        let id = log.record(&env).await.unwrap();
        let record = log.get(id).await.unwrap().unwrap();

        assert_eq!(record.status, EnvelopeStatus::Approved);
        assert_eq!(record.context_hash.len(), 64);
        assert!(log.verify_integrity(id).await.unwrap());
        assert_eq!(log.list().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_oldest_record_evicted_at_capacity() {
        let log = AuditLog::with_capacity(2);
        let first = envelope(None);
        let second = envelope(None);
        let third = envelope(None);

        log.record(&first).await.unwrap();
        log.record(&second).await.unwrap();
        // Re-recording does not take a second slot
        log.record(&second).await.unwrap();
        log.record(&third).await.unwrap();

        assert!(log.get(first.request_id).await.unwrap().is_none());
        assert!(log.get(second.request_id).await.unwrap().is_some());
        assert!(log.get(third.request_id).await.unwrap().is_some());

        let ids = log.list().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&first.request_id));
    }

    #[tokio::test]
    async fn test_unknown_request_fails_verification() {
        let log = AuditLog::new();
        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
        assert!(log.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let context = ContextBuilder::default()
            .build(&QueryPlan::new(Intent::NewsAnalysis, "RBI policy news"))
            .unwrap();
        assert_eq!(
            compute_context_hash(Some(&context)),
            compute_context_hash(Some(&context.clone()))
        );
        assert_ne!(compute_context_hash(Some(&context)), compute_context_hash(None));
    }
}
