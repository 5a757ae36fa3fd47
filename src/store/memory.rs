use std::collections::HashMap;

use super::{MeasurementStore, StoreError};
use crate::measurement::MeasurementBundle;

/// Ephemeral store keeping every bundle in memory, grouped by host in the
/// order they were recorded. Unbounded and not deduplicated.
///
/// Not synchronized; concurrent probers must serialize their calls.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: HashMap<String, Vec<MeasurementBundle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every bundle recorded for `host`, oldest first.
    pub fn history(&self, host: &str) -> &[MeasurementBundle] {
        self.documents
            .get(host)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Total number of bundles across all hosts.
    pub fn len(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn append(&mut self, bundle: MeasurementBundle) {
        self.documents
            .entry(bundle.host().to_string())
            .or_default()
            .push(bundle);
    }
}

impl MeasurementStore for MemoryStore {
    async fn record_measurement(&mut self, bundle: MeasurementBundle) -> Result<(), StoreError> {
        self.append(bundle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::measurement::{ContentMetadata, UptimeRecord};

    fn bundle(host: &str, status: u16, body: &str) -> MeasurementBundle {
        let now = Utc::now();
        MeasurementBundle {
            uptime: UptimeRecord::new(now, status, host),
            metadata: ContentMetadata::from_document(now, host, body.as_bytes()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_same_bundle_twice_is_kept_twice() {
        let mut store = MemoryStore::new();
        let doc = bundle(
            "lol.test",
            200,
            "<html><head><title>Test</title></head><body><h1>OMG Great Test!</h1></body></html>",
        );

        store.record_measurement(doc.clone()).await.expect("record");
        store.record_measurement(doc.clone()).await.expect("record");

        assert_eq!(store.history("lol.test").len(), 2);
        assert_eq!(store.history("lol.test")[0], doc);
        assert_eq!(store.history("lol.test")[1], doc);
    }

    #[tokio::test]
    async fn test_history_preserves_call_order() {
        let mut store = MemoryStore::new();
        for status in [200, 500, 404] {
            store
                .record_measurement(bundle("a.test", status, "x"))
                .await
                .expect("record");
        }

        let statuses: Vec<u16> = store
            .history("a.test")
            .iter()
            .map(|b| b.uptime.status_code)
            .collect();
        assert_eq!(statuses, vec![200, 500, 404]);
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let mut store = MemoryStore::new();
        store.record_measurement(bundle("h.test", 200, "a")).await.expect("record");
        store.record_measurement(bundle("h.test", 200, "b")).await.expect("record");
        store.record_measurement(bundle("h2.test", 503, "c")).await.expect("record");

        assert_eq!(store.history("h.test").len(), 2);
        assert_eq!(store.history("h2.test").len(), 1);
        assert_eq!(store.len(), 3);
        let mut hosts: Vec<&str> = store.hosts().collect();
        hosts.sort();
        assert_eq!(hosts, vec!["h.test", "h2.test"]);
    }

    #[test]
    fn test_unknown_host_is_empty() {
        let store = MemoryStore::new();
        assert!(store.history("nowhere.test").is_empty());
        assert!(store.is_empty());
    }
}
