use std::future::Future;
use std::time::Duration;

use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Binary, Bson, DateTime, Document, doc};
use tokio::time::timeout;

use super::{BackendError, MeasurementStore, RecordKind, StoreError};
use crate::measurement::{ContentMetadata, LatencyRecord, MeasurementBundle, UptimeRecord};

/// Bound on each individual write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub const UPTIME_COLLECTION: &str = "uptime";
pub const LATENCY_COLLECTION: &str = "latency";
pub const METADATA_COLLECTION: &str = "metadata";

/// A networked document database able to insert one document into a named
/// collection.
pub trait DocumentBackend: Send + Sync {
    fn insert(
        &self,
        collection: &'static str,
        document: Document,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Durable store writing each bundle as three documents, one per collection,
/// in the order uptime, latency, metadata.
///
/// There is no transaction around the three inserts. The first failing insert
/// ends the call and is reported; earlier inserts are not rolled back.
/// Content sizes are not persisted yet.
pub struct DocumentStore<B> {
    backend: B,
    write_timeout: Duration,
}

impl<B: DocumentBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        DocumentStore {
            backend,
            write_timeout: WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn write(
        &self,
        record: RecordKind,
        collection: &'static str,
        document: Document,
    ) -> Result<(), StoreError> {
        match timeout(self.write_timeout, self.backend.insert(collection, document)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(StoreError::Write { record, source }),
            Err(_) => Err(StoreError::WriteTimeout {
                record,
                timeout: self.write_timeout,
            }),
        }
    }
}

impl<B: DocumentBackend> MeasurementStore for DocumentStore<B> {
    async fn record_measurement(&mut self, bundle: MeasurementBundle) -> Result<(), StoreError> {
        self.write(RecordKind::Uptime, UPTIME_COLLECTION, uptime_document(&bundle.uptime))
            .await?;
        self.write(RecordKind::Latency, LATENCY_COLLECTION, latency_document(&bundle.latency))
            .await?;
        self.write(RecordKind::Metadata, METADATA_COLLECTION, metadata_document(&bundle.metadata))
            .await?;
        log::debug!("stored measurement for {}", bundle.host());
        Ok(())
    }
}

/// BSON dates only carry milliseconds, so sub-millisecond precision of the
/// record timestamp is dropped here.
fn timestamp(ts: &chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_millis(ts.timestamp_millis())
}

fn nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

fn uptime_document(uptime: &UptimeRecord) -> Document {
    doc! {
        "up": uptime.up,
        "timestamp": timestamp(&uptime.timestamp),
        "rc": i32::from(uptime.status_code),
        "url": uptime.host.as_str(),
    }
}

/// Durations are stored as integer nanoseconds.
fn latency_document(latency: &LatencyRecord) -> Document {
    doc! {
        "dnslookup": nanos(latency.dns_lookup),
        "tlshandshake": nanos(latency.tls_handshake),
        "ttfb": nanos(latency.time_to_first_byte),
        "total": nanos(latency.total_latency),
        "timestamp": timestamp(&latency.timestamp),
        "url": latency.host.as_str(),
    }
}

/// Valid UTF-8 documents are stored as strings, anything else as generic
/// binary so the stored bytes still match `bytes` and `sha256sum`.
fn document_value(document: &[u8]) -> Bson {
    match std::str::from_utf8(document) {
        Ok(text) => Bson::String(text.to_string()),
        Err(_) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: document.to_vec(),
        }),
    }
}

fn metadata_document(meta: &ContentMetadata) -> Document {
    doc! {
        "bytes": i64::try_from(meta.byte_count).unwrap_or(i64::MAX),
        "document": document_value(&meta.document),
        "sha256sum": meta.content_hash.as_str(),
        "timestamp": timestamp(&meta.timestamp),
        "url": meta.host.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        fail_on: Option<&'static str>,
        hang_on: Option<&'static str>,
        written: Mutex<Vec<(&'static str, Document)>>,
    }

    impl FakeBackend {
        fn collections(&self) -> Vec<&'static str> {
            self.written
                .lock()
                .expect("lock")
                .iter()
                .map(|(c, _)| *c)
                .collect()
        }
    }

    impl DocumentBackend for FakeBackend {
        async fn insert(&self, collection: &'static str, document: Document) -> Result<(), BackendError> {
            if self.hang_on == Some(collection) {
                std::future::pending::<()>().await;
            }
            if self.fail_on == Some(collection) {
                return Err(format!("insert into {collection} rejected").into());
            }
            self.written.lock().expect("lock").push((collection, document));
            Ok(())
        }
    }

    fn sample_bundle() -> MeasurementBundle {
        let now = Utc::now();
        MeasurementBundle {
            uptime: UptimeRecord::new(now, 200, "example.test"),
            latency: LatencyRecord {
                timestamp: now,
                dns_lookup: Duration::from_millis(3),
                tls_handshake: Duration::from_millis(10),
                time_to_first_byte: Duration::from_millis(20),
                total_latency: Duration::from_millis(30),
                host: "example.test".to_string(),
            },
            metadata: ContentMetadata::from_document(now, "example.test", b"<html>ok</html>"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_writes_three_documents_in_order() {
        let mut store = DocumentStore::new(FakeBackend::default());

        store.record_measurement(sample_bundle()).await.expect("record");

        assert_eq!(
            store.backend().collections(),
            vec![UPTIME_COLLECTION, LATENCY_COLLECTION, METADATA_COLLECTION]
        );
        let written = store.backend().written.lock().expect("lock");
        let latency = &written[1].1;
        assert_eq!(latency.get_i64("dnslookup").expect("dnslookup"), 3_000_000);
        assert_eq!(latency.get_i64("total").expect("total"), 30_000_000);
        let meta = &written[2].1;
        assert_eq!(meta.get_i64("bytes").expect("bytes"), 15);
        assert_eq!(meta.get_str("url").expect("url"), "example.test");
        assert_eq!(meta.get_str("document").expect("document"), "<html>ok</html>");
    }

    #[test]
    fn test_non_utf8_document_stored_as_binary() {
        let body: &[u8] = b"caf\xe9";
        let meta = ContentMetadata::from_document(Utc::now(), "latin1.test", body);

        let stored = metadata_document(&meta);

        let binary = stored.get_binary_generic("document").expect("binary document");
        assert_eq!(binary.as_slice(), body);
        assert_eq!(stored.get_i64("bytes").expect("bytes"), 4);
        assert_eq!(stored.get_str("sha256sum").expect("sha256sum"), meta.content_hash);
    }

    #[tokio::test]
    async fn test_latency_failure_is_named_and_uptime_kept() {
        let mut store = DocumentStore::new(FakeBackend {
            fail_on: Some(LATENCY_COLLECTION),
            ..Default::default()
        });

        let err = store
            .record_measurement(sample_bundle())
            .await
            .expect_err("latency write fails");

        assert!(matches!(err, StoreError::Write { record: RecordKind::Latency, .. }));
        assert_eq!(err.record(), Some(RecordKind::Latency));
        assert!(err.to_string().contains("latency"));
        // uptime already durable, metadata never attempted
        assert_eq!(store.backend().collections(), vec![UPTIME_COLLECTION]);
    }

    #[tokio::test]
    async fn test_uptime_failure_stops_immediately() {
        let mut store = DocumentStore::new(FakeBackend {
            fail_on: Some(UPTIME_COLLECTION),
            ..Default::default()
        });

        let err = store
            .record_measurement(sample_bundle())
            .await
            .expect_err("uptime write fails");

        assert_eq!(err.record(), Some(RecordKind::Uptime));
        assert!(store.backend().collections().is_empty());
    }

    #[tokio::test]
    async fn test_hung_write_times_out() {
        let mut store = DocumentStore::new(FakeBackend {
            hang_on: Some(METADATA_COLLECTION),
            ..Default::default()
        })
        .with_write_timeout(Duration::from_millis(50));

        let err = store
            .record_measurement(sample_bundle())
            .await
            .expect_err("metadata write hangs");

        assert!(matches!(
            err,
            StoreError::WriteTimeout { record: RecordKind::Metadata, .. }
        ));
        assert_eq!(
            store.backend().collections(),
            vec![UPTIME_COLLECTION, LATENCY_COLLECTION]
        );
    }
}
