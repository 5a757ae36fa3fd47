//! Records produced by a single probe cycle.
//!
//! All four records of one cycle share the same `timestamp` and `host`. They
//! are plain values: built once by the probe and never mutated afterwards.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Reachability of the target for one probe cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UptimeRecord {
    pub timestamp: DateTime<Utc>,
    /// True iff `status_code == 200`.
    pub up: bool,
    /// HTTP status of the final response, 0 when no response was received.
    pub status_code: u16,
    pub host: String,
}

impl UptimeRecord {
    pub fn new(timestamp: DateTime<Utc>, status_code: u16, host: impl Into<String>) -> Self {
        UptimeRecord {
            timestamp,
            up: status_code == 200,
            status_code,
            host: host.into(),
        }
    }
}

/// Phase durations of one request. The phases may overlap and do not sum to
/// `total_latency`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyRecord {
    pub timestamp: DateTime<Utc>,
    pub dns_lookup: Duration,
    /// Zero for plain HTTP targets.
    pub tls_handshake: Duration,
    pub time_to_first_byte: Duration,
    pub total_latency: Duration,
    pub host: String,
}

/// The response document together with its size and SHA-256 digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMetadata {
    pub timestamp: DateTime<Utc>,
    /// Raw response body, exactly as received.
    pub document: Vec<u8>,
    pub byte_count: usize,
    /// Lowercase hex SHA-256 of the raw document bytes.
    pub content_hash: String,
    pub host: String,
}

impl ContentMetadata {
    /// Builds the metadata record, deriving `byte_count` and `content_hash`
    /// from the stored document itself.
    pub fn from_document(timestamp: DateTime<Utc>, host: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let document = body.into();
        ContentMetadata {
            timestamp,
            byte_count: document.len(),
            content_hash: format!("{:x}", Sha256::digest(&document)),
            document,
            host: host.into(),
        }
    }

    /// The document as text, when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.document).ok()
    }
}

/// Placeholder for a per-sub-resource size breakdown. Never populated yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSizes {}

/// The four records of one probe cycle, persisted as one logical unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementBundle {
    pub uptime: UptimeRecord,
    pub latency: LatencyRecord,
    pub metadata: ContentMetadata,
    pub sizes: ContentSizes,
}

impl MeasurementBundle {
    /// Bundle for a cycle that never produced a full response. Only the
    /// uptime record is populated and it is always down, even when a status
    /// line was seen before the failure.
    pub fn transport_failure(timestamp: DateTime<Utc>, host: impl Into<String>, status_code: u16) -> Self {
        MeasurementBundle {
            uptime: UptimeRecord {
                timestamp,
                up: false,
                status_code,
                host: host.into(),
            },
            ..Default::default()
        }
    }

    pub fn host(&self) -> &str {
        &self.uptime.host
    }
}
