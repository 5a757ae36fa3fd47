//! Persistence of measurement bundles.
//!
//! A store receives the four records of one probe cycle as a single bundle.
//! Backends try to persist every record they support; when one fails the
//! error names that record, and records already written stay written.

pub mod document;
pub mod memory;
pub mod mongo;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::measurement::MeasurementBundle;

pub use document::{DocumentBackend, DocumentStore};
pub use memory::MemoryStore;
pub use mongo::{MongoBackend, MongoConfig, MongoStore};

/// Boxed error coming from a backend's client library.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// The sub-record of a bundle a write refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Uptime,
    Latency,
    Metadata,
    ContentSizes,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Uptime => "uptime",
            RecordKind::Latency => "latency",
            RecordKind::Metadata => "metadata",
            RecordKind::ContentSizes => "content_sizes",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to document store at {address}")]
    Connect {
        address: String,
        #[source]
        source: BackendError,
    },

    #[error("document store at {address} did not answer ping")]
    Ping {
        address: String,
        #[source]
        source: BackendError,
    },

    #[error("document store at {address} did not answer ping within {timeout:?}")]
    PingTimeout { address: String, timeout: Duration },

    #[error("failed to persist {record} record")]
    Write {
        record: RecordKind,
        #[source]
        source: BackendError,
    },

    #[error("{record} record write timed out after {timeout:?}")]
    WriteTimeout { record: RecordKind, timeout: Duration },
}

impl StoreError {
    /// The sub-record whose write failed, for write errors.
    pub fn record(&self) -> Option<RecordKind> {
        match self {
            StoreError::Write { record, .. } | StoreError::WriteTimeout { record, .. } => {
                Some(*record)
            }
            _ => None,
        }
    }
}

/// Capability shared by every store backend.
pub trait MeasurementStore {
    /// Persists one bundle. On failure the error identifies the sub-record
    /// that could not be written.
    fn record_measurement(
        &mut self,
        bundle: MeasurementBundle,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
