//! Single-shot HTTP probing with sub-phase latency breakdown, content
//! hashing and pluggable measurement stores.

pub mod config;
pub mod http_probe;
pub mod measurement;
pub mod store;

pub use http_probe::prelude::*;
pub use measurement::{ContentMetadata, ContentSizes, LatencyRecord, MeasurementBundle, UptimeRecord};
pub use store::{MeasurementStore, MemoryStore, MongoStore, RecordKind, StoreError};
