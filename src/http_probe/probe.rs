use chrono::Utc;
use tokio::time::timeout;

use super::prelude::*;
use crate::measurement::{
    ContentMetadata, ContentSizes, LatencyRecord, MeasurementBundle, UptimeRecord,
};

/// Probes one target and returns the four-record measurement bundle.
///
/// Any HTTP response, whatever its status, is a successful cycle. A
/// transport failure (DNS, connect, TLS, timeout, broken body) yields a
/// `ProbeFailure` whose bundle only carries the uptime record. Nothing is
/// retried.
pub async fn probe(
    transport: &ProbeTransport,
    request: &ProbeRequest,
) -> Result<MeasurementBundle, ProbeFailure> {
    let host = request.host();
    let mut trace = ProbeTrace::default();
    trace.mark(TraceEvent::RequestStart);

    let outcome = timeout(transport.timeout(), transport.fetch(request, &mut trace)).await;
    // One timestamp shared by every record of this cycle.
    let timestamp = Utc::now();

    let fetched = match outcome {
        Ok(Ok(fetched)) => fetched,
        Ok(Err(error)) => {
            return Err(ProbeFailure {
                bundle: MeasurementBundle::transport_failure(timestamp, host, trace.status.unwrap_or(0)),
                error,
            });
        }
        Err(_) => {
            return Err(ProbeFailure {
                bundle: MeasurementBundle::transport_failure(timestamp, host, trace.status.unwrap_or(0)),
                error: ProbeError::Timeout(transport.timeout()),
            });
        }
    };

    let latency = trace.latency(timestamp, host.clone());
    if is_anomalous(&latency) {
        log::warn!(
            "Possible lookup issue for URL: {}, DNS: {:?}, Latency: {:?}, TLS handshake: {:?}, TTFB: {:?}",
            request.url(),
            latency.dns_lookup,
            latency.total_latency,
            latency.tls_handshake,
            latency.time_to_first_byte,
        );
    }

    Ok(MeasurementBundle {
        uptime: UptimeRecord::new(timestamp, fetched.status, host.clone()),
        latency,
        metadata: ContentMetadata::from_document(timestamp, host, fetched.body.to_vec()),
        sizes: ContentSizes::default(),
    })
}

/// A successful exchange should always show a lookup, a first byte and a
/// total; a zero in any of them points at the instrumentation or the network.
pub(crate) fn is_anomalous(latency: &LatencyRecord) -> bool {
    latency.dns_lookup.is_zero()
        || latency.total_latency.is_zero()
        || latency.time_to_first_byte.is_zero()
}
