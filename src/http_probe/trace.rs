use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::measurement::LatencyRecord;

/// Transport lifecycle points captured during a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    RequestStart,
    DnsStart,
    DnsDone,
    ConnectStart,
    TlsHandshakeStart,
    TlsHandshakeDone,
    FirstResponseByte,
    Completed,
}

/// Event sink filled in by the transport while the single request runs and
/// read back once it is over.
///
/// Connection events belong to a single hop: `begin_hop` clears them before
/// each request of a redirect chain, so only the final hop is reported.
/// Request start and completion span the whole cycle.
#[derive(Debug, Clone, Default)]
pub struct ProbeTrace {
    request_start: Option<Instant>,
    dns_start: Option<Instant>,
    dns_done: Option<Instant>,
    connect_start: Option<Instant>,
    tls_start: Option<Instant>,
    tls_done: Option<Instant>,
    first_byte: Option<Instant>,
    completed: Option<Instant>,
    /// Last status line seen, if any.
    pub status: Option<u16>,
}

impl ProbeTrace {
    /// Forgets the DNS, connect, TLS and first-byte captures of a previous hop.
    pub fn begin_hop(&mut self) {
        self.dns_start = None;
        self.dns_done = None;
        self.connect_start = None;
        self.tls_start = None;
        self.tls_done = None;
        self.first_byte = None;
    }

    pub fn mark(&mut self, event: TraceEvent) {
        self.record(event, Instant::now());
    }

    pub fn record(&mut self, event: TraceEvent, at: Instant) {
        let slot = match event {
            TraceEvent::RequestStart => &mut self.request_start,
            TraceEvent::DnsStart => &mut self.dns_start,
            TraceEvent::DnsDone => &mut self.dns_done,
            TraceEvent::ConnectStart => &mut self.connect_start,
            TraceEvent::TlsHandshakeStart => &mut self.tls_start,
            TraceEvent::TlsHandshakeDone => &mut self.tls_done,
            TraceEvent::FirstResponseByte => &mut self.first_byte,
            TraceEvent::Completed => &mut self.completed,
        };
        *slot = Some(at);
    }

    pub fn dns_lookup(&self) -> Duration {
        span(self.dns_start, self.dns_done)
    }

    pub fn tls_handshake(&self) -> Duration {
        span(self.tls_start, self.tls_done)
    }

    /// Measured from connection start, so it overlaps the TLS handshake.
    pub fn time_to_first_byte(&self) -> Duration {
        span(self.connect_start, self.first_byte)
    }

    pub fn total_latency(&self) -> Duration {
        span(self.request_start, self.completed)
    }

    pub fn latency(&self, timestamp: DateTime<Utc>, host: impl Into<String>) -> LatencyRecord {
        LatencyRecord {
            timestamp,
            dns_lookup: self.dns_lookup(),
            tls_handshake: self.tls_handshake(),
            time_to_first_byte: self.time_to_first_byte(),
            total_latency: self.total_latency(),
            host: host.into(),
        }
    }
}

fn span(start: Option<Instant>, end: Option<Instant>) -> Duration {
    match (start, end) {
        (Some(start), Some(end)) => end.saturating_duration_since(start),
        _ => Duration::ZERO,
    }
}

/// Stream wrapper that notes when the first byte arrives from the peer.
pub(crate) struct FirstByteIo<S> {
    inner: S,
    first_byte: Arc<OnceLock<Instant>>,
}

impl<S> FirstByteIo<S> {
    pub fn new(inner: S, first_byte: Arc<OnceLock<Instant>>) -> Self {
        FirstByteIo { inner, first_byte }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for FirstByteIo<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            if buf.filled().len() > before && this.first_byte.get().is_none() {
                let _ = this.first_byte.set(Instant::now());
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for FirstByteIo<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
