use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HOST, LOCATION, USER_AGENT as USER_AGENT_HEADER};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::TokioAsyncResolver;
use url::Host;

use super::error::ProbeError;
use super::request::{Endpoint, ProbeRequest};
use super::trace::{FirstByteIo, ProbeTrace, TraceEvent};
use super::{DEFAULT_MAX_REDIRECTS, PROBE_TIMEOUT, USER_AGENT};

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// Everything a probe needs to reach a target: the resolver, the TLS
/// connector, the cycle timeout and the redirect limit.
///
/// Cheap to clone. Holds no connection pool, every probe dials a fresh
/// connection so DNS and TLS are always observed.
#[derive(Clone)]
pub struct ProbeTransport {
    resolver: TokioAsyncResolver,
    tls: TokioTlsConnector,
    timeout: Duration,
    max_redirects: usize,
}

/// A fully read response.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub status: u16,
    pub body: Bytes,
}

/// Keeps the hyper connection task alive for as long as the response is in
/// use.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Hop {
    response: Response<Incoming>,
    _connection: ConnectionGuard,
}

impl ProbeTransport {
    pub fn new(resolver: TokioAsyncResolver, tls: TokioTlsConnector) -> Self {
        ProbeTransport {
            resolver,
            tls,
            timeout: PROBE_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Zero disables redirect following; the redirect response is measured.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Runs the request to completion, following redirects, and reads the
    /// whole body of the final response.
    pub(crate) async fn fetch(
        &self,
        request: &ProbeRequest,
        trace: &mut ProbeTrace,
    ) -> Result<Fetched, ProbeError> {
        let mut current = request.clone();
        let mut redirects = 0;

        loop {
            let hop = self.exchange(&current, trace).await?;
            let status = hop.response.status();

            if let Some(next) = self.redirect_target(&current, &hop.response)? {
                redirects += 1;
                if redirects > self.max_redirects {
                    return Err(ProbeError::TooManyRedirects(self.max_redirects));
                }
                log::debug!("following {} redirect to {}", status.as_u16(), next.url());
                current = next;
                continue;
            }

            let body = hop
                .response
                .into_body()
                .collect()
                .await
                .map_err(ProbeError::Body)?
                .to_bytes();
            trace.mark(TraceEvent::Completed);

            return Ok(Fetched {
                status: status.as_u16(),
                body,
            });
        }
    }

    fn redirect_target(
        &self,
        current: &ProbeRequest,
        response: &Response<Incoming>,
    ) -> Result<Option<ProbeRequest>, ProbeError> {
        if self.max_redirects == 0 || !is_redirect(response.status()) {
            return Ok(None);
        }
        let Some(location) = response.headers().get(LOCATION) else {
            return Ok(None);
        };
        let location = location
            .to_str()
            .map_err(|_| ProbeError::InvalidRedirect(format!("{:?}", location)))?;
        let next = current
            .url()
            .join(location)
            .map_err(|_| ProbeError::InvalidRedirect(location.to_string()))?;
        ProbeRequest::from_url(next).map(Some)
    }

    /// One request/response on a freshly opened connection. Returns once the
    /// response head has arrived.
    async fn exchange(
        &self,
        request: &ProbeRequest,
        trace: &mut ProbeTrace,
    ) -> Result<Hop, ProbeError> {
        trace.begin_hop();
        let endpoint = request.endpoint();
        let addrs = self.resolve(&endpoint, trace).await?;
        let stream = connect(&addrs, endpoint.port, trace).await?;

        let io: Box<dyn Io> = if endpoint.tls {
            let server_name = endpoint.server_name();
            trace.mark(TraceEvent::TlsHandshakeStart);
            let handshake = self.tls.connect(&server_name, stream).await;
            trace.mark(TraceEvent::TlsHandshakeDone);
            Box::new(handshake.map_err(|source| ProbeError::Tls {
                host: server_name,
                source,
            })?)
        } else {
            Box::new(stream)
        };

        let first_byte = Arc::new(OnceLock::new());
        let io = FirstByteIo::new(io, Arc::clone(&first_byte));

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(io)).await?;
        let connection = ConnectionGuard(tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::debug!("probe connection closed: {e}");
            }
        }));

        let outgoing = Request::get(endpoint.target)
            .header(HOST, endpoint.authority.as_str())
            .header(USER_AGENT_HEADER, USER_AGENT)
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(outgoing).await?;
        if let Some(at) = first_byte.get() {
            trace.record(TraceEvent::FirstResponseByte, *at);
        }
        trace.status = Some(response.status().as_u16());

        Ok(Hop {
            response,
            _connection: connection,
        })
    }

    async fn resolve(
        &self,
        endpoint: &Endpoint<'_>,
        trace: &mut ProbeTrace,
    ) -> Result<Vec<IpAddr>, ProbeError> {
        let domain = match &endpoint.host {
            Host::Ipv4(ip) => return Ok(vec![IpAddr::V4(*ip)]),
            Host::Ipv6(ip) => return Ok(vec![IpAddr::V6(*ip)]),
            Host::Domain(domain) => *domain,
        };

        trace.mark(TraceEvent::DnsStart);
        let lookup = self.resolver.lookup_ip(domain).await;
        trace.mark(TraceEvent::DnsDone);

        let lookup = lookup.map_err(|source| ProbeError::Dns {
            host: domain.to_string(),
            source,
        })?;
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        if addrs.is_empty() {
            return Err(ProbeError::NoAddress {
                host: domain.to_string(),
            });
        }
        Ok(addrs)
    }
}

/// Tries each resolved address in order until one accepts.
async fn connect(addrs: &[IpAddr], port: u16, trace: &mut ProbeTrace) -> Result<TcpStream, ProbeError> {
    trace.mark(TraceEvent::ConnectStart);
    let mut last_error = None;
    for ip in addrs {
        let addr = SocketAddr::new(*ip, port);
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(source) => {
                log::debug!("connect to {addr} failed: {source}");
                last_error = Some(ProbeError::Connect {
                    addr: addr.to_string(),
                    source,
                });
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ProbeError::NoAddress {
        host: format!("port {port}"),
    }))
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}
