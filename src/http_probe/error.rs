use std::time::Duration;

use thiserror::Error;

use crate::measurement::MeasurementBundle;

/// Transport-level failure of a probe cycle.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("URL {0:?} has no host")]
    MissingHost(String),

    #[error("DNS lookup for {host} failed")]
    Dns {
        host: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },

    #[error("DNS lookup for {host} returned no addresses")]
    NoAddress { host: String },

    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {host} failed")]
    Tls {
        host: String,
        #[source]
        source: native_tls::Error,
    },

    #[error("failed to build request")]
    Request(#[from] hyper::http::Error),

    #[error("HTTP exchange failed")]
    Http(#[from] hyper::Error),

    #[error("failed to read response body")]
    Body(#[source] hyper::Error),

    #[error("redirect with invalid location {0:?}")]
    InvalidRedirect(String),

    #[error("stopped after {0} redirects")]
    TooManyRedirects(usize),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// A probe cycle that ended without a complete response.
///
/// `bundle` still carries the uptime record (`up == false`); the other three
/// records are zero-valued.
#[derive(Debug, Error)]
#[error("probe of {} failed: {error}", .bundle.host())]
pub struct ProbeFailure {
    pub bundle: MeasurementBundle,
    #[source]
    pub error: ProbeError,
}
