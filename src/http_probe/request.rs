use url::{Host, Position, Url};

use super::error::ProbeError;

/// A GET against a single URL. No caller-supplied headers or body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    url: Url,
}

impl ProbeRequest {
    pub fn get(url: &str) -> Result<Self, ProbeError> {
        let parsed = Url::parse(url).map_err(|source| ProbeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Self::from_url(parsed)
    }

    pub fn from_url(url: Url) -> Result<Self, ProbeError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ProbeError::UnsupportedScheme(other.to_string())),
        }
        if url.host().is_none() {
            return Err(ProbeError::MissingHost(url.to_string()));
        }
        Ok(ProbeRequest { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host identifier used to correlate records: the host name plus the
    /// port when the URL spells one out.
    pub fn host(&self) -> String {
        authority(&self.url)
    }

    pub(crate) fn endpoint(&self) -> Endpoint<'_> {
        let host = match self.url.host() {
            Some(host) => host,
            None => Host::Domain(""),
        };
        Endpoint {
            host,
            port: self.url.port_or_known_default().unwrap_or(80),
            tls: self.url.scheme() == "https",
            authority: authority(&self.url),
            target: &self.url[Position::BeforePath..Position::AfterQuery],
        }
    }
}

/// Where and how to open the connection for one request.
#[derive(Debug)]
pub(crate) struct Endpoint<'a> {
    pub host: Host<&'a str>,
    pub port: u16,
    pub tls: bool,
    /// Value of the `Host` header.
    pub authority: String,
    /// Origin-form request target (path and query).
    pub target: &'a str,
}

impl Endpoint<'_> {
    /// Name presented for SNI and certificate verification.
    pub fn server_name(&self) -> String {
        match &self.host {
            Host::Domain(domain) => domain.to_string(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        }
    }
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_without_explicit_port() {
        let request = ProbeRequest::get("https://example.test/some/path?q=1").expect("valid url");
        assert_eq!(request.host(), "example.test");
        let endpoint = request.endpoint();
        assert_eq!(endpoint.port, 443);
        assert!(endpoint.tls);
        assert_eq!(endpoint.target, "/some/path?q=1");
    }

    #[test]
    fn test_host_keeps_explicit_port() {
        let request = ProbeRequest::get("http://127.0.0.1:8080").expect("valid url");
        assert_eq!(request.host(), "127.0.0.1:8080");
        let endpoint = request.endpoint();
        assert_eq!(endpoint.port, 8080);
        assert!(!endpoint.tls);
        assert_eq!(endpoint.target, "/");
        assert_eq!(endpoint.server_name(), "127.0.0.1");
    }

    #[test]
    fn test_rejects_malformed_and_non_http_urls() {
        assert!(matches!(
            ProbeRequest::get("not a url"),
            Err(ProbeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ProbeRequest::get("ftp://example.test/file"),
            Err(ProbeError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }
}
