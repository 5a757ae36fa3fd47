use std::env;
use std::net::IpAddr;

use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::ConfigError;
use super::probe_config::ProbeConfig;
use crate::store::mongo::{DEFAULT_DATABASE, DEFAULT_PORT, MongoConfig};

pub struct AppConfig {
    pub probe: ProbeConfig,
    pub dns_hosts: Vec<String>,
    /// `None` keeps measurements in memory.
    pub mongo: Option<MongoConfig>,
    pub max_host_width: usize,
}

/// Load the application configuration from a YAML file and environment variables.
/// The YAML file is read from `CONFIG_FILE` (default `config.yml`). A `.env` file,
/// when present, is loaded first. `DNS_HOSTS` overrides the system resolver and
/// `MONGO_HOST` switches storage to the document store.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_file_location =
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yml".to_string());
    let config_str =
        std::fs::read_to_string(&config_file_location).map_err(|source| ConfigError::Read {
            path: config_file_location.clone(),
            source,
        })?;

    let probe: ProbeConfig =
        serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Yaml {
            path: config_file_location.clone(),
            source,
        })?;

    let dns_hosts = parse_dns_hosts(&env::var("DNS_HOSTS").unwrap_or_default());
    if dns_hosts.is_empty() {
        log::info!("Using system DNS configuration");
    } else {
        log::info!("Using DNS hosts: {:?}", dns_hosts);
    }

    let mongo = mongo_from_env()?;

    let max_host_width = probe
        .targets
        .iter()
        .map(|t| t.url.len())
        .max()
        .unwrap_or(10);

    Ok(AppConfig {
        probe,
        dns_hosts,
        mongo,
        max_host_width,
    })
}

fn parse_dns_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn mongo_from_env() -> Result<Option<MongoConfig>, ConfigError> {
    let Some(host) = non_empty_var("MONGO_HOST") else {
        return Ok(None);
    };
    let port = match non_empty_var("MONGO_PORT") {
        Some(value) => value.parse().map_err(|_| ConfigError::Env {
            name: "MONGO_PORT",
            value,
        })?,
        None => DEFAULT_PORT,
    };

    Ok(Some(MongoConfig {
        host,
        port,
        username: non_empty_var("MONGO_USER"),
        password: non_empty_var("MONGO_PASSWORD"),
        database: non_empty_var("MONGO_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
    }))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Setup the TLS connector used for HTTPS targets.
pub fn setup_tls_connector(accept_invalid_certs: bool) -> Result<TokioTlsConnector, ConfigError> {
    let mut builder = native_tls::TlsConnector::builder();
    builder.danger_accept_invalid_certs(accept_invalid_certs);
    let connector = builder.build()?;
    Ok(TokioTlsConnector::from(connector))
}

/// Setup a DNS resolver using the provided DNS hosts.
/// With an empty list the system resolver configuration is used. Otherwise the
/// resolver queries the given name servers over TCP with 2 attempts and a 2 second
/// timeout per attempt.
/// # Arguments
/// * `dns_hosts` - DNS server IPs (e.g., "1.1.1.1").
/// # Returns
/// A `TokioAsyncResolver`, or an error when a host is not an IP address or the
/// system configuration cannot be read.
pub fn setup_resolver(dns_hosts: &[String]) -> Result<TokioAsyncResolver, ConfigError> {
    if dns_hosts.is_empty() {
        return TokioAsyncResolver::tokio_from_system_conf().map_err(ConfigError::SystemResolver);
    }

    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = std::time::Duration::from_secs(2);
    // Every probe should observe a real lookup.
    opts.cache_size = 0;

    let mut name_servers = NameServerConfigGroup::new();

    for host in dns_hosts {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigError::DnsHost(host.clone()))?;
        name_servers.push(NameServerConfig {
            socket_addr: (ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dns_hosts() {
        assert_eq!(parse_dns_hosts("1.1.1.1, 8.8.8.8"), vec!["1.1.1.1", "8.8.8.8"]);
        assert!(parse_dns_hosts("").is_empty());
        assert!(parse_dns_hosts(" , ").is_empty());
    }

    #[tokio::test]
    async fn test_resolver_rejects_non_ip_host() {
        let result = setup_resolver(&["dns.example".to_string()]);
        assert!(matches!(result, Err(ConfigError::DnsHost(host)) if host == "dns.example"));
    }

    #[tokio::test]
    async fn test_resolver_with_explicit_hosts() {
        assert!(setup_resolver(&["1.1.1.1".to_string(), "8.8.8.8".to_string()]).is_ok());
    }

    #[test]
    fn test_tls_connector_builds() {
        assert!(setup_tls_connector(true).is_ok());
        assert!(setup_tls_connector(false).is_ok());
    }
}
