pub mod app_config;
pub mod probe_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid DNS host {0:?}")]
    DnsHost(String),

    #[error("failed to read system DNS configuration")]
    SystemResolver(#[source] trust_dns_resolver::error::ResolveError),

    #[error("invalid value {value:?} for {name}")]
    Env { name: &'static str, value: String },

    #[error("failed to build TLS connector")]
    Tls(#[from] native_tls::Error),
}
