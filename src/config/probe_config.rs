use serde::Deserialize;

use crate::http_probe::DEFAULT_MAX_REDIRECTS;

/// Targets and transport options for the openping binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Targets probed once each, in order.
    pub targets: Vec<TargetConfig>,

    /// Redirect hops to follow. 0 measures the redirect response itself.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Skip certificate verification on HTTPS targets.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// A single target to probe.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// The URL requested with GET.
    pub url: String,
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_default_max_redirects() {
        assert_eq!(default_max_redirects(), 10);
    }

    #[test]
    fn test_probe_config_deserialization() {
        let yaml = r#"
                    targets:
                        - url: https://www.google.com
                        - url: http://www.example.com:8080/health
                    max_redirects: 0
                    accept_invalid_certs: true
                    "#;

        let config: ProbeConfig = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].url, "https://www.google.com");
        assert_eq!(config.targets[1].url, "http://www.example.com:8080/health");
        assert_eq!(config.max_redirects, 0);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_probe_config_defaults() {
        let yaml = r#"
                    targets:
                        - url: https://www.github.com
                    "#;

        let config: ProbeConfig = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.max_redirects, 10);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_missing_targets_is_an_error() {
        let result: Result<ProbeConfig, _> = serde_yaml::from_str("max_redirects: 3");
        assert!(result.is_err());
    }
}
