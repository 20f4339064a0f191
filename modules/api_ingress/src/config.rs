use contractkit::TimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8087";
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_STATUS: u16 = 504;
pub const DEFAULT_GRANTS_HEADER: &str = "x-grants";
pub const DEFAULT_LOGGED_BODY_LIMIT: usize = 32 * 1024;

/// Host configuration, read from `modules.api_ingress`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ApiIngressConfig {
    pub bind_addr: String,
    /// Serve the route catalogue at `/routes`.
    pub enable_docs: bool,
    pub cors_enabled: bool,
    pub body_limit_bytes: usize,
    /// Applied to routes that carry no timeout metadata.
    #[serde(with = "humantime_serde")]
    pub default_timeout: Option<Duration>,
    /// Status for timeouts that don't name one.
    pub timeout_status: u16,
    /// Named timeout policies, referenced by `RequestTimeout::Named`.
    pub timeout_policies: HashMap<String, TimeoutPolicy>,
    pub auth: AuthConfig,
    pub http_logging: HttpLoggingConfig,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            enable_docs: false,
            cors_enabled: false,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            default_timeout: None,
            timeout_status: DEFAULT_TIMEOUT_STATUS,
            timeout_policies: HashMap::new(),
            auth: AuthConfig::default(),
            http_logging: HttpLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct AuthConfig {
    /// Request header carrying the caller's comma separated grants.
    pub grants_header: String,
    /// Policy name → grants that satisfy it.
    pub policies: HashMap<String, Vec<String>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            grants_header: DEFAULT_GRANTS_HEADER.to_string(),
            policies: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct HttpLoggingConfig {
    /// Body bytes logged when a route doesn't set its own limit.
    pub default_body_limit: usize,
}

impl Default for HttpLoggingConfig {
    fn default() -> Self {
        Self {
            default_body_limit: DEFAULT_LOGGED_BODY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_uses_defaults() {
        let cfg: ApiIngressConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg, ApiIngressConfig::default());
        assert_eq!(cfg.auth.grants_header, "x-grants");
        assert_eq!(cfg.timeout_status, 504);
    }

    #[test]
    fn durations_and_policies_deserialize() {
        let cfg: ApiIngressConfig = serde_json::from_value(serde_json::json!({
            "bind_addr": "0.0.0.0:9000",
            "default_timeout": "30s",
            "timeout_policies": {
                "slow": { "timeout": "2m", "status": 503 }
            },
            "auth": { "policies": { "user": ["reader", "writer"] } }
        }))
        .unwrap();

        assert_eq!(cfg.default_timeout, Some(Duration::from_secs(30)));
        let slow = &cfg.timeout_policies["slow"];
        assert_eq!(slow.timeout, Duration::from_secs(120));
        assert_eq!(slow.status, Some(503));
        assert_eq!(cfg.auth.policies["user"], vec!["reader", "writer"]);
        assert_eq!(cfg.auth.grants_header, "x-grants");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: Result<ApiIngressConfig, _> =
            serde_json::from_value(serde_json::json!({ "bind": "x" }));
        assert!(res.is_err());
    }
}
