use contractkit::Verb;
use thiserror::Error;

/// Failures while assembling or serving the HTTP host. All of them are fatal.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("router has already been built")]
    AlreadyBuilt,

    #[error("cannot mount routing table '{contract}' after the router was built")]
    MountAfterBuild { contract: String },

    #[error("{verb} {path}: unknown timeout policy '{name}'")]
    UnknownTimeoutPolicy {
        verb: Verb,
        path: String,
        name: String,
    },

    #[error("{verb} {path}: invalid timeout status {status}")]
    InvalidTimeoutStatus { verb: Verb, path: String, status: u16 },

    #[error("invalid grants header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid bind address '{addr}': {source}")]
    InvalidBindAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}
