use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("DNS lookup for '{host}' failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DNS lookup for '{0}' returned no addresses")]
    NoAddresses(String),

    #[error("Connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with '{host}' failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Request build error: {0}")]
    Request(#[from] http::Error),

    #[error("Stopped after {limit} redirects starting from '{url}'")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Metrics(#[from] probe_metrics::MetricsError),
}

impl ProbeError {
    /// Short, stable label for the failure class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::InvalidUrl { .. } | ProbeError::UnsupportedScheme(_) => "url",
            ProbeError::Dns { .. } | ProbeError::NoAddresses(_) => "dns",
            ProbeError::Connect { .. } => "connect",
            ProbeError::Tls { .. } | ProbeError::TlsConfig(_) => "tls",
            ProbeError::Http(_) | ProbeError::Request(_) | ProbeError::TooManyRedirects { .. } => {
                "http"
            }
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Metrics(_) => "metrics",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ProbeError::Timeout(Duration::from_secs(1)).kind(), "timeout");
        assert_eq!(ProbeError::NoAddresses("a.test".into()).kind(), "dns");
        assert_eq!(ProbeError::UnsupportedScheme("ftp".into()).kind(), "url");
        let redirects = ProbeError::TooManyRedirects {
            url: "http://a.test/".into(),
            limit: 10,
        };
        assert_eq!(redirects.kind(), "http");
    }

    #[test]
    fn test_timeout_message() {
        let err = ProbeError::Timeout(Duration::from_secs(1));
        assert_eq!(err.to_string(), "Request timed out after 1s");
    }
}
