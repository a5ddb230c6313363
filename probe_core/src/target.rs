use crate::error::{ProbeError, Result};
use http::Uri;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A probe destination parsed from a configured URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: String,
    scheme: Scheme,
    host: String,
    port: u16,
    path_and_query: String,
}

impl Target {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = |reason: &str| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

        let scheme = match uri.scheme_str() {
            Some("http") => Scheme::Http,
            Some("https") => Scheme::Https,
            Some(other) => return Err(ProbeError::UnsupportedScheme(other.to_string())),
            None => return Err(invalid("missing scheme")),
        };

        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = match explicit_port(&uri) {
            Some(text) if !text.is_empty() => {
                text.parse::<u16>().map_err(|_| invalid("invalid port"))?
            }
            _ => scheme.default_port(),
        };
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            url: url.to_string(),
            scheme,
            host,
            port,
            path_and_query,
        })
    }

    /// The URL exactly as configured. Used as the `url` label.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    /// Host literal address, if the URL names one. Such targets need no DNS.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Value for the `Host` request header.
    pub fn authority(&self) -> String {
        let host = match self.ip() {
            Some(IpAddr::V6(_)) => format!("[{}]", self.host),
            _ => self.host.clone(),
        };

        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Resolves a redirect `Location` against this target. Absolute,
    /// scheme-relative, absolute-path and relative-path forms are accepted.
    pub fn join(&self, location: &str) -> Result<Target> {
        let location = location.trim();

        if location.starts_with("//") {
            return Target::parse(&format!("{}:{}", self.scheme.as_str(), location));
        }
        if location.contains("://") {
            return Target::parse(location);
        }

        let path = if location.starts_with('/') {
            location.to_string()
        } else {
            let base = self.path_and_query.split('?').next().unwrap_or("/");
            let directory = match base.rfind('/') {
                Some(i) => &base[..=i],
                None => "/",
            };
            format!("{}{}", directory, location)
        };

        Target::parse(&format!("{}://{}{}", self.scheme.as_str(), self.authority(), path))
    }

    pub fn description(&self) -> String {
        format!("{} {}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

/// Port text as written in the authority, if any.
fn explicit_port(uri: &Uri) -> Option<&str> {
    let authority = uri.authority()?.as_str();
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let host_end = host_port.rfind(']').unwrap_or(0);
    host_port[host_end..].rsplit_once(':').map(|(_, port)| port)
}

impl FromStr for Target {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_defaults() {
        let target = Target::parse("https://example.test").unwrap();
        assert_eq!(target.scheme(), Scheme::Https);
        assert_eq!(target.host(), "example.test");
        assert_eq!(target.port(), 443);
        assert_eq!(target.path_and_query(), "/");
        assert_eq!(target.authority(), "example.test");
        assert_eq!(target.url(), "https://example.test");
    }

    #[test]
    fn test_parse_explicit_port_and_path() {
        let target: Target = "http://127.0.0.1:8080/health?full=1".parse().unwrap();
        assert_eq!(target.port(), 8080);
        assert_eq!(target.path_and_query(), "/health?full=1");
        assert_eq!(target.authority(), "127.0.0.1:8080");
        assert_eq!(target.ip(), Some("127.0.0.1".parse().unwrap()));
        assert_eq!(target.description(), "http 127.0.0.1:8080");
    }

    #[test]
    fn test_parse_ipv6_literal() {
        let target = Target::parse("http://[::1]:9000/").unwrap();
        assert_eq!(target.host(), "::1");
        assert!(target.ip().is_some());
        assert_eq!(target.authority(), "[::1]:9000");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            Target::parse("ftp://example.test"),
            Err(ProbeError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Target::parse("example.test/path"),
            Err(ProbeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Target::parse("not a url"),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_rejects_port_out_of_range() {
        let err = Target::parse("http://127.0.0.1:99999/").unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl { ref reason, .. } if reason == "invalid port"));
        assert!(Target::parse("http://a.test:8o/").is_err());
        assert_eq!(Target::parse("http://127.0.0.1:65535/").unwrap().port(), 65535);
        assert_eq!(Target::parse("http://[::1]/").unwrap().port(), 80);
    }

    #[test]
    fn test_join_location_forms() {
        let base = Target::parse("http://a.test:8080/app/page?x=1").unwrap();

        let absolute = base.join("https://b.test/login").unwrap();
        assert_eq!(absolute.scheme(), Scheme::Https);
        assert_eq!(absolute.host(), "b.test");
        assert_eq!(absolute.port(), 443);

        let scheme_relative = base.join("//c.test/x").unwrap();
        assert_eq!(scheme_relative.scheme(), Scheme::Http);
        assert_eq!(scheme_relative.host(), "c.test");
        assert_eq!(scheme_relative.path_and_query(), "/x");

        let root = base.join("/other?y=2").unwrap();
        assert_eq!(root.authority(), "a.test:8080");
        assert_eq!(root.path_and_query(), "/other?y=2");

        let relative = base.join("next").unwrap();
        assert_eq!(relative.path_and_query(), "/app/next");
    }
}
