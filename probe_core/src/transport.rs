//! One-connection-per-request HTTP/1.1 transport with lifecycle hooks.
//!
//! Every exchange resolves, dials and (for https) handshakes a fresh
//! connection, reporting each step to the caller's [`TraceHooks`]. The
//! response body is drained and discarded, and the connection task is torn
//! down on every exit path.

use crate::error::{ProbeError, Result};
use crate::target::{Scheme, Target};
use crate::trace::TraceHooks;
use bytes::Bytes;
use http::header::{HOST, LOCATION, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = concat!("latency-probe/", env!("CARGO_PKG_VERSION"));

/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 10;

#[derive(Clone)]
pub struct Transport {
    tls: TlsConnector,
    user_agent: String,
}

impl Transport {
    /// Transport trusting the Mozilla root store.
    pub fn new() -> Result<Self> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::TlsConfig(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self::with_tls_config(Arc::new(config)))
    }

    pub fn with_tls_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            tls: TlsConnector::from(config),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Performs a traced GET and returns the final response status code.
    ///
    /// Redirects are followed up to [`MAX_REDIRECTS`] hops, each over a fresh
    /// connection reported to the same hooks. Any final status is a completed
    /// exchange; only transport failures are errors.
    pub async fn get<H>(&self, target: &Target, hooks: &mut H) -> Result<u16>
    where
        H: TraceHooks + ?Sized,
    {
        let mut current = target.clone();
        let mut redirects = 0;

        loop {
            let hop = self.fetch(&current, hooks).await?;

            let location = match hop.location {
                Some(location) if is_redirect(hop.status) => location,
                _ => return Ok(hop.status),
            };

            if redirects == MAX_REDIRECTS {
                return Err(ProbeError::TooManyRedirects {
                    url: target.url().to_string(),
                    limit: MAX_REDIRECTS,
                });
            }
            redirects += 1;

            let next = current.join(&location)?;
            debug!(
                url = %target.url(),
                status = hop.status,
                location = %next,
                redirects,
                "Following redirect"
            );
            current = next;
        }
    }

    async fn fetch<H>(&self, target: &Target, hooks: &mut H) -> Result<Hop>
    where
        H: TraceHooks + ?Sized,
    {
        let addrs = resolve(target, hooks).await?;
        let tcp = dial(target, &addrs, hooks).await?;

        match target.scheme() {
            Scheme::Http => self.exchange(tcp, target).await,
            Scheme::Https => {
                let server_name = ServerName::try_from(target.host().to_string()).map_err(|e| {
                    ProbeError::InvalidUrl {
                        url: target.url().to_string(),
                        reason: e.to_string(),
                    }
                })?;

                hooks.tls_start();
                let tls = self
                    .tls
                    .connect(server_name, tcp)
                    .await
                    .map_err(|source| ProbeError::Tls {
                        host: target.host().to_string(),
                        source,
                    })?;
                hooks.tls_done();

                self.exchange(tls, target).await
            }
        }
    }

    async fn exchange<IO>(&self, io: IO, target: &Target) -> Result<Hop>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io)).await?;

        let url = target.url().to_string();
        let _conn = ConnectionTask(tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(url = %url, "Connection closed with error: {}", e);
            }
        }));

        let request = Request::builder()
            .method(Method::GET)
            .uri(target.path_and_query())
            .header(HOST, target.authority())
            .header(USER_AGENT, &self.user_agent)
            .body(Empty::<Bytes>::new())?;

        let response = sender.send_request(request).await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut body = response.into_body();
        let mut drained = 0usize;
        while let Some(frame) = body.frame().await {
            if let Some(chunk) = frame?.data_ref() {
                drained += chunk.len();
            }
        }
        debug!(url = %target.url(), status, bytes = drained, "Response body drained");

        Ok(Hop { status, location })
    }
}

/// Status and `Location` of one request/response exchange.
struct Hop {
    status: u16,
    location: Option<String>,
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

async fn resolve<H>(target: &Target, hooks: &mut H) -> Result<Vec<SocketAddr>>
where
    H: TraceHooks + ?Sized,
{
    if let Some(ip) = target.ip() {
        return Ok(vec![SocketAddr::new(ip, target.port())]);
    }

    hooks.dns_start(target.host());
    let addrs: Vec<SocketAddr> = lookup_host((target.host(), target.port()))
        .await
        .map_err(|source| ProbeError::Dns {
            host: target.host().to_string(),
            source,
        })?
        .collect();
    hooks.dns_done();

    if addrs.is_empty() {
        return Err(ProbeError::NoAddresses(target.host().to_string()));
    }

    Ok(addrs)
}

async fn dial<H>(target: &Target, addrs: &[SocketAddr], hooks: &mut H) -> Result<TcpStream>
where
    H: TraceHooks + ?Sized,
{
    let mut last_error = None;

    for addr in addrs {
        hooks.connect_start(*addr);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                hooks.connect_done(*addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!(url = %target.url(), %addr, "Connect attempt failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    let source = last_error.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no addresses to dial")
    });
    Err(ProbeError::Connect {
        target: target.description(),
        source,
    })
}

/// Aborts the spawned connection driver when dropped.
struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        spawn_http_server, spawn_https_server, spawn_redirect_server, spawn_silent_server,
        unused_addr,
    };
    use crate::trace::MockTraceHooks;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::time::Duration;

    #[tokio::test]
    async fn test_plain_http_fires_connect_only() {
        let addr = spawn_http_server(200, Duration::ZERO).await;
        let target = Target::parse(&format!("http://{}/", addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_dns_start().never();
        hooks.expect_dns_done().never();
        hooks.expect_connect_start().with(eq(addr)).times(1).return_const(());
        hooks.expect_connect_done().with(eq(addr)).times(1).return_const(());
        hooks.expect_tls_start().never();
        hooks.expect_tls_done().never();

        let status = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_hostname_fires_dns_events() {
        let addr = spawn_http_server(204, Duration::ZERO).await;
        let target = Target::parse(&format!("http://localhost:{}/", addr.port())).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_dns_start().with(eq("localhost")).times(1).return_const(());
        hooks.expect_dns_done().times(1).return_const(());
        // localhost may resolve to ::1 first, which the fixture does not listen on.
        hooks.expect_connect_start().times(1..).return_const(());
        hooks.expect_connect_done().times(1).return_const(());

        let status = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap();
        assert_eq!(status, 204);
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let addr = spawn_http_server(503, Duration::ZERO).await;
        let target = Target::parse(&format!("http://{}/down", addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_connect_start().return_const(());
        hooks.expect_connect_done().return_const(());

        let status = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap();
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let addr = unused_addr();
        let target = Target::parse(&format!("http://{}/", addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_connect_start().times(1).return_const(());
        hooks.expect_connect_done().never();

        let err = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap_err();
        assert_eq!(err.kind(), "connect");
    }

    #[tokio::test]
    async fn test_tls_failure_leaves_tls_done_unfired() {
        // The silent fixture never answers the ClientHello; bound by timeout.
        let addr = spawn_silent_server().await;
        let target = Target::parse(&format!("https://{}/", addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_connect_start().return_const(());
        hooks.expect_connect_done().return_const(());
        hooks.expect_tls_start().times(1).return_const(());
        hooks.expect_tls_done().never();

        let transport = Transport::new().unwrap();
        let outcome =
            tokio::time::timeout(Duration::from_millis(200), transport.get(&target, &mut hooks)).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_https_fires_tls_events_in_order() {
        let (addr, tls_config) = spawn_https_server(200).await;
        let target = Target::parse(&format!("https://{}/secure", addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        let mut seq = Sequence::new();
        hooks.expect_connect_start().with(eq(addr)).times(1).in_sequence(&mut seq).return_const(());
        hooks.expect_connect_done().with(eq(addr)).times(1).in_sequence(&mut seq).return_const(());
        hooks.expect_tls_start().times(1).in_sequence(&mut seq).return_const(());
        hooks.expect_tls_done().times(1).in_sequence(&mut seq).return_const(());

        let status = Transport::with_tls_config(tls_config)
            .get(&target, &mut hooks)
            .await
            .unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_redirect_is_followed_to_final_status() {
        let final_addr = spawn_http_server(200, Duration::ZERO).await;
        let redirect_addr = spawn_redirect_server(format!("http://{}/landing", final_addr)).await;
        let target = Target::parse(&format!("http://{}/", redirect_addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        let mut seq = Sequence::new();
        hooks.expect_connect_start().with(eq(redirect_addr)).times(1).in_sequence(&mut seq).return_const(());
        hooks.expect_connect_done().with(eq(redirect_addr)).times(1).in_sequence(&mut seq).return_const(());
        hooks.expect_connect_start().with(eq(final_addr)).times(1).in_sequence(&mut seq).return_const(());
        hooks.expect_connect_done().with(eq(final_addr)).times(1).in_sequence(&mut seq).return_const(());

        let status = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_redirect_to_https_fires_tls_events() {
        let (tls_addr, tls_config) = spawn_https_server(204).await;
        let redirect_addr = spawn_redirect_server(format!("https://{}/", tls_addr)).await;
        let target = Target::parse(&format!("http://{}/", redirect_addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_connect_start().times(2).return_const(());
        hooks.expect_connect_done().times(2).return_const(());
        hooks.expect_tls_start().times(1).return_const(());
        hooks.expect_tls_done().times(1).return_const(());

        let status = Transport::with_tls_config(tls_config)
            .get(&target, &mut hooks)
            .await
            .unwrap();
        assert_eq!(status, 204);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let addr = spawn_redirect_server("/again").await;
        let target = Target::parse(&format!("http://{}/", addr)).unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_connect_start().times(MAX_REDIRECTS + 1).return_const(());
        hooks.expect_connect_done().times(MAX_REDIRECTS + 1).return_const(());

        let err = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap_err();
        assert!(matches!(err, ProbeError::TooManyRedirects { limit: MAX_REDIRECTS, .. }));
        assert_eq!(err.kind(), "http");
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_a_dns_error() {
        let target = Target::parse("http://nonexistent.invalid/").unwrap();

        let mut hooks = MockTraceHooks::new();
        hooks.expect_dns_start().with(eq("nonexistent.invalid")).times(1).return_const(());
        hooks.expect_dns_done().never();
        hooks.expect_connect_start().never();

        let err = Transport::new().unwrap().get(&target, &mut hooks).await.unwrap_err();
        assert_eq!(err.kind(), "dns");
    }
}
