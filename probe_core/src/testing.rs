//! In-process HTTP fixtures for tests.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves every request with `status` after `delay`, closing each connection.
pub async fn spawn_http_server(status: u16, delay: Duration) -> SocketAddr {
    spawn_responder(status, delay, String::new()).await
}

/// Answers every request with `301` pointing at `location`.
pub async fn spawn_redirect_server(location: impl Into<String>) -> SocketAddr {
    let headers = format!("Location: {}\r\n", location.into());
    spawn_responder(301, Duration::ZERO, headers).await
}

/// Accepts connections and never writes a byte.
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// An address with nothing listening on it. Port 1 (tcpmux) is reserved.
pub fn unused_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 1))
}

/// Serves HTTPS with a fresh self-signed certificate for `127.0.0.1` and
/// `localhost`. Returns a client config that trusts only that certificate.
#[cfg(test)]
pub async fn spawn_https_server(status: u16) -> (SocketAddr, std::sync::Arc<rustls::ClientConfig>) {
    use rustls::pki_types::PrivateKeyDer;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    params
        .subject_alt_names
        .push(rcgen::SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    let cert = params.self_signed(&key_pair).unwrap().der().clone();
    let key = PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let server_config = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert).unwrap();
    let client_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(stream).await {
                    respond(tls, status, Duration::ZERO, String::new()).await;
                }
            });
        }
    });

    (addr, Arc::new(client_config))
}

async fn spawn_responder(status: u16, delay: Duration, headers: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(respond(stream, status, delay, headers.clone()));
        }
    });

    addr
}

async fn respond<S>(mut stream: S, status: u16, delay: Duration, headers: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    tokio::time::sleep(delay).await;

    let body = if status == 204 || status == 304 { "" } else { "ok" };
    let response = format!(
        "HTTP/1.1 {} Fixture\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        status,
        body.len(),
        headers,
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
