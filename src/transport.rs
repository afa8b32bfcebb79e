//! Dialing the server connection, plain TCP or client-side TLS.

use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::EngineError;

/// An established connection to the server.
pub(crate) enum Stream {
    /// Plain TCP.
    Tcp(TcpStream),
    /// Client-side TLS.
    Tls(Box<TlsStream<TcpStream>>),
}

/// Dial the configured server, upgrading to TLS when requested.
pub(crate) async fn dial(config: &Config) -> Result<Stream, EngineError> {
    let tcp = TcpStream::connect(&config.server).await?;
    if let Err(e) = enable_keepalive(&tcp) {
        warn!(error = %e, "failed to enable TCP keepalive");
    }
    let peer = tcp.peer_addr()?;

    if !config.tls {
        info!(server = %config.server, peer = %peer, "connected");
        return Ok(Stream::Tcp(tcp));
    }

    let tls = upgrade_to_tls(tcp, &config.server, config.tls_verify).await?;
    info!(
        server = %config.server,
        peer = %peer,
        verify = config.tls_verify,
        "connected over TLS"
    );
    Ok(Stream::Tls(Box::new(tls)))
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    sock.set_tcp_keepalive(&keepalive)
}

/// Upgrade a TCP stream to client TLS.
async fn upgrade_to_tls(
    tcp: TcpStream,
    server: &str,
    verify: bool,
) -> Result<TlsStream<TcpStream>, EngineError> {
    let hostname = server.rsplit_once(':').map_or(server, |(host, _)| host);

    let tls_config = if verify {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for cert in native.certs {
            if let Err(e) = roots.add(cert) {
                warn!(error = %e, "failed to add root cert");
            }
        }
        for e in &native.errors {
            warn!(error = %e, "error loading native certs");
        }
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        // Skip certificate verification (self-signed / test servers only).
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()
    };

    let connector = TlsConnector::from(Arc::new(tls_config));
    let name = ServerName::try_from(hostname.to_string())
        .map_err(|_| EngineError::InvalidServerName(hostname.to_string()))?;

    Ok(connector.connect(name, tcp).await?)
}

/// Certificate verifier that accepts any server certificate.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dial_plain_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = Config::new(addr.to_string(), "bot", "bot");
        let stream = dial(&config).await.unwrap();
        assert!(matches!(stream, Stream::Tcp(_)));
    }

    #[tokio::test]
    async fn test_dial_refused() {
        // A port nothing listens on: bind, note the address, drop.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config::new(addr.to_string(), "bot", "bot");
        assert!(dial(&config).await.is_err());
    }
}
