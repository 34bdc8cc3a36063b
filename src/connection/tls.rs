//! TLS support: the raw/TLS stream switch and the rustls client setup for
//! each [`SslMode`](crate::SslMode).
//!
//! The session starts every connection in plaintext. When the server accepts
//! the SSL request packet, the raw stream is taken out of the transport,
//! handed to the TLS engine, and put back wrapped — all later packets travel
//! through the encrypted stream.

use crate::{
    connection::config::{Config, SslMode},
    error::IoErrorKind,
    Error,
};
use futures_util::io::{AsyncRead, AsyncWrite};
use std::{
    fs, io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio_rustls::{
    rustls::{
        client::{
            danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
            WebPkiServerVerifier,
        },
        pki_types::{CertificateDer, ServerName, UnixTime},
        CertificateError, ClientConfig, DigitallySignedStruct, Error as RustlsError,
        RootCertStore, SignatureScheme,
    },
    TlsConnector,
};
use tokio_util::compat::{Compat, FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::{event, Level};

pub(crate) type TlsStream<S> = Compat<tokio_rustls::client::TlsStream<Compat<S>>>;

/// The byte source underneath the packet codec: either the raw stream or its
/// TLS wrapping. `Detached` exists only for the instant the raw stream is
/// handed to the TLS engine.
#[derive(Debug)]
pub(crate) enum MaybeTlsStream<S> {
    Raw(S),
    Tls(Box<TlsStream<S>>),
    Detached,
}

impl<S> MaybeTlsStream<S> {
    pub(crate) fn is_tls(&self) -> bool {
        matches!(self, MaybeTlsStream::Tls(_))
    }
}

fn detached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream detached for TLS upgrade")
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> AsyncRead for MaybeTlsStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match Pin::get_mut(self) {
            MaybeTlsStream::Raw(stream) => Pin::new(stream).poll_read(cx, buf),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
            MaybeTlsStream::Detached => Poll::Ready(Err(detached())),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> AsyncWrite for MaybeTlsStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match Pin::get_mut(self) {
            MaybeTlsStream::Raw(stream) => Pin::new(stream).poll_write(cx, buf),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
            MaybeTlsStream::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match Pin::get_mut(self) {
            MaybeTlsStream::Raw(stream) => Pin::new(stream).poll_flush(cx),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
            MaybeTlsStream::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match Pin::get_mut(self) {
            MaybeTlsStream::Raw(stream) => Pin::new(stream).poll_close(cx),
            MaybeTlsStream::Tls(stream) => Pin::new(stream.as_mut()).poll_close(cx),
            MaybeTlsStream::Detached => Poll::Ready(Err(detached())),
        }
    }
}

/// Accepts any certificate. Used for `Preferred` and `Required`, which
/// encrypt the stream without validating the peer.
#[derive(Debug)]
struct NoCertVerifier;

impl ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Validates the certificate chain but tolerates a hostname mismatch. Used
/// for `VerifyCa`.
#[derive(Debug)]
struct ChainOnlyVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(RustlsError::InvalidCertificate(CertificateError::NotValidForName)) => {
                Ok(ServerCertVerified::assertion())
            }
            Err(RustlsError::InvalidCertificate(
                CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn load_roots(config: &Config) -> crate::Result<RootCertStore> {
    let mut roots = RootCertStore::empty();

    match &config.ca_cert_path {
        Some(path) => {
            let buf = fs::read(path).map_err(|_| Error::Io {
                kind: IoErrorKind::InvalidData,
                message: "Could not read provided CA certificate!".to_string(),
            })?;

            let certs: Vec<CertificateDer<'static>> = match path.extension() {
                Some(ext) if ext.eq_ignore_ascii_case("pem") || ext.eq_ignore_ascii_case("crt") => {
                    let mut reader = io::BufReader::new(buf.as_slice());
                    rustls_pemfile::certs(&mut reader)
                        .filter_map(|r| r.ok())
                        .collect()
                }
                Some(ext) if ext.eq_ignore_ascii_case("der") => {
                    vec![CertificateDer::from(buf)]
                }
                Some(_) | None => {
                    return Err(Error::Io {
                        kind: IoErrorKind::InvalidInput,
                        message: "Provided CA certificate with unsupported file-extension! Supported types are pem, crt and der.".to_string(),
                    });
                }
            };

            if certs.is_empty() {
                return Err(Error::Io {
                    kind: IoErrorKind::InvalidInput,
                    message: format!(
                        "Certificate file {} contains no certs",
                        path.to_string_lossy()
                    ),
                });
            }

            for cert in certs {
                roots.add(cert).map_err(|e| Error::Tls(e.to_string()))?;
            }
        }
        None => {
            let native_certs = rustls_native_certs::load_native_certs();
            for cert in native_certs.certs {
                let _ = roots.add(cert);
            }
        }
    }

    Ok(roots)
}

fn build_client_config(config: &Config) -> crate::Result<ClientConfig> {
    match config.ssl_mode {
        SslMode::Preferred | SslMode::Required => {
            event!(
                Level::WARN,
                "Encrypting the stream without validating the server certificate."
            );
            let mut client_config = ClientConfig::builder()
                .with_root_certificates(RootCertStore::empty())
                .with_no_client_auth();
            client_config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoCertVerifier));
            Ok(client_config)
        }
        SslMode::VerifyCa => {
            let roots = load_roots(config)?;
            let verifier = WebPkiServerVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| Error::Tls(e.to_string()))?;
            let mut client_config = ClientConfig::builder()
                .with_root_certificates(RootCertStore::empty())
                .with_no_client_auth();
            client_config
                .dangerous()
                .set_certificate_verifier(Arc::new(ChainOnlyVerifier { inner: verifier }));
            Ok(client_config)
        }
        SslMode::VerifyFull => {
            let roots = load_roots(config)?;
            Ok(ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth())
        }
        SslMode::None => Err(Error::Tls(
            "a TLS handshake was requested with TLS disabled".to_string(),
        )),
    }
}

fn server_name(config: &Config, hostname: &str) -> crate::Result<ServerName<'static>> {
    match ServerName::try_from(hostname.to_string()) {
        Ok(name) => Ok(name),
        // Only VerifyFull checks the name, everything else may use a stand-in.
        Err(_) if config.ssl_mode != SslMode::VerifyFull => {
            Ok(ServerName::try_from("placeholder.domain.com".to_string())
                .expect("static server name"))
        }
        Err(e) => Err(Error::Tls(format!("{:?}", e))),
    }
}

/// Runs the TLS handshake over `stream` and returns the encrypted stream.
pub(crate) async fn connect_tls<S>(
    config: &Config,
    hostname: &str,
    stream: S,
) -> crate::Result<TlsStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    event!(Level::INFO, "Performing a TLS handshake");

    let client_config = build_client_config(config)?;
    let connector = TlsConnector::from(Arc::new(client_config));

    let tls_stream = connector
        .connect(server_name(config, hostname)?, stream.compat())
        .await?;

    Ok(tls_stream.compat())
}
