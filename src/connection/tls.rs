use std::sync::Arc;

use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::client::WebPkiServerVerifier;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::Error as TlsError;
use tokio_rustls::rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};

use crate::connection::stream::{MySqlStream, MAX_PACKET_SIZE_ADVERTISED};
use crate::error::{ClientError, Error, Result};
use crate::options::{MySqlConnectOptions, MySqlSslMode};
use crate::protocol::connect::SslRequest;
use crate::protocol::Capabilities;

/// Negotiates the TLS upgrade after the initial handshake packet, per the
/// configured SSL mode. The SSL request frame must be flushed before the
/// transport switches; bytes already buffered above the socket carry over.
pub(super) async fn maybe_upgrade(
    stream: &mut MySqlStream,
    options: &MySqlConnectOptions,
    server_capabilities: Capabilities,
    collation: u8,
) -> Result<()> {
    match options.ssl_mode {
        MySqlSslMode::Disabled => return Ok(()),

        MySqlSslMode::Preferred => {
            if !server_capabilities.contains(Capabilities::SSL) {
                // downgrade: stop advertising SSL in the handshake response
                stream.capabilities.remove(Capabilities::SSL);
                return Ok(());
            }
        }

        MySqlSslMode::Required | MySqlSslMode::VerifyCa | MySqlSslMode::VerifyIdentity => {
            if !server_capabilities.contains(Capabilities::SSL) {
                return Err(Error::Client(ClientError::TlsUnsupported));
            }
        }
    }

    stream.write_packet(SslRequest {
        max_packet_size: MAX_PACKET_SIZE_ADVERTISED,
        collation,
    })?;

    stream.flush().await?;

    let config = Arc::new(client_config(options).await?);
    stream.stream.stream.upgrade(&options.host, config).await?;

    Ok(())
}

async fn client_config(options: &MySqlConnectOptions) -> Result<ClientConfig> {
    match options.ssl_mode {
        MySqlSslMode::VerifyCa | MySqlSslMode::VerifyIdentity => {
            let roots = Arc::new(root_store(options).await?);

            if options.ssl_mode == MySqlSslMode::VerifyCa {
                // chain verification only; the certificate need not name
                // the host we dialed
                let verifier = WebPkiServerVerifier::builder(roots)
                    .build()
                    .map_err(Error::tls)?;

                Ok(ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoHostnameTlsVerifier { verifier }))
                    .with_no_client_auth())
            } else {
                Ok(ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth())
            }
        }

        _ => Ok(ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()),
    }
}

async fn root_store(options: &MySqlConnectOptions) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca) = &options.ssl_ca {
        let data = tokio::fs::read(ca).await?;
        let mut cursor = std::io::Cursor::new(data);

        for cert in rustls_pemfile::certs(&mut cursor) {
            roots.add(cert?).map_err(Error::tls)?;
        }
    }

    Ok(roots)
}

/// Accepts any server certificate. Used for `Required`: the session is
/// encrypted but the peer is not authenticated.
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
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Full WebPKI verification minus the host-name binding. Used for
/// `VerifyCa`: the chain must anchor in the trusted roots, but a
/// certificate issued for another name is accepted.
#[derive(Debug)]
struct NoHostnameTlsVerifier {
    verifier: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for NoHostnameTlsVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        match self.verifier.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(TlsError::InvalidCertificate(
                CertificateError::NotValidForName
                | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),

            result => result,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        self.verifier.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        self.verifier.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.verifier.supported_verify_schemes()
    }
}
