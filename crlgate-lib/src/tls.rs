//! Installing the engine into `rustls`.
//!
//! [`RevocationVerifier`] is both a client and a server certificate verifier,
//! so one engine can guard either end of a connection. Handshake signatures
//! are checked with the crypto provider's algorithms; certificate trust is
//! entirely the engine's decision.

use crate::certificate::Certificate;
use crate::trust::{CertificateRejected, TrustDecisionEngine};
use crate::CrlGateError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, DistinguishedName, Error, OtherError,
    ServerConfig, SignatureScheme,
};
use std::sync::Arc;

/// rustls does not expose the negotiated key exchange to verifiers.
const AUTH_TYPE: &str = "UNKNOWN";

/// A rustls verifier that defers every trust decision to a
/// [`TrustDecisionEngine`].
#[derive(Debug)]
pub struct RevocationVerifier {
    engine: Arc<TrustDecisionEngine>,
    provider: Arc<CryptoProvider>,
    root_hints: Vec<DistinguishedName>,
}

impl RevocationVerifier {
    /// Use the `ring` crypto provider for handshake signatures.
    pub fn new(engine: Arc<TrustDecisionEngine>) -> Self {
        Self::with_provider(engine, Arc::new(rustls::crypto::ring::default_provider()))
    }

    pub fn with_provider(engine: Arc<TrustDecisionEngine>, provider: Arc<CryptoProvider>) -> Self {
        // Delegates are fixed at construction, so the hints never change.
        let root_hints = engine
            .accepted_issuers()
            .iter()
            .map(|issuer| DistinguishedName::from(issuer.as_raw().to_vec()))
            .collect();
        RevocationVerifier {
            engine,
            provider,
            root_hints,
        }
    }

    fn chain(
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> Result<Vec<Certificate>, Error> {
        std::iter::once(end_entity)
            .chain(intermediates)
            .map(|der| {
                Certificate::from_der(der)
                    .map_err(|_| Error::InvalidCertificate(CertificateError::BadEncoding))
            })
            .collect()
    }
}

fn to_tls_error(rejection: CertificateRejected) -> Error {
    if rejection.is_revocation() {
        Error::InvalidCertificate(CertificateError::Revoked)
    } else {
        Error::InvalidCertificate(CertificateError::Other(OtherError(Arc::new(rejection))))
    }
}

impl ClientCertVerifier for RevocationVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.root_hints
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, Error> {
        let chain = Self::chain(end_entity, intermediates)?;
        self.engine
            .check_client_trusted(&chain, AUTH_TYPE)
            .map_err(to_tls_error)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl ServerCertVerifier for RevocationVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let chain = Self::chain(end_entity, intermediates)?;
        self.engine
            .check_server_trusted(&chain, AUTH_TYPE)
            .map_err(to_tls_error)?;

        webpki::EndEntityCert::try_from(end_entity)
            .map_err(|_| Error::InvalidCertificate(CertificateError::BadEncoding))?
            .verify_is_valid_for_subject_name(server_name)
            .map_err(|_| Error::InvalidCertificate(CertificateError::NotValidForName))?;

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build a server configuration that requires client certificates and
/// checks them through `verifier`.
pub fn server_config(
    verifier: Arc<RevocationVerifier>,
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, CrlGateError> {
    let config = ServerConfig::builder_with_provider(verifier.provider.clone())
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)?;
    Ok(config)
}

/// Build a client configuration that checks server chains through
/// `verifier` and presents no client certificate.
pub fn client_config(verifier: Arc<RevocationVerifier>) -> Result<ClientConfig, CrlGateError> {
    let config = ClientConfig::builder_with_provider(verifier.provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    Ok(config)
}
