//! crlgate-lib: Composite TLS trust manager with a hot-reloaded revocation list.
//!
//! A [`TrustDecisionEngine`] sits in front of any number of ordinary trust
//! managers ([`TrustDelegate`]s). Client chains are first checked against a
//! file-backed CRL ([`RevocationStore`]) that reloads itself whenever the file's
//! modification time changes; only certificates that survive the revocation
//! veto reach the delegates.
//!
//! The engine is installed into `rustls` through [`RevocationVerifier`].

mod certificate;
mod config;
pub mod revocation;
pub mod tls;
pub mod trust;
mod util;

pub use certificate::{parse_pem_chain, Certificate, DistinguishedName};
pub use config::GuardConfig;
pub use revocation::{RevocationList, RevocationStatus, RevocationStore, RevokedEntry};
pub use tls::{client_config, server_config, RevocationVerifier};
pub use trust::{
    find_system_ca_bundle, AnchorDelegate, CertificateRejected, ChainRole, DelegateError,
    NoTrustedDelegate, TrustDecisionEngine, TrustDelegate, TrustDelegateSet,
};

/// Errors returned by crlgate-lib.
#[derive(Debug, thiserror::Error)]
pub enum CrlGateError {
    #[error("Invalid PEM format: {0}")]
    PemError(String),

    #[error("Invalid DER format: {0}")]
    DerError(String),

    #[error("Invalid certificate revocation list: {0}")]
    CrlError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}
