//! The capability every underlying trust manager provides.

use crate::certificate::{Certificate, DistinguishedName};

/// Which side of the handshake presented the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRole {
    Client,
    Server,
}

impl std::fmt::Display for ChainRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainRole::Client => f.write_str("client"),
            ChainRole::Server => f.write_str("server"),
        }
    }
}

/// Why a single delegate refused a chain.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DelegateError {
    #[error("path validation failed: {0}")]
    PathValidation(webpki::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("empty certificate chain")]
    EmptyChain,
}

/// A trust manager the engine can fall back on.
///
/// `chain[0]` is the end-entity certificate, followed by whatever
/// intermediates the peer sent. `auth_type` is the key exchange or signature
/// algorithm family negotiated for the handshake; implementations may ignore
/// it.
pub trait TrustDelegate: Send + Sync + std::fmt::Debug {
    fn check_client(&self, chain: &[Certificate], auth_type: &str) -> Result<(), DelegateError>;

    fn check_server(&self, chain: &[Certificate], auth_type: &str) -> Result<(), DelegateError>;

    /// Subjects of the CA certificates this delegate trusts.
    fn accepted_issuers(&self) -> Vec<DistinguishedName>;

    fn check(
        &self,
        role: ChainRole,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), DelegateError> {
        match role {
            ChainRole::Client => self.check_client(chain, auth_type),
            ChainRole::Server => self.check_server(chain, auth_type),
        }
    }
}
