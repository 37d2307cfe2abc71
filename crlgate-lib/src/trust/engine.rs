//! The composite trust manager: revocation veto, then delegate fallback.

use super::delegate_set::{NoTrustedDelegate, TrustDelegateSet};
use crate::certificate::{Certificate, DistinguishedName};
use crate::revocation::{RevocationStatus, RevocationStore};
use num_bigint::BigUint;

/// Why the engine refused a chain. Any variant aborts the handshake.
#[derive(Debug, thiserror::Error)]
pub enum CertificateRejected {
    #[error("Rejecting revoked certificate {serial} for {subject}")]
    Revoked {
        serial: BigUint,
        subject: DistinguishedName,
    },

    #[error("Rejecting revoked certificate {serial} for {subject} (serial number revoked by {crl_issuer})")]
    SerialCollision {
        serial: BigUint,
        subject: DistinguishedName,
        crl_issuer: DistinguishedName,
    },

    #[error(transparent)]
    Untrusted(#[from] NoTrustedDelegate),

    #[error("empty certificate chain")]
    EmptyChain,
}

impl CertificateRejected {
    /// Whether the rejection came from the revocation list.
    pub fn is_revocation(&self) -> bool {
        matches!(
            self,
            CertificateRejected::Revoked { .. } | CertificateRejected::SerialCollision { .. }
        )
    }
}

/// Trust manager installed into the TLS stack.
///
/// Client chains are vetoed by the revocation store before any delegate sees
/// them; server chains go straight to the delegates.
#[derive(Debug)]
pub struct TrustDecisionEngine {
    revocations: RevocationStore,
    delegates: TrustDelegateSet,
}

impl TrustDecisionEngine {
    pub fn new(revocations: RevocationStore, delegates: TrustDelegateSet) -> Self {
        TrustDecisionEngine {
            revocations,
            delegates,
        }
    }

    pub fn revocations(&self) -> &RevocationStore {
        &self.revocations
    }

    pub fn delegates(&self) -> &TrustDelegateSet {
        &self.delegates
    }

    pub fn check_client_trusted(
        &self,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), CertificateRejected> {
        let leaf = chain.first().ok_or(CertificateRejected::EmptyChain)?;

        let rejection = match self.revocations.check(leaf) {
            RevocationStatus::NotRevoked => None,
            RevocationStatus::Revoked(_) => Some(CertificateRejected::Revoked {
                serial: leaf.serial().clone(),
                subject: leaf.subject().clone(),
            }),
            RevocationStatus::SerialCollision(entry) => {
                Some(CertificateRejected::SerialCollision {
                    serial: leaf.serial().clone(),
                    subject: leaf.subject().clone(),
                    crl_issuer: entry.issuer,
                })
            }
        };
        if let Some(rejection) = rejection {
            tracing::warn!("{}", rejection);
            return Err(rejection);
        }

        self.delegates.check_client(chain, auth_type)?;
        Ok(())
    }

    pub fn check_server_trusted(
        &self,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), CertificateRejected> {
        self.delegates.check_server(chain, auth_type)?;
        Ok(())
    }

    pub fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.delegates.accepted_issuers()
    }
}
