//! Ordered fallback over several trust managers.

use super::delegate::{ChainRole, DelegateError, TrustDelegate};
use crate::certificate::{Certificate, DistinguishedName};
use std::collections::HashSet;
use std::sync::Arc;

/// Every delegate refused the chain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot find suitable {role} trusted certificate among {delegates} trust managers")]
pub struct NoTrustedDelegate {
    pub role: ChainRole,
    pub delegates: usize,
    /// The last delegate's rejection. `None` only when there are no delegates.
    #[source]
    pub last_error: Option<DelegateError>,
}

/// Delegates tried in insertion order until one accepts.
///
/// The same `Arc` is only kept once; separately allocated delegates are
/// distinct even when they trust the same anchors.
#[derive(Debug, Clone, Default)]
pub struct TrustDelegateSet {
    delegates: Vec<Arc<dyn TrustDelegate>>,
}

impl TrustDelegateSet {
    pub fn new<I>(delegates: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TrustDelegate>>,
    {
        let mut kept: Vec<Arc<dyn TrustDelegate>> = Vec::new();
        for delegate in delegates {
            if !kept
                .iter()
                .any(|d| std::ptr::addr_eq(Arc::as_ptr(d), Arc::as_ptr(&delegate)))
            {
                kept.push(delegate);
            }
        }
        TrustDelegateSet { delegates: kept }
    }

    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    pub fn check_client(
        &self,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), NoTrustedDelegate> {
        self.check(ChainRole::Client, chain, auth_type)
    }

    pub fn check_server(
        &self,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), NoTrustedDelegate> {
        self.check(ChainRole::Server, chain, auth_type)
    }

    fn check(
        &self,
        role: ChainRole,
        chain: &[Certificate],
        auth_type: &str,
    ) -> Result<(), NoTrustedDelegate> {
        let mut last_error = None;
        for (index, delegate) in self.delegates.iter().enumerate() {
            match delegate.check(role, chain, auth_type) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(%role, delegate = index, error = %e, "delegate rejected chain");
                    last_error = Some(e);
                }
            }
        }
        Err(NoTrustedDelegate {
            role,
            delegates: self.delegates.len(),
            last_error,
        })
    }

    /// Union of every delegate's accepted issuers, each listed once.
    pub fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        let mut seen = HashSet::new();
        self.delegates
            .iter()
            .flat_map(|d| d.accepted_issuers())
            .filter(|issuer| seen.insert(issuer.clone()))
            .collect()
    }
}

impl FromIterator<Arc<dyn TrustDelegate>> for TrustDelegateSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn TrustDelegate>>>(iter: I) -> Self {
        TrustDelegateSet::new(iter)
    }
}
