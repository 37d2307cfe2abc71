//! Engine configuration.
//!
//! ```toml
//! crl_path = "/etc/crlgate/ca.crl"
//! system_roots = true
//! trust_stores = ["/etc/crlgate/clients.pem"]
//! ```

use crate::revocation::RevocationStore;
use crate::trust::{AnchorDelegate, TrustDecisionEngine, TrustDelegate, TrustDelegateSet};
use crate::CrlGateError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_system_roots() -> bool {
    true
}

/// Where the revocation list and trust anchors live.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// CRL file watched by the revocation store. It need not exist yet.
    pub crl_path: PathBuf,
    /// Consult the platform trust store before `trust_stores`.
    #[serde(default = "default_system_roots")]
    pub system_roots: bool,
    /// PEM bundles of CA certificates; each becomes its own delegate.
    #[serde(default)]
    pub trust_stores: Vec<PathBuf>,
}

impl GuardConfig {
    /// A configuration with only a CRL path and the system roots.
    pub fn new(crl_path: impl Into<PathBuf>) -> Self {
        GuardConfig {
            crl_path: crl_path.into(),
            system_roots: true,
            trust_stores: Vec::new(),
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, CrlGateError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, CrlGateError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            CrlGateError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::from_toml_str(&data)
    }

    /// Load the delegates (system roots first, then each trust store in
    /// order) and build the engine.
    pub fn build_engine(&self) -> Result<TrustDecisionEngine, CrlGateError> {
        let mut delegates: Vec<Arc<dyn TrustDelegate>> = Vec::new();
        if self.system_roots {
            delegates.push(Arc::new(AnchorDelegate::system()?));
        }
        for path in &self.trust_stores {
            let delegate = AnchorDelegate::from_pem_file(path)?;
            if delegate.is_empty() {
                return Err(CrlGateError::ConfigError(format!(
                    "{}: no usable CA certificates",
                    path.display()
                )));
            }
            delegates.push(Arc::new(delegate));
        }

        tracing::info!(
            crl_path = %self.crl_path.display(),
            delegates = delegates.len(),
            "trust engine configured"
        );
        Ok(TrustDecisionEngine::new(
            RevocationStore::new(&self.crl_path),
            TrustDelegateSet::new(delegates),
        ))
    }
}
