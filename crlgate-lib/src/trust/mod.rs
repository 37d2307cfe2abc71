//! Trust decisions: delegates, their ordered fallback, and the engine that
//! puts the revocation store in front of them.

mod anchors;
mod delegate;
mod delegate_set;
mod engine;

pub use anchors::{find_system_ca_bundle, AnchorDelegate};
pub use delegate::{ChainRole, DelegateError, TrustDelegate};
pub use delegate_set::{NoTrustedDelegate, TrustDelegateSet};
pub use engine::{CertificateRejected, TrustDecisionEngine};
