//! Certificate revocation: CRL parsing and the hot-reloaded store.

mod list;
mod store;

pub use list::{RevocationList, RevokedEntry};
pub use store::{RevocationStatus, RevocationStore, Snapshot};
