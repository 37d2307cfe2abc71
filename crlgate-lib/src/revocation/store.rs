//! File-backed revocation store with hot reload.

use super::list::{RevocationList, RevokedEntry};
use crate::certificate::Certificate;
use arc_swap::ArcSwapOption;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Outcome of a revocation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationStatus {
    /// No entry for this serial number.
    NotRevoked,
    /// Serial and issuer both match an entry.
    Revoked(RevokedEntry),
    /// The serial number is revoked under a different issuer. Treated as
    /// revoked.
    SerialCollision(RevokedEntry),
}

impl RevocationStatus {
    pub fn is_revoked(&self) -> bool {
        !matches!(self, RevocationStatus::NotRevoked)
    }
}

/// What a reload compares: the file's modification time and size.
///
/// The size catches a file rewritten within one mtime tick, e.g. a CRL read
/// while it was still being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(meta: &std::fs::Metadata) -> std::io::Result<Self> {
        Ok(FileStamp {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }
}

/// A parsed list together with the file state it was read from.
///
/// Published as one unit so readers never pair a list with the wrong
/// timestamp.
#[derive(Debug)]
pub struct Snapshot {
    pub list: RevocationList,
    pub modified: SystemTime,
    /// File size in bytes when the list was read.
    pub len: u64,
}

impl Snapshot {
    fn stamp(&self) -> FileStamp {
        FileStamp {
            modified: self.modified,
            len: self.len,
        }
    }
}

/// Revocation list backed by a file on disk.
///
/// Every lookup stats the file; when its modification time or size differs
/// from the published snapshot's, the file is re-read. Lookups never block on
/// each other, only concurrent reloads are serialized. A file that failed to
/// parse is not retried until its modification time or size changes.
#[derive(Debug)]
pub struct RevocationStore {
    path: PathBuf,
    snapshot: ArcSwapOption<Snapshot>,
    failed: ArcSwapOption<FileStamp>,
    reload_lock: Mutex<()>,
    reloads: AtomicU64,
}

impl RevocationStore {
    /// Create a store for `path`. Nothing is read until the first lookup.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RevocationStore {
            path: path.into(),
            snapshot: ArcSwapOption::empty(),
            failed: ArcSwapOption::empty(),
            reload_lock: Mutex::new(()),
            reloads: AtomicU64::new(0),
        }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of successful reloads so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Acquire)
    }

    /// The currently published snapshot, without checking the file.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    /// Whether `cert` is revoked, including serial-only matches.
    pub fn is_revoked(&self, cert: &Certificate) -> bool {
        self.check(cert).is_revoked()
    }

    /// Look `cert` up in the current list, reloading the file first if it
    /// changed.
    ///
    /// A missing file revokes nothing. A file that cannot be read or parsed
    /// leaves the previous list in place.
    pub fn check(&self, cert: &Certificate) -> RevocationStatus {
        let stamp = match std::fs::metadata(&self.path).and_then(|m| FileStamp::of(&m)) {
            Ok(stamp) => Some(stamp),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return RevocationStatus::NotRevoked;
            }
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "cannot stat revocation list, using cached copy"
                );
                None
            }
        };
        if let Some(stamp) = stamp {
            self.refresh(stamp);
        }

        let guard = self.snapshot.load();
        let Some(snapshot) = &*guard else {
            return RevocationStatus::NotRevoked;
        };

        if let Some(entry) = snapshot.list.find_exact(cert) {
            return RevocationStatus::Revoked(entry.clone());
        }

        match snapshot.list.find_serial(cert.serial()) {
            Some(entry) => {
                tracing::warn!(
                    serial = %cert.serial(),
                    cert_issuer = %cert.issuer(),
                    crl_issuer = %entry.issuer,
                    "certificate issuer does not match CRL issuer, but serial number has been revoked"
                );
                RevocationStatus::SerialCollision(entry.clone())
            }
            None => RevocationStatus::NotRevoked,
        }
    }

    /// Whether `stamp` needs no reload: it is already published, or it is
    /// the file that last failed to parse. Never takes the reload lock.
    fn is_settled(&self, stamp: FileStamp) -> bool {
        let current = match &*self.snapshot.load() {
            Some(snapshot) => snapshot.stamp() == stamp,
            None => false,
        };
        current || matches!(&*self.failed.load(), Some(failed) if **failed == stamp)
    }

    fn refresh(&self, stamp: FileStamp) {
        if self.is_settled(stamp) {
            return;
        }

        let _reloading = match self.reload_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("revocation reload lock poisoned, recovering");
                poisoned.into_inner()
            }
        };

        // Another thread may have reloaded while we waited.
        if self.is_settled(stamp) {
            return;
        }

        tracing::info!(path = %self.path.display(), "reloading CRL");
        match RevocationList::from_file(&self.path) {
            Ok(list) => {
                tracing::info!(
                    path = %self.path.display(),
                    entries = list.len(),
                    "loaded CRL"
                );
                self.snapshot.store(Some(Arc::new(Snapshot {
                    list,
                    modified: stamp.modified,
                    len: stamp.len,
                })));
                self.reloads.fetch_add(1, Ordering::AcqRel);
                self.failed.store(None);
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to reload CRL, keeping previous list"
                );
                self.failed.store(Some(Arc::new(stamp)));
            }
        }
    }
}
