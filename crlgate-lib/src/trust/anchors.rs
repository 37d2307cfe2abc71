//! Trust-anchor delegate backed by `rustls-webpki` path validation.
//!
//! Loads CA certificates from PEM bundles, directories, or the system trust
//! store (discovered the same way OpenSSL does).

use super::delegate::{DelegateError, TrustDelegate};
use crate::certificate::{parse_pem_chain, Certificate, DistinguishedName};
use crate::CrlGateError;
use rustls::pki_types::{CertificateDer, TrustAnchor, UnixTime};
use std::path::{Path, PathBuf};
use webpki::{EndEntityCert, KeyUsage};

/// Bundle files shipped by common distributions, tried after `SSL_CERT_FILE`
/// and the OpenSSL build defaults.
const SYSTEM_BUNDLES: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/pki/tls/certs/ca-bundle.crt",
    "/etc/ssl/ca-bundle.pem",
    "/etc/ssl/cert.pem",
];

/// Hashed certificate directory used when no bundle file is found.
const SYSTEM_CERT_DIR: &str = "/etc/ssl/certs";

const ANCHOR_EXTENSIONS: &[&str] = &["pem", "crt", "cer"];

/// Whether a directory entry should be read for anchors: certificate
/// extensions, or `c_rehash` links such as `5ad8a5d6.0`.
fn is_anchor_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ANCHOR_EXTENSIONS.contains(&ext) => true,
        Some(ext) => ext.len() == 1 && ext.as_bytes().iter().all(u8::is_ascii_digit),
        None => false,
    }
}

/// Bundle files that may hold the platform roots, most specific first.
fn bundle_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::env::var_os("SSL_CERT_FILE")
        .map(PathBuf::from)
        .into_iter()
        .collect();
    candidates.extend(openssl_probe::probe().cert_file);
    candidates.extend(SYSTEM_BUNDLES.iter().map(PathBuf::from));
    candidates
}

/// Certificate directories that may hold the platform roots.
fn directory_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::env::var_os("SSL_CERT_DIR")
        .map(PathBuf::from)
        .into_iter()
        .collect();
    candidates.extend(openssl_probe::probe().cert_dir);
    candidates.push(PathBuf::from(SYSTEM_CERT_DIR));
    candidates
}

/// A delegate that accepts chains terminating at one of its trust anchors.
///
/// Performs RFC 5280 path validation at the current time for the clientAuth
/// or serverAuth usage. Host names are not checked here.
pub struct AnchorDelegate {
    name: String,
    anchors: Vec<TrustAnchor<'static>>,
    subjects: Vec<DistinguishedName>,
}

impl std::fmt::Debug for AnchorDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorDelegate")
            .field("name", &self.name)
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

impl AnchorDelegate {
    /// Create a delegate with no anchors. `name` only shows up in logs.
    pub fn new(name: impl Into<String>) -> Self {
        AnchorDelegate {
            name: name.into(),
            anchors: Vec::new(),
            subjects: Vec::new(),
        }
    }

    /// The platform default store: the first bundle file that yields any
    /// anchors, otherwise the first certificate directory that does.
    pub fn system() -> Result<Self, CrlGateError> {
        let mut delegate = AnchorDelegate::new("system");

        if let Some(bundle) = find_system_ca_bundle() {
            if let Ok(data) = std::fs::read(&bundle) {
                let added = delegate.add_pem_bundle(&data).unwrap_or(0);
                if added > 0 {
                    tracing::debug!(
                        path = %bundle.display(),
                        anchors = added,
                        "loaded system roots"
                    );
                    return Ok(delegate);
                }
            }
        }

        for dir in directory_candidates() {
            if let Ok(added) = delegate.add_pem_directory(&dir) {
                if added > 0 {
                    tracing::debug!(
                        path = %dir.display(),
                        anchors = added,
                        "loaded system roots"
                    );
                    return Ok(delegate);
                }
            }
        }

        Err(CrlGateError::ConfigError(
            "no system trust store found".into(),
        ))
    }

    /// Create a delegate from a PEM bundle of CA certificates.
    pub fn from_pem(name: impl Into<String>, pem_data: &[u8]) -> Result<Self, CrlGateError> {
        let mut delegate = AnchorDelegate::new(name);
        delegate.add_pem_bundle(pem_data)?;
        Ok(delegate)
    }

    /// Create a delegate from a PEM file; the path becomes its name.
    pub fn from_pem_file(path: &Path) -> Result<Self, CrlGateError> {
        let data = std::fs::read(path).map_err(|e| {
            CrlGateError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::from_pem(path.display().to_string(), &data)
    }

    /// Add a single CA certificate.
    pub fn add_certificate(&mut self, cert: &Certificate) -> Result<(), CrlGateError> {
        let anchor = webpki::anchor_from_trusted_cert(cert.der())
            .map_err(|e| CrlGateError::DerError(format!("not a usable trust anchor: {}", e)))?
            .to_owned();
        self.anchors.push(anchor);
        if !self.subjects.contains(cert.subject()) {
            self.subjects.push(cert.subject().clone());
        }
        Ok(())
    }

    /// Add every usable CA certificate of a PEM bundle and return how many
    /// became anchors.
    pub fn add_pem_bundle(&mut self, pem_data: &[u8]) -> Result<usize, CrlGateError> {
        let mut added = 0;
        for cert in parse_pem_chain(pem_data)? {
            if self.add_certificate(&cert).is_ok() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Add the anchors of every certificate file in `dir`. Unreadable or
    /// unparsable files are skipped.
    pub fn add_pem_directory(&mut self, dir: &Path) -> Result<usize, CrlGateError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            CrlGateError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", dir.display(), e),
            ))
        })?;
        let mut added = 0;
        for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
            if !path.is_file() || !is_anchor_file(&path) {
                continue;
            }
            match std::fs::read(&path).map(|data| self.add_pem_bundle(&data)) {
                Ok(Ok(count)) => added += count,
                _ => tracing::debug!(path = %path.display(), "skipping unreadable anchor file"),
            }
        }
        Ok(added)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of trust anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    fn verify(&self, chain: &[Certificate], usage: KeyUsage) -> Result<(), DelegateError> {
        let (leaf, rest) = chain.split_first().ok_or(DelegateError::EmptyChain)?;
        let end_entity =
            EndEntityCert::try_from(leaf.der()).map_err(DelegateError::PathValidation)?;
        let intermediates: Vec<CertificateDer<'static>> =
            rest.iter().map(|c| c.der().clone()).collect();

        end_entity
            .verify_for_usage(
                webpki::ALL_VERIFICATION_ALGS,
                &self.anchors,
                &intermediates,
                UnixTime::now(),
                usage,
                None,
                None,
            )
            .map(|_| ())
            .map_err(DelegateError::PathValidation)
    }
}

impl TrustDelegate for AnchorDelegate {
    fn check_client(&self, chain: &[Certificate], _auth_type: &str) -> Result<(), DelegateError> {
        self.verify(chain, KeyUsage::client_auth())
    }

    fn check_server(&self, chain: &[Certificate], _auth_type: &str) -> Result<(), DelegateError> {
        self.verify(chain, KeyUsage::server_auth())
    }

    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.subjects.clone()
    }
}

/// The platform CA bundle file, if one exists: `SSL_CERT_FILE`, then the
/// OpenSSL build default, then the usual distribution locations.
pub fn find_system_ca_bundle() -> Option<PathBuf> {
    bundle_candidates().into_iter().find(|path| path.is_file())
}
