#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared fixtures: freshly minted CAs, leaves and CRLs, stub delegates, and
//! a tracing layer that records warnings.

use crlgate_lib::{Certificate, DelegateError, DistinguishedName, TrustDelegate};
use rcgen::{
    date_time_ymd, BasicConstraints, CertificateParams, CertificateRevocationListParams, DnType,
    DnValue, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose,
    RevocationReason, RevokedCertParams, SerialNumber,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

// ---------------------------------------------------------------------------
// Certificates and CRLs
// ---------------------------------------------------------------------------

/// A self-signed CA able to sign leaves and CRLs.
pub struct TestCa {
    pub cert: Certificate,
    pub pem: String,
    issuer: Issuer<'static, KeyPair>,
}

fn distinguished_name(cn: &str) -> rcgen::DistinguishedName {
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    dn
}

impl TestCa {
    pub fn new(cn: &str) -> Self {
        Self::with_name(distinguished_name(cn))
    }

    /// A CA whose common name is encoded as a PrintableString rather than
    /// rcgen's default UTF8String.
    pub fn with_printable_name(cn: &str) -> Self {
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::PrintableString(cn.try_into().unwrap()),
        );
        Self::with_name(dn)
    }

    fn with_name(dn: rcgen::DistinguishedName) -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.distinguished_name = dn;

        let key = KeyPair::generate().unwrap();
        let cert = params.clone().self_signed(&key).unwrap();
        TestCa {
            cert: Certificate::from_der(cert.der()).unwrap(),
            pem: cert.pem(),
            issuer: Issuer::new(params, key),
        }
    }

    /// A leaf for `localhost`, usable for client and server auth.
    pub fn leaf(&self, cn: &str, serial: u64) -> Certificate {
        let der = self.leaf_der(cn, serial);
        Certificate::from_der(&der).unwrap()
    }

    pub fn leaf_der(&self, cn: &str, serial: u64) -> Vec<u8> {
        self.leaf_with_key(cn, serial).0
    }

    /// DER of a leaf plus its PKCS#8 private key.
    pub fn leaf_with_key(&self, cn: &str, serial: u64) -> (Vec<u8>, Vec<u8>) {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name = distinguished_name(cn);
        params.serial_number = Some(SerialNumber::from(serial));
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.issuer).unwrap();
        (cert.der().to_vec(), key.serialize_der())
    }

    fn crl_params(&self, serials: &[u64]) -> CertificateRevocationListParams {
        CertificateRevocationListParams {
            this_update: date_time_ymd(2024, 1, 1),
            next_update: date_time_ymd(2099, 1, 1),
            crl_number: SerialNumber::from(1u64),
            issuing_distribution_point: None,
            revoked_certs: serials
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from(*serial),
                    revocation_time: date_time_ymd(2024, 1, 1),
                    reason_code: Some(RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::Sha256,
        }
    }

    /// A PEM CRL revoking `serials`.
    pub fn crl_pem(&self, serials: &[u64]) -> String {
        self.crl_params(serials)
            .signed_by(&self.issuer)
            .unwrap()
            .pem()
            .unwrap()
    }

    /// A DER CRL revoking `serials`.
    pub fn crl_der(&self, serials: &[u64]) -> Vec<u8> {
        self.crl_params(serials)
            .signed_by(&self.issuer)
            .unwrap()
            .der()
            .to_vec()
    }
}

/// A fixed point in time for file modification stamps.
pub fn stamp(offset_secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + offset_secs)
}

/// Write `contents` to `path` and pin its modification time.
pub fn write_with_mtime(path: &Path, contents: &[u8], modified: SystemTime) {
    std::fs::write(path, contents).unwrap();
    set_mtime(path, modified);
}

pub fn set_mtime(path: &Path, modified: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

// ---------------------------------------------------------------------------
// Delegates
// ---------------------------------------------------------------------------

/// A delegate with a canned answer that counts how often it is asked.
#[derive(Debug)]
pub struct StubDelegate {
    name: &'static str,
    accept: bool,
    issuers: Vec<DistinguishedName>,
    calls: AtomicUsize,
}

impl StubDelegate {
    pub fn accepting(name: &'static str) -> Arc<Self> {
        Arc::new(Self::build(name, true, Vec::new()))
    }

    pub fn rejecting(name: &'static str) -> Arc<Self> {
        Arc::new(Self::build(name, false, Vec::new()))
    }

    pub fn with_issuers(
        name: &'static str,
        accept: bool,
        issuers: Vec<DistinguishedName>,
    ) -> Arc<Self> {
        Arc::new(Self::build(name, accept, issuers))
    }

    fn build(name: &'static str, accept: bool, issuers: Vec<DistinguishedName>) -> Self {
        StubDelegate {
            name,
            accept,
            issuers,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<(), DelegateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.accept {
            Ok(())
        } else {
            Err(DelegateError::Rejected(format!("{} says no", self.name)))
        }
    }
}

impl TrustDelegate for StubDelegate {
    fn check_client(&self, _chain: &[Certificate], _auth_type: &str) -> Result<(), DelegateError> {
        self.answer()
    }

    fn check_server(&self, _chain: &[Certificate], _auth_type: &str) -> Result<(), DelegateError> {
        self.answer()
    }

    fn accepted_issuers(&self) -> Vec<DistinguishedName> {
        self.issuers.clone()
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct WarningLayer(Arc<Mutex<Vec<String>>>);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for WarningLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }
}

/// Run `f` with a subscriber installed on this thread and return the
/// messages of every warning it logged.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let layer = WarningLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    let warnings = layer.0.lock().unwrap().clone();
    (result, warnings)
}

pub const COLLISION_WARNING: &str =
    "certificate issuer does not match CRL issuer, but serial number has been revoked";
