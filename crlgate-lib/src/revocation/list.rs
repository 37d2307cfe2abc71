//! Parsed certificate revocation lists.
//!
//! A [`RevocationList`] is built from one file holding either a single
//! DER-encoded CRL or any number of PEM `X509 CRL` blocks, and answers the two
//! questions the store needs: is this exact certificate revoked, and is this
//! serial number revoked by anyone.

use crate::certificate::{Certificate, DistinguishedName};
use crate::util;
use crate::CrlGateError;
use num_bigint::BigUint;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use x509_parser::prelude::*;
use x509_parser::revocation_list::CertificateRevocationList;

/// A single revoked serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokedEntry {
    /// Revoked serial number.
    #[serde(serialize_with = "serialize_serial")]
    pub serial: BigUint,
    /// Issuer of the CRL that lists this serial.
    pub issuer: DistinguishedName,
    /// Revocation time as a Unix timestamp.
    pub revoked_at: i64,
    /// RFC 5280 reason, when the entry carries one.
    pub reason: Option<&'static str>,
}

fn serialize_serial<S: serde::Serializer>(serial: &BigUint, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&serial.to_str_radix(10))
}

/// Revoked entries from one CRL file, indexed by serial number.
#[derive(Debug, Clone, Default)]
pub struct RevocationList {
    by_serial: HashMap<BigUint, Vec<RevokedEntry>>,
    issuers: Vec<DistinguishedName>,
    len: usize,
}

impl RevocationList {
    /// Parse a CRL file's contents, auto-detecting PEM or DER.
    pub fn from_bytes(input: &[u8]) -> Result<Self, CrlGateError> {
        if input.is_empty() {
            return Err(CrlGateError::CrlError("empty input".into()));
        }
        let mut list = RevocationList::default();
        if util::is_pem(input) {
            for der in util::pem_blocks(input, &["X509 CRL"], "CRLs")? {
                list.add_der(&der)?;
            }
        } else {
            list.add_der(input)?;
        }
        Ok(list)
    }

    /// Read and parse a CRL file.
    pub fn from_file(path: &Path) -> Result<Self, CrlGateError> {
        let data = std::fs::read(path).map_err(|e| {
            CrlGateError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::from_bytes(&data)
    }

    /// Add the entries of one DER-encoded CRL.
    pub fn add_der(&mut self, der: &[u8]) -> Result<(), CrlGateError> {
        let (_, crl) = CertificateRevocationList::from_der(der)
            .map_err(|e| CrlGateError::CrlError(format!("{}", e)))?;

        let issuer = DistinguishedName::from_x509(crl.issuer());
        for revoked in crl.iter_revoked_certificates() {
            let entry = RevokedEntry {
                serial: BigUint::from_bytes_be(revoked.raw_serial()),
                issuer: issuer.clone(),
                revoked_at: revoked.revocation_date.timestamp(),
                reason: revoked.reason_code().map(|(_, code)| reason_name(code)),
            };
            self.by_serial
                .entry(entry.serial.clone())
                .or_default()
                .push(entry);
            self.len += 1;
        }
        if !self.issuers.contains(&issuer) {
            self.issuers.push(issuer);
        }
        Ok(())
    }

    /// The entry revoking exactly this certificate: same serial, same issuer.
    pub fn find_exact(&self, cert: &Certificate) -> Option<&RevokedEntry> {
        self.by_serial
            .get(cert.serial())?
            .iter()
            .find(|entry| &entry.issuer == cert.issuer())
    }

    /// Any entry with this serial number, whatever its issuer.
    pub fn find_serial(&self, serial: &BigUint) -> Option<&RevokedEntry> {
        self.by_serial.get(serial)?.first()
    }

    /// Issuers of the CRLs that made up this list, in file order.
    pub fn issuers(&self) -> &[DistinguishedName] {
        &self.issuers
    }

    /// All entries, ordered by serial number.
    pub fn entries(&self) -> Vec<&RevokedEntry> {
        let mut entries: Vec<&RevokedEntry> = self.by_serial.values().flatten().collect();
        entries.sort_by(|a, b| a.serial.cmp(&b.serial));
        entries
    }

    /// Number of revoked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list revokes nothing.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// RFC 5280 `CRLReason` names indexed by code; 7 is unassigned.
const CRL_REASONS: [Option<&str>; 11] = [
    Some("unspecified"),
    Some("keyCompromise"),
    Some("cACompromise"),
    Some("affiliationChanged"),
    Some("superseded"),
    Some("cessationOfOperation"),
    Some("certificateHold"),
    None,
    Some("removeFromCRL"),
    Some("privilegeWithdrawn"),
    Some("aACompromise"),
];

fn reason_name(code: ReasonCode) -> &'static str {
    CRL_REASONS
        .get(usize::from(code.0))
        .copied()
        .flatten()
        .unwrap_or("unspecified")
}
