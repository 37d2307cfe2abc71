//! Certificates as seen by the trust engine.
//!
//! The engine only looks at serial, issuer and subject; the DER is kept so
//! delegates can run full path validation.

use crate::util;
use crate::CrlGateError;
use num_bigint::BigUint;
use rustls::pki_types::CertificateDer;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use x509_parser::prelude::*;

/// One attribute of a canonical name: dotted OID and normalized value.
type CanonicalAttribute = (String, String);

/// An X.509 distinguished name.
///
/// Two names are equal when their canonical forms match: same attributes in
/// the same RDN order, string values compared case-insensitively with
/// whitespace collapsed, whatever ASN.1 string type encoded them. The raw
/// DER is kept for TLS root hints; the text form is for humans.
#[derive(Debug, Clone, Serialize)]
pub struct DistinguishedName {
    #[serde(skip)]
    raw: Vec<u8>,
    #[serde(skip)]
    canonical: Vec<Vec<CanonicalAttribute>>,
    text: String,
}

impl DistinguishedName {
    pub(crate) fn from_x509(name: &X509Name<'_>) -> Self {
        DistinguishedName {
            raw: name.as_raw().to_vec(),
            canonical: name.iter_rdn().map(canonical_rdn).collect(),
            text: name.to_string(),
        }
    }

    /// DER encoding of the `Name`, including the outer SEQUENCE.
    pub fn as_raw(&self) -> &[u8] {
        &self.raw
    }

    /// RFC 4514-style rendering, e.g. `CN=Example CA, O=Example`.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn canonical_rdn(rdn: &RelativeDistinguishedName<'_>) -> Vec<CanonicalAttribute> {
    let mut attributes: Vec<CanonicalAttribute> = rdn
        .iter()
        .map(|attr| {
            let value = match attr.as_str() {
                Ok(text) => text
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase(),
                Err(_) => format!("#{}", util::hex_colon_upper(attr.as_slice())),
            };
            (attr.attr_type().to_id_string(), value)
        })
        .collect();
    // Multi-valued RDNs are sets.
    attributes.sort();
    attributes
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for DistinguishedName {}

impl Hash for DistinguishedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// One element of a presented certificate chain.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: CertificateDer<'static>,
    serial: BigUint,
    issuer: DistinguishedName,
    subject: DistinguishedName,
}

impl Certificate {
    /// Parse a DER-encoded certificate. Trailing bytes are ignored.
    pub fn from_der(input: &[u8]) -> Result<Self, CrlGateError> {
        let (remaining, x509) = X509Certificate::from_der(input)
            .map_err(|e| CrlGateError::DerError(format!("{}", e)))?;
        let cert_len = input.len() - remaining.len();
        let cert_der = input.get(..cert_len).unwrap_or(input);

        Ok(Certificate {
            der: CertificateDer::from(cert_der.to_vec()),
            serial: BigUint::from_bytes_be(x509.raw_serial()),
            issuer: DistinguishedName::from_x509(x509.issuer()),
            subject: DistinguishedName::from_x509(x509.subject()),
        })
    }

    pub fn serial(&self) -> &BigUint {
        &self.serial
    }

    /// Serial number as colon-separated hex, leading zero bytes stripped.
    pub fn serial_hex(&self) -> String {
        util::hex_colon_upper(&self.serial.to_bytes_be())
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }
}

const CERTIFICATE_LABELS: &[&str] = &["CERTIFICATE", "TRUSTED CERTIFICATE", "X509 CERTIFICATE"];

/// Parse a PEM bundle into certificates, preserving order (leaf first for a
/// chain file).
pub fn parse_pem_chain(input: &[u8]) -> Result<Vec<Certificate>, CrlGateError> {
    util::pem_blocks(input, CERTIFICATE_LABELS, "certificates")?
        .iter()
        .enumerate()
        .map(|(depth, der)| {
            Certificate::from_der(der).map_err(|e| {
                CrlGateError::DerError(format!(
                    "failed to parse certificate at depth {}: {}",
                    depth, e
                ))
            })
        })
        .collect()
}
