//! Shared encoding utilities.

use crate::CrlGateError;
use std::fmt::Write;
use x509_parser::prelude::*;

/// Whether the input looks like PEM (leading whitespace is ignored).
pub(crate) fn is_pem(input: &[u8]) -> bool {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    input
        .get(start..)
        .is_some_and(|rest| rest.starts_with(b"-----BEGIN"))
}

/// Collect the contents of every PEM block whose label is in `labels`.
///
/// Bytes after the last good block are ignored; garbage before any block is
/// an error. `what` names the expected objects in errors.
pub(crate) fn pem_blocks(
    input: &[u8],
    labels: &[&str],
    what: &str,
) -> Result<Vec<Vec<u8>>, CrlGateError> {
    let mut blocks = Vec::new();
    for pem in Pem::iter_from_buffer(input) {
        match pem {
            Ok(pem) if labels.contains(&pem.label.as_str()) => blocks.push(pem.contents),
            Ok(_) => {}
            Err(_) if !blocks.is_empty() => break,
            Err(e) => {
                return Err(CrlGateError::PemError(format!(
                    "unreadable {} PEM: {}",
                    what, e
                )))
            }
        }
    }
    if blocks.is_empty() {
        return Err(CrlGateError::PemError(format!("no {} in PEM input", what)));
    }
    Ok(blocks)
}

/// Colon-separated uppercase hex, e.g. `0A:1B:FF`.
pub(crate) fn hex_colon_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
