use crate::error::StockPriceError;
use sha2::{Digest, Sha256};
use std::net::Ipv4Addr;

const MAPPED_V4_PREFIX: &str = "::ffff:";

/// Unwraps an IPv4-mapped IPv6 address (`::ffff:203.0.113.7`) to its dotted
/// quad. Anything else is returned trimmed but otherwise untouched.
pub fn normalize_address(addr: &str) -> &str {
    let addr = addr.trim();
    let prefix_len = MAPPED_V4_PREFIX.len();
    match (addr.get(..prefix_len), addr.get(prefix_len..)) {
        (Some(prefix), Some(embedded))
            if prefix.eq_ignore_ascii_case(MAPPED_V4_PREFIX)
                && embedded.parse::<Ipv4Addr>().is_ok() =>
        {
            embedded
        }
        _ => addr,
    }
}

/// One-way visitor identity: lowercase hex SHA-256 of the normalized address.
pub fn fingerprint(addr: Option<&str>) -> Result<String, StockPriceError> {
    let addr = addr
        .map(normalize_address)
        .filter(|a| !a.is_empty())
        .ok_or(StockPriceError::MissingAddress)?;

    let mut hasher = Sha256::new();
    hasher.update(addr.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
