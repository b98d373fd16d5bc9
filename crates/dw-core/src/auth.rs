use crate::error::IngestError;
use crate::store::Store;
use crate::tenants::TenantRepository;
use crate::types::Tenant;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const BEARER_PREFIX: &str = "Bearer ";

type HmacSha256 = Hmac<Sha256>;

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, IngestError> {
    let trimmed = header.map(str::trim).unwrap_or_default();
    let token = trimmed
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .ok_or(IngestError::MissingAuth)?;
    if token.is_empty() {
        return Err(IngestError::MissingAuth);
    }
    Ok(token)
}

/// Resolves a bearer header to an enabled tenant. Unknown and disabled
/// tenants both yield `InvalidAuth`.
pub fn authenticate<S: Store>(store: &S, header: Option<&str>) -> Result<Tenant, IngestError> {
    let token = bearer_token(header)?;
    match store.tenants().get_by_auth_token(token)? {
        Some(tenant) if tenant.enabled => Ok(tenant),
        _ => Err(IngestError::InvalidAuth),
    }
}

/// Lower-case hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac accepts keys of any length"),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a caller-supplied signature against the raw body. Blank
/// signatures never verify.
pub fn verify_signature(body: &[u8], secret: &str, supplied: Option<&str>) -> bool {
    let supplied = supplied.map(str::trim).unwrap_or_default().to_ascii_lowercase();
    if supplied.is_empty() {
        return false;
    }
    constant_time_eq(&sign(secret, body), &supplied)
}

pub fn constant_time_eq(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
