//! HS256 signed session tokens.
//!
//! Layout is a compact JWT: `base64url(header).base64url(claims).base64url(mac)`.
//! The MAC is HMAC-SHA256 over `header.claims` with the server-held secret.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const TOKEN_VERSION: u8 = 1;
/// Minimum secret length accepted for signing.
pub const MIN_SECRET_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub v: u8,
    /// User id.
    pub sub: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, used by the refresh ledger.
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("signing secret too short")]
    WeakSecret,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid token version")]
    InvalidVersion,
    #[error("unexpected token type")]
    WrongKind,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(secret: &[u8]) -> Result<HmacSha256, Error> {
    if secret.len() < MIN_SECRET_BYTES {
        return Err(Error::WeakSecret);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| Error::WeakSecret)
}

/// Sign `claims` with `secret`.
///
/// # Errors
///
/// Returns an error if the secret is shorter than [`MIN_SECRET_BYTES`] or the
/// claims cannot be encoded.
pub fn sign_hs256(secret: &[u8], claims: &SessionClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a token and return its claims.
///
/// The signature is checked before any claim is trusted; then version, kind and
/// expiry (`exp <= now` is expired).
///
/// # Errors
///
/// Returns an error if the token is malformed, the signature does not match,
/// or the claims fail validation.
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    expected_kind: TokenKind,
    now_unix_seconds: i64,
) -> Result<SessionClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = mac(secret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: SessionClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(Error::InvalidVersion);
    }
    if claims.typ != expected_kind {
        return Err(Error::WrongKind);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    fn claims(kind: TokenKind) -> SessionClaims {
        SessionClaims {
            v: TOKEN_VERSION,
            sub: "00000000-0000-0000-0000-000000000001".to_string(),
            typ: kind,
            iat: NOW,
            exp: NOW + 900,
            jti: "01HZX0000000000000000000AA".to_string(),
        }
    }

    #[test]
    fn sign_and_verify() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims(TokenKind::Access))?;
        assert_eq!(token.split('.').count(), 3);
        let verified = verify_hs256(&token, SECRET, TokenKind::Access, NOW)?;
        assert_eq!(verified, claims(TokenKind::Access));
        Ok(())
    }

    #[test]
    fn signing_is_deterministic() -> Result<(), Error> {
        let first = sign_hs256(SECRET, &claims(TokenKind::Refresh))?;
        let second = sign_hs256(SECRET, &claims(TokenKind::Refresh))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn expired_at_exact_expiry() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims(TokenKind::Access))?;
        assert!(verify_hs256(&token, SECRET, TokenKind::Access, NOW + 899).is_ok());
        assert!(matches!(
            verify_hs256(&token, SECRET, TokenKind::Access, NOW + 900),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims(TokenKind::Access))?;
        let other = b"fedcba9876543210fedcba9876543210";
        assert!(matches!(
            verify_hs256(&token, other, TokenKind::Access, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn kinds_are_not_interchangeable() -> Result<(), Error> {
        let refresh = sign_hs256(SECRET, &claims(TokenKind::Refresh))?;
        assert!(matches!(
            verify_hs256(&refresh, SECRET, TokenKind::Access, NOW),
            Err(Error::WrongKind)
        ));
        Ok(())
    }

    #[test]
    fn tampered_claims_fail_signature() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims(TokenKind::Access))?;
        let mut forged = claims(TokenKind::Access);
        forged.sub = "00000000-0000-0000-0000-000000000002".to_string();
        let forged_b64 = b64e_json(&forged)?;
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);
        assert!(matches!(
            verify_hs256(&tampered, SECRET, TokenKind::Access, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn malformed_tokens() {
        for token in ["", "a", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(verify_hs256(token, SECRET, TokenKind::Access, NOW).is_err());
        }
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(matches!(
            sign_hs256(b"short", &claims(TokenKind::Access)),
            Err(Error::WeakSecret)
        ));
    }
}
