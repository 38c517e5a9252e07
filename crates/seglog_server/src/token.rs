//! Subject tokens.
//!
//! A token binds a subject name to the server secret with HMAC-SHA256.
//! Tokens carry an issue timestamp for expiration checking.
//!
//! ## Token Format
//!
//! ```text
//! ┌───────────────┬───────────┬────────────────┬───────────────┐
//! │ subject_len   │ subject   │ issued_at_ms   │ HMAC-SHA256   │
//! │ (2 bytes, BE) │ (UTF-8)   │ (8 bytes, BE)  │ (32 bytes)    │
//! └───────────────┴───────────┴────────────────┴───────────────┘
//! ```
//!
//! The MAC covers everything before it. Tokens travel as raw bytes in the
//! `Hello` frame; [`encode_token_hex`] and [`decode_token_hex`] convert to
//! and from the hex form printed by `seglog token`.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const LEN_WIDTH: usize = 2;
const TIMESTAMP_WIDTH: usize = 8;
const MAC_WIDTH: usize = 32;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and verifies subject tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `subject`, issued now.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the subject is empty or longer than 65535 bytes.
    pub fn create_token(&self, subject: &str) -> ServerResult<Vec<u8>> {
        self.create_token_at(subject, now_millis())
    }

    fn create_token_at(&self, subject: &str, issued_at_ms: u64) -> ServerResult<Vec<u8>> {
        let len = u16::try_from(subject.len())
            .ok()
            .filter(|&len| len > 0)
            .ok_or_else(|| {
                ServerError::Internal(format!("subject length {} not in 1..=65535", subject.len()))
            })?;

        let mut token =
            Vec::with_capacity(LEN_WIDTH + subject.len() + TIMESTAMP_WIDTH + MAC_WIDTH);
        token.extend_from_slice(&len.to_be_bytes());
        token.extend_from_slice(subject.as_bytes());
        token.extend_from_slice(&issued_at_ms.to_be_bytes());

        let signature = self.mac(&token)?.finalize().into_bytes();
        token.extend_from_slice(&signature);
        Ok(token)
    }

    /// Verifies a token and returns the subject it names.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` if the token is malformed, its signature
    /// does not verify, or it has expired.
    pub fn validate_token(&self, token: &[u8]) -> ServerResult<String> {
        let unauthenticated = |reason: &str| ServerError::Unauthenticated(reason.to_string());

        let (len_bytes, rest) = token
            .split_first_chunk::<LEN_WIDTH>()
            .ok_or_else(|| unauthenticated("token too short"))?;
        let subject_len = usize::from(u16::from_be_bytes(*len_bytes));

        let signed_len = LEN_WIDTH + subject_len + TIMESTAMP_WIDTH;
        if subject_len == 0 || rest.len() != subject_len + TIMESTAMP_WIDTH + MAC_WIDTH {
            return Err(unauthenticated("invalid token length"));
        }

        let (signed, signature) = token.split_at(signed_len);
        self.mac(signed)?
            .verify_slice(signature)
            .map_err(|_| unauthenticated("invalid signature"))?;

        let subject = std::str::from_utf8(&signed[LEN_WIDTH..LEN_WIDTH + subject_len])
            .map_err(|_| unauthenticated("subject is not UTF-8"))?;

        let mut timestamp = [0u8; TIMESTAMP_WIDTH];
        timestamp.copy_from_slice(&signed[LEN_WIDTH + subject_len..]);
        let issued_at = u64::from_be_bytes(timestamp);

        let expiry_millis = u64::try_from(self.config.token_expiry.as_millis()).unwrap_or(u64::MAX);
        if now_millis() > issued_at.saturating_add(expiry_millis) {
            return Err(unauthenticated("token expired"));
        }

        Ok(subject.to_string())
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("token_expiry", &self.config.token_expiry)
            .finish_non_exhaustive()
    }
}

/// Encodes a token as lowercase hex.
#[must_use]
pub fn encode_token_hex(token: &[u8]) -> String {
    token.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes a hex token back to the bytes `LogClient::connect` expects.
///
/// # Errors
///
/// Returns `Unauthenticated` if `hex` has odd length or a non-hex digit.
pub fn decode_token_hex(hex: &str) -> ServerResult<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(ServerError::Unauthenticated("hex token has odd length".into()));
    }

    hex.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| ServerError::Unauthenticated("token is not valid hex".into()))
        })
        .collect()
}

fn now_millis() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec()))
    }

    #[test]
    fn create_and_validate_token() {
        let validator = validator();

        let token = validator.create_token("alice").unwrap();
        assert_eq!(token.len(), 2 + 5 + 8 + 32);
        assert_eq!(validator.validate_token(&token).unwrap(), "alice");
    }

    #[test]
    fn reject_tampered_subject() {
        let validator = validator();
        let mut token = validator.create_token("alice").unwrap();
        token[2] = b'b';

        let err = validator.validate_token(&token).unwrap_err();
        assert!(matches!(err, ServerError::Unauthenticated(_)));
    }

    #[test]
    fn reject_tampered_signature() {
        let validator = validator();
        let mut token = validator.create_token("alice").unwrap();
        let last = token.len() - 1;
        token[last] ^= 0xFF;

        assert!(validator.validate_token(&token).is_err());
    }

    #[test]
    fn reject_other_secret() {
        let token = validator().create_token("alice").unwrap();
        let other = TokenValidator::new(AuthConfig::new(b"another-secret".to_vec()));
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn reject_expired_token() {
        let validator = TokenValidator::new(
            AuthConfig::new(b"secret".to_vec()).with_expiry(Duration::from_secs(60)),
        );
        let issued = now_millis() - 120_000;
        let token = validator.create_token_at("alice", issued).unwrap();

        let err = validator.validate_token(&token).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn reject_malformed_tokens() {
        let validator = validator();
        for token in [&b""[..], b"\x00", b"\x00\x00", b"\x00\x05alice"] {
            assert!(validator.validate_token(token).is_err());
        }
    }

    #[test]
    fn hex_token_validates_after_decoding() {
        let validator = validator();
        let token = validator.create_token("alice").unwrap();

        let hex = encode_token_hex(&token);
        assert_eq!(hex.len(), token.len() * 2);

        let decoded = decode_token_hex(&format!("{hex}\n")).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(validator.validate_token(&decoded).unwrap(), "alice");
    }

    #[test]
    fn reject_malformed_hex() {
        for hex in ["abc", "zz", "0g", "é1"] {
            let err = decode_token_hex(hex).unwrap_err();
            assert!(matches!(err, ServerError::Unauthenticated(_)));
        }
    }

    #[test]
    fn reject_empty_subject() {
        assert!(validator().create_token("").is_err());
    }
}
