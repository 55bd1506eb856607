//! Session token generation and validation.
//!
//! Tokens are HMAC-SHA256 based, scoped to a user ID.
//! Format: `gp_st_<user_id>_<hmac_hex>`

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Token prefix used to identify goalpost session tokens.
const TOKEN_PREFIX: &str = "gp_st_";

/// Environment variable holding the hex-encoded token secret.
pub const TOKEN_SECRET_ENV: &str = "GOALPOST_TOKEN_SECRET";

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("missing token secret")]
    MissingSecret,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// The HMAC secret key bytes.
    pub secret: Vec<u8>,
}

impl TokenConfig {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    /// Build a config from a hex-encoded secret (as written by `goalpost init`).
    pub fn from_hex(secret_hex: &str) -> Result<Self, TokenError> {
        let secret = hex::decode(secret_hex.trim())
            .map_err(|e| TokenError::InvalidFormat(format!("token secret is not valid hex: {e}")))?;
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self::new(secret))
    }

    /// Create a TokenConfig from the `GOALPOST_TOKEN_SECRET` environment variable.
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex = std::env::var(TOKEN_SECRET_ENV).map_err(|_| TokenError::MissingSecret)?;
        Self::from_hex(&secret_hex)
    }
}

/// Generate a session token for a user.
///
/// The HMAC-SHA256 is computed over the hyphenated user ID.
pub fn generate_session_token(config: &TokenConfig, user_id: UserId) -> String {
    let message = user_id.to_string();
    let mac = compute_hmac(&config.secret, message.as_bytes());
    format!("{TOKEN_PREFIX}{user_id}_{}", hex::encode(mac))
}

/// Validate a session token and return the user it identifies.
///
/// The HMAC is compared in constant time.
pub fn validate_session_token(config: &TokenConfig, token: &str) -> Result<UserId, TokenError> {
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        TokenError::InvalidFormat(format!("token must start with {TOKEN_PREFIX:?}"))
    })?;

    // A hyphenated UUID is 36 chars.
    if rest.len() < 36 || !rest.is_char_boundary(36) {
        return Err(TokenError::InvalidFormat(
            "token too short to contain a valid user ID".to_string(),
        ));
    }
    let (user_id_str, after_user_id) = rest.split_at(36);

    let user_id =
        Uuid::parse_str(user_id_str).map_err(|e| TokenError::InvalidUserId(e.to_string()))?;

    let hmac_hex = after_user_id.strip_prefix('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore after user ID".to_string())
    })?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    let user_id = UserId(user_id);
    verify_hmac(&config.secret, user_id.to_string().as_bytes(), &provided_mac)?;

    Ok(user_id)
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn verify_hmac(key: &[u8], message: &[u8], expected_mac: &[u8]) -> Result<(), TokenError> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| TokenError::HmacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TokenConfig {
        TokenConfig::new(b"test-secret-key-for-goalpost".to_vec())
    }

    fn fixed_user() -> UserId {
        UserId(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap())
    }

    #[test]
    fn token_has_expected_shape() {
        let token = generate_session_token(&test_config(), fixed_user());

        assert!(token.starts_with("gp_st_550e8400-e29b-41d4-a716-446655440000_"));
        let hmac_hex = token.rsplit('_').next().unwrap();
        assert_eq!(hmac_hex.len(), 64, "HMAC-SHA256 hex should be 64 chars");
    }

    #[test]
    fn generate_and_validate_roundtrip() {
        let config = test_config();
        let user = UserId(Uuid::new_v4());

        let token = generate_session_token(&config, user);
        assert_eq!(validate_session_token(&config, &token).unwrap(), user);
    }

    #[test]
    fn same_user_produces_same_token() {
        let config = test_config();
        assert_eq!(
            generate_session_token(&config, fixed_user()),
            generate_session_token(&config, fixed_user())
        );
    }

    #[test]
    fn reject_tampered_hmac() {
        let config = test_config();
        let mut tampered = generate_session_token(&config, fixed_user());
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'a' { 'b' } else { 'a' });

        let err = validate_session_token(&config, &tampered).unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn reject_swapped_user_id() {
        let config = test_config();
        let token = generate_session_token(&config, fixed_user());
        let other = "660e8400-e29b-41d4-a716-446655440000";
        let tampered = token.replace(&fixed_user().to_string(), other);

        let err = validate_session_token(&config, &tampered).unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn reject_wrong_secret() {
        let token = generate_session_token(&test_config(), fixed_user());
        let wrong = TokenConfig::new(b"another-secret".to_vec());

        let err = validate_session_token(&wrong, &token).unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn reject_malformed_tokens() {
        let config = test_config();
        for bad in ["", "gp_st_short", "bearer_abc", "gp_st_550e8400-e29b-41d4-a716-446655440000"] {
            let err = validate_session_token(&config, bad).unwrap_err();
            assert!(matches!(err, TokenError::InvalidFormat(_)), "{bad:?} gave {err:?}");
        }
    }

    #[test]
    fn reject_invalid_uuid() {
        let config = test_config();
        let err =
            validate_session_token(&config, "gp_st_not-a-valid-uuid-at-all-noooooo_abcdef").unwrap_err();
        assert!(matches!(err, TokenError::InvalidUserId(_)));
    }

    #[test]
    fn reject_invalid_hex() {
        let config = test_config();
        let token = format!("gp_st_{}_zz-not-hex", fixed_user());
        let err = validate_session_token(&config, &token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidFormat(_)));
    }

    #[test]
    fn from_hex_decodes_secret() {
        let config = TokenConfig::from_hex("deadbeef").unwrap();
        assert_eq!(config.secret, vec![0xde, 0xad, 0xbe, 0xef]);

        assert!(matches!(
            TokenConfig::from_hex("xyz").unwrap_err(),
            TokenError::InvalidFormat(_)
        ));
        assert!(matches!(
            TokenConfig::from_hex("").unwrap_err(),
            TokenError::MissingSecret
        ));
    }
}
