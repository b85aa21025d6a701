use base64::engine::{general_purpose, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a Zoom API token in seconds
pub const TOKEN_TTL_SECS: i64 = 3600;

// Same member order as the tokens Zoom's own SDK samples produce
const JWT_HEADER: &str = r#"{"typ":"JWT","alg":"HS256"}"#;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    exp: i64,
}

/// Authentication utilities for the Zoom REST API
pub struct ZoomAuth;

impl ZoomAuth {
    /// Get current timestamp for API tokens
    pub fn get_timestamp() -> i64 {
        Utc::now().timestamp()
    }

    /// Build a short-lived HS256 JWT for a Zoom account.
    ///
    /// The issuer is the account's API key and the token expires one hour
    /// after `issued_at`. The signature is HMAC-SHA256 over
    /// `base64url(header).base64url(payload)` keyed with the secret key.
    pub fn generate_token(api_key: &str, secret_key: &str, issued_at: i64) -> String {
        let claims = Claims {
            iss: api_key,
            exp: issued_at + TOKEN_TTL_SECS,
        };
        // Serializing a struct of a &str and an i64 cannot fail
        let payload = serde_json::to_vec(&claims).unwrap_or_default();

        let signing_input = format!(
            "{}.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes()),
            general_purpose::URL_SAFE_NO_PAD.encode(&payload)
        );

        debug!("Signing Zoom token for issuer {}", api_key);

        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }

    /// Token valid from now for the next hour
    pub fn token_now(api_key: &str, secret_key: &str) -> String {
        Self::generate_token(api_key, secret_key, Self::get_timestamp())
    }
}
