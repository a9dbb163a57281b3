//! Token validation for the live-channel endpoint.
//!
//! Live connections cannot reliably carry custom headers in every client
//! environment, so their bearer token travels in the connection's
//! addressable parameters instead. The token format is
//!
//! - 8 bytes: expiry (Unix millis, big-endian)
//! - N bytes: user identifier (UTF-8)
//! - 32 bytes: HMAC-SHA256 signature over the preceding bytes
//!
//! hex-encoded for transport. The coordinator only validates; issuing
//! credentials is the authentication service's job (the `issue` method
//! exists for that service and for tests).

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 32;
const EXPIRY_LEN: usize = 8;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token lifetime.
    pub token_ttl: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration with a 24 hour token lifetime.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

impl From<&ServerConfig> for AuthConfig {
    fn from(config: &ServerConfig) -> Self {
        AuthConfig::new(config.auth_secret.clone()).with_ttl(config.token_ttl)
    }
}

/// Validates live-channel tokens and resolves them to a user identifier.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for a user, valid for the configured lifetime.
    pub fn issue(&self, user: &str) -> String {
        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(self.config.token_ttl)
            .as_millis() as u64;

        let mut data = Vec::with_capacity(EXPIRY_LEN + user.len() + SIGNATURE_LEN);
        data.extend_from_slice(&expiry.to_be_bytes());
        data.extend_from_slice(user.as_bytes());
        let signature = self.sign(&data);
        data.extend_from_slice(&signature);
        hex::encode(data)
    }

    /// Validates a token and returns the user identifier it names.
    pub fn validate(&self, token: &str) -> ServerResult<String> {
        let bytes = hex::decode(token)
            .map_err(|_| ServerError::Unauthorized("malformed token".into()))?;
        if bytes.len() <= EXPIRY_LEN + SIGNATURE_LEN {
            return Err(ServerError::Unauthorized("token too short".into()));
        }

        let (payload, signature) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
        let expected = self.sign(payload);
        if signature != expected.as_slice() {
            return Err(ServerError::Unauthorized("invalid signature".into()));
        }

        let mut expiry_bytes = [0u8; EXPIRY_LEN];
        expiry_bytes.copy_from_slice(&payload[..EXPIRY_LEN]);
        let expiry = u64::from_be_bytes(expiry_bytes);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        if now > expiry {
            return Err(ServerError::Unauthorized("token expired".into()));
        }

        let user = std::str::from_utf8(&payload[EXPIRY_LEN..])
            .map_err(|_| ServerError::Unauthorized("malformed token subject".into()))?;
        if user.is_empty() {
            return Err(ServerError::Unauthorized("empty token subject".into()));
        }
        Ok(user.to_string())
    }

    fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LEN] {
        let mut mac = match HmacSha256::new_from_slice(&self.config.secret) {
            Ok(mac) => mac,
            // HMAC accepts keys of any length; unreachable in practice.
            Err(_) => return [0u8; SIGNATURE_LEN],
        };
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}
