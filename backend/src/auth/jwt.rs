//! JWT token generation and validation
//!
//! Tokens are stateless: validity is signature correctness plus expiry, so
//! the configured lifetime is the only revocation mechanism. Keys are derived
//! once from the injected secret and shared behind `Arc`.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashboard_shared::AuthError;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Identity claim set carried by a bearer token
///
/// Login tokens carry all three fields; password-reset tokens carry only the
/// username.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    /// Claims issued on successful authentication
    pub fn user(id: Uuid, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: Some(username.into()),
            email: Some(email.into()),
        }
    }

    /// Minimal claims embedded in a password-reset token
    pub fn reset(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: Some(username.into()),
            email: None,
        }
    }
}

/// Signed payload: the identity plus the token envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    identity: Identity,
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Expiration time (Unix timestamp)
    exp: i64,
    /// Token ID; keeps two tokens for the same identity distinct
    jti: String,
}

/// Pre-computed JWT keys for efficient token operations
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl JwtKeys {
    /// Create new JWT keys from secret
    /// This should be called once at startup
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: Arc::new(EncodingKey::from_secret(bytes)),
            decoding: Arc::new(DecodingKey::from_secret(bytes)),
        }
    }
}

/// Token issuer and verifier
#[derive(Clone)]
pub struct TokenService {
    keys: JwtKeys,
    lifetime: Duration,
    validation: Validation,
}

impl TokenService {
    /// Create a token service from the signing secret and token lifetime
    pub fn new(secret: &SecretString, lifetime_secs: i64, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            keys: JwtKeys::new(secret),
            lifetime: Duration::seconds(lifetime_secs),
            validation,
        }
    }

    /// Sign `identity` into a token valid for the configured lifetime
    pub fn sign(&self, identity: &Identity) -> Result<String> {
        self.sign_at(identity, Utc::now())
    }

    /// Sign `identity` as if issued at `issued_at`
    pub fn sign_at(&self, identity: &Identity, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            identity: identity.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))?;
        debug!(user_id = ?identity.id, "token signed");
        Ok(token)
    }

    /// Verify a token and return exactly the identity that was signed
    ///
    /// An elapsed expiry is reported as [`AuthError::TokenExpired`] only when
    /// the signature is valid; every other failure is
    /// [`AuthError::TokenInvalid`].
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        match decode::<Claims>(token, &self.keys.decoding, &self.validation) {
            Ok(data) => Ok(data.claims.identity),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::TokenExpired),
                _ => {
                    debug!(error = %e, "token rejected");
                    Err(AuthError::TokenInvalid)
                }
            },
        }
    }

    /// Token lifetime in seconds
    #[inline]
    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}
