//! Opaque session tokens
//!
//! A token carries `{id, username, role, expiration}` where `expiration` is
//! milliseconds since the Unix epoch. Two codecs exist:
//!
//! - [`TokenCodec::Plain`], the legacy format: standard base64 of the JSON
//!   payload. It is *not* signed, anyone can mint a well-formed token, so the
//!   middleware additionally compares every presented token with the one
//!   persisted on the account row.
//! - [`TokenCodec::Signed`], opted into by configuring a secret: an HS256 JWT
//!   over the same payload. Expiration is still judged by [`TokenClaims::is_expired`],
//!   never by the JWT `exp` claim.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::access::Role;

/// Default token lifetime: five days, in milliseconds
pub const DEFAULT_TOKEN_LIFETIME_MS: i64 = 5 * 24 * 60 * 60 * 1000;

/// Token decoding and encoding failures
#[derive(Error, Debug)]
pub enum TokenError {
    /// Not base64, not JSON, or missing required fields
    #[error("Malformed token")]
    Malformed,

    /// Signature verification failed
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The payload could not be encoded
    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

/// Decoded token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
}

impl TokenClaims {
    /// Fails closed: a missing expiration counts as expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expiration {
            Some(expiration) => expiration <= now_ms,
            None => true,
        }
    }
}

/// A freshly minted token and the expiration it encodes
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expiration: i64,
}

/// Wire format of the token
#[derive(Clone)]
pub enum TokenCodec {
    Plain,
    Signed {
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
        validation: Validation,
    },
}

impl TokenCodec {
    /// HS256 codec keyed by `secret`
    pub fn signed(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        TokenCodec::Signed {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

/// Token service
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    lifetime_ms: i64,
}

impl TokenService {
    pub fn new(codec: TokenCodec, lifetime_ms: i64) -> Self {
        Self { codec, lifetime_ms }
    }

    /// Legacy unsigned codec with the default lifetime
    pub fn plain() -> Self {
        Self::new(TokenCodec::Plain, DEFAULT_TOKEN_LIFETIME_MS)
    }

    /// Signed codec when a secret is configured, legacy codec otherwise
    pub fn from_secret(secret: Option<&str>, lifetime_ms: i64) -> Self {
        let codec = match secret {
            Some(secret) if !secret.is_empty() => TokenCodec::signed(secret),
            _ => TokenCodec::Plain,
        };
        Self::new(codec, lifetime_ms)
    }

    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_ms
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.codec, TokenCodec::Signed { .. })
    }

    /// Encode a token expiring at `expiration_ms`
    pub fn create_token(
        &self,
        id: Uuid,
        username: &str,
        role: Role,
        expiration_ms: i64,
    ) -> Result<String, TokenError> {
        let claims = TokenClaims {
            id,
            username: username.to_string(),
            role,
            expiration: Some(expiration_ms),
        };
        self.encode_claims(&claims)
    }

    /// Mint a token that expires one lifetime from now
    pub fn issue(&self, id: Uuid, username: &str, role: Role) -> Result<IssuedToken, TokenError> {
        let expiration = now_millis() + self.lifetime_ms;
        let token = self.create_token(id, username, role, expiration)?;
        Ok(IssuedToken { token, expiration })
    }

    pub fn encode_claims(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        match &self.codec {
            TokenCodec::Plain => {
                let json = serde_json::to_vec(claims)
                    .map_err(|e| TokenError::Encoding(e.to_string()))?;
                Ok(BASE64.encode(json))
            }
            TokenCodec::Signed { encoding_key, .. } => {
                encode(&Header::new(Algorithm::HS256), claims, encoding_key)
                    .map_err(|e| TokenError::Encoding(e.to_string()))
            }
        }
    }

    /// Decode a token without judging its expiration
    pub fn decode_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let token = token.trim();
        match &self.codec {
            TokenCodec::Plain => {
                let bytes = BASE64.decode(token).map_err(|_| TokenError::Malformed)?;
                serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
            }
            TokenCodec::Signed {
                decoding_key,
                validation,
                ..
            } => decode::<TokenClaims>(token, decoding_key, validation)
                .map(|data| data.claims)
                .map_err(|e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        TokenError::InvalidSignature
                    }
                    _ => TokenError::Malformed,
                }),
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
