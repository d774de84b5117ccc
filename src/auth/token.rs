// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Self-contained HMAC-signed session tokens.
//!
//! ## Format
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(HMAC-SHA256(key, first two segments))
//! ```
//!
//! Base64 is the URL-safe alphabet without padding. Nothing is stored
//! server-side: a token is valid iff its MAC verifies under the configured
//! key and `now < exp`.
//!
//! The codec takes its clock as a dependency so expiry can be tested
//! against a fixed instant.

use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::claims::{SessionClaims, TokenHeader, TOKEN_ALG};
use super::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed session lifetime in seconds (24 hours).
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Source of the current time, in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// HMAC signing key for session tokens.
///
/// An empty key is rejected at construction; callers treat that as a
/// deployment error rather than running with verification disabled.
#[derive(Clone)]
pub struct SigningKey(HmacSha256);

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let bytes = secret.into();
        if bytes.is_empty() {
            return Err(AuthError::InternalError(
                "session signing secret is empty".to_string(),
            ));
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(&bytes)
            .map_err(|e| AuthError::InternalError(format!("invalid signing key: {e}")))?;
        Ok(Self(mac))
    }

    /// Fresh keyed MAC state.
    fn mac(&self) -> HmacSha256 {
        self.0.clone()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    key: SigningKey,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec using the wall clock.
    pub fn new(key: SigningKey) -> Self {
        Self::with_clock(key, Arc::new(SystemClock))
    }

    /// Create a codec with an explicit clock.
    pub fn with_clock(key: SigningKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            key,
            clock,
            ttl: Duration::seconds(SESSION_TTL_SECS),
        }
    }

    /// Session lifetime applied by [`TokenCodec::issue`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `username`, valid for [`SESSION_TTL_SECS`].
    pub fn issue(&self, username: &str) -> String {
        let now = self.clock.now();
        let claims = SessionClaims {
            username: username.to_string(),
            issued_at: now,
            expires_at: now + self.ttl.num_seconds(),
        };
        self.encode(&TokenHeader::default(), &claims)
    }

    /// Verify a token and return its claims.
    ///
    /// Total over its input: any malformed, forged or expired token maps to
    /// an [`AuthError`] variant, never a panic.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::MalformedToken);
        };

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| AuthError::MalformedToken)?;

        // MAC first: nothing inside the token is trusted before this.
        let mut mac = self.key.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let header: TokenHeader = decode_segment(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(AuthError::MalformedToken);
        }

        let claims: SessionClaims = decode_segment(claims_b64)?;
        if claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    fn encode(&self, header: &TokenHeader, claims: &SessionClaims) -> String {
        let header_b64 = encode_segment(header);
        let claims_b64 = encode_segment(claims);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.key.mac();
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        )
    }
}

fn encode_segment<T: serde::Serialize>(value: &T) -> String {
    // Header and claims are plain structs of strings and integers.
    let json = serde_json::to_vec(value).unwrap_or_default();
    Base64UrlUnpadded::encode_string(&json)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}
