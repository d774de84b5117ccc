// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token header/claims and the authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Algorithm identifier written into every token header.
pub const TOKEN_ALG: &str = "HS256";

/// Token type written into every token header.
pub const TOKEN_TYP: &str = "JWT";

/// Token header segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        }
    }
}

/// Claims carried in the payload segment of a session token.
///
/// Timestamps are Unix seconds. A token is only valid while
/// `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Console user the session was issued to
    pub username: String,

    /// Issued at timestamp
    #[serde(rename = "iat")]
    pub issued_at: i64,

    /// Expiration timestamp
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionClaims {
    /// Whether the claims are expired at `now` (Unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Authenticated console user extracted from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Console username
    pub username: String,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified claims.
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            username: claims.username,
            expires_at: claims.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_use_registered_claim_names() {
        let claims = SessionClaims {
            username: "admin".to_string(),
            issued_at: 1_700_000_000,
            expires_at: 1_700_086_400,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["username"], "admin");
        assert_eq!(json["iat"], 1_700_000_000);
        assert_eq!(json["exp"], 1_700_086_400);
    }

    #[test]
    fn expiry_is_exclusive() {
        let claims = SessionClaims {
            username: "admin".to_string(),
            issued_at: 0,
            expires_at: 100,
        };
        assert!(!claims.is_expired_at(99));
        assert!(claims.is_expired_at(100));
        assert!(claims.is_expired_at(101));
    }

    #[test]
    fn from_claims_keeps_username_and_expiry() {
        let user = AuthenticatedUser::from_claims(SessionClaims {
            username: "ops".to_string(),
            issued_at: 10,
            expires_at: 20,
        });
        assert_eq!(user.username, "ops");
        assert_eq!(user.expires_at, 20);
        // Expiry is internal only
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("expires_at").is_none());
    }
}
