// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session authentication for the storage console.
//!
//! ## Auth Flow
//!
//! 1. `POST /api/auth/login` checks the configured console credentials
//! 2. On success the server issues an HMAC-signed session token
//!    ([`TokenCodec`]) and sets it as the `auth-token` cookie
//! 3. Every request passes the [`gate`]: page requests without the cookie
//!    are redirected to `/login`
//! 4. API handlers that need identity use the [`Auth`] extractor, which
//!    verifies signature and expiry
//!
//! ## Security
//!
//! - No server-side session store; tokens expire after 24 hours
//! - Cookie is `HttpOnly`, `SameSite=Strict`, `Path=/`, `Secure` in production
//! - Missing/forged/expired tokens produce the same 401 body

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod login;
pub mod token;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use gate::{session_gate, GateDecision, RouteClass, SessionGate};
pub use login::ConsoleCredentials;
pub use token::{Clock, SigningKey, SystemClock, TokenCodec};

/// Session cookie name.
pub const AUTH_COOKIE: &str = "auth-token";
