// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Console login credential check.
//!
//! The configured password is either an Argon2 PHC string (`$argon2id$...`)
//! or plaintext. Plaintext comparison is constant time.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use subtle::ConstantTimeEq;

/// Configured console login.
#[derive(Clone)]
pub struct ConsoleCredentials {
    username: String,
    password: PasswordCheck,
}

#[derive(Clone)]
enum PasswordCheck {
    Argon2(String),
    Plain(String),
}

impl ConsoleCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let password = password.into();
        let password = if password.starts_with("$argon2") {
            PasswordCheck::Argon2(password)
        } else {
            PasswordCheck::Plain(password)
        };
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Check a login attempt.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok: bool = self.username.as_bytes().ct_eq(username.as_bytes()).into();
        // Always run the password check so timing does not reveal the username.
        let password_ok = match &self.password {
            PasswordCheck::Argon2(phc) => match PasswordHash::new(phc) {
                Ok(parsed) => Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "configured password hash is not a valid PHC string"
                    );
                    false
                }
            },
            PasswordCheck::Plain(expected) => expected.as_bytes().ct_eq(password.as_bytes()).into(),
        };
        user_ok && password_ok
    }
}

impl std::fmt::Debug for ConsoleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHasher, SaltString};

    #[test]
    fn plaintext_password_matches_exactly() {
        let creds = ConsoleCredentials::new("admin", "hunter2");
        assert!(creds.verify("admin", "hunter2"));
        assert!(!creds.verify("admin", "hunter"));
        assert!(!creds.verify("admin", "hunter22"));
        assert!(!creds.verify("root", "hunter2"));
        assert!(!creds.verify("", ""));
    }

    #[test]
    fn argon2_hash_is_verified() {
        let salt = SaltString::encode_b64(&[7u8; 16]).unwrap();
        let phc = Argon2::default()
            .hash_password(b"correct horse", &salt)
            .unwrap()
            .to_string();

        let creds = ConsoleCredentials::new("admin", phc);
        assert!(creds.verify("admin", "correct horse"));
        assert!(!creds.verify("admin", "battery staple"));
    }

    #[test]
    fn broken_hash_never_matches() {
        let creds = ConsoleCredentials::new("admin", "$argon2id$garbage");
        assert!(!creds.verify("admin", "$argon2id$garbage"));
    }

    #[test]
    fn debug_redacts_password() {
        let creds = ConsoleCredentials::new("admin", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
