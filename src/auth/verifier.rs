// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 bearer token verification.

use axum::http::HeaderValue;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::{AuthError, IdentityClaims};

const BEARER_PREFIX: &str = "Bearer ";

/// Verifies tokens signed by the auth service with the shared secret.
///
/// The algorithm is pinned to HS256; a token whose header names anything
/// else (including `none`) is rejected without trying other algorithms.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for `secret` allowing `leeway_secs` of clock skew on `exp`.
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;
        // The auth service sets neither aud nor iss, and `exp` is checked
        // only when present.
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify the raw `Authorization` header value.
    pub fn verify_header(&self, header: Option<&HeaderValue>) -> Result<IdentityClaims, AuthError> {
        let value = header
            .ok_or(AuthError::Unauthorized)?
            .to_str()
            .map_err(|_| AuthError::Unauthorized)?;

        let token = value
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::Unauthorized)?;

        self.verify(token)
    }

    /// Verify a bare token.
    ///
    /// Claims that cannot be carried in `X-User-*` headers are rejected too.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let claims = decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        if claims.header_values().is_err() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}
