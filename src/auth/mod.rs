// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication for proxied requests.
//!
//! ## Auth Flow
//!
//! 1. The auth service issues HS256 tokens carrying `user_id` and `roles`
//! 2. Clients send `Authorization: Bearer <token>`
//! 3. The gateway:
//!    - skips verification for whitelisted `(method, path)` pairs
//!    - verifies signature and expiry with the shared secret
//!    - forwards `X-User-Id` / `X-User-Roles` along with the original
//!      `Authorization` header
//!
//! ## Security
//!
//! - The algorithm is pinned to HS256
//! - Backends receive the original token and may re-verify it

pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod verifier;

pub use claims::IdentityClaims;
pub use error::AuthError;
pub use extractor::Caller;
pub use verifier::TokenVerifier;
