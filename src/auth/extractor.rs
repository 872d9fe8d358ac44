// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the caller identity set by [`auth_stage`].
//!
//! ```rust,ignore
//! async fn handler(Caller(identity): Caller) -> impl IntoResponse {
//!     // identity is None on whitelisted routes
//! }
//! ```
//!
//! [`auth_stage`]: super::middleware::auth_stage

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::IdentityClaims;

/// Identity of the caller, if the request went through token verification.
///
/// Never rejects: whitelisted requests simply carry `None`.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<IdentityClaims>);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<IdentityClaims>().cloned()))
    }
}
