// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity claims carried by clinic access tokens.

use axum::http::{header::InvalidHeaderValue, HeaderValue};
use serde::{Deserialize, Deserializer};

/// Claims the gateway reads from a verified token.
///
/// Tokens issued by the auth service also carry `username`, `iat`, `exp` and
/// friends; only `user_id` and `roles` identify the caller downstream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityClaims {
    /// Caller ID, stringified. Tokens carry it as either a number or a string.
    #[serde(deserialize_with = "user_id_as_string")]
    pub user_id: String,

    /// Role names, e.g. `["PATIENT"]`.
    pub roles: Vec<String>,
}

impl IdentityClaims {
    pub fn new(user_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
        }
    }

    /// Value of the `X-User-Roles` header: the roles as a JSON array.
    pub fn roles_header(&self) -> String {
        serde_json::Value::from(self.roles.clone()).to_string()
    }

    /// `(X-User-Id, X-User-Roles)` values for the outbound request.
    pub fn header_values(&self) -> Result<(HeaderValue, HeaderValue), InvalidHeaderValue> {
        Ok((
            HeaderValue::from_bytes(self.user_id.as_bytes())?,
            HeaderValue::from_bytes(self.roles_header().as_bytes())?,
        ))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Text(String),
    Integer(i64),
    Unsigned(u64),
}

fn user_id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawUserId::deserialize(deserializer)? {
        RawUserId::Text(s) => s,
        RawUserId::Integer(n) => n.to_string(),
        RawUserId::Unsigned(n) => n.to_string(),
    })
}
