// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clinic Gateway - Authenticating Reverse Proxy
//!
//! Single entry point in front of the clinic microservices (auth, doctor,
//! patient, appointment, laboratory, ...). Requests to
//! `/{service}/{path...}` are authenticated with an HS256 bearer token unless
//! whitelisted, then forwarded once to the service's backend.
//!
//! ## Modules
//!
//! - `api` - HTTP surface (Axum router, proxy handler, health)
//! - `auth` - Bearer token verification and auth stage
//! - `routing` - Route table, whitelist and per-request decision
//! - `proxy` - Outbound forwarding and response relay
//! - `config` - Startup configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod proxy;
pub mod routing;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod test_support;
