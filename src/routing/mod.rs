// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Routing
//!
//! Static tables consulted for every proxied request:
//!
//! - [`RouteTable`] maps the first path segment (`svc-doctor`, ...) to a
//!   backend origin.
//! - [`Whitelist`] lists the `(method, path prefix)` pairs that skip token
//!   verification.
//!
//! [`RouteMatcher`] combines both into a [`RouteDecision`]. Both tables are
//! built once at startup and never mutated.

pub mod matcher;
pub mod method;
pub mod route_table;
pub mod whitelist;

pub use matcher::{RouteDecision, RouteMatcher, RoutingError};
pub use method::ProxyMethod;
pub use route_table::{Route, RouteTable, RouteTableError};
pub use whitelist::{Whitelist, WhitelistEntry};
