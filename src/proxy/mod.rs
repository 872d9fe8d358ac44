// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Forwarding to backend services and relaying their answers.

pub mod forwarder;
pub mod relay;

pub use forwarder::{
    outbound_headers, Forwarder, OutboundRequest, TransportError, UpstreamResponse, REQUEST_ID_HEADER,
    USER_ID_HEADER, USER_ROLES_HEADER,
};
pub use relay::relay;
