// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once at startup and never changes afterwards;
//! picking up new routes or a new secret requires a restart.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GATEWAY_CONFIG` | Path to the JSON config file | unset |
//! | `GATEWAY_ROUTES` | `prefix=url,prefix=url`, replaces the file's routes | unset |
//! | `JWT_SECRET` | HS256 signing secret shared with the auth service | Required |
//! | `AUTH_SERVICE_SECRET` | Fallback name for `JWT_SECRET` | unset |
//! | `UPSTREAM_TIMEOUT_SECS` | Per-call backend timeout | `10` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key; enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Config File
//!
//! ```json
//! {
//!   "jwt_secret": "change-me",
//!   "routes": [{ "prefix": "svc-doctor", "url": "http://service-doctor:8002" }],
//!   "whitelist": [
//!     { "method": "GET", "path": "svc-doctor/api/info" },
//!     { "service": "svc-laboratory", "path": "api/testtypes" }
//!   ],
//!   "upstream_timeout_secs": 10,
//!   "max_in_flight": 256,
//!   "clock_skew_leeway_secs": 0
//! }
//! ```
//!
//! Omitting `whitelist` selects [`Whitelist::clinic_defaults`].

use std::{
    env,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::routing::{
    ProxyMethod, RouteMatcher, RouteTable, RouteTableError, Whitelist, WhitelistEntry,
};

/// Environment variable name for the JSON config file path.
pub const GATEWAY_CONFIG_ENV: &str = "GATEWAY_CONFIG";
/// Environment variable name for the inline route table.
pub const GATEWAY_ROUTES_ENV: &str = "GATEWAY_ROUTES";
/// Environment variable name for the token signing secret.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
/// Secondary name for the signing secret, as used by the auth service.
pub const AUTH_SERVICE_SECRET_ENV: &str = "AUTH_SERVICE_SECRET";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_ENV: &str = "TLS_KEY_PATH";
/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Route(#[from] RouteTableError),

    #[error("invalid route '{0}' in GATEWAY_ROUTES (expected prefix=url)")]
    RouteSyntax(String),

    #[error("no routes configured")]
    NoRoutes,

    #[error("unknown whitelist method '{0}' (expected GET, POST, PUT, DELETE or *)")]
    WhitelistMethod(String),

    #[error("whitelist entry has an empty path")]
    EmptyWhitelistPath,

    #[error("token signing secret is not configured (set JWT_SECRET)")]
    MissingSecret,

    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
}

/// On-disk configuration, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    pub whitelist: Option<Vec<WhitelistSpec>>,
    pub upstream_timeout_secs: Option<u64>,
    pub max_in_flight: Option<usize>,
    pub clock_skew_leeway_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    pub prefix: String,
    pub url: String,
}

/// Whitelist entry as written in the config file.
///
/// - `{"method": "GET", "path": "svc-doctor/api/info"}` exempts one method.
/// - `{"path": ...}` or `{"method": "*", ...}` exempts every method.
/// - `{"service": "svc-auth", "path": "api/login"}` is joined to
///   `svc-auth/api/login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhitelistSpec {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    pub path: String,
}

impl WhitelistSpec {
    fn into_entry(self) -> Result<WhitelistEntry, ConfigError> {
        let prefix = match self.service {
            Some(service) => format!("{service}/{}", self.path),
            None => self.path,
        };
        if prefix.is_empty() {
            return Err(ConfigError::EmptyWhitelistPath);
        }

        match self.method.as_deref() {
            None | Some("*") => Ok(WhitelistEntry::general(prefix)),
            Some(m) => ProxyMethod::parse(m)
                .map(|method| WhitelistEntry::method(method, prefix))
                .ok_or_else(|| ConfigError::WhitelistMethod(m.to_string())),
        }
    }
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values taken from the environment, which win over the file.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub routes: Option<String>,
    pub jwt_secret: Option<String>,
    pub upstream_timeout_secs: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            routes: non_empty_var(GATEWAY_ROUTES_ENV),
            jwt_secret: non_empty_var(JWT_SECRET_ENV).or_else(|| non_empty_var(AUTH_SERVICE_SECRET_ENV)),
            upstream_timeout_secs: non_empty_var(UPSTREAM_TIMEOUT_ENV),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `prefix=url,prefix=url`.
pub fn parse_route_list(spec: &str) -> Result<Vec<(String, String)>, ConfigError> {
    spec.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.split_once('=')
                .map(|(prefix, url)| (prefix.trim().to_string(), url.trim().to_string()))
                .ok_or_else(|| ConfigError::RouteSyntax(item.to_string()))
        })
        .collect()
}

/// Immutable gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    pub routes: RouteTable,
    pub whitelist: Whitelist,
    jwt_secret: String,
    pub upstream_timeout: Duration,
    pub max_in_flight: usize,
    pub clock_skew_leeway_secs: u64,
}

impl GatewayConfig {
    pub fn new(routes: RouteTable, whitelist: Whitelist, jwt_secret: impl Into<String>) -> Self {
        Self {
            routes,
            whitelist,
            jwt_secret: jwt_secret.into(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            clock_skew_leeway_secs: 0,
        }
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_clock_skew_leeway(mut self, secs: u64) -> Self {
        self.clock_skew_leeway_secs = secs;
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn matcher(&self) -> RouteMatcher<'_> {
        RouteMatcher::new(&self.routes, &self.whitelist)
    }

    /// Load from `GATEWAY_CONFIG` (if set) plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match non_empty_var(GATEWAY_CONFIG_ENV) {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::from_sources(file, EnvOverrides::from_env())
    }

    /// Merge a config file with environment overrides and validate the result.
    pub fn from_sources(file: ConfigFile, overrides: EnvOverrides) -> Result<Self, ConfigError> {
        let routes = match overrides.routes {
            Some(spec) => RouteTable::from_pairs(parse_route_list(&spec)?)?,
            None => RouteTable::from_pairs(file.routes.into_iter().map(|r| (r.prefix, r.url)))?,
        };
        if routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        let whitelist = match file.whitelist {
            Some(specs) => Whitelist::new(
                specs
                    .into_iter()
                    .map(WhitelistSpec::into_entry)
                    .collect::<Result<_, _>>()?,
            ),
            None => Whitelist::clinic_defaults(),
        };

        let jwt_secret = overrides
            .jwt_secret
            .or(file.jwt_secret)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let upstream_timeout = match overrides.upstream_timeout_secs {
            Some(raw) => Duration::from_secs(parse_positive(UPSTREAM_TIMEOUT_ENV, &raw)?),
            None => file
                .upstream_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
        };
        if upstream_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "upstream_timeout_secs",
                value: "0".to_string(),
            });
        }

        let max_in_flight = file.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT);
        if max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_in_flight",
                value: "0".to_string(),
            });
        }

        Ok(Self::new(routes, whitelist, jwt_secret)
            .with_upstream_timeout(upstream_timeout)
            .with_max_in_flight(max_in_flight)
            .with_clock_skew_leeway(file.clock_skew_leeway_secs.unwrap_or(0)))
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("routes", &self.routes)
            .field("whitelist", &self.whitelist)
            .field("jwt_secret", &"<redacted>")
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("clock_skew_leeway_secs", &self.clock_skew_leeway_secs)
            .finish()
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        })
}

/// PEM certificate chain and private key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            non_empty_var(HOST_ENV),
            non_empty_var(PORT_ENV),
            non_empty_var(TLS_CERT_ENV),
            non_empty_var(TLS_KEY_ENV),
        )
    }

    pub fn from_values(
        host: Option<String>,
        port: Option<String>,
        tls_cert: Option<String>,
        tls_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidValue {
            name: HOST_ENV,
            value: host.clone(),
        })?;

        let port = match port {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (tls_cert, tls_key) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            tls,
        })
    }
}
