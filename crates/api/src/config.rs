//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use printshop_auth::{RouteAccessPolicy, SessionLifetime};
use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together")]
    PartialBootstrap,

    #[error("route policy {path}: {message}")]
    RoutePolicy { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub lifetime: SessionLifetime,
    /// Upper bound on session resolution; slower lookups count as no session.
    pub validation_timeout: Duration,
    /// Adds `Secure` to the session cookie. Off only for plain-HTTP local runs.
    pub cookie_secure: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    /// JSON route policy document; the built-in policy when unset.
    pub route_policy: Option<PathBuf>,
}

impl ApiConfig {
    /// Defaults suitable for tests: given secret, loopback, standard lifetimes.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            lifetime: SessionLifetime::default(),
            validation_timeout: Duration::from_millis(2_000),
            cookie_secure: false,
            bootstrap_admin: None,
            route_policy: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let bind_addr = parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let defaults = SessionLifetime::default();
        let ttl_secs = parse_or(&lookup, "SESSION_TTL_SECS", defaults.ttl.num_seconds())?;
        let grace_secs = parse_or(&lookup, "REFRESH_GRACE_SECS", defaults.refresh_grace.num_seconds())?;
        let timeout_ms: u64 = parse_or(&lookup, "SESSION_VALIDATION_TIMEOUT_MS", 2_000)?;
        let cookie_secure = parse_or(&lookup, "COOKIE_SECURE", true)?;

        if ttl_secs <= 0 {
            return Err(ConfigError::NotPositive("SESSION_TTL_SECS"));
        }
        if grace_secs < 0 {
            return Err(ConfigError::Invalid {
                var: "REFRESH_GRACE_SECS",
                value: grace_secs.to_string(),
            });
        }
        if timeout_ms == 0 {
            return Err(ConfigError::NotPositive("SESSION_VALIDATION_TIMEOUT_MS"));
        }

        let bootstrap_admin = match (lookup("BOOTSTRAP_ADMIN_EMAIL"), lookup("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialBootstrap),
        };

        Ok(Self {
            jwt_secret,
            bind_addr,
            lifetime: SessionLifetime {
                ttl: chrono::Duration::seconds(ttl_secs),
                refresh_grace: chrono::Duration::seconds(grace_secs),
            },
            validation_timeout: Duration::from_millis(timeout_ms),
            cookie_secure,
            bootstrap_admin,
            route_policy: lookup("ROUTE_POLICY").map(PathBuf::from),
        })
    }

    /// The route policy to run with: the `ROUTE_POLICY` document if one is
    /// configured, otherwise [`RouteAccessPolicy::standard`].
    pub fn load_route_policy(&self) -> Result<RouteAccessPolicy, ConfigError> {
        let Some(path) = &self.route_policy else {
            return Ok(RouteAccessPolicy::standard());
        };
        let policy_error = |message: String| ConfigError::RoutePolicy {
            path: path.display().to_string(),
            message,
        };
        let document = std::fs::read_to_string(path).map_err(|e| policy_error(e.to_string()))?;
        let policy = RouteAccessPolicy::from_json(&document).map_err(|e| policy_error(e.to_string()))?;
        tracing::info!(path = %path.display(), rules = policy.rules().len(), "loaded route policy");
        Ok(policy)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
