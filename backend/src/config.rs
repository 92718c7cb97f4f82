use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::providers::overpass::DEFAULT_OVERPASS_URL;
use crate::session::MAX_DEVIATION_LIMIT_KM;

/// Value shipped in unconfigured builds in place of a real directions token.
pub const MAPBOX_TOKEN_PLACEHOLDER: &str = "MAPBOX_TOKEN_PLACEHOLDER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub overpass_url: String,
    pub overpass_timeout_secs: u64,
    pub mapbox_token: Option<String>,
    pub mapbox_profile: String,
    pub http_timeout: Duration,
    pub detour_concurrency: usize,
    /// 0 disables the directions cache.
    pub directions_cache_size: usize,
    pub default_max_deviation_km: f64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, environment or test map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(&var, "BIND_ADDR", "0.0.0.0:8080".parse().ok())?;
        let overpass_url = var("OVERPASS_URL").unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_string());
        let overpass_timeout_secs = parse_or(&var, "OVERPASS_TIMEOUT_SECS", Some(25))?;
        let mapbox_token = var("MAPBOX_TOKEN").filter(|token| token != MAPBOX_TOKEN_PLACEHOLDER);
        let mapbox_profile = var("MAPBOX_PROFILE").unwrap_or_else(|| "cycling".to_string());
        let http_timeout_secs: u64 = parse_or(&var, "HTTP_TIMEOUT_SECS", Some(30))?;
        let detour_concurrency: usize = parse_or(&var, "DETOUR_CONCURRENCY", Some(1))?;
        let directions_cache_size = parse_or(&var, "DIRECTIONS_CACHE_SIZE", Some(256))?;
        let default_max_deviation_km: f64 =
            parse_or(&var, "DEFAULT_MAX_DEVIATION_KM", Some(shared::default_max_deviation_km()))?;

        if detour_concurrency == 0 {
            return Err(invalid("DETOUR_CONCURRENCY", "0", "must be at least 1"));
        }
        if !default_max_deviation_km.is_finite()
            || default_max_deviation_km <= 0.0
            || default_max_deviation_km > MAX_DEVIATION_LIMIT_KM
        {
            return Err(invalid(
                "DEFAULT_MAX_DEVIATION_KM",
                &default_max_deviation_km.to_string(),
                &format!("must be in (0, {MAX_DEVIATION_LIMIT_KM}]"),
            ));
        }

        Ok(Self {
            bind_addr,
            overpass_url,
            overpass_timeout_secs,
            mapbox_token,
            mapbox_profile,
            http_timeout: Duration::from_secs(http_timeout_secs),
            detour_concurrency,
            directions_cache_size,
            default_max_deviation_km,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            overpass_timeout_secs: 25,
            mapbox_token: None,
            mapbox_profile: "cycling".to_string(),
            http_timeout: Duration::from_secs(30),
            detour_concurrency: 1,
            directions_cache_size: 256,
            default_max_deviation_km: shared::default_max_deviation_km(),
        }
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err: T::Err| invalid(key, &raw, &err.to_string())),
        None => default.ok_or_else(|| invalid(key, "", "missing")),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
