//! Typed configuration loading (spec.md's ambient config layer). Kept from
//! the teacher's `configs` crate almost verbatim for `DatabasePoolConfig`
//! and the `%ENV_VAR` override mechanism, extended with an `AppConfig` that
//! combines everything the `api` binary needs to start.

pub mod database;
mod deserialize_env;

use {serde::Deserialize, std::net::SocketAddr};

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid socket address")
}

fn default_transfer_horizon() -> std::time::Duration {
    std::time::Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_offer_horizon() -> std::time::Duration {
    std::time::Duration::from_secs(3 * 24 * 60 * 60)
}

const fn default_ocr_rate_limit_per_minute() -> std::num::NonZeroU32 {
    std::num::NonZeroU32::new(30).expect("value should be greater than 0")
}

/// Top-level config for the `api` binary. Loaded from a TOML file via
/// [`AppConfig::load`]; every field supports the `%ENV_VAR` override
/// convention via [`database::DatabasePoolConfig`]'s fields and, where
/// relevant, `humantime-serde` for durations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default)]
    pub database: database::DatabasePoolConfig,

    /// How long a pending Request-type transfer may sit unresolved before
    /// the sweeper cancels it (spec.md §5).
    #[serde(default = "default_transfer_horizon", with = "humantime_serde")]
    pub transfer_horizon: std::time::Duration,

    /// How long an active offer may sit unresolved before the sweeper
    /// expires it, absent an explicit per-offer `expires_at`.
    #[serde(default = "default_offer_horizon", with = "humantime_serde")]
    pub offer_horizon: std::time::Duration,

    /// Token-bucket capacity for outbound OCR calls (spec.md §4.3); the
    /// actual limiter lives in the `rate-limit` crate, this is just the
    /// knob.
    #[serde(default = "default_ocr_rate_limit_per_minute")]
    pub ocr_rate_limit_per_minute: std::num::NonZeroU32,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl AppConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.bind_addr, default_bind_addr());
        assert_eq!(config.transfer_horizon, default_transfer_horizon());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = toml::from_str::<AppConfig>("not-a-real-field = 1").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }
}
