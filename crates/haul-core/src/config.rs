use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::AppError;
use crate::pagination::StabilizationConfig;
use crate::rate_limiter::{RateLimitPolicy, RateLimiterConfig};

/// Everything needed to assemble one acquisition pipeline.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub cache: CacheConfig,
    pub rate_limiter: RateLimiterConfig,
    pub rate_limit_policy: RateLimitPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Maximum simultaneous upstream fetches.
    pub max_concurrent: usize,
    pub stabilization: StabilizationConfig,
    /// Serve placeholder data instead of returning guarded-path errors.
    pub degrade_on_failure: bool,
    /// Collapse concurrent misses for the same cache key into one fetch.
    pub coalesce_misses: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            rate_limit_policy: RateLimitPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            max_concurrent: 2,
            stabilization: StabilizationConfig::default(),
            degrade_on_failure: true,
            coalesce_misses: false,
        }
    }
}

impl AcquisitionConfig {
    /// Read configuration from `HAUL_*` environment variables.
    ///
    /// - `HAUL_CACHE_TTL_SECS` (default 900)
    /// - `HAUL_CACHE_MAX_ENTRIES` (default unbounded)
    /// - `HAUL_RATE_LIMIT_PER_MINUTE` / `HAUL_RATE_LIMIT_FLOOR` (default 20 / 5)
    /// - `HAUL_RATE_LIMIT_POLICY` = `wait` | `reject`, with `HAUL_RATE_LIMIT_MAX_WAIT_SECS`
    /// - `HAUL_BREAKER_FAILURE_THRESHOLD` / `HAUL_BREAKER_RECOVERY_SECS` (default 3 / 120)
    /// - `HAUL_MAX_CONCURRENT` (default 2)
    /// - `HAUL_STABLE_TOTALS` (comma-separated) / `HAUL_STABLE_TOLERANCE`
    /// - `HAUL_DEGRADE_ON_FAILURE` / `HAUL_COALESCE_MISSES` (booleans)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads from an arbitrary source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "HAUL_CACHE_TTL_SECS")? {
            config.cache.ttl = Duration::from_secs(secs);
        }
        config.cache.max_entries = parse_var(&lookup, "HAUL_CACHE_MAX_ENTRIES")?;

        if let Some(ceiling) = parse_var(&lookup, "HAUL_RATE_LIMIT_PER_MINUTE")? {
            config.rate_limiter.ceiling = ceiling;
        }
        if let Some(floor) = parse_var(&lookup, "HAUL_RATE_LIMIT_FLOOR")? {
            config.rate_limiter.floor = floor;
        }

        let max_wait = parse_var::<u64, _>(&lookup, "HAUL_RATE_LIMIT_MAX_WAIT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));
        config.rate_limit_policy = match lookup("HAUL_RATE_LIMIT_POLICY").as_deref() {
            None | Some("wait") => RateLimitPolicy::Wait { max_wait },
            Some("reject") => RateLimitPolicy::Reject,
            Some(other) => {
                return Err(AppError::ConfigError(format!(
                    "Invalid HAUL_RATE_LIMIT_POLICY '{other}': expected 'wait' or 'reject'"
                )));
            }
        };

        if let Some(threshold) = parse_var(&lookup, "HAUL_BREAKER_FAILURE_THRESHOLD")? {
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "HAUL_BREAKER_RECOVERY_SECS")? {
            config.circuit_breaker.recovery_timeout = Duration::from_secs(secs);
        }

        if let Some(max) = parse_var(&lookup, "HAUL_MAX_CONCURRENT")? {
            config.max_concurrent = max;
        }

        if let Some(raw) = lookup("HAUL_STABLE_TOTALS") {
            config.stabilization.boundaries = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse().map_err(|_| {
                        AppError::ConfigError(format!(
                            "Invalid HAUL_STABLE_TOTALS entry '{s}': must be a positive integer"
                        ))
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(tolerance) = parse_var(&lookup, "HAUL_STABLE_TOLERANCE")? {
            config.stabilization.tolerance = tolerance;
        }

        if let Some(flag) = parse_var(&lookup, "HAUL_DEGRADE_ON_FAILURE")? {
            config.degrade_on_failure = flag;
        }
        if let Some(flag) = parse_var(&lookup, "HAUL_COALESCE_MISSES")? {
            config.coalesce_misses = flag;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.rate_limiter.ceiling == 0 {
            return Err(AppError::ConfigError(
                "rate limit ceiling must be at least 1".into(),
            ));
        }
        if self.rate_limiter.floor == 0 || self.rate_limiter.floor > self.rate_limiter.ceiling {
            return Err(AppError::ConfigError(format!(
                "rate limit floor must be between 1 and the ceiling ({})",
                self.rate_limiter.ceiling
            )));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(AppError::ConfigError(
                "breaker failure threshold must be at least 1".into(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(AppError::ConfigError(
                "max concurrent fetches must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, L>(lookup: &L, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_original_deployment() {
        let config = AcquisitionConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(900));
        assert_eq!(config.rate_limiter.ceiling, 20);
        assert_eq!(config.rate_limiter.floor, 5);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrent, 2);
        assert!(config.degrade_on_failure);
        assert!(!config.coalesce_misses);
    }

    #[test]
    fn reads_overrides() {
        let config = AcquisitionConfig::from_lookup(lookup_from(&[
            ("HAUL_CACHE_TTL_SECS", "30"),
            ("HAUL_CACHE_MAX_ENTRIES", "1000"),
            ("HAUL_RATE_LIMIT_POLICY", "reject"),
            ("HAUL_MAX_CONCURRENT", "4"),
            ("HAUL_STABLE_TOTALS", "96, 960"),
            ("HAUL_COALESCE_MISSES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.cache.max_entries, Some(1000));
        assert_eq!(config.rate_limit_policy, RateLimitPolicy::Reject);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.stabilization.boundaries, vec![96, 960]);
        assert!(config.coalesce_misses);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = AcquisitionConfig::from_lookup(lookup_from(&[("HAUL_MAX_CONCURRENT", "lots")]))
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        let err =
            AcquisitionConfig::from_lookup(lookup_from(&[("HAUL_RATE_LIMIT_POLICY", "drop")]))
                .unwrap_err();
        assert!(err.to_string().contains("HAUL_RATE_LIMIT_POLICY"));
    }

    #[test]
    fn rejects_floor_above_ceiling() {
        let err = AcquisitionConfig::from_lookup(lookup_from(&[
            ("HAUL_RATE_LIMIT_PER_MINUTE", "4"),
            ("HAUL_RATE_LIMIT_FLOOR", "8"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
