//! Server configuration, read from `config.toml` and `NESTMATCH_*`
//! environment variables.

use std::{path::PathBuf, time::Duration};

use anyhow::ensure;
use nestmatch_api::{EngineConfig, RateLimitConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Lifetime of a cached decision view.
  pub cache_ttl_secs:      u64,
  pub query_timeout_ms:    u64,
  pub invitation_ttl_days: i64,
  pub rate_limit_burst:    u32,
  pub rate_limit_per_sec:  f64,
  /// Per-address limit, applied before authentication.
  pub peer_limit_burst:    u32,
  pub peer_limit_per_sec:  f64,
}

pub const MAX_INVITATION_TTL_DAYS: i64 = 365;

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                8080,
      store_path:          PathBuf::from("nestmatch.db"),
      cache_ttl_secs:      5,
      query_timeout_ms:    3_000,
      invitation_ttl_days: 7,
      rate_limit_burst:    30,
      rate_limit_per_sec:  2.0,
      peer_limit_burst:    120,
      peer_limit_per_sec:  8.0,
    }
  }
}

impl ServerConfig {
  /// Reject values that would panic or misbehave once turned into engine and
  /// limiter settings.
  pub fn validate(&self) -> anyhow::Result<()> {
    ensure!(
      (1..=MAX_INVITATION_TTL_DAYS).contains(&self.invitation_ttl_days),
      "invitation_ttl_days must be between 1 and {MAX_INVITATION_TTL_DAYS}, got {}",
      self.invitation_ttl_days
    );
    ensure!(self.query_timeout_ms > 0, "query_timeout_ms must be positive");
    ensure!(self.cache_ttl_secs > 0, "cache_ttl_secs must be positive");
    for (name, burst, rate) in [
      ("rate_limit", self.rate_limit_burst, self.rate_limit_per_sec),
      ("peer_limit", self.peer_limit_burst, self.peer_limit_per_sec),
    ] {
      ensure!(burst >= 1, "{name}_burst must be at least 1");
      ensure!(
        rate.is_finite() && rate > 0.0,
        "{name}_per_sec must be a positive number, got {rate}"
      );
    }
    Ok(())
  }

  pub fn engine(&self) -> EngineConfig {
    EngineConfig {
      cache_ttl:      Duration::from_secs(self.cache_ttl_secs),
      query_timeout:  Duration::from_millis(self.query_timeout_ms),
      invitation_ttl: chrono::Duration::days(self.invitation_ttl_days),
    }
  }

  pub fn limits(&self) -> RateLimitConfig {
    RateLimitConfig {
      burst:        self.rate_limit_burst,
      per_sec:      self.rate_limit_per_sec,
      peer_burst:   self.peer_limit_burst,
      peer_per_sec: self.peer_limit_per_sec,
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_source_yields_defaults() {
    let cfg: ServerConfig = config::Config::builder()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.engine().cache_ttl, Duration::from_secs(5));
    assert_eq!(cfg.engine().query_timeout, Duration::from_secs(3));
    assert_eq!(cfg.engine().invitation_ttl, chrono::Duration::days(7));
    assert_eq!(cfg.limits().burst, 30);
  }

  #[test]
  fn toml_overrides_individual_fields() {
    let toml = r#"
      port = 9000
      query_timeout_ms = 250
      rate_limit_per_sec = 0.5
    "#;
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.engine().query_timeout, Duration::from_millis(250));
    assert_eq!(cfg.limits().per_sec, 0.5);
  }

  #[test]
  fn defaults_are_valid() {
    ServerConfig::default().validate().unwrap();
  }

  #[test]
  fn out_of_range_values_are_rejected() {
    let cases = [
      ServerConfig { invitation_ttl_days: 1_000_000_000_000_000, ..ServerConfig::default() },
      ServerConfig { invitation_ttl_days: 0, ..ServerConfig::default() },
      ServerConfig { rate_limit_per_sec: -1.0, ..ServerConfig::default() },
      ServerConfig { rate_limit_per_sec: f64::NAN, ..ServerConfig::default() },
      ServerConfig { peer_limit_per_sec: f64::INFINITY, ..ServerConfig::default() },
      ServerConfig { peer_limit_burst: 0, ..ServerConfig::default() },
      ServerConfig { query_timeout_ms: 0, ..ServerConfig::default() },
    ];
    for cfg in cases {
      assert!(cfg.validate().is_err(), "{cfg:?}");
    }
  }
}
