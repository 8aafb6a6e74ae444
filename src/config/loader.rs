//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finish(config)
}

/// Build configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default())
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `PORT`, `BACKEND_SERVERS` and `SHUTDOWN_TIMEOUT` overrides.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
        let port: u16 = port.parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            value: port.clone(),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(servers) = lookup("BACKEND_SERVERS").filter(|s| !s.is_empty()) {
        config.backends = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(raw) = lookup("SHUTDOWN_TIMEOUT").filter(|s| !s.is_empty()) {
        let grace_ms = parse_duration(&raw)
            .and_then(|grace| u64::try_from(grace.as_millis()).ok())
            .ok_or(ConfigError::Env {
                var: "SHUTDOWN_TIMEOUT",
                value: raw.clone(),
            })?;
        config.timeouts.shutdown_grace_ms = grace_ms;
    }

    Ok(())
}

/// Parse a duration such as `500ms`, `1.5s`, `1m30s` or `2h`.
///
/// Accepts the units `ns`, `us`/`µs`, `ms`, `s`, `m` and `h`, with optional
/// decimal fractions and several components in a row. A bare integer is read
/// as seconds. Returns `None` on malformed input or overflow.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if raw.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = raw;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        total = total.checked_add(component(number, unit)?)?;
        rest = tail;
    }
    Some(total)
}

fn component(number: &str, unit: &str) -> Option<Duration> {
    let unit_nanos: u128 = match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    };

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;
    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().ok()?;
        let scale = 10u128.checked_pow(u32::try_from(fraction.len()).ok()?)?;
        nanos = nanos.checked_add(digits.checked_mul(unit_nanos)? / scale)?;
    }

    let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
    Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn backend_servers_are_split_and_trimmed() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[("BACKEND_SERVERS", "http://localhost:8081, http://localhost:8082,")]),
        )
        .unwrap();
        assert_eq!(config.backends, vec!["http://localhost:8081", "http://localhost:8082"]);
    }

    #[test]
    fn port_replaces_bind_port() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("PORT", "9000")])).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");

        let err = apply_env_overrides(&mut config, env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));
    }

    #[test]
    fn shutdown_timeout_accepts_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("soon"), None);

        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("SHUTDOWN_TIMEOUT", "5s")])).unwrap();
        assert_eq!(config.timeouts.shutdown_grace_ms, 5_000);
    }

    #[test]
    fn sub_second_shutdown_timeout_is_kept() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("SHUTDOWN_TIMEOUT", "500ms")])).unwrap();
        assert_eq!(config.timeouts.shutdown_grace_ms, 500);
    }

    #[test]
    fn compound_and_fractional_durations() {
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3_600)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1_500)));
        assert_eq!(parse_duration(".5m"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2h45m"), Some(Duration::from_secs(9_900)));
        assert_eq!(parse_duration("250us"), Some(Duration::from_micros(250)));

        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("s"), None);
        assert_eq!(parse_duration("1.s5"), None);
        assert_eq!(parse_duration("10d"), None);
        assert_eq!(parse_duration("-5s"), None);
    }

    #[test]
    fn huge_durations_are_rejected_not_wrapped() {
        assert_eq!(parse_duration("18446744073709551615m"), None);
        assert_eq!(parse_duration("99999999999999999999999999999999999999h"), None);

        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("SHUTDOWN_TIMEOUT", "18446744073709551615m")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "SHUTDOWN_TIMEOUT", .. }));
    }

    #[test]
    fn load_config_validates() {
        let dir = std::env::temp_dir().join(format!("gateway-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");

        std::fs::write(&path, "backends = []\n").unwrap();
        // Environment may legitimately carry BACKEND_SERVERS; only assert when it does not.
        if std::env::var("BACKEND_SERVERS").map(|v| v.is_empty()).unwrap_or(true) {
            assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
        }

        std::fs::write(&path, "backends = [\"http://127.0.0.1:9001\"]\n[cache]\nttl_secs = 10\n").unwrap();
        if std::env::var("BACKEND_SERVERS").is_err() && std::env::var("PORT").is_err() {
            let config = load_config(&path).unwrap();
            assert_eq!(config.cache.ttl_secs, 10);
        }

        std::fs::remove_dir_all(&dir).unwrap_or_default();
    }

    #[test]
    fn example_config_parses() {
        let config: GatewayConfig = toml::from_str(include_str!("../../gateway.toml")).unwrap();
        assert_eq!(config.backends.len(), 3);
        assert_eq!(config.retries.retry_on.len(), 3);
        assert!(crate::config::validation::validate_config(&config).is_ok());
    }
}
