//! Worker configuration loading from environment variables.
//!
//! All values come from `GENRELAY_*` environment variables with sensible
//! defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GENRELAY_BIND` | 127.0.0.1:50051 | Listen address |
//! | `GENRELAY_MODEL` | stub | Model identifier (opaque to the core) |
//! | `GENRELAY_CHANNEL_CAPACITY` | 128 | In-flight chunks before backpressure |
//! | `GENRELAY_MAX_FRAME_SIZE` | 134217728 | Max wire frame size (bytes) |
//! | `GENRELAY_MAX_CONNECTIONS` | 64 | Max concurrent connections |
//! | `GENRELAY_SHUTDOWN_TIMEOUT` | 30 | Graceful drain timeout (secs) |
//! | `GENRELAY_LOG_FORMAT` | json | `json` or `pretty` |

use std::net::SocketAddr;
use std::time::Duration;

use crate::server::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::telemetry::LogFormat;

const DEFAULT_BIND: &str = "127.0.0.1:50051";

/// All worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub bind: SocketAddr,
    pub model: String,
    pub channel_capacity: usize,
    pub max_frame_size: usize,
    pub max_connections: usize,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.parse().expect("default bind address is valid"),
            model: "stub".to_string(),
            channel_capacity: 128,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_connections: 64,
            shutdown_timeout: Duration::from_secs(30),
            log_format: LogFormat::Json,
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let defaults = EnvConfig::default();

    let bind = std::env::var("GENRELAY_BIND")
        .ok()
        .and_then(|v| v.parse::<SocketAddr>().ok())
        .unwrap_or(defaults.bind);
    let model = std::env::var("GENRELAY_MODEL").unwrap_or(defaults.model);

    let channel_capacity = parse_usize("GENRELAY_CHANNEL_CAPACITY", 128).max(1);
    let max_frame_size = parse_usize("GENRELAY_MAX_FRAME_SIZE", DEFAULT_MAX_FRAME_SIZE)
        .max(4096); // floor: 4 KiB
    let max_connections = parse_usize("GENRELAY_MAX_CONNECTIONS", 64).max(1);
    let shutdown_secs = parse_u64("GENRELAY_SHUTDOWN_TIMEOUT", 30).max(1);

    let log_format = match std::env::var("GENRELAY_LOG_FORMAT").as_deref() {
        Ok("pretty") => LogFormat::Pretty,
        _ => LogFormat::Json,
    };

    EnvConfig {
        bind,
        model,
        channel_capacity,
        max_frame_size,
        max_connections,
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        log_format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "GENRELAY_BIND",
        "GENRELAY_MODEL",
        "GENRELAY_CHANNEL_CAPACITY",
        "GENRELAY_MAX_FRAME_SIZE",
        "GENRELAY_MAX_CONNECTIONS",
        "GENRELAY_SHUTDOWN_TIMEOUT",
        "GENRELAY_LOG_FORMAT",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.bind.to_string(), "127.0.0.1:50051");
        assert_eq!(cfg.model, "stub");
        assert_eq!(cfg.channel_capacity, 128);
        assert_eq!(cfg.max_frame_size, 128 * 1024 * 1024);
        assert_eq!(cfg.max_connections, 64);
        assert_eq!(cfg.shutdown_timeout.as_secs(), 30);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GENRELAY_BIND", "0.0.0.0:9000");
        std::env::set_var("GENRELAY_MODEL", "llama-3-8b");
        std::env::set_var("GENRELAY_CHANNEL_CAPACITY", "16");
        std::env::set_var("GENRELAY_LOG_FORMAT", "pretty");
        let cfg = load();
        assert_eq!(cfg.bind.to_string(), "0.0.0.0:9000");
        assert_eq!(cfg.model, "llama-3-8b");
        assert_eq!(cfg.channel_capacity, 16);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GENRELAY_BIND", "not-an-address");
        std::env::set_var("GENRELAY_CHANNEL_CAPACITY", "abc");
        let cfg = load();
        assert_eq!(cfg.bind.to_string(), "127.0.0.1:50051");
        assert_eq!(cfg.channel_capacity, 128);
        clear_env_vars();
    }

    #[test]
    fn floors_are_enforced() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GENRELAY_CHANNEL_CAPACITY", "0");
        std::env::set_var("GENRELAY_MAX_FRAME_SIZE", "1");
        std::env::set_var("GENRELAY_MAX_CONNECTIONS", "0");
        std::env::set_var("GENRELAY_SHUTDOWN_TIMEOUT", "0");
        let cfg = load();
        assert!(cfg.channel_capacity >= 1);
        assert!(cfg.max_frame_size >= 4096);
        assert!(cfg.max_connections >= 1);
        assert!(cfg.shutdown_timeout.as_secs() >= 1);
        clear_env_vars();
    }
}
