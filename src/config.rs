//! Application configuration (component C8).
//!
//! Mirrors the teacher's layered `AppConfig`: each sub-config is loaded via
//! `from_env()`, falls back to a documented default, and logs a warning
//! (rather than failing) when an operator-supplied value is out of range.

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Complete application configuration, loaded from environment variables or
/// default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub solver: SolverConfig,
    pub assignment: AssignmentConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            solver: SolverConfig::from_env(),
            assignment: AssignmentConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("BINSTOW_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    host = %host_value, error = %err, default = Self::DEFAULT_HOST,
                    "could not parse BINSTOW_API_HOST, using default"
                );
                (
                    Self::DEFAULT_HOST
                        .parse::<IpAddr>()
                        .expect("default host must be valid"),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("BINSTOW_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(default = Self::DEFAULT_PORT, "BINSTOW_API_PORT must not be 0");
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(raw = %raw, error = %err, default = Self::DEFAULT_PORT, "could not parse BINSTOW_API_PORT");
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Configuration for the annealer (C5), per spec §4.7/§6.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    pub allow_rotate: bool,
    pub max_iter: u64,
    pub temperature: f64,
    pub progress_interval: u64,
}

impl SolverConfig {
    pub const DEFAULT_ALLOW_ROTATE: bool = true;
    pub const DEFAULT_MAX_ITER: u64 = 10_000;
    pub const DEFAULT_TEMPERATURE: f64 = 0.0;
    pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10;

    fn from_env() -> Self {
        let allow_rotate = env_string("BINSTOW_ALLOW_ROTATE")
            .and_then(|raw| parse_bool(&raw, "BINSTOW_ALLOW_ROTATE"))
            .unwrap_or(Self::DEFAULT_ALLOW_ROTATE);

        let max_iter = load_u64_with_warning(
            "BINSTOW_MAX_ITER",
            Self::DEFAULT_MAX_ITER,
            |value| value > 0,
            "must be greater than 0",
        );

        let temperature = load_f64_with_warning(
            "BINSTOW_TEMPERATURE",
            Self::DEFAULT_TEMPERATURE,
            |value| value >= 0.0,
            "must be non-negative",
        );

        let progress_interval = load_u64_with_warning(
            "BINSTOW_PROGRESS_INTERVAL",
            Self::DEFAULT_PROGRESS_INTERVAL,
            |value| value > 0,
            "must be greater than 0",
        );

        Self {
            allow_rotate,
            max_iter,
            temperature,
            progress_interval,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            allow_rotate: Self::DEFAULT_ALLOW_ROTATE,
            max_iter: Self::DEFAULT_MAX_ITER,
            temperature: Self::DEFAULT_TEMPERATURE,
            progress_interval: Self::DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Configuration for the initial assignment MILP (C4), per spec §4.4/§9.
#[derive(Clone, Debug)]
pub struct AssignmentConfig {
    pub volume_capacity_ratio: f64,
    pub weight_capacity_ratio: f64,
    pub area_capacity_ratio: f64,
    pub milp_timeout_secs: u64,
    pub gap_rel: f64,
}

impl AssignmentConfig {
    pub const DEFAULT_VOLUME_RATIO: f64 = 0.7;
    pub const DEFAULT_WEIGHT_RATIO: f64 = 1.0;
    pub const DEFAULT_AREA_RATIO: f64 = 1.0;
    pub const DEFAULT_MILP_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_GAP_REL: f64 = 0.01;

    fn from_env() -> Self {
        Self {
            volume_capacity_ratio: load_f64_with_warning(
                "BINSTOW_VOLUME_CAPACITY_RATIO",
                Self::DEFAULT_VOLUME_RATIO,
                |value| (0.0..=1.0).contains(&value),
                "must be between 0 and 1",
            ),
            weight_capacity_ratio: load_f64_with_warning(
                "BINSTOW_WEIGHT_CAPACITY_RATIO",
                Self::DEFAULT_WEIGHT_RATIO,
                |value| (0.0..=1.0).contains(&value),
                "must be between 0 and 1",
            ),
            area_capacity_ratio: load_f64_with_warning(
                "BINSTOW_AREA_CAPACITY_RATIO",
                Self::DEFAULT_AREA_RATIO,
                |value| (0.0..=1.0).contains(&value),
                "must be between 0 and 1",
            ),
            milp_timeout_secs: load_u64_with_warning(
                "BINSTOW_MILP_TIMEOUT_SECS",
                Self::DEFAULT_MILP_TIMEOUT_SECS,
                |value| value > 0,
                "must be greater than 0",
            ),
            gap_rel: load_f64_with_warning(
                "BINSTOW_MILP_GAP_REL",
                Self::DEFAULT_GAP_REL,
                |value| (0.0..1.0).contains(&value),
                "must be between 0 and 1",
            ),
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            volume_capacity_ratio: Self::DEFAULT_VOLUME_RATIO,
            weight_capacity_ratio: Self::DEFAULT_WEIGHT_RATIO,
            area_capacity_ratio: Self::DEFAULT_AREA_RATIO,
            milp_timeout_secs: Self::DEFAULT_MILP_TIMEOUT_SECS,
            gap_rel: Self::DEFAULT_GAP_REL,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(var = name, error = %err, "could not read environment variable, using default");
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(var = var_name, value = other, "could not interpret boolean value, using default");
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if validator(value) => value,
            Ok(value) => {
                tracing::warn!(var = var_name, value, invalid_hint, default, "out-of-range value, using default");
                default
            }
            Err(err) => {
                tracing::warn!(var = var_name, raw = %raw, error = %err, default, "could not parse as number, using default");
                default
            }
        },
        None => default,
    }
}

fn load_u64_with_warning(
    var_name: &str,
    default: u64,
    validator: impl Fn(u64) -> bool,
    invalid_hint: &str,
) -> u64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if validator(value) => value,
            Ok(value) => {
                tracing::warn!(var = var_name, value, invalid_hint, default, "out-of-range value, using default");
                default
            }
            Err(err) => {
                tracing::warn!(var = var_name, raw = %raw, error = %err, default, "could not parse as integer, using default");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("off", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn solver_config_defaults_match_spec() {
        let config = SolverConfig::default();
        assert!(config.allow_rotate);
        assert_eq!(config.max_iter, 10_000);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.progress_interval, 10);
    }

    #[test]
    fn assignment_config_defaults_match_spec() {
        let config = AssignmentConfig::default();
        assert_eq!(config.volume_capacity_ratio, 0.7);
        assert_eq!(config.weight_capacity_ratio, 1.0);
        assert_eq!(config.area_capacity_ratio, 1.0);
    }
}
