// Configuration module entry point
// Loads service configuration from an optional file and the environment

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{Config, RoutesConfig};

/// Default config file, resolved as `config.toml` by the `config` crate
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Prefix for environment overrides, e.g. `TIMESVC_SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "TIMESVC";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// and `TIMESVC_*` environment variables
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::load_with_env(config_path, default_environment())
    }

    /// Load configuration with an explicit environment source
    pub fn load_with_env(
        config_path: &str,
        env: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(env)
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("routes.health.enabled", true)?
            .set_default("routes.health.liveness_path", "/health")?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate().map_err(config::ConfigError::Message)?;
        Ok(cfg)
    }

    /// Reject values that deserialize but cannot be used to start the server
    fn validate(&self) -> Result<(), String> {
        if self.server.workers == Some(0) {
            return Err("server.workers must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// Default configuration, unaffected by files or the process environment
#[cfg(test)]
pub fn test_config() -> Config {
    let env = default_environment().source(Some(std::collections::HashMap::new()));
    Config::load_with_env("simple_time_service_test_no_such_config", env)
        .expect("defaults deserialize")
}

fn default_environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        default_environment().source(Some(source))
    }

    fn missing_file() -> String {
        std::env::temp_dir()
            .join("simple_time_service_no_such_config")
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_defaults_bind_all_interfaces_on_5000() {
        let cfg = Config::load_with_env(&missing_file(), env_from(&[])).unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "0.0.0.0:5000");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert!(cfg.logging.access_log_file.is_none());
        assert_eq!(cfg.performance.keep_alive_timeout, 75);
        assert_eq!(cfg.performance.max_connections, None);
        assert!(cfg.server.workers.is_none());
        assert!(cfg.routes.health.enabled);
        assert_eq!(cfg.routes.health.liveness_path, "/health");
    }

    #[test]
    fn test_environment_overrides() {
        let env = env_from(&[
            ("TIMESVC_SERVER__PORT", "8080"),
            ("TIMESVC_SERVER__HOST", "127.0.0.1"),
            ("TIMESVC_LOGGING__ACCESS_LOG", "false"),
            ("TIMESVC_PERFORMANCE__MAX_CONNECTIONS", "16"),
        ]);
        let cfg = Config::load_with_env(&missing_file(), env).unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert!(!cfg.logging.access_log);
        assert_eq!(cfg.performance.max_connections, Some(16));
    }

    #[test]
    fn test_file_then_environment_precedence() {
        let path = std::env::temp_dir().join(format!(
            "simple_time_service_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[server]\nport = 6000\nworkers = 2\n\n[routes.health]\nliveness_path = \"/livez\"\n",
        )
        .unwrap();

        let path_str = path.to_string_lossy().into_owned();
        let cfg = Config::load_with_env(&path_str, env_from(&[])).unwrap();
        assert_eq!(cfg.server.port, 6000);
        assert_eq!(cfg.server.workers, Some(2));
        assert_eq!(cfg.routes.health.liveness_path, "/livez");

        let env = env_from(&[("TIMESVC_SERVER__PORT", "7000")]);
        let cfg = Config::load_with_env(&path_str, env).unwrap();
        assert_eq!(cfg.server.port, 7000);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let env = env_from(&[("TIMESVC_SERVER__WORKERS", "0")]);
        let err = Config::load_with_env(&missing_file(), env).unwrap_err();
        assert!(err.to_string().contains("server.workers"), "got: {err}");

        let env = env_from(&[("TIMESVC_SERVER__WORKERS", "1")]);
        let cfg = Config::load_with_env(&missing_file(), env).unwrap();
        assert_eq!(cfg.server.workers, Some(1));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let env = env_from(&[("TIMESVC_SERVER__HOST", "not an ip")]);
        let cfg = Config::load_with_env(&missing_file(), env).unwrap();
        assert!(cfg.get_socket_addr().is_err());
    }
}
