//! Environment-driven configuration, read the same way
//! `bpmn-lite-server::main::parse_database_url` reads its CLI flag/env pair:
//! an explicit override takes precedence, then an env var, then a default.

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub simulation_broker_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub max_simulation_seconds: u64,
    pub default_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            simulation_broker_url: None,
            cors_origins: Vec::new(),
            max_simulation_seconds: 300,
            default_seed: 42,
        }
    }
}

impl Config {
    /// Load from the process environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            simulation_broker_url: std::env::var("SIMULATION_BROKER_URL").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            max_simulation_seconds: std::env::var("MAX_SIMULATION_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_simulation_seconds),
            default_seed: std::env::var("DEFAULT_SEED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.max_simulation_seconds, 300);
        assert_eq!(c.default_seed, 42);
        assert!(c.database_url.is_none());
    }
}
