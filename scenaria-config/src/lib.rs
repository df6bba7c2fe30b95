//! # Scenaria Configuration System
//!
//! Hierarchical configuration for the scenaria engine and command line tool.
//!
//! ## Features
//! - **Layering**: defaults, base file, environment file, environment variables
//! - **Validation**: every loaded configuration is validated before use

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod engine;
mod error;
mod telemetry;
mod validation;

pub use engine::{EngineConfig, MixedNodePolicy};
pub use error::ConfigError;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/scenaria.yaml";
const ENV_PREFIX: &str = "SCENARIA_";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct ScenariaConfig {
    /// Scenario interpretation and run limits.
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,

    /// Logging and metrics.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl ScenariaConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/scenaria.yaml` - Base settings. If missing, defaults are used.
    /// 3. `config/<SCENARIA_ENV>.yaml` - Environment‑specific overrides.
    /// 4. `SCENARIA_*` environment variables, `__` separating sections.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(ScenariaConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("SCENARIA_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, still honouring environment
    /// variable overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment = Figment::from(Serialized::defaults(ScenariaConfig::default()))
            .merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = ScenariaConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.engine.max_steps, 1000);
        assert_eq!(config.engine.mixed_nodes, MixedNodePolicy::Reject);
    }

    #[test]
    fn layered_files() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all("config").map_err(|e| e.to_string())?;
            jail.create_file(
                "config/scenaria.yaml",
                "engine:\n  seed: 7\n  max_steps: 50\ntelemetry:\n  log_level: debug\n",
            )?;
            jail.create_file("config/staging.yaml", "engine:\n  max_steps: 20\n")?;
            jail.set_env("SCENARIA_ENV", "staging");

            let config = ScenariaConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.engine.seed, Some(7));
            assert_eq!(config.engine.max_steps, 20);
            assert_eq!(config.telemetry.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("SCENARIA_ENGINE__MAX_STEPS", "8192");
            jail.set_env("SCENARIA_ENGINE__MIXED_NODES", "conditioned_first");
            let config = ScenariaConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.engine.max_steps, 8192);
            assert_eq!(config.engine.mixed_nodes, MixedNodePolicy::ConditionedFirst);
            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.yaml",
                "engine:\n  max_steps: 0\ntelemetry:\n  log_level: loud\n",
            )?;
            let err = ScenariaConfig::load_from_path("custom.yaml").unwrap_err();
            let message = err.to_string();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(message.contains("engine.max_steps"), "{message}");
            assert!(message.contains("telemetry.log_level"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ScenariaConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
