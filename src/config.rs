use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{GlobalSettings, MAX_FREQUENCY_SAMPLES};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "STAGE_POWER__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    /// Settings for rig files that carry none
    pub defaults: GlobalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Forces the crest sample count for every recalculation when set
    pub frequency_samples: Option<usize>,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frequency_samples: None,
            log_filter: "info,stage_power=debug".to_string(),
        }
    }
}

/// camelCase names of the `defaults` table, keyed by their lowercase form
static SETTINGS_KEYS: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    match serde_json::to_value(GlobalSettings::default()) {
        Ok(serde_json::Value::Object(fields)) => fields
            .keys()
            .map(|k| (k.to_ascii_lowercase(), k.clone()))
            .collect(),
        _ => Vec::new(),
    }
});

/// Env var names arrive in any case; engine keys are snake_case and
/// `defaults` keys camelCase.
fn env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    if let Some(field) = key.strip_prefix("defaults.") {
        let field = SETTINGS_KEYS
            .iter()
            .find(|(lower, _)| lower == field)
            .map_or(field, |(_, camel)| camel.as_str());
        return format!("defaults.{field}");
    }
    key
}

impl Config {
    /// Built-in defaults, then the TOML file (if present), then `STAGE_POWER__*` env vars
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .split("__")
                    .map(|key| env_key(key.as_str()).into())
                    .lowercase(false),
            )
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let cfg: Config = Self::figment(path).extract()?;
        cfg.defaults.validate()?;
        Ok(cfg)
    }

    /// Apply engine-level overrides to a rig's settings
    pub fn effective_settings(&self, mut settings: GlobalSettings) -> GlobalSettings {
        if let Some(samples) = self.engine.frequency_samples {
            settings.frequency_samples = samples.clamp(1, MAX_FREQUENCY_SAMPLES);
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crest::{ContentProfile, CrestAlgorithm};
    use figment::Jail;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_| {
            let cfg = Config::load_from("does/not/exist.toml").map_err(|e| e.to_string())?;
            assert_eq!(cfg.defaults, GlobalSettings::default());
            assert_eq!(cfg.engine.log_filter, "info,stage_power=debug");
            Ok(())
        });
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                r#"
                [engine]
                frequency_samples = 40

                [defaults]
                ambientTemperatureC = 45.0
                contentProfile = "edm"
                crestAlgorithm = "peak"
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(cfg.engine.frequency_samples, Some(40));
        assert_eq!(cfg.defaults.ambient_temperature_c, 45.0);
        assert_eq!(cfg.defaults.content_profile, ContentProfile::Edm);
        assert_eq!(cfg.defaults.crest_algorithm, CrestAlgorithm::Peak);
        assert_eq!(cfg.effective_settings(GlobalSettings::default()).frequency_samples, 40);
    }

    #[test]
    fn test_env_overrides_reach_camel_case_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("STAGE_POWER__DEFAULTS__AMBIENTTEMPERATUREC", 50);
            jail.set_env("STAGE_POWER__DEFAULTS__CRESTALGORITHM", "peak");
            jail.set_env("STAGE_POWER__ENGINE__LOG_FILTER", "warn");

            let cfg = Config::load_from("missing.toml").map_err(|e| e.to_string())?;
            assert_eq!(cfg.engine.log_filter, "warn");
            assert_eq!(cfg.defaults.ambient_temperature_c, 50.0);
            assert_eq!(cfg.defaults.crest_algorithm, CrestAlgorithm::Peak);
            Ok(())
        });
    }

    #[test]
    fn test_env_rejects_invalid_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("STAGE_POWER__DEFAULTS__FREQUENCYSAMPLES", 0);
            assert!(Config::load_from("missing.toml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_env_key_mapping() {
        assert_eq!(env_key("DEFAULTS.SPLREFERENCEDISTANCEM"), "defaults.splReferenceDistanceM");
        assert_eq!(env_key("engine.FREQUENCY_SAMPLES"), "engine.frequency_samples");
        assert_eq!(env_key("defaults.unknownkey"), "defaults.unknownkey");
    }
}
