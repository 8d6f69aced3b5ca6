use std::error::Error;
use std::path::Path;
use std::{env, fs};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    pub owner_name: String,
    #[serde(default = "Presence::default_detection_interval_secs")]
    pub detection_interval_secs: u64,
    #[serde(default = "Presence::default_stability_count")]
    pub stability_count: u32,
    #[serde(default = "Presence::default_greeting_cooldown_secs")]
    pub greeting_cooldown_secs: u64,
    #[serde(default = "Presence::default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
    #[serde(default = "Presence::default_intruder_dir")]
    pub intruder_dir: String,
}

impl Presence {
    fn default_detection_interval_secs() -> u64 {
        1
    }

    fn default_stability_count() -> u32 {
        3
    }

    fn default_greeting_cooldown_secs() -> u64 {
        1800
    }

    fn default_collaborator_timeout_secs() -> u64 {
        5
    }

    fn default_intruder_dir() -> String {
        String::from("recordings/intruders")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub broker: Broker,
    pub presence: Presence,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let path = env::var("VIGIL_CONFIG").unwrap_or_else(|_| "configs/default.toml".into());
        let settings: Settings = toml::from_str(&fs::read_to_string(&path)?)?;

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let override_path = format!("configs/{run_mode}.toml");
        if Path::new(&override_path).is_file() {
            let overrides: toml::Value = toml::from_str(&fs::read_to_string(&override_path)?)?;
            return Self::merge(settings, overrides);
        }

        Ok(settings)
    }

    /// Shallow-merge two serializable maps, non-null keys on the right win.
    pub fn merge<L, R, T>(left: L, right: R) -> Result<T, Box<dyn Error>>
    where
        L: Serialize,
        R: Serialize,
        T: Serialize + DeserializeOwned,
    {
        let mut left_map = serde_json::to_value(&left)?
            .as_object()
            .map(|map| map.to_owned())
            .ok_or("Failed to serialize left value which is not an object")?;

        let mut right_map = serde_json::to_value(&right)?
            .as_object()
            .map(|map| map.to_owned())
            .ok_or("Failed to serialize right value which is not an object")?;

        right_map.retain(|_, v| !v.is_null());
        left_map.extend(right_map);

        let value = serde_json::to_value(&left_map)?;

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: &str = r#"
        [logger]
        level = "debug"

        [broker]
        host = "127.0.0.1"
        port = 1883
        client_id = "vigil-bridge"

        [presence]
        owner_name = "Owner"
    "#;

    #[test]
    fn test_parse_with_presence_defaults() {
        let settings: Settings = toml::from_str(DEFAULT).unwrap();

        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.broker.username, None);
        assert_eq!(settings.presence.stability_count, 3);
        assert_eq!(settings.presence.greeting_cooldown_secs, 1800);
        assert_eq!(settings.presence.intruder_dir, "recordings/intruders");
    }

    #[test]
    fn test_merge_overrides_section() {
        let settings: Settings = toml::from_str(DEFAULT).unwrap();
        let overrides: toml::Value = toml::from_str(
            r#"
            [logger]
            level = "warn"
        "#,
        )
        .unwrap();

        let merged: Settings = Settings::merge(settings, overrides).unwrap();

        assert_eq!(merged.logger.level, "warn");
        assert_eq!(merged.broker.client_id, "vigil-bridge");
    }
}
