use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use store::StoreConfig;

use crate::{transport::Actor, EngineError, EngineSettings};

/// Process-wide settings, read from YAML with CLI and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub store: Option<String>,
    pub data_dir: PathBuf,
    pub default_theme: String,
    pub default_mode: String,
    pub bot_id: u64,
    pub bot_name: String,
    pub narration_pause_secs: u64,
    pub leg_cadence_secs: u64,
    pub vault_interval_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            store: None,
            data_dir: PathBuf::from("data"),
            default_theme: "heist".to_string(),
            default_mode: "clash".to_string(),
            bot_id: 0,
            bot_name: "Racebot".to_string(),
            narration_pause_secs: 3,
            leg_cadence_secs: 2,
            vault_interval_secs: 120,
        }
    }
}

/// Values given on the command line; each one beats the environment and YAML.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub store: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub theme: Option<String>,
    pub mode: Option<String>,
}

impl BotConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_cli_or_env_or_yaml(
        cli: &CliOverrides,
        yaml_path: Option<&Path>,
    ) -> Result<Self, EngineError> {
        let mut config = match yaml_path {
            Some(path) => {
                log::info!("Reading configuration from {}", path.display());
                Self::from_yaml_str(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_overrides(cli, std::env::var("HEIST_DATA_DIR").ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, cli: &CliOverrides, env_data_dir: Option<String>) {
        if let Some(store) = &cli.store {
            self.store = Some(store.clone());
        }
        if let Some(dir) = cli.data_dir.clone().or(env_data_dir.map(PathBuf::from)) {
            self.data_dir = dir;
        }
        if let Some(theme) = &cli.theme {
            self.default_theme = theme.clone();
        }
        if let Some(mode) = &cli.mode {
            self.default_mode = mode.clone();
        }
    }

    /// A store given on the command line was already folded into `self.store`,
    /// so it is passed as the CLI value to keep it ahead of the environment.
    pub fn store_config(&self, cli: &CliOverrides) -> Result<StoreConfig, EngineError> {
        let yaml = if cli.store.is_some() { None } else { self.store.clone() };
        Ok(StoreConfig::from_cli_or_env_or_yaml(cli.store.clone(), yaml)?)
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            default_theme: self.default_theme.clone(),
            default_mode: self.default_mode.clone(),
            bot: Actor::new(self.bot_id, self.bot_name.clone()),
            narration_pause: Duration::from_secs(self.narration_pause_secs),
            leg_cadence: Duration::from_secs(self.leg_cadence_secs),
            vault_interval: Duration::from_secs(self.vault_interval_secs),
        }
    }
}
