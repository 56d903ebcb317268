use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Bot-level configuration. Everything a guild admin can change lives in
/// the per-guild settings store instead, so this file stays small.
#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct Config {
    /// Where the sled database lives.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Newline-separated word list for the scramble game. A small built-in
    /// list is used when unset.
    pub word_list_path: Option<String>,
    /// The help text for the bot. `/help`
    pub help_text: Option<Arc<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            word_list_path: None,
            help_text: None,
        }
    }
}

impl Config {
    /// Fetches the config from the config file in the root directory.
    pub fn create_from_file(config_path: impl AsRef<Path>) -> Result<Config> {
        let file = std::fs::read_to_string(config_path).wrap_err("Could not read config file")?;

        toml::from_str(&file).wrap_err("Could not parse config file")
    }

    /// Reloads the config file and updates the configuration.
    pub fn reload(&mut self, config_path: impl AsRef<Path>) {
        if let Ok(config) = Config::create_from_file(config_path) {
            *self = config;
        }
    }

    pub fn save(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let toml = toml::to_string(&self).wrap_err("Could not serialize config")?;

        std::fs::write(config_path, toml).wrap_err("Could not save config")
    }
}

fn default_database_path() -> String {
    String::from("tanager.db")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_gets_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.database_path, "tanager.db");
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = Config {
            database_path: String::from("/var/lib/tanager/db"),
            word_list_path: Some(String::from("data/words.txt")),
            help_text: Some(Arc::new(String::from("Hi, I'm Tanager."))),
        };

        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed, config);
    }
}
