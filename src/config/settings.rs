use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_DATA_DIR: &str = "./data";
static DEFAULT_WALLET_FILE: &str = "./wallet.dat";

const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";
const WALLET_FILE_KEY: &str = "LEDGER_WALLET_FILE";

/// Process settings, read once from the environment.
pub struct Config {
    inner: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut map = HashMap::new();
        for (key, default) in [
            (DATA_DIR_KEY, DEFAULT_DATA_DIR),
            (WALLET_FILE_KEY, DEFAULT_WALLET_FILE),
        ] {
            let value = lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| String::from(default));
            map.insert(String::from(key), value);
        }

        Config { inner: map }
    }

    fn get_path(&self, key: &str, default: &str) -> PathBuf {
        PathBuf::from(self.inner.get(key).map(String::as_str).unwrap_or(default))
    }

    /// Directory of the sled database holding the ledger.
    pub fn get_data_dir(&self) -> PathBuf {
        self.get_path(DATA_DIR_KEY, DEFAULT_DATA_DIR)
    }

    pub fn get_wallet_file(&self) -> PathBuf {
        self.get_path(WALLET_FILE_KEY, DEFAULT_WALLET_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.get_data_dir(), PathBuf::from("./data"));
        assert_eq!(config.get_wallet_file(), PathBuf::from("./wallet.dat"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(|key| match key {
            "LEDGER_DATA_DIR" => Some("/tmp/ledger".to_string()),
            "LEDGER_WALLET_FILE" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.get_data_dir(), PathBuf::from("/tmp/ledger"));
        // empty values fall back to the default
        assert_eq!(config.get_wallet_file(), PathBuf::from("./wallet.dat"));
    }
}
