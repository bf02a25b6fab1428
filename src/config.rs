use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

pub static CONFIG: OnceCell<Config> = OnceCell::new();

/// Name of the optional TOML config file, looked up in the working directory.
const CONFIG_FILE: &str = "matchbook.toml";

/// Prefix for environment overrides, e.g. MATCHBOOK_SERVER__PORT=9090
/// or MATCHBOOK_SEED__AUTO_SEED=off.
const ENV_PREFIX: &str = "MATCHBOOK_";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const DEFAULT_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            level: Self::DEFAULT_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.level.clone();
        self.level = self.level.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.level.as_str()) {
            eprintln!(
                "Config error: log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::DEFAULT_LEVEL
            );
            self.level = Self::DEFAULT_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "./matchbook.db".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SeedConfig {
    /// Auto-seed toggle. The raw string is kept as-is; the bootstrap layer
    /// recognizes a small falsey vocabulary and treats everything else
    /// (including empty) as enabled.
    pub auto_seed: String,
}

impl SeedConfig {
    fn default() -> Self {
        SeedConfig {
            auto_seed: "true".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub seed: SeedConfig,
}

impl Config {
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::load)
    }

    /// Loads the configuration from `matchbook.toml` in the working directory,
    /// with `MATCHBOOK_*` environment variables taking precedence.
    /// If the file is missing or fails to parse, defaults are used.
    pub fn load() -> Self {
        let default_config = Config {
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            seed: SeedConfig::default(),
        };

        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        // Attempt to extract the configuration; on error, log a message and
        // fall back to defaults.
        let mut config: Config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                CONFIG_FILE, err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
    }
}
