// ⚙️ Configuration - defaults → optional TOML file → environment
use crate::analysis::Thresholds;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name used under the platform config dir for the desktop client
pub const CLIENT_DATA_DIR: &str = "dish-accounting-system";
pub const DATABASE_FILE: &str = "accounting.db";
/// Session lifetimes beyond a century are rejected
pub const MAX_TOKEN_TTL_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub analysis: Thresholds,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 5001,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Explicit database file; wins over every other source
    pub path: Option<PathBuf>,
    /// Desktop shell data directory (`ELECTRON_USER_DATA`)
    pub user_data_dir: Option<PathBuf>,
    /// Share the desktop client's database location in development
    pub use_client_db: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub password: String,
    pub token_ttl_days: i64,
    pub require_token: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            password: "666888".to_string(),
            token_ttl_days: 7,
            require_token: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (if given), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides through `lookup`, so tests never touch
    /// the real process environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(password) = lookup("APP_PASSWORD") {
            self.auth.password = password;
        }
        if let Some(path) = lookup("LEDGER_DB_PATH").filter(|v| !v.trim().is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("ELECTRON_USER_DATA").filter(|v| !v.trim().is_empty()) {
            self.database.user_data_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup("USE_CLIENT_DB") {
            self.database.use_client_db = flag == "true";
        }
        if let Some(flag) = lookup("LEDGER_REQUIRE_TOKEN") {
            self.auth.require_token = flag == "true";
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be between 1 and 65535");
        }
        if self.auth.password.trim().is_empty() {
            bail!("auth.password must not be empty");
        }
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.auth.token_ttl_days) {
            bail!(
                "auth.token_ttl_days must be between 1 and {}",
                MAX_TOKEN_TTL_DAYS
            );
        }

        let t = &self.analysis;
        for (name, value) in [
            ("expense_threshold", t.expense_threshold),
            ("balance_threshold", t.balance_threshold),
            ("year_balance_threshold", t.year_balance_threshold),
        ] {
            if !value.is_finite() {
                bail!("analysis.{} must be a finite number", name);
            }
        }
        if t.expense_threshold < 0.0 {
            bail!("analysis.expense_threshold must not be negative");
        }

        Ok(())
    }

    /// Where the database lives. First match wins:
    /// explicit path, desktop data dir, client data dir, `./data`.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        if let Some(dir) = &self.database.user_data_dir {
            return dir.join(DATABASE_FILE);
        }
        if self.database.use_client_db {
            if let Some(config_dir) = dirs::config_dir() {
                return config_dir.join(CLIENT_DATA_DIR).join(DATABASE_FILE);
            }
        }
        PathBuf::from("data").join(DATABASE_FILE)
    }

    /// `database_path`, with its parent directory created
    pub fn prepare_database_path(&self) -> Result<PathBuf> {
        let path = self.database_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(path)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
