use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::shopping_list::ShoppingListFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub recipes: RecipesConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Uploaded recipe images and avatars are stored below this directory.
    pub media_path: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/foodgram.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            media_path: "media".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Base used for absolute URLs (short links, image URLs).
    /// When empty the request's Host header is used instead.
    pub public_url: String,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    pub page_size: u64,

    pub max_page_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: String::new(),
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            secure_cookies: true,
            page_size: 6,
            max_page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipesConfig {
    /// Cooking time bounds in minutes.
    pub min_cooking_time: i32,

    pub max_cooking_time: i32,

    pub min_ingredient_amount: i32,

    pub max_ingredient_amount: i32,

    pub short_link_length: usize,

    /// Upper bound on candidates drawn per short link before giving up.
    pub short_link_max_attempts: u32,

    pub shopping_list_format: ShoppingListFormat,

    /// Maximum decoded size of an uploaded image.
    pub max_image_bytes: usize,
}

impl Default for RecipesConfig {
    fn default() -> Self {
        Self {
            min_cooking_time: 1,
            max_cooking_time: 32_000,
            min_ingredient_amount: 1,
            max_ingredient_amount: 32_000,
            short_link_length: crate::domain::short_link::DEFAULT_LENGTH,
            short_link_max_attempts: crate::domain::short_link::DEFAULT_MAX_ATTEMPTS,
            shopping_list_format: ShoppingListFormat::Csv,
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    pub min_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// `FOODGRAM_DATABASE_URL` and `FOODGRAM_PORT` win over the file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("FOODGRAM_DATABASE_URL")
            && !url.trim().is_empty()
        {
            self.general.database_path = url;
        }

        if let Ok(port) = std::env::var("FOODGRAM_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid FOODGRAM_PORT: {port}"))?;
        }

        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("foodgram").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".foodgram").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        if self.server.page_size == 0 || self.server.page_size > self.server.max_page_size {
            anyhow::bail!("Page size must be between 1 and max_page_size");
        }

        let recipes = &self.recipes;
        if recipes.min_cooking_time < 1 || recipes.min_cooking_time > recipes.max_cooking_time {
            anyhow::bail!(
                "Invalid cooking time bounds: {}..{}",
                recipes.min_cooking_time,
                recipes.max_cooking_time
            );
        }

        if recipes.min_ingredient_amount < 1
            || recipes.min_ingredient_amount > recipes.max_ingredient_amount
        {
            anyhow::bail!(
                "Invalid ingredient amount bounds: {}..{}",
                recipes.min_ingredient_amount,
                recipes.max_ingredient_amount
            );
        }

        if recipes.short_link_length == 0 || recipes.short_link_max_attempts == 0 {
            anyhow::bail!("Short link length and max attempts must be > 0");
        }

        if recipes.short_link_length > crate::domain::short_link::MAX_LENGTH {
            anyhow::bail!(
                "Short link length {} exceeds the maximum of {}",
                recipes.short_link_length,
                crate::domain::short_link::MAX_LENGTH
            );
        }

        if !matches!(self.general.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "Unknown log format '{}', expected 'pretty' or 'json'",
                self.general.log_format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.recipes.short_link_length, 6);
        assert_eq!(config.recipes.short_link_max_attempts, 16);
        assert_eq!(config.recipes.shopping_list_format, ShoppingListFormat::Csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[recipes]"));
        assert!(toml_str.contains("shopping_list_format = \"csv\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [recipes]
            max_cooking_time = 600
            shopping_list_format = "txt"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.recipes.max_cooking_time, 600);
        assert_eq!(config.recipes.shopping_list_format, ShoppingListFormat::Txt);

        assert_eq!(config.recipes.min_cooking_time, 1);
        assert_eq!(config.server.page_size, 6);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = Config::default();
        config.recipes.min_ingredient_amount = 10;
        config.recipes.max_ingredient_amount = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.recipes.short_link_length = 33;
        assert!(config.validate().is_err());
    }
}
