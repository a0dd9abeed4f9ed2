//! Configuration management for Time Browser.
//!
//! Settings come from environment variables; `main` loads a `.env` file with
//! dotenvy first, so either works.

use std::path::PathBuf;

use thiserror::Error;

use crate::repository::util::{is_postgres_url, redact_url_password};
use crate::services::RasterFormat;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./data";
/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "timebrowser.db";
/// Subdirectory of the data directory holding page images.
pub const PAGES_SUBDIR: &str = "pages";
/// Allowed origin when CORS_ORIGINS is unset.
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{0} must be set when APP_ENV is not 'dev'")]
    Missing(&'static str),

    #[error("DATABASE_URL is a PostgreSQL URL but this build lacks the 'postgres' feature")]
    PostgresUnsupported,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Self::Dev),
            "staging" => Some(Self::Staging),
            "prod" | "production" => Some(Self::Prod),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Explicit database URL. Defaults to a SQLite file in `data_dir`.
    pub database_url: Option<String>,
    /// OCR endpoint. Empty means no remote OCR.
    pub ocr_api_url: String,
    pub ocr_api_token: Option<String>,
    /// Key required by admin endpoints.
    pub admin_api_key: Option<String>,
    pub env: AppEnv,
    /// Comma-separated allowed origins.
    pub cors_origins: String,
    pub pdf_dpi: u32,
    pub page_image_format: RasterFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_url: None,
            ocr_api_url: String::new(),
            ocr_api_token: None,
            admin_api_key: None,
            env: AppEnv::Dev,
            cors_origins: DEFAULT_CORS_ORIGINS.to_string(),
            pdf_dpi: crate::services::document::DEFAULT_DPI,
            page_image_format: RasterFormat::Png,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(dir) = get("TIMEBROWSER_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }

        if let Some(url) = get("DATABASE_URL") {
            if is_postgres_url(&url) && !cfg!(feature = "postgres") {
                return Err(ConfigError::PostgresUnsupported);
            }
            tracing::debug!(
                "Using DATABASE_URL from environment: {}",
                redact_url_password(&url)
            );
            settings.database_url = Some(url);
        }

        if let Some(env) = get("APP_ENV") {
            settings.env = AppEnv::from_str(&env).ok_or(ConfigError::Invalid {
                key: "APP_ENV",
                value: env.clone(),
                reason: "expected dev, staging or prod",
            })?;
        }

        settings.ocr_api_url = get("OCR_API_URL").unwrap_or_default();
        settings.ocr_api_token = get("OCR_API_TOKEN");
        settings.admin_api_key = get("ADMIN_API_KEY");

        if let Some(origins) = get("CORS_ORIGINS") {
            settings.cors_origins = origins;
        }

        if let Some(dpi) = get("PDF_DPI") {
            settings.pdf_dpi = match dpi.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "PDF_DPI",
                        value: dpi,
                        reason: "expected a positive integer",
                    })
                }
            };
        }

        if let Some(format) = get("PAGE_IMAGE_FORMAT") {
            settings.page_image_format =
                RasterFormat::from_str(&format).ok_or(ConfigError::Invalid {
                    key: "PAGE_IMAGE_FORMAT",
                    value: format.clone(),
                    reason: "expected png, jpeg or tiff",
                })?;
        }

        if !settings.is_dev() && settings.admin_api_key.is_none() {
            return Err(ConfigError::Missing("ADMIN_API_KEY"));
        }

        Ok(settings)
    }

    /// Get the database URL, constructing from the data directory if not set.
    pub fn database_url(&self) -> String {
        match self.database_url {
            Some(ref url) => url.clone(),
            None => format!("sqlite:{}", self.database_path().display()),
        }
    }

    /// Database URL safe to print.
    pub fn display_database_url(&self) -> String {
        redact_url_password(&self.database_url())
    }

    /// Path of the default SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_DATABASE_FILENAME)
    }

    /// Directory holding page images.
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(PAGES_SUBDIR)
    }

    /// Parse comma-separated CORS origins.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    pub fn is_dev(&self) -> bool {
        self.env == AppEnv::Dev
    }

    /// Use the stub OCR backend in development when no endpoint is set.
    pub fn use_stub_ocr(&self) -> bool {
        self.is_dev() && self.ocr_api_url.is_empty()
    }

    /// Ensure the data and image directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.images_dir())?;
        Ok(())
    }

    /// Check whether the default SQLite database file exists.
    pub fn database_exists(&self) -> bool {
        self.database_url.is_some() || self.database_path().exists()
    }
}
