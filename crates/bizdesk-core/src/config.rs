//! Configuration module
//!
//! Runtime configuration is read from the environment (a `.env` file is
//! loaded first when present) and validated once at startup.

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;
const MAX_FILE_SIZE_MB: usize = 25;
const THUMBNAIL_SIZE: u32 = 256;
const MIN_THUMBNAIL_SIZE: u32 = 32;
const MAX_THUMBNAIL_SIZE: u32 = 2048;
const CONVERTER_TIMEOUT_SECS: u64 = 60;
const ORPHAN_FILE_GRACE_HOURS: i64 = 24;
const CLEANUP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_STATISTICS_TABLES: &str = "invoices:total,quotes:total,contacts";

/// Settings shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub environment: String,
}

/// One `(table, field)` pair tracked by the statistics trigger.
///
/// A target without a field only counts documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatisticTarget {
    pub table: String,
    pub field: Option<String>,
}

impl FromStr for StatisticTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (table, field) = match s.split_once(':') {
            Some((table, field)) => (table.trim(), Some(field.trim())),
            None => (s, None),
        };

        if table.is_empty() {
            return Err(anyhow::anyhow!("Invalid statistics target: '{}'", s));
        }
        if let Some(field) = field {
            if field.is_empty() {
                return Err(anyhow::anyhow!("Invalid statistics target: '{}'", s));
            }
        }

        Ok(StatisticTarget {
            table: table.to_lowercase(),
            field: field.map(String::from),
        })
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub master_api_key: Option<String>,
    // Storage
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Uploads
    pub max_file_size_bytes: usize,
    pub allowed_mime_types: Vec<String>,
    pub thumbnails_enabled: bool,
    pub thumbnail_size: u32,
    // External converters
    pub pdftoppm_path: String,
    pub soffice_path: String,
    pub ffmpeg_path: String,
    pub converter_timeout_secs: u64,
    // File lifecycle
    pub orphan_file_grace_hours: i64,
    /// 0 disables the periodic cleanup task.
    pub cleanup_interval_secs: u64,
    pub statistics_targets: Vec<StatisticTarget>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `STATISTICS_TABLES`-style lists (`invoices:total,contacts`).
pub fn parse_statistic_targets(raw: &str) -> Result<Vec<StatisticTarget>, anyhow::Error> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(StatisticTarget::from_str)
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_hours: env_or("JWT_EXPIRY_HOURS", JWT_EXPIRY_HOURS),
            environment,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => Some(s.parse::<StorageBackend>()?),
            Err(_) => None,
        };

        let statistics_targets = parse_statistic_targets(
            &env::var("STATISTICS_TABLES").unwrap_or_else(|_| DEFAULT_STATISTICS_TABLES.to_string()),
        )?;

        Ok(AppConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            master_api_key: env::var("MASTER_API_KEY").ok().filter(|k| !k.is_empty()),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_file_size_bytes: env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB) * 1024 * 1024,
            allowed_mime_types: env_list("ALLOWED_MIME_TYPES", ""),
            thumbnails_enabled: env_or("THUMBNAILS_ENABLED", true),
            thumbnail_size: env_or("THUMBNAIL_SIZE", THUMBNAIL_SIZE),
            pdftoppm_path: env::var("PDFTOPPM_PATH").unwrap_or_else(|_| "pdftoppm".to_string()),
            soffice_path: env::var("SOFFICE_PATH").unwrap_or_else(|_| "soffice".to_string()),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            converter_timeout_secs: env_or("CONVERTER_TIMEOUT_SECS", CONVERTER_TIMEOUT_SECS),
            orphan_file_grace_hours: env_or("ORPHAN_FILE_GRACE_HOURS", ORPHAN_FILE_GRACE_HOURS),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", CLEANUP_INTERVAL_SECS),
            statistics_targets,
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if let Some(ref key) = self.master_api_key {
            if key.len() < 32 {
                return Err(anyhow::anyhow!(
                    "MASTER_API_KEY must be at least 32 characters long"
                ));
            }
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if !(MIN_THUMBNAIL_SIZE..=MAX_THUMBNAIL_SIZE).contains(&self.thumbnail_size) {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_SIZE must be between {} and {}",
                MIN_THUMBNAIL_SIZE,
                MAX_THUMBNAIL_SIZE
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.converter_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "CONVERTER_TIMEOUT_SECS must be greater than 0"
            ));
        }

        if self.orphan_file_grace_hours < 0 {
            return Err(anyhow::anyhow!(
                "ORPHAN_FILE_GRACE_HOURS cannot be negative"
            ));
        }

        match self.storage_backend.unwrap_or(StorageBackend::Local) {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AppConfig>);

impl Config {
    fn inner(&self) -> &AppConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = AppConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        self.inner().is_production()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.inner().base.jwt_expiry_hours
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn master_api_key(&self) -> Option<&str> {
        self.inner().master_api_key.as_deref()
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        &self.inner().allowed_mime_types
    }

    pub fn thumbnails_enabled(&self) -> bool {
        self.inner().thumbnails_enabled
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.inner().thumbnail_size
    }

    pub fn pdftoppm_path(&self) -> &str {
        &self.inner().pdftoppm_path
    }

    pub fn soffice_path(&self) -> &str {
        &self.inner().soffice_path
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn converter_timeout_secs(&self) -> u64 {
        self.inner().converter_timeout_secs
    }

    pub fn orphan_file_grace_hours(&self) -> i64 {
        self.inner().orphan_file_grace_hours
    }

    pub fn cleanup_interval_secs(&self) -> u64 {
        self.inner().cleanup_interval_secs
    }

    pub fn statistics_targets(&self) -> &[StatisticTarget] {
        &self.inner().statistics_targets
    }
}
