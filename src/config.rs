use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Longest validity AWS SigV4 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Memory,
}

impl FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageProvider::S3),
            "memory" => Ok(StorageProvider::Memory),
            other => bail!("Unknown STORAGE_PROVIDER: {}", other),
        }
    }
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageProvider::S3 => write!(f, "s3"),
            StorageProvider::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_path_style: bool,
    pub presign_expiry_secs: u64,
}

impl StorageConfig {
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

// Keeps the secret key out of startup logs.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("provider", &self.provider)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field(
                "s3_secret_access_key",
                &self.s3_secret_access_key.as_ref().map(|_| "********"),
            )
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_path_style", &self.s3_path_style)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider: StorageProvider = var("STORAGE_PROVIDER")
            .unwrap_or_else(|| "s3".to_string())
            .parse()?;

        let s3_bucket = match (var("S3_BUCKET"), provider) {
            (Some(bucket), _) => bucket,
            (None, StorageProvider::Memory) => "files".to_string(),
            (None, StorageProvider::S3) => bail!("S3_BUCKET must be set"),
        };

        let presign_expiry_secs: u64 = var("PRESIGN_EXPIRY_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .context("PRESIGN_EXPIRY_SECS must be a number of seconds")?;
        if presign_expiry_secs == 0 || presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS {
            bail!(
                "PRESIGN_EXPIRY_SECS must be between 1 and {}, got {}",
                MAX_PRESIGN_EXPIRY_SECS,
                presign_expiry_secs
            );
        }

        Ok(Self {
            server: ServerConfig {
                port: var("PORT")
                    .unwrap_or_else(|| "8080".to_string())
                    .parse()
                    .context("PORT must be a valid port number")?,
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                cors_allowed_origins: var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|| (50 * 1024 * 1024).to_string())
                    .parse()
                    .context("MAX_UPLOAD_BYTES must be a number of bytes")?,
            },
            storage: StorageConfig {
                provider,
                s3_bucket,
                s3_region: var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                s3_access_key_id: var("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: var("S3_ENDPOINT"),
                s3_path_style: var("S3_PATH_STYLE")
                    .unwrap_or_else(|| "true".to_string())
                    .parse()
                    .context("S3_PATH_STYLE must be true or false")?,
                presign_expiry_secs,
            },
            logging: LoggingConfig {
                directory: var("LOG_DIR"),
            },
        })
    }
}
