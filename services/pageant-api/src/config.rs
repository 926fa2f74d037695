//! Service configuration, read once at startup.

use pageant_core::logging::LogFormat;
use std::env;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} requires {1} to be set")]
    Incomplete(&'static str, &'static str),
}

/// Outbound mail relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub relay_url: String,
    pub from: String,
}

/// S3 bucket backing photo uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoConfig {
    pub bucket: String,
    /// Base URL the bucket's objects are served from
    pub public_url: String,
}

/// First admin account, created when no admin exists
#[derive(Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    /// Ed25519 seed for session tokens; `None` means generate one per process
    pub session_key: Option<[u8; 32]>,
    pub session_ttl: Duration,
    pub mail: Option<MailConfig>,
    pub photos: Option<PhotoConfig>,
    pub cors_origin: Option<String>,
    pub log_format: LogFormat,
    pub bootstrap_admin: Option<AdminBootstrap>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            env::var(key)
                .ok()
                .or_else(|| read_secret(Path::new(SECRETS_DIR), key))
        })
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{e}"),
            })?,
            None => 5000,
        };

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new("data").join("pageant.db"));

        let session_key = get("SESSION_SIGNING_KEY")
            .map(|raw| parse_seed(&raw))
            .transpose()?;

        let session_ttl = match get("SESSION_TTL_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| ConfigError::Invalid {
                key: "SESSION_TTL_SECS",
                reason: format!("{e}"),
            })?),
            None => Duration::from_secs(30 * 24 * 60 * 60),
        };

        let mail = match (get("MAIL_RELAY_URL"), get("MAIL_FROM")) {
            (Some(relay_url), Some(from)) => Some(MailConfig { relay_url, from }),
            (Some(_), None) => return Err(ConfigError::Incomplete("MAIL_RELAY_URL", "MAIL_FROM")),
            (None, _) => None,
        };

        let photos = match (get("PHOTO_BUCKET"), get("PHOTO_PUBLIC_URL")) {
            (Some(bucket), Some(public_url)) => Some(PhotoConfig {
                bucket,
                public_url: public_url.trim_end_matches('/').to_string(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("PHOTO_BUCKET", "PHOTO_PUBLIC_URL"))
            }
            (None, _) => None,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "LOG_FORMAT",
                reason,
            })?,
            None => LogFormat::default(),
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap { email, password }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "BOOTSTRAP_ADMIN_EMAIL",
                    "BOOTSTRAP_ADMIN_PASSWORD",
                ))
            }
            (None, _) => None,
        };

        Ok(Config {
            port,
            database_path,
            session_key,
            session_ttl,
            mail,
            photos,
            cors_origin: get("CORS_ORIGIN"),
            log_format,
            bootstrap_admin,
        })
    }

    /// Log the effective settings without secrets
    pub fn log_summary(&self) {
        info!(
            port = self.port,
            database = %self.database_path.display(),
            session_ttl_secs = self.session_ttl.as_secs(),
            mail_relay = self.mail.is_some(),
            photo_bucket = self.photos.as_ref().map(|p| p.bucket.as_str()).unwrap_or("memory"),
            cors_origin = self.cors_origin.as_deref().unwrap_or("*"),
            "Configuration loaded"
        );
        if self.session_key.is_none() {
            warn!("SESSION_SIGNING_KEY not set; sessions will not survive a restart");
        }
    }
}

fn parse_seed(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(raw).map_err(|e| ConfigError::Invalid {
        key: "SESSION_SIGNING_KEY",
        reason: e.to_string(),
    })?;
    bytes.try_into().map_err(|b: Vec<u8>| ConfigError::Invalid {
        key: "SESSION_SIGNING_KEY",
        reason: format!("expected 32 bytes, got {}", b.len()),
    })
}

fn read_secret(dir: &Path, key: &str) -> Option<String> {
    read_to_string(dir.join(key))
        .map(|s| s.trim().to_string())
        .ok()
}
