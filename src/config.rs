use std::{path::PathBuf, str::FromStr, time::Duration};

// ============================================================================
// CONFIG - Everything the server reads from the environment
// ============================================================================

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MEDIA_ROOT: &str = "media";
pub const DEFAULT_INDEX_CACHE_TTL_SECS: u64 = 20;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub bind_addr: String,
    pub media_root: PathBuf,
    pub index_cache_ttl: Duration,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub login_attempts_per_minute: u32,
    pub bcrypt_cost: u32,
    pub groups_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    /// Builds the config from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let login_attempts_per_minute: u32 = parse_or(
            &lookup,
            "LOGIN_ATTEMPTS_PER_MINUTE",
            DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE,
        )?;
        if login_attempts_per_minute == 0 {
            return Err(ConfigError::Invalid {
                name: "LOGIN_ATTEMPTS_PER_MINUTE",
                value: "0".into(),
            });
        }

        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            jwt_secret,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            media_root: lookup("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT)),
            index_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "INDEX_CACHE_TTL_SECS",
                DEFAULT_INDEX_CACHE_TTL_SECS,
            )?),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            login_attempts_per_minute,
            bcrypt_cost,
            groups_file: lookup("GROUPS_FILE")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Config suitable for tests: fast hashing, caller-chosen media root.
    pub fn for_tests(media_root: impl Into<PathBuf>) -> Self {
        Self {
            jwt_secret: "test-secret".to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            media_root: media_root.into(),
            index_cache_ttl: Duration::from_secs(DEFAULT_INDEX_CACHE_TTL_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            login_attempts_per_minute: DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE,
            bcrypt_cost: 4,
            groups_file: None,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
