use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::rotator::policy::FailurePolicy;

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub slack_token: String,
    pub slack_user_id: String,
    pub api_base_url: String,
    pub interval: Duration,
    pub failure_policy: FailurePolicy,
    pub shim_path: Option<PathBuf>,
    pub http_timeout: Option<Duration>,
    pub max_cycles: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slack_token: String::new(),
            slack_user_id: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            failure_policy: FailurePolicy::Exit,
            shim_path: None,
            http_timeout: None,
            max_cycles: None,
        }
    }
}

// Keeps the token out of the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.slack_token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Config")
            .field("slack_token", &token)
            .field("slack_user_id", &self.slack_user_id)
            .field("api_base_url", &self.api_base_url)
            .field("interval", &self.interval)
            .field("failure_policy", &self.failure_policy)
            .field("shim_path", &self.shim_path)
            .field("http_timeout", &self.http_timeout)
            .field("max_cycles", &self.max_cycles)
            .finish()
    }
}

impl Config {
    /// Build the configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset. The two Slack credentials are never
    /// rejected here; a missing one shows up later as an API failure.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        config.slack_token = get("SLACK_TOKEN").unwrap_or_default();
        config.slack_user_id = get("SLACK_USER_ID").unwrap_or_default();

        if let Some(url) = get("SLACK_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(secs) = get("PFP_INTERVAL_SECS") {
            config.interval = Duration::from_secs(parse_number("PFP_INTERVAL_SECS", &secs)?);
        }

        let max_retries = match get("PFP_MAX_RETRIES") {
            Some(v) => parse_number::<u32>("PFP_MAX_RETRIES", &v)?,
            None => DEFAULT_MAX_RETRIES,
        };
        let retry_delay = match get("PFP_RETRY_DELAY_SECS") {
            Some(v) => Duration::from_secs(parse_number("PFP_RETRY_DELAY_SECS", &v)?),
            None => Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        };

        config.failure_policy = match get("PFP_FAILURE_POLICY")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("exit") => FailurePolicy::Exit,
            Some("resilient") => FailurePolicy::Resilient {
                max_retries,
                retry_delay,
            },
            Some(_) => {
                return Err(AppError::config(
                    "PFP_FAILURE_POLICY",
                    "Must be 'exit' or 'resilient'",
                ))
            }
        };

        config.shim_path = get("PFP_SHIM_PATH").map(PathBuf::from);

        if let Some(secs) = get("PFP_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Some(Duration::from_secs(parse_number(
                "PFP_HTTP_TIMEOUT_SECS",
                &secs,
            )?));
        }

        if let Some(n) = get("PFP_MAX_CYCLES") {
            config.max_cycles = Some(parse_number("PFP_MAX_CYCLES", &n)?);
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> AppResult<T> {
    value
        .parse::<T>()
        .map_err(|_| AppError::config(field, &format!("'{}' is not a valid number", value)))
}

/// Load `.env` (if any) and read the process environment
pub fn load_config() -> AppResult<Config> {
    match dotenv::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) => log::debug!("No .env file loaded: {}", e),
    }

    let config = Config::from_lookup(|key| std::env::var(key).ok())?;

    if config.slack_token.is_empty() {
        log::warn!("SLACK_TOKEN is not set; Slack will reject every request");
    }
    if config.slack_user_id.is_empty() {
        log::warn!("SLACK_USER_ID is not set; the profile lookup will fail");
    }

    Ok(config)
}

pub fn validate_config(config: &Config) -> AppResult<()> {
    if config.interval.is_zero() {
        return Err(AppError::config(
            "PFP_INTERVAL_SECS",
            "Must be greater than 0",
        ));
    }

    if config.http_timeout.is_some_and(|t| t.is_zero()) {
        return Err(AppError::config(
            "PFP_HTTP_TIMEOUT_SECS",
            "Must be greater than 0",
        ));
    }

    if config.max_cycles == Some(0) {
        return Err(AppError::config("PFP_MAX_CYCLES", "Must be greater than 0"));
    }

    if !config.api_base_url.starts_with("http://") && !config.api_base_url.starts_with("https://")
    {
        return Err(AppError::config("SLACK_API_URL", "Must be an http(s) URL"));
    }

    Ok(())
}
