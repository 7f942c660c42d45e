use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const API_URL_VAR: &str = "INK_CALC_API_URL";
pub const REQUEST_TIMEOUT_VAR: &str = "INK_CALC_REQUEST_TIMEOUT_SECS";
pub const JPEG_QUALITY_VAR: &str = "INK_CALC_JPEG_QUALITY";

pub const DEFAULT_API_URL: &str = "http://localhost:8900";
pub const DEFAULT_JPEG_QUALITY: f32 = 0.7;

/// Runtime settings read once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_url: Url,
    /// `None` means requests may run indefinitely.
    pub request_timeout: Option<Duration>,
    pub jpeg_quality: f32,
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source. Blank values count as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] when the API URL is not an
    /// `http`/`https` URL, [`ConfigError::InvalidTimeout`] when the timeout is
    /// not a positive number of seconds and [`ConfigError::InvalidQuality`]
    /// when the JPEG quality is outside `(0, 1]`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_url = parse_api_url(read(API_URL_VAR).as_deref().unwrap_or(DEFAULT_API_URL))?;

        let request_timeout = match read(REQUEST_TIMEOUT_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => None,
        };

        let jpeg_quality = match read(JPEG_QUALITY_VAR) {
            Some(raw) => match raw.parse::<f32>() {
                Ok(quality) if quality > 0.0 && quality <= 1.0 => quality,
                _ => return Err(ConfigError::InvalidQuality(raw)),
            },
            None => DEFAULT_JPEG_QUALITY,
        };

        Ok(Self {
            api_url,
            request_timeout,
            jpeg_quality,
        })
    }

    /// `{api_url}/calculate`, keeping any path prefix of the base URL.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] if the joined URL does not parse.
    pub fn calculate_endpoint(&self) -> Result<Url, ConfigError> {
        let joined = format!("{}/calculate", self.api_url.as_str().trim_end_matches('/'));
        Url::parse(&joined).map_err(|error| ConfigError::InvalidUrl {
            url: joined,
            reason: error.to_string(),
        })
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|error| ConfigError::InvalidUrl {
        url: raw.to_owned(),
        reason: error.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_owned(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid INK_CALC_API_URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid INK_CALC_REQUEST_TIMEOUT_SECS `{0}`: expected a positive number of seconds")]
    InvalidTimeout(String),
    #[error("invalid INK_CALC_JPEG_QUALITY `{0}`: expected a fraction in (0, 1]")]
    InvalidQuality(String),
}
