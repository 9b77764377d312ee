use std::time::Duration;

/// Failure to obtain funding rates from a single exchange.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("error parsing response text to json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response schema: {0}")]
    Schema(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    pub fn schema(msg: impl Into<String>) -> Self {
        FetchError::Schema(msg.into())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("no destination configured")]
    MissingDestination,

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),

    #[error("messaging API rejected the message: {0}")]
    Api(String),

    #[error("email error: {0}")]
    Email(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Errors that terminate the process at startup.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
