use crate::error::ConfigError;
use crate::exchange::Exchange;
use crate::settings::{
    FIVE_MIN, FORTY_FIVE_MIN, LOG_LEVEL, ONE_DAY, QUOTE_SUFFIX, REQUEST_TIMEOUT_SEC, SMTP_URL,
    TELEGRAM_API_URL, TOP_N,
};
use derivative::Derivative;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Telegram,
    Email,
}

impl FromStr for NotifierKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(NotifierKind::Telegram),
            "email" => Ok(NotifierKind::Email),
            other => Err(format!("unknown notifier `{}`", other)),
        }
    }
}

#[derive(Clone, Deserialize, Derivative)]
#[derivative(Debug)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,
    #[derivative(Debug = "ignore")]
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub parse_mode: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: TELEGRAM_API_URL.to_string(),
            bot_token: None,
            chat_id: None,
            parse_mode: None,
        }
    }
}

#[derive(Clone, Deserialize, Derivative)]
#[derivative(Debug)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub username: Option<String>,
    #[derivative(Debug = "ignore")]
    pub password: Option<String>,
    pub from: String,
    pub to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: SMTP_URL.to_string(),
            username: None,
            password: None,
            from: "Funding Rate Monitor <alerts@localhost>".to_string(),
            to: None,
        }
    }
}

#[derive(Clone, Deserialize, Derivative)]
#[derivative(Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    #[derivative(Debug = "ignore")]
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub exchanges: Vec<Exchange>,
    pub poll_interval_secs: u64,
    pub alert_window_secs: i64,
    pub top_n: usize,
    pub quote_suffix: String,
    pub request_timeout_secs: u64,
    pub run_on_start: bool,
    pub watchlist: Vec<String>,
    pub notifier: NotifierKind,
    pub telegram: TelegramConfig,
    pub email: EmailConfig,
    pub server: Option<ServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LOG_LEVEL.to_string(),
            exchanges: Exchange::iter().collect(),
            poll_interval_secs: FIVE_MIN,
            alert_window_secs: FORTY_FIVE_MIN,
            top_n: TOP_N,
            quote_suffix: QUOTE_SUFFIX.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SEC,
            run_on_start: true,
            watchlist: Vec::new(),
            notifier: NotifierKind::default(),
            telegram: TelegramConfig::default(),
            email: EmailConfig::default(),
            server: None,
        }
    }
}

impl Config {
    /// File first (if any), then environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(list) = lookup("EXCHANGES") {
            self.exchanges = split_list(&list)
                .iter()
                .map(|name| {
                    Exchange::from_str(name)
                        .map_err(|_| ConfigError::invalid("EXCHANGES", format!("unknown exchange `{}`", name)))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = lookup("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_var("POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = lookup("ALERT_WINDOW_SECS") {
            self.alert_window_secs = parse_var("ALERT_WINDOW_SECS", &value)?;
        }
        if let Some(value) = lookup("TOP_N") {
            self.top_n = parse_var("TOP_N", &value)?;
        }
        if let Some(suffix) = lookup("QUOTE_SUFFIX") {
            self.quote_suffix = suffix;
        }
        if let Some(value) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("RUN_ON_START") {
            self.run_on_start = parse_bool("RUN_ON_START", &value)?;
        }
        if let Some(list) = lookup("WATCHLIST") {
            self.watchlist = split_list(&list);
        }
        if let Some(value) = lookup("NOTIFIER") {
            self.notifier = NotifierKind::from_str(&value).map_err(|e| ConfigError::invalid("NOTIFIER", e))?;
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(mode) = lookup("TELEGRAM_PARSE_MODE") {
            self.telegram.parse_mode = Some(mode);
        }
        if let Some(host) = lookup("SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Some(username) = lookup("SMTP_USERNAME") {
            self.email.username = Some(username);
        }
        if let Some(password) = lookup("SMTP_PASSWORD") {
            self.email.password = Some(password);
        }
        if let Some(from) = lookup("ALERT_EMAIL_FROM") {
            self.email.from = from;
        }
        if let Some(to) = lookup("ALERT_EMAIL_TO") {
            self.email.to = Some(to);
        }
        if let Some(bind_addr) = lookup("SERVER_ADDR") {
            let webhook_secret = self.server.take().and_then(|server| server.webhook_secret);
            self.server = Some(ServerConfig {
                bind_addr,
                webhook_secret,
            });
        }
        if let (Some(secret), Some(server)) = (lookup("WEBHOOK_SECRET"), self.server.as_mut()) {
            server.webhook_secret = Some(secret);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::invalid("exchanges", "at least one exchange is required"));
        }
        if let Some(dup) = self
            .exchanges
            .iter()
            .enumerate()
            .find(|(i, exchange)| self.exchanges[..*i].contains(*exchange))
            .map(|(_, exchange)| exchange)
        {
            return Err(ConfigError::invalid("exchanges", format!("{} is listed more than once", dup)));
        }
        if self.poll_interval_secs == 0 || self.poll_interval_secs > ONE_DAY {
            return Err(ConfigError::invalid(
                "poll_interval_secs",
                format!("must be between 1 and {}", ONE_DAY),
            ));
        }
        if self.alert_window_secs <= 0 {
            return Err(ConfigError::invalid("alert_window_secs", "must be positive"));
        }
        if self.top_n == 0 {
            return Err(ConfigError::invalid("top_n", "must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "must be positive"));
        }
        Ok(())
    }

    /// Webhook commands reply through the notifier, so they need the Telegram backend.
    pub fn webhook_enabled(&self) -> bool {
        self.server.is_some() && self.notifier == NotifierKind::Telegram
    }

    /// Where alerts go for the selected notifier.
    pub fn destination(&self) -> Option<String> {
        match self.notifier {
            NotifierKind::Telegram => self.telegram.chat_id.clone(),
            NotifierKind::Email => self.email.to.clone(),
        }
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("`{}`: {}", value, e)))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("`{}` is not a boolean", other))),
    }
}
