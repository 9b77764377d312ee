use crate::config::{Config, EmailConfig, NotifierKind, TelegramConfig};
use crate::error::NotifyError;
use crate::output::stamp_message;
use async_trait::async_trait;
use chrono::Utc;
use derivative::Derivative;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use log::{error, info};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Delivers one message to one destination. No retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError>;
}

/// Sends and logs the result. Returns whether the message went out.
pub async fn deliver(notifier: &dyn Notifier, destination: Option<&str>, text: &str) -> bool {
    let destination = match destination.filter(|d| !d.trim().is_empty()) {
        Some(destination) => destination,
        None => {
            error!("Alert not sent via {}: {}", notifier.name(), NotifyError::MissingDestination);
            return false;
        }
    };
    match notifier.send(destination, text).await {
        Ok(()) => {
            info!("✅ Alert sent via {}", notifier.name());
            true
        }
        Err(e) => {
            error!("Could not send alert via {}: {}", notifier.name(), e);
            false
        }
    }
}

pub fn build_notifier(config: &Config, client: &reqwest::Client) -> Arc<dyn Notifier> {
    match config.notifier {
        NotifierKind::Telegram => Arc::new(TelegramNotifier::new(client.clone(), &config.telegram)),
        NotifierKind::Email => Arc::new(EmailNotifier::new(&config.email)),
    }
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct TelegramNotifier {
    #[derivative(Debug = "ignore")]
    client: reqwest::Client,
    api_url: String,
    #[derivative(Debug = "ignore")]
    bot_token: Option<String>,
    parse_mode: Option<String>,
}

impl TelegramNotifier {
    pub fn new(client: reqwest::Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            bot_token: config.bot_token.clone(),
            parse_mode: config.parse_mode.clone(),
        }
    }

    fn send_message_url(&self, token: &str) -> Result<Url, NotifyError> {
        let mut base = self.api_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?.join(&format!("./bot{}/sendMessage", token))?)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "Telegram"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
        let token = self
            .bot_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or(NotifyError::MissingCredential("TELEGRAM_BOT_TOKEN"))?;
        let mut body = json!({ "chat_id": destination, "text": text });
        if let Some(mode) = &self.parse_mode {
            body["parse_mode"] = Value::String(mode.clone());
        }
        let response = self
            .client
            .post(self.send_message_url(token)?)
            .json(&body)
            .send()
            .await
            // the URL carries the bot token
            .map_err(|e| NotifyError::Request(e.without_url()))?;
        let status = response.status();
        let reply: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() && reply["ok"].as_bool() == Some(true) {
            Ok(())
        } else {
            let description = reply["description"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            Err(NotifyError::Api(description))
        }
    }
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct EmailNotifier {
    smtp_host: String,
    from: String,
    username: Option<String>,
    #[derivative(Debug = "ignore")]
    password: Option<String>,
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            smtp_host: config.smtp_host.clone(),
            from: config.from.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
        let username = self
            .username
            .clone()
            .ok_or(NotifyError::MissingCredential("SMTP_USERNAME"))?;
        let password = self
            .password
            .clone()
            .ok_or(NotifyError::MissingCredential("SMTP_PASSWORD"))?;
        let to = format!("Trader <{}>", destination);
        let email = Message::builder()
            .from(
                self.from
                    .parse::<Mailbox>()
                    .map_err(|e| NotifyError::Email(format!("sender: {}", e)))?,
            )
            .to(to
                .parse::<Mailbox>()
                .map_err(|e| NotifyError::Email(format!("recipient: {}", e)))?)
            .subject("Funding Rate Alert")
            .body(stamp_message(text, Utc::now()))
            .map_err(|e| NotifyError::Email(e.to_string()))?;
        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_host)
                .map_err(|e| NotifyError::Email(e.to_string()))?
                .credentials(Credentials::new(username, password))
                .build();
        mailer
            .send(email)
            .await
            .map_err(|e| NotifyError::Email(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), text.to_string()));
            if self.fail {
                Err(NotifyError::Api("chat not found".to_string()))
            } else {
                Ok(())
            }
        }
    }
}
