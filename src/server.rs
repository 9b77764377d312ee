use crate::funding_rates::FundingMonitor;
use crate::notifier::{deliver, Notifier};
use crate::settings::RUNNING_MESSAGE;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<FundingMonitor>,
    pub notifier: Arc<dyn Notifier>,
    pub webhook_secret: Option<String>,
    pub webhook_enabled: bool,
    pub poll_interval: Duration,
}

/// Subset of a Telegram `Update` the bot reacts to.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(health))
        .route("/health", get(health));
    if state.webhook_enabled {
        router = router.route("/webhook", post(webhook));
    }
    router.with_state(state)
}

/// Binding happens in `main` so a taken port fails startup.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Health check and webhook listening on {}", addr);
    }
    axum::serve(listener, router(state)).await
}

async fn health() -> &'static str {
    RUNNING_MESSAGE
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_str()) {
            warn!("Rejected webhook call with a bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }
    let Some(message) = update.message else {
        return StatusCode::OK;
    };
    let chat_id = message.chat.id.to_string();
    let text = message.text.unwrap_or_default();
    // "/status@SomeBot" in group chats
    let command = text
        .split_whitespace()
        .next()
        .and_then(|word| word.split('@').next())
        .unwrap_or("");
    match command {
        "/status" => {
            let reply = status_text(&state);
            deliver(state.notifier.as_ref(), Some(chat_id.as_str()), &reply).await;
        }
        "/check" => {
            let reply = if state.monitor.is_running() {
                "⏳ A funding rate check is already running."
            } else {
                let monitor = state.monitor.clone();
                tokio::spawn(async move {
                    monitor.run_cycle().await;
                });
                "🔍 Checking funding rates..."
            };
            deliver(state.notifier.as_ref(), Some(chat_id.as_str()), reply).await;
        }
        _ => debug!("Ignoring webhook message from {}: {:?}", chat_id, text),
    }
    StatusCode::OK
}

fn status_text(state: &AppState) -> String {
    let exchanges: Vec<String> = state
        .monitor
        .exchanges()
        .iter()
        .map(|exchange| exchange.to_string())
        .collect();
    let settings = state.monitor.settings();
    format!(
        "✅ {}\nExchanges: {}\nInterval: {} sec\nWindow: {} min\nCheck in progress: {}",
        RUNNING_MESSAGE,
        exchanges.join(", "),
        state.poll_interval.as_secs(),
        settings.window_secs / 60,
        if state.monitor.is_running() { "yes" } else { "no" }
    )
}
