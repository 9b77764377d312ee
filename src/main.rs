use env_logger::Env;
use funding_rate_monitor::{
    config::Config,
    error::AppError,
    exchange::build_adapters,
    funding_rates::{AlertSettings, FundingMonitor},
    notifier::build_notifier,
    scheduler::Scheduler,
    server::{self, AppState},
    settings::{CONFIG_PATH_ENV, USER_AGENT},
};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
            error!("Could not load configuration: {}", e);
            return Err(e.into());
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(&config.log_level)).init();
    info!("Configuration loaded: {:?}", config);

    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let adapters = build_adapters(&config.exchanges, &client, &config.quote_suffix);
    let notifier = build_notifier(&config, &client);
    let destination = config.destination();
    if destination.is_none() {
        error!("No alert destination configured; alerts will not be delivered");
    }
    let monitor = Arc::new(FundingMonitor::new(
        adapters,
        notifier.clone(),
        destination,
        AlertSettings::from_config(&config),
    ));
    let poll_interval = Duration::from_secs(config.poll_interval_secs);

    let server_task = match &config.server {
        Some(server_config) => {
            let listener = tokio::net::TcpListener::bind(&server_config.bind_addr).await?;
            let webhook_enabled = config.webhook_enabled();
            if !webhook_enabled {
                warn!("Webhook commands need the Telegram notifier; serving health checks only");
            }
            let state = AppState {
                monitor: monitor.clone(),
                notifier,
                webhook_secret: server_config.webhook_secret.clone(),
                webhook_enabled,
                poll_interval,
            };
            Some(tokio::spawn(async move {
                if let Err(e) = server::serve(listener, state).await {
                    error!("HTTP server stopped: {}", e);
                }
            }))
        }
        None => None,
    };

    let scheduler = Scheduler::new(monitor, poll_interval, config.run_on_start).start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    scheduler.stop().await;
    if let Some(task) = server_task {
        task.abort();
    }
    Ok(())
}
