pub mod binance;
pub mod bybit;
pub mod config;
pub mod error;
pub mod exchange;
pub mod funding_rates;
pub mod mexc;
pub mod notifier;
pub mod okx;
pub mod output;
pub mod scheduler;
pub mod server;
pub mod settings;

pub use config::Config;
pub use error::{AppError, ConfigError, FetchError, NotifyError};
pub use exchange::{collect_all, Exchange, ExchangeAdapter};
pub use funding_rates::{CycleOutcome, FundingMonitor, FundingQuote};
pub use notifier::Notifier;
pub use scheduler::{Scheduler, SchedulerHandle};
