use crate::config::Config;
use crate::error::FetchError;
use crate::exchange::{collect_all, Exchange, ExchangeAdapter};
use crate::notifier::{deliver, Notifier};
use crate::output::render_alert;
use crate::settings::EIGHT_HOURS;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::{sync::Arc, time::Duration};

/// One exchange's funding rate for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingQuote {
    pub exchange: Exchange,
    pub symbol: String,
    /// Fraction per settlement, 0.0001 is 0.01%.
    pub funding_rate: f64,
    /// Epoch seconds, UTC.
    pub next_funding_time: i64,
}

impl FundingQuote {
    pub fn new(
        exchange: Exchange,
        symbol: impl Into<String>,
        funding_rate: f64,
        next_funding_time: i64,
    ) -> Result<Self, FetchError> {
        let symbol = symbol.into();
        if !funding_rate.is_finite() {
            return Err(FetchError::schema(format!(
                "non-finite funding rate for {}",
                symbol
            )));
        }
        if next_funding_time < 0 {
            return Err(FetchError::schema(format!(
                "negative settlement time for {}",
                symbol
            )));
        }
        Ok(Self {
            exchange,
            symbol,
            funding_rate,
            next_funding_time,
        })
    }

    pub fn seconds_until_funding(&self, now: i64) -> i64 {
        self.next_funding_time - now
    }
}

/// Next 00:00/08:00/16:00 UTC settlement strictly after `now`, in epoch seconds.
pub fn next_funding_boundary(now: DateTime<Utc>) -> i64 {
    (now.timestamp().div_euclid(EIGHT_HOURS) + 1) * EIGHT_HOURS
}

/// Quotes settling in `(now, now + window_secs]`, in input order.
pub fn filter_upcoming(quotes: &[FundingQuote], now: i64, window_secs: i64) -> Vec<FundingQuote> {
    quotes
        .iter()
        .filter(|quote| {
            let delta = quote.seconds_until_funding(now);
            delta > 0 && delta <= window_secs
        })
        .cloned()
        .collect()
}

/// An empty watchlist keeps everything.
pub fn apply_watchlist(quotes: Vec<FundingQuote>, watchlist: &[String]) -> Vec<FundingQuote> {
    if watchlist.is_empty() {
        return quotes;
    }
    quotes
        .into_iter()
        .filter(|quote| watchlist.iter().any(|symbol| symbol == &quote.symbol))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedGroup {
    pub exchange: Exchange,
    /// Highest rate first.
    pub positive: Vec<FundingQuote>,
    /// Most negative rate first.
    pub negative: Vec<FundingQuote>,
}

/// Groups by exchange and keeps the `top_n` extremes on each side. Zero rates
/// are never surfaced and groups with nothing to show are dropped.
pub fn rank_by_exchange(quotes: &[FundingQuote], top_n: usize) -> Vec<RankedGroup> {
    let mut by_exchange: BTreeMap<Exchange, Vec<&FundingQuote>> = BTreeMap::new();
    for quote in quotes {
        by_exchange.entry(quote.exchange).or_default().push(quote);
    }
    by_exchange
        .into_iter()
        .filter_map(|(exchange, rates)| {
            let mut positive: Vec<FundingQuote> = rates
                .iter()
                .filter(|q| q.funding_rate > 0.0)
                .map(|q| (*q).clone())
                .collect();
            let mut negative: Vec<FundingQuote> = rates
                .iter()
                .filter(|q| q.funding_rate < 0.0)
                .map(|q| (*q).clone())
                .collect();
            positive.sort_by(|a, b| b.funding_rate.total_cmp(&a.funding_rate));
            negative.sort_by(|a, b| a.funding_rate.total_cmp(&b.funding_rate));
            positive.truncate(top_n);
            negative.truncate(top_n);
            if positive.is_empty() && negative.is_empty() {
                None
            } else {
                Some(RankedGroup {
                    exchange,
                    positive,
                    negative,
                })
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub window_secs: i64,
    pub top_n: usize,
    pub request_timeout: Duration,
    pub watchlist: Vec<String>,
}

impl AlertSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_secs: config.alert_window_secs,
            top_n: config.top_n,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            watchlist: config.watchlist.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another check held the guard.
    Skipped,
    NoUpcoming,
    /// Quotes were in the window but all had a zero rate.
    NothingToReport,
    Sent,
    SendFailed,
    /// The check panicked.
    Failed,
}

/// Collector, filter, ranker and notifier wired together. At most one check
/// runs at a time.
pub struct FundingMonitor {
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    notifier: Arc<dyn Notifier>,
    destination: Option<String>,
    settings: AlertSettings,
    running: tokio::sync::Mutex<()>,
}

impl FundingMonitor {
    pub fn new(
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        notifier: Arc<dyn Notifier>,
        destination: Option<String>,
        settings: AlertSettings,
    ) -> Self {
        Self {
            adapters,
            notifier,
            destination,
            settings,
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.adapters.iter().map(|adapter| adapter.exchange()).collect()
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Runs one check unless one is already in progress. Never panics.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _guard = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Previous funding rate check still running, skipping this one");
                return CycleOutcome::Skipped;
            }
        };
        match AssertUnwindSafe(self.check_funding_rates()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Funding rate check aborted: {}", reason);
                CycleOutcome::Failed
            }
        }
    }

    async fn check_funding_rates(&self) -> CycleOutcome {
        let start = tokio::time::Instant::now();
        info!("Checking funding rates on {} exchanges", self.adapters.len());
        let collection = collect_all(&self.adapters, self.settings.request_timeout).await;
        let now = Utc::now().timestamp();
        let upcoming = apply_watchlist(
            filter_upcoming(&collection.quotes, now, self.settings.window_secs),
            &self.settings.watchlist,
        );
        if upcoming.is_empty() {
            info!(
                "No upcoming settlements within {} min",
                self.settings.window_secs / 60
            );
            return CycleOutcome::NoUpcoming;
        }
        let groups = rank_by_exchange(&upcoming, self.settings.top_n);
        let message = match render_alert(&groups, self.settings.window_secs) {
            Some(message) => message,
            None => {
                info!("{} upcoming settlements, all at a zero rate", upcoming.len());
                return CycleOutcome::NothingToReport;
            }
        };
        let outcome =
            match deliver(self.notifier.as_ref(), self.destination.as_deref(), &message).await {
                true => CycleOutcome::Sent,
                false => CycleOutcome::SendFailed,
            };
        info!("Funding rate check took {} ms", start.elapsed().as_millis());
        outcome
    }
}
