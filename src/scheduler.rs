use crate::funding_rates::FundingMonitor;
use futures_util::StreamExt;
use log::info;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

/// Fixed-interval driver for [`FundingMonitor::run_cycle`].
pub struct Scheduler {
    monitor: Arc<FundingMonitor>,
    period: Duration,
    run_on_start: bool,
}

/// Stops the scheduler when `stop` is called or the handle is dropped.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(monitor: Arc<FundingMonitor>, period: Duration, run_on_start: bool) -> Self {
        Self {
            monitor,
            period,
            run_on_start,
        }
    }

    /// Each tick spawns a check; the monitor's guard turns overlapping ticks
    /// into skips instead of queueing them.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            let first_tick = match self.run_on_start {
                true => time::Instant::now(),
                false => time::Instant::now() + self.period,
            };
            let mut interval = time::interval_at(first_tick, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = IntervalStream::new(interval);
            let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
            info!(
                "🚀 Funding rate monitor running every {} sec",
                self.period.as_secs()
            );
            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    Some(_) = ticks.next() => {
                        in_flight.retain(|task| !task.is_finished());
                        let monitor = self.monitor.clone();
                        in_flight.push(tokio::spawn(async move {
                            monitor.run_cycle().await;
                        }));
                    }
                }
            }
            for task in &in_flight {
                task.abort();
            }
            info!("Funding rate monitor stopped");
        });
        SchedulerHandle { shutdown, task }
    }
}

impl SchedulerHandle {
    /// Abandons any check in progress.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::exchange::{Exchange, ExchangeAdapter};
    use crate::funding_rates::{AlertSettings, FundingQuote};
    use crate::notifier::testing::RecordingNotifier;
    use async_trait::async_trait;
    use chrono::Utc;

    struct SoonAdapter {
        delay: Duration,
    }

    #[async_trait]
    impl ExchangeAdapter for SoonAdapter {
        fn exchange(&self) -> Exchange {
            Exchange::Binance
        }
        async fn fetch(&self) -> Result<Vec<FundingQuote>, FetchError> {
            if !self.delay.is_zero() {
                time::sleep(self.delay).await;
            }
            let now = Utc::now().timestamp();
            Ok(vec![FundingQuote::new(Exchange::Binance, "BTCUSDT", 0.0004, now + 600)?])
        }
    }

    fn monitor(notifier: Arc<RecordingNotifier>, delay: Duration) -> Arc<FundingMonitor> {
        Arc::new(FundingMonitor::new(
            vec![Arc::new(SoonAdapter { delay })],
            notifier,
            Some("42".to_string()),
            AlertSettings {
                window_secs: 2700,
                top_n: 3,
                request_timeout: Duration::from_secs(1000),
                watchlist: Vec::new(),
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_period() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handle = Scheduler::new(monitor(notifier.clone(), Duration::ZERO), Duration::from_secs(60), true).start();
        time::sleep(Duration::from_secs(150)).await;
        assert_eq!(notifier.calls(), 3);
        handle.stop().await;
        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(notifier.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_start_waits_one_period() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handle = Scheduler::new(monitor(notifier.clone(), Duration::ZERO), Duration::from_secs(60), false).start();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(notifier.calls(), 0);
        time::sleep(Duration::from_secs(40)).await;
        assert_eq!(notifier.calls(), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_checks_do_not_pile_up() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handle = Scheduler::new(
            monitor(notifier.clone(), Duration::from_secs(90)),
            Duration::from_secs(60),
            true,
        )
        .start();
        // t=0 runs until 90, t=60 is skipped, t=120 runs until 210.
        time::sleep(Duration::from_secs(215)).await;
        assert_eq!(notifier.calls(), 2);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_abandons_the_check_in_progress() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = monitor(notifier.clone(), Duration::from_secs(90));
        let handle = Scheduler::new(monitor.clone(), Duration::from_secs(60), true).start();
        time::sleep(Duration::from_secs(10)).await;
        assert!(monitor.is_running());
        handle.stop().await;
        time::sleep(Duration::from_secs(200)).await;
        assert_eq!(notifier.calls(), 0);
        assert!(!monitor.is_running());
    }
}
