use crate::{
    dashboard::{Dashboard, DashboardSnapshot},
    orchestrator::{ScanOutcome, Scanner},
};
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

/// Cadences of the two independent refresh loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Full indicator scan.
    pub scan_interval: Duration,
    /// Price-only dashboard refresh.
    pub fast_tick: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(300),
            fast_tick: Duration::from_secs(30),
        }
    }
}

/// Handle to the running refresh loops.
///
/// Each loop awaits its current run before taking the next tick, so runs of the same loop never
/// overlap. Latest results are published on `watch` channels.
#[derive(Debug)]
pub struct Scheduler {
    pub outcomes: watch::Receiver<Option<ScanOutcome>>,
    pub dashboard: watch::Receiver<Option<DashboardSnapshot>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(scanner: Scanner, dashboard: Dashboard, config: ScheduleConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outcome_tx, outcomes) = watch::channel(None);
        let (dashboard_tx, dashboard_rx) = watch::channel(None);

        let handles = vec![
            spawn_scan_loop(scanner, config.scan_interval, outcome_tx, shutdown_rx.clone()),
            spawn_dashboard_loop(dashboard, config.fast_tick, dashboard_tx, shutdown_rx),
        ];

        Self {
            outcomes,
            dashboard: dashboard_rx,
            shutdown_tx,
            handles,
        }
    }

    /// Signal both loops to stop, cancelling any run in flight, and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(error) = handle.await {
                warn!(%error, "refresh loop terminated abnormally");
            }
        }
    }
}

/// Run [`Scanner::run_cycle`] every `every`, publishing each outcome.
pub fn spawn_scan_loop(
    scanner: Scanner,
    every: Duration,
    outcome_tx: watch::Sender<Option<ScanOutcome>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(every_secs = every.as_secs_f64(), "starting full scan loop");

        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                outcome = scanner.run_cycle() => outcome,
            };

            if outcome_tx.send(Some(outcome)).is_err() {
                debug!("scan outcome receivers dropped");
                break;
            }
        }

        info!("full scan loop stopped");
    })
}

/// Run [`Dashboard::refresh`] every `every`, publishing each snapshot. Failed refreshes keep
/// the previous snapshot.
pub fn spawn_dashboard_loop(
    dashboard: Dashboard,
    every: Duration,
    snapshot_tx: watch::Sender<Option<DashboardSnapshot>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(every_secs = every.as_secs_f64(), "starting dashboard loop");

        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {}
            }

            let refreshed = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                refreshed = dashboard.refresh() => refreshed,
            };

            match refreshed {
                Ok(snapshot) => {
                    if snapshot_tx.send(Some(snapshot)).is_err() {
                        debug!("dashboard receivers dropped");
                        break;
                    }
                }
                Err(error) => warn!(%error, "dashboard refresh failed"),
            }
        }

        info!("dashboard loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dashboard::DashboardConfig, orchestrator::ScanSettings, tracker::ReferenceTracker,
        universe::UniverseConfig,
    };
    use async_trait::async_trait;
    use scanner_data::{
        CandleRequest, CandleSeries, DataError, Instrument, MarketDataSource, ProviderKind,
    };
    use smol_str::SmolStr;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Default)]
    struct CountingSource {
        ticker_calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for CountingSource {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Bybit
        }

        async fn list_tickers(&self) -> Result<Vec<Instrument>, DataError> {
            self.ticker_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Instrument {
                symbol: SmolStr::new("BTCUSDT"),
                product_id: None,
                last_price: 100.0,
                price_change_pct: 1.0,
                reference_value: 10.0,
                turnover: Some(1.0),
                volume: None,
            }])
        }

        async fn fetch_candles(
            &self,
            instrument: &Instrument,
            _: CandleRequest,
        ) -> Result<CandleSeries, DataError> {
            Err(DataError::HistoryUnavailable {
                symbol: instrument.symbol.clone(),
                reason: "no history".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_scheduler_publishes_and_shuts_down() {
        let source = Arc::new(CountingSource::default());
        let scanner = Scanner::new(
            source.clone(),
            Arc::new(ReferenceTracker::new()),
            UniverseConfig::default(),
            ScanSettings::default(),
        );
        let dashboard = Dashboard::new(source.clone(), DashboardConfig::default());

        let mut scheduler = Scheduler::spawn(
            scanner,
            dashboard,
            ScheduleConfig {
                scan_interval: Duration::from_millis(20),
                fast_tick: Duration::from_millis(10),
            },
        );

        tokio::time::timeout(Duration::from_secs(5), scheduler.outcomes.changed())
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), scheduler.dashboard.changed())
            .await
            .unwrap()
            .unwrap();

        let outcome = scheduler.outcomes.borrow().clone().unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.is_empty_bullish());

        let snapshot = scheduler.dashboard.borrow().clone().unwrap();
        assert_eq!(snapshot.quotes.len(), 1);
        assert_eq!(snapshot.quotes[0].symbol, "BTCUSDT");

        tokio::time::timeout(Duration::from_secs(5), scheduler.shutdown())
            .await
            .unwrap();

        let calls = source.ticker_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.ticker_calls.load(Ordering::SeqCst), calls);
    }
}
