use scanner::{
    ReferenceTracker, ScanOutcome, ScanReport, Scanner, ScannerConfig,
    dashboard::{Dashboard, DashboardSnapshot},
    scheduler::Scheduler,
};
use scanner_data::build_source;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting momentum scanner");

    let config = ScannerConfig::load()?;
    let source = build_source(&config.source_config())?;

    let scanner = Scanner::new(
        Arc::clone(&source),
        Arc::new(ReferenceTracker::new()),
        config.universe.clone(),
        config.scan_settings(),
    );
    let dashboard = Dashboard::new(source, config.dashboard.clone());

    let mut scheduler = Scheduler::spawn(scanner, dashboard, config.schedule());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            changed = scheduler.outcomes.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(outcome) = scheduler.outcomes.borrow_and_update().as_ref() {
                    log_outcome(outcome);
                }
            }
            changed = scheduler.dashboard.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = scheduler.dashboard.borrow_and_update().as_ref() {
                    log_dashboard(snapshot);
                }
            }
        }
    }

    scheduler.shutdown().await;
    info!("Scanner stopped");

    Ok(())
}

fn log_outcome(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Published(report) => log_report(report),
        ScanOutcome::NoData { synced_at, reason } => {
            warn!(%synced_at, %reason, "No market data available this cycle");
        }
    }
}

fn log_report(report: &ScanReport) {
    info!(
        synced_at = %report.synced_at,
        bullish = report.bullish.len(),
        bearish = report.bearish.len(),
        skipped = report.skipped.len(),
        "Scan published"
    );

    if report.is_empty_bullish() {
        info!("No bullish breakouts detected");
    }
    for row in &report.bullish {
        info!(
            symbol = %row.symbol,
            ltp = row.last_price,
            momentum_pct = row.momentum_pct,
            change_24h_pct = row.price_change_pct,
            rsi = row.rsi,
            adx = row.adx,
            sentiment = %row.sentiment,
            "BULL"
        );
    }

    if report.is_empty_bearish() {
        info!("No bearish breakdowns detected");
    }
    for row in &report.bearish {
        info!(
            symbol = %row.symbol,
            ltp = row.last_price,
            momentum_pct = row.momentum_pct,
            change_24h_pct = row.price_change_pct,
            rsi = row.rsi,
            adx = row.adx,
            sentiment = %row.sentiment,
            "BEAR"
        );
    }
}

fn log_dashboard(snapshot: &DashboardSnapshot) {
    for quote in &snapshot.quotes {
        info!(
            symbol = %quote.symbol,
            price = quote.last_price,
            change_24h_pct = quote.price_change_pct,
            "Dashboard"
        );
    }
    match snapshot.bias {
        Some(bias) => info!(%bias, "Market bias"),
        None => warn!("Market bias unavailable, lead symbol not listed"),
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
