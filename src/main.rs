use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info};

use geotick::config::CONFIG;
use geotick::gateway::SimulatedGateway;
use geotick::report::{
    HttpTransmitter, ReportSettings, Reporter, StartupSeed, SubscriptionParams,
};
use geotick::util;

#[tokio::main]
async fn main() -> Result<()> {
    util::setup_logging(&CONFIG.general.log_level)?;
    info!("Application starting...");

    let device_id = util::get_device_id(&CONFIG.general);
    info!("Device id: {}", device_id);

    let gateway = Arc::new(SimulatedGateway::new(&CONFIG.simulation));
    let transmitter = Arc::new(HttpTransmitter::new(CONFIG.transmit.timeout())?);
    let reporter = Reporter::new(gateway, transmitter)
        .with_selection(CONFIG.selection)
        .with_subscription(SubscriptionParams {
            min_interval: CONFIG.subscription.min_interval(),
            min_distance_m: CONFIG.subscription.min_distance_m,
        });

    let target_url = CONFIG.report.target_url();
    let settings = ReportSettings::new(CONFIG.report.interval, Some(&target_url), &device_id);
    match reporter.start(settings)? {
        StartupSeed::Fresh(reading) => info!("Starting from {}", reading.describe(&device_id)),
        StartupSeed::NoFreshReading => info!("No fresh location yet, waiting for updates"),
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping reporter..."),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }

    reporter.stop().await;
    info!("Reporter stopped, shutting down");

    Ok(())
}
