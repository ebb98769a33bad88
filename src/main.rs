pub mod actuator;
pub mod bridge;
pub mod command;
pub mod config;
pub mod mqtt;
pub mod telemetry;

use crate::actuator::{ActuatorBank, OutputFactory, RppalOutputs, SimulatedOutputs};
use crate::bridge::{AppContext, Bridge, Topics};
use crate::config::BridgeConfig;
use crate::mqtt::{BrokerSession, RumqttcTransport};
use crate::telemetry::{SimulatedSensors, TelemetryScheduler};
use color_eyre::{eyre::eyre, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let path = config::config_path();
    info!("Using configuration {}", path.display());
    let config = config::load_or_create(&path).await?;

    let context = build_context(&config)?;
    let bridge = Bridge::create(context)
        .start()
        .map_err(|e| eyre!("Failed to start bridge: {}", e))?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        ctrl_c.cancel();
    });

    let stopped = bridge
        .run_until_cancelled(config.tick_interval(), cancel)
        .await;

    let context = stopped
        .shutdown()
        .map_err(|e| eyre!("Failed to shut down cleanly: {}", e))?;
    info!(
        "local: {:?}, cloud: {:?}",
        context.local.stats(),
        context.cloud.stats()
    );

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn build_context(config: &BridgeConfig) -> Result<AppContext> {
    let mut factory: Box<dyn OutputFactory> = if config.hardware.simulated {
        warn!("Simulated hardware, no GPIO will be touched");
        Box::new(SimulatedOutputs)
    } else {
        Box::new(RppalOutputs::new().map_err(|e| {
            eyre!(
                "Failed to open GPIO: {} (set [hardware] simulated = true off-device)",
                e
            )
        })?)
    };

    let bank = ActuatorBank::open(&config.pins, factory.as_mut())
        .map_err(|e| eyre!("Failed to claim actuator outputs: {}", e))?;

    let local_broker = config.local.broker();
    let cloud_broker = config.cloud.broker();
    let local = BrokerSession::new(
        local_broker.clone(),
        Box::new(RumqttcTransport::new(&local_broker)),
    );
    let cloud = BrokerSession::new(
        cloud_broker.clone(),
        Box::new(RumqttcTransport::new(&cloud_broker)),
    );

    Ok(AppContext {
        bank,
        local,
        cloud,
        scheduler: TelemetryScheduler::new(
            config.schedule.sensor_interval(),
            config.schedule.mirror_interval(),
            Instant::now(),
        ),
        sensors: Box::new(SimulatedSensors::new()),
        topics: Topics::from_config(config),
    })
}
