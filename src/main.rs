use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use linux_embedded_hal::I2cdev;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use current_monitor::application_state::ApplicationState;
use current_monitor::config::{self, BusDriver};
use current_monitor::sensors::SensorSnapshot;
use current_monitor::sensors::sensor_mock::SimulatedBus;
use current_monitor::services::power_monitor::start_power_monitoring_thread;
use current_monitor::{build_app, configure_logging, start_server};

/// Raw count the mock driver reports for every sensor; 0.6 A with the default profile.
const MOCK_RAW_CURRENT: i16 = 6000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    configure_logging();

    let app_config = config::load_app_config().context("Failed to load app config")?;

    let (readings_tx, readings_rx) = watch::channel(SensorSnapshot::default());
    let cancel_token = CancellationToken::new();
    let poll_interval = Duration::from_millis(app_config.bus.poll_interval_ms());

    let monitor = match app_config.bus.driver {
        BusDriver::Linux => {
            let device_path = app_config.bus.device_path();
            let i2c = I2cdev::new(device_path)
                .with_context(|| format!("Failed to open I2C device {}", device_path))?;
            debug!("I2C device {} opened", device_path);

            start_power_monitoring_thread(
                i2c,
                app_config.sensors,
                poll_interval,
                readings_tx,
                cancel_token.clone(),
            )
        }
        BusDriver::Mock => {
            info!("Using simulated I2C bus, no hardware will be accessed");
            let bus = SimulatedBus::for_descriptors(&app_config.sensors, MOCK_RAW_CURRENT);

            start_power_monitoring_thread(
                bus,
                app_config.sensors,
                poll_interval,
                readings_tx,
                cancel_token.clone(),
            )
        }
    };

    let app_state = Arc::new(Mutex::new(ApplicationState::new(
        app_config.clone(),
        readings_rx,
    )));
    let app = build_app(app_state);

    let server_result = start_server(app, &app_config, cancel_token.clone()).await;
    cancel_token.cancel();
    monitor.await.context("Power monitoring thread panicked")?;

    server_result
}
