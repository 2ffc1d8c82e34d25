use std::time::Duration;

use embedded_hal::i2c::I2c;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch::Sender;
use tokio::task::{self, JoinHandle};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sensors::current_sensors::CurrentSensors;
use crate::sensors::ina219::PowerMode;
use crate::sensors::{SENSOR_COUNT, SensorDescriptor, SensorSnapshot, SensorState};
use crate::utils::datetime;

/// Spawns the task that owns the I2C bus: initializes every sensor once, then polls them on
/// a fixed interval and publishes a snapshot after each pass. Nothing else touches the bus.
///
/// On cancellation the current pass finishes, initialized sensors are powered down and the
/// task exits, which closes the snapshot channel.
pub fn start_power_monitoring_thread<I2C>(
    i2c: I2C,
    descriptors: [SensorDescriptor; SENSOR_COUNT],
    poll_interval: Duration,
    readings_tx: Sender<SensorSnapshot>,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    I2C: I2c + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting power monitoring thread, polling every {} ms",
            poll_interval.as_millis()
        );

        let mut sensors: CurrentSensors<'_, I2C, SENSOR_COUNT> = CurrentSensors::new(i2c);
        run_blocking(|| sensors.initialize(&descriptors));
        publish(&sensors, &readings_tx, None);

        let mut tick = interval(poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tick.tick() => {}
            }

            run_blocking(|| sensors.poll_all());
            publish(
                &sensors,
                &readings_tx,
                Some(datetime::get_formatted_current_timestamp()),
            );
        }

        info!("Stopping power monitoring thread");
        run_blocking(|| {
            for index in 0..SENSOR_COUNT {
                if sensors.state(index) != Some(SensorState::Initialized) {
                    continue;
                }
                if let Err(e) = sensors.set_power_mode(index, PowerMode::PowerDown) {
                    warn!("Failed to power down sensor {}: {}", index, e);
                }
            }
        });
    })
}

/// Runs a pass of blocking bus transactions without stalling other tasks on this worker.
/// `block_in_place` is only available on the multi-threaded runtime.
fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::current().runtime_flavor() {
        RuntimeFlavor::MultiThread => task::block_in_place(f),
        _ => f(),
    }
}

fn publish<I2C: I2c, const N: usize>(
    sensors: &CurrentSensors<'_, I2C, N>,
    readings_tx: &Sender<SensorSnapshot>,
    polled_at: Option<String>,
) {
    let snapshot = SensorSnapshot {
        sensors: sensors.statuses(),
        polled_at,
    };
    debug!(
        "Publishing readings, {} of {} sensor(s) online",
        snapshot.online_count(),
        N
    );

    readings_tx.send_replace(snapshot);
}
