use crate::application_state::AppStateMutex;
use crate::sensors::{SENSOR_COUNT, SensorStatus};
use crate::utils::datetime;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub async fn check_sensors(state: &AppStateMutex) -> MonitorStatus {
    let state_clone = Arc::clone(state);
    let state_guard = state_clone.lock().await;
    debug!("Lock acquired on ApplicationState");

    let snapshot = state_guard.latest_snapshot();

    MonitorStatus {
        version: state_guard.version.clone(),
        uptime_seconds: datetime::seconds_since(state_guard.startup_time),
        bus_driver: format!("{:?}", state_guard.app_config.bus.driver),
        monitor_running: state_guard.monitor_running(),
        last_poll_time: snapshot.polled_at.clone(),
        sensors_online: snapshot.online_count(),
        sensors_total: SENSOR_COUNT,
        sensors: snapshot.sensors,
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MonitorStatus {
    pub version: String,
    pub uptime_seconds: u64,
    pub bus_driver: String,
    pub monitor_running: bool,
    pub last_poll_time: Option<String>,
    pub sensors_online: usize,
    pub sensors_total: usize,
    pub sensors: Vec<SensorStatus>,
}
