use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tokio::sync::watch::Receiver;
use tracing::info;

use crate::AppConfig;
use crate::sensors::SensorSnapshot;

pub type AppStateMutex = Arc<Mutex<ApplicationState>>;

pub struct ApplicationState {
    pub startup_time: SystemTime,
    pub app_config: AppConfig,
    pub version: String,
    /// Latest snapshot published by the power monitoring thread
    pub readings_rx: Receiver<SensorSnapshot>,
}

impl ApplicationState {
    pub fn new(app_config: AppConfig, readings_rx: Receiver<SensorSnapshot>) -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();

        info!("Starting current-monitor, version: {}", version);

        Self {
            startup_time: SystemTime::now(),
            app_config,
            version,
            readings_rx,
        }
    }

    pub fn latest_snapshot(&self) -> SensorSnapshot {
        self.readings_rx.borrow().clone()
    }

    /// False once the power monitoring thread has exited and dropped its sender.
    pub fn monitor_running(&self) -> bool {
        self.readings_rx.has_changed().is_ok()
    }
}
