use crate::application_state;
use crate::error::ApiError;
use crate::sensors::{SENSOR_COUNT, SensorSnapshot, SensorStatus};
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct CurrentResponse {
    pub index: usize,
    /// `null` when the sensor has no reading
    pub current_amps: Option<f32>,
}

async fn running_snapshot(
    app_state: &application_state::AppStateMutex,
) -> Result<SensorSnapshot, ApiError> {
    let state_guard = app_state.lock().await;
    if !state_guard.monitor_running() {
        return Err(ApiError::Unavailable(
            "power monitoring thread has stopped".to_string(),
        ));
    }
    Ok(state_guard.latest_snapshot())
}

pub async fn list_sensors(
    State(app_state): State<application_state::AppStateMutex>,
) -> Result<Json<Vec<SensorStatus>>, ApiError> {
    let snapshot = running_snapshot(&app_state).await?;
    Ok(Json(snapshot.sensors))
}

pub async fn get_sensor_current(
    State(app_state): State<application_state::AppStateMutex>,
    Path(index): Path<usize>,
) -> Result<Json<CurrentResponse>, ApiError> {
    if index >= SENSOR_COUNT {
        return Err(ApiError::NotFound(format!(
            "sensor {} (valid indices are 0..{})",
            index, SENSOR_COUNT
        )));
    }

    let snapshot = running_snapshot(&app_state).await?;
    let current_amps = snapshot.current_amps(index);

    Ok(Json(CurrentResponse {
        index,
        current_amps: (!current_amps.is_nan()).then_some(current_amps),
    }))
}
