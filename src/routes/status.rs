use crate::application_state;
use crate::services::status;
use axum::extract::State;
use axum::{Json, response::IntoResponse};

pub async fn detailed_health(
    State(app_state): State<application_state::AppStateMutex>,
) -> impl IntoResponse {
    let monitor_status = status::check_sensors(&app_state).await;
    Json(monitor_status)
}
