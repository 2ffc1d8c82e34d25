pub mod sensors;
pub mod status;

use axum::response::IntoResponse;

pub async fn root() -> impl IntoResponse {
    "Current monitor is online!"
}
