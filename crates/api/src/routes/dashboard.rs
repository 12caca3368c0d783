use axum::Json;
use axum::extract::State;
use services::DashboardMetrics;

use crate::AppState;
use crate::error::ApiError;

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardMetrics>, ApiError> {
    let metrics = state
        .services
        .dashboard()
        .dashboard()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch dashboard data", e))?;
    Ok(Json(metrics))
}
