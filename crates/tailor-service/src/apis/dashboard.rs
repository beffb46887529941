//! Administrator dashboard.

use crate::auth::Caller;
use crate::server::AppState;
use axum::{extract::State, routing::get, Json, Router};
use tailor_types::{APIError, DashboardMetrics};

pub fn routes() -> Router<AppState> {
	Router::new().route("/dashboard", get(dashboard_metrics))
}

async fn dashboard_metrics(
	State(state): State<AppState>,
	Caller(actor): Caller,
) -> Result<Json<DashboardMetrics>, APIError> {
	state
		.engine
		.dashboard_metrics(&actor)
		.await
		.map(Json)
		.map_err(|e| state.reject("Dashboard", e))
}
