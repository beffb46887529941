//! Measurement endpoints. One record per username.

use crate::auth::Caller;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	routing::get,
	Json, Router,
};
use tailor_types::{APIError, Measurement};

pub fn routes() -> Router<AppState> {
	Router::new().route(
		"/measurements/{username}",
		get(get_measurement)
			.post(create_measurement)
			.put(update_measurement),
	)
}

async fn get_measurement(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(username): Path<String>,
) -> Result<Json<Measurement>, APIError> {
	state
		.engine
		.get_measurement(&actor, &username)
		.await
		.map(Json)
		.map_err(|e| state.reject("Measurement retrieval", e))
}

async fn create_measurement(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(username): Path<String>,
	Json(measurement): Json<Measurement>,
) -> Result<(StatusCode, Json<Measurement>), APIError> {
	let measurement = state
		.engine
		.create_measurement(&actor, &username, measurement)
		.await
		.map_err(|e| state.reject("Measurement creation", e))?;
	Ok((StatusCode::CREATED, Json(measurement)))
}

async fn update_measurement(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(username): Path<String>,
	Json(measurement): Json<Measurement>,
) -> Result<Json<Measurement>, APIError> {
	state
		.engine
		.update_measurement(&actor, &username, measurement)
		.await
		.map(Json)
		.map_err(|e| state.reject("Measurement update", e))
}
