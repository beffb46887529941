//! HTTP server for the tailor shop API.
//!
//! Routes are nested under `/api`; `/health` sits at the root for load
//! balancers. Every `/api` route requires the caller identity headers.

use crate::apis::{self, engine_error};
use axum::{
	extract::DefaultBodyLimit,
	http::{HeaderValue, StatusCode},
	routing::get,
	Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tailor_config::ApiConfig;
use tailor_core::{EngineError, TailorEngine};
use tailor_types::APIError;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<TailorEngine>,
	/// Advertised to callers when the backend is unavailable.
	pub retry_after_seconds: u64,
}

impl AppState {
	/// Logs a failed operation and converts the error for the response.
	pub fn reject(&self, operation: &str, error: EngineError) -> APIError {
		tracing::warn!("{} failed: {}", operation, error);
		engine_error(error, self.retry_after_seconds)
	}
}

/// Builds the application router.
pub fn router(engine: Arc<TailorEngine>, api_config: &ApiConfig) -> Router {
	let state = AppState {
		engine,
		retry_after_seconds: api_config.retry_after_seconds,
	};

	let api = Router::new()
		.merge(apis::orders::routes())
		.merge(apis::dashboard::routes())
		.merge(apis::profiles::routes())
		.merge(apis::measurements::routes());

	Router::new()
		.route("/health", get(health))
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<TailorEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Tailor API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};
	if cors.allowed_origins.iter().any(|origin| origin == "*") {
		return CorsLayer::permissive();
	}

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match HeaderValue::from_str(origin) {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!("Ignoring invalid CORS origin: {}", origin);
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(tower_http::cors::Any)
		.allow_headers(tower_http::cors::Any)
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
	(StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
