//! Route handlers of the tailor shop API.

pub mod dashboard;
pub mod measurements;
pub mod orders;
pub mod profiles;

use serde_json::json;
use tailor_core::{EngineError, LifecycleError};
use tailor_types::APIError;

/// Maps an engine failure onto the HTTP error contract.
pub fn engine_error(error: EngineError, retry_after_seconds: u64) -> APIError {
	match error {
		EngineError::Validation(errors) => APIError::validation(&errors),
		EngineError::Forbidden(message) => APIError::Forbidden { message },
		EngineError::NotFound(what) => APIError::NotFound {
			message: format!("{} not found", what),
		},
		EngineError::StaleState {
			order_id,
			expected,
			actual,
		} => APIError::Conflict {
			error_type: "STALE_STATE".to_string(),
			message: format!(
				"Order {} changed since it was loaded. Refresh and try again.",
				order_id
			),
			details: Some(json!({
				"orderId": order_id,
				"expected": expected,
				"actual": actual,
			})),
		},
		EngineError::Conflict(message) => APIError::Conflict {
			error_type: "CONFLICT".to_string(),
			message,
			details: None,
		},
		EngineError::IllegalTransition(LifecycleError::IllegalTransition {
			state,
			action,
			role,
		}) => APIError::UnprocessableEntity {
			error_type: "ILLEGAL_TRANSITION".to_string(),
			message: format!("Cannot {} an order that is {}", action, state),
			details: Some(json!({
				"state": state,
				"action": action,
				"role": role,
			})),
		},
		EngineError::Persistence(message) => APIError::ServiceUnavailable {
			error_type: "PERSISTENCE_FAILURE".to_string(),
			message: format!("The change could not be saved: {}", message),
			retry_after: Some(retry_after_seconds),
		},
		EngineError::Backend(message) => APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message,
		},
	}
}

#[cfg(test)]
pub(crate) mod testing {
	//! Router harness shared by the handler tests.

	use crate::auth::{ROLE_HEADER, USER_HEADER};
	use axum::{
		body::{to_bytes, Body},
		http::{Method, Request, StatusCode},
		Router,
	};
	use serde_json::Value;
	use std::sync::Arc;
	use tailor_config::{ApiConfig, ConfigBuilder};
	use tailor_core::{TailorBuilder, TailorFactories, TailorEngine};
	use tower::ServiceExt;

	pub fn engine() -> Arc<TailorEngine> {
		let config = ConfigBuilder::new().build();
		let factories = TailorFactories {
			storage_factories: tailor_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			backend_factories: tailor_backend::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			notification_factories: tailor_notification::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		};
		Arc::new(TailorBuilder::new(config).build(factories).unwrap())
	}

	pub fn app() -> Router {
		crate::server::router(engine(), &ApiConfig::default())
	}

	/// Sends one request as `user` with `role` and returns status and JSON body.
	pub async fn send(
		app: &Router,
		method: Method,
		uri: &str,
		caller: Option<(&str, &str)>,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		if let Some((user, role)) = caller {
			request = request.header(USER_HEADER, user).header(ROLE_HEADER, role);
		}
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string())),
			None => request.body(Body::empty()),
		}
		.unwrap();

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let json = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, json)
	}

	pub const ADMIN: Option<(&str, &str)> = Some(("owner", "admin"));
	pub const ALICE: Option<(&str, &str)> = Some(("alice", "client"));
	pub const BOB: Option<(&str, &str)> = Some(("bob", "client"));
}
