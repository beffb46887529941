//! API types for the tailor shop HTTP API.
//!
//! This module defines the request and response shapes shared by the HTTP
//! handlers, and the structured error type mapped onto HTTP status codes.

use crate::form::FormError;
use crate::lifecycle::Action;
use crate::order::{LifecycleState, Order};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for `POST /api/orders/{id}/actions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
	pub action: Action,
	/// State the caller last observed. Enables the stale-state check.
	#[serde(default, rename = "expectedState", alias = "expected_state")]
	pub expected_state: Option<LifecycleState>,
}

/// Legal actions for the caller on one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableActionsResponse {
	#[serde(rename = "orderId")]
	pub order_id: u64,
	pub state: LifecycleState,
	pub actions: Vec<Action>,
}

/// Delivery outcome of the notification attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
	NotRequired,
	Sent,
	Failed { reason: String },
}

impl NotificationStatus {
	pub fn is_failed(&self) -> bool {
		matches!(self, NotificationStatus::Failed { .. })
	}
}

/// Response returned after an order operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderOperationResponse {
	/// The updated order, absent when it was deleted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order: Option<Order>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub from: Option<LifecycleState>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub to: Option<LifecycleState>,
	pub notification: NotificationStatus,
	/// Shown to the operator when the state changed but the message did not go out.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub warning: Option<String>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Missing or malformed caller identity (401)
	Unauthorized { message: String },
	/// Caller may not touch this resource (403)
	Forbidden { message: String },
	/// Resource does not exist (404)
	NotFound { message: String },
	/// Stale state or duplicate record (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Unprocessable entity for business rule failures (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Service unavailable with optional retry information (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Builds a 400 carrying per-field messages.
	pub fn validation(errors: &FormError) -> Self {
		APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message: errors.to_string(),
			details: serde_json::to_value(&errors.fields).ok(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::Conflict {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => (error_type.clone(), message.clone(), details.clone(), None),
			APIError::Unauthorized { message } => {
				("UNAUTHORIZED".to_string(), message.clone(), None, None)
			},
			APIError::Forbidden { message } => {
				("FORBIDDEN".to_string(), message.clone(), None, None)
			},
			APIError::NotFound { message } => {
				("NOT_FOUND".to_string(), message.clone(), None, None)
			},
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type.clone(), message.clone(), None, *retry_after),
			APIError::InternalServerError {
				error_type,
				message,
			} => (error_type.clone(), message.clone(), None, None),
		};
		ErrorResponse {
			error,
			message,
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthorized { message } => write!(f, "Unauthorized: {}", message),
			APIError::Forbidden { message } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let mut response = (status, Json(self.to_error_response())).into_response();
		if let APIError::ServiceUnavailable {
			retry_after: Some(secs),
			..
		} = &self
		{
			if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
				response
					.headers_mut()
					.insert(axum::http::header::RETRY_AFTER, value);
			}
		}
		response
	}
}
