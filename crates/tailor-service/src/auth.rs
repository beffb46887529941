//! Caller identity.
//!
//! Authentication happens in the gateway in front of this service, which
//! forwards the signed-in user as `X-Tailor-User` and `X-Tailor-Role`.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use tailor_types::{is_valid_username, APIError, Actor, Role};

pub const USER_HEADER: &str = "x-tailor-user";
pub const ROLE_HEADER: &str = "x-tailor-role";

/// The actor on whose behalf a request runs.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<S> FromRequestParts<S> for Caller
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		actor_from_headers(&parts.headers).map(Caller)
	}
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, APIError> {
	let username = header_value(headers, USER_HEADER)
		.filter(|name| is_valid_username(name))
		.ok_or_else(|| APIError::Unauthorized {
			message: format!("Missing or invalid {} header", USER_HEADER),
		})?;
	let role = header_value(headers, ROLE_HEADER)
		.ok_or_else(|| APIError::Unauthorized {
			message: format!("Missing {} header", ROLE_HEADER),
		})?
		.parse::<Role>()
		.map_err(|message| APIError::Unauthorized { message })?;

	Ok(Actor::new(username, role))
}

fn header_value(headers: &HeaderMap, key: &str) -> Option<String> {
	let raw = headers.get(key)?.to_str().ok()?.trim();
	if raw.is_empty() {
		return None;
	}
	Some(raw.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	fn headers(user: Option<&str>, role: Option<&str>) -> HeaderMap {
		let mut headers = HeaderMap::new();
		if let Some(user) = user {
			headers.insert(USER_HEADER, HeaderValue::from_str(user).unwrap());
		}
		if let Some(role) = role {
			headers.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
		}
		headers
	}

	#[test]
	fn test_actor_from_headers() {
		let actor = actor_from_headers(&headers(Some(" alice "), Some("Client"))).unwrap();
		assert_eq!(actor, Actor::client("alice"));

		let actor = actor_from_headers(&headers(Some("owner"), Some("admin"))).unwrap();
		assert!(actor.is_admin());
	}

	#[test]
	fn test_missing_or_invalid_identity_is_unauthorized() {
		for (user, role) in [
			(None, Some("client")),
			(Some("alice"), None),
			(Some("   "), Some("client")),
			(Some("alice"), Some("tailor")),
		] {
			let err = actor_from_headers(&headers(user, role)).unwrap_err();
			assert_eq!(err.status_code(), 401, "user={:?} role={:?}", user, role);
		}

		for user in [".alice", "alice smith", "a".repeat(65).as_str()] {
			let err = actor_from_headers(&headers(Some(user), Some("client"))).unwrap_err();
			assert_eq!(err.status_code(), 401, "user={:?}", user);
		}
	}
}
