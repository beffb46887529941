//! Profile endpoints.
//!
//! Administrators register and remove users; everyone may read and update
//! their own profile.

use crate::auth::Caller;
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	routing::get,
	Json, Router,
};
use tailor_types::{APIError, NewProfile, Profile, ProfileUpdate};

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/profiles", get(list_profiles).post(register_profile))
		.route(
			"/profiles/{username}",
			get(get_profile).put(update_profile).delete(delete_profile),
		)
}

async fn list_profiles(
	State(state): State<AppState>,
	Caller(actor): Caller,
) -> Result<Json<Vec<Profile>>, APIError> {
	state
		.engine
		.list_profiles(&actor)
		.await
		.map(Json)
		.map_err(|e| state.reject("Profile listing", e))
}

async fn register_profile(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Json(submission): Json<NewProfile>,
) -> Result<(StatusCode, Json<Profile>), APIError> {
	let profile = state
		.engine
		.register_profile(&actor, submission)
		.await
		.map_err(|e| state.reject("Profile registration", e))?;
	Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(username): Path<String>,
) -> Result<Json<Profile>, APIError> {
	state
		.engine
		.get_profile(&actor, &username)
		.await
		.map(Json)
		.map_err(|e| state.reject("Profile retrieval", e))
}

async fn update_profile(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(username): Path<String>,
	Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, APIError> {
	state
		.engine
		.update_profile(&actor, &username, update)
		.await
		.map(Json)
		.map_err(|e| state.reject("Profile update", e))
}

async fn delete_profile(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(username): Path<String>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.delete_profile(&actor, &username)
		.await
		.map(|()| StatusCode::NO_CONTENT)
		.map_err(|e| state.reject("Profile deletion", e))
}

#[cfg(test)]
mod tests {
	use crate::apis::testing::{app, send, ADMIN, ALICE, BOB};
	use axum::http::{Method, StatusCode};
	use serde_json::{json, Value};

	fn alice() -> Value {
		json!({
			"username": "alice",
			"firstname": "Alice",
			"lastname": "Moreau",
			"email": "alice@example.com",
			"phonenumber": "+15550100123",
		})
	}

	#[tokio::test]
	async fn test_register_and_read_profile() {
		let app = app();
		let (status, body) = send(&app, Method::POST, "/api/profiles", ADMIN, Some(alice())).await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["role"], "client");

		let (status, body) = send(&app, Method::GET, "/api/profiles/alice", ALICE, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["email"], "alice@example.com");

		let (status, _) = send(&app, Method::GET, "/api/profiles/alice", BOB, None).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn test_duplicate_registration_conflicts() {
		let app = app();
		send(&app, Method::POST, "/api/profiles", ADMIN, Some(alice())).await;

		let (status, body) = send(&app, Method::POST, "/api/profiles", ADMIN, Some(alice())).await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "CONFLICT");
	}

	#[tokio::test]
	async fn test_clients_cannot_register() {
		let app = app();
		let (status, _) = send(&app, Method::POST, "/api/profiles", ALICE, Some(alice())).await;
		assert_eq!(status, StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn test_update_validates_and_delete_removes() {
		let app = app();
		send(&app, Method::POST, "/api/profiles", ADMIN, Some(alice())).await;

		let (status, body) = send(
			&app,
			Method::PUT,
			"/api/profiles/alice",
			ALICE,
			Some(json!({ "firstname": "  " })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(body["details"].get("firstname").is_some());

		let (status, body) = send(
			&app,
			Method::PUT,
			"/api/profiles/alice",
			ALICE,
			Some(json!({ "bio": "Prefers wool" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["bio"], "Prefers wool");

		let (status, _) = send(&app, Method::DELETE, "/api/profiles/alice", ADMIN, None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, _) = send(&app, Method::GET, "/api/profiles/alice", ADMIN, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}
