//! Order endpoints.
//!
//! Listing, placement, edits and every lifecycle action. Mutations return an
//! `OrderOperationResponse` so a failed client notification surfaces as a
//! warning next to the stored order instead of as an error.

use crate::auth::Caller;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	routing::get,
	Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tailor_types::{
	APIError, Action, ActionRequest, AvailableActionsResponse, LifecycleState, NewOrder, Order,
	OrderEdit, OrderOperationResponse, OrderQuery,
};

/// Body of `PUT /api/orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOrderRequest {
	#[serde(flatten)]
	pub edit: OrderEdit,
	#[serde(default, rename = "expectedState", alias = "expected_state")]
	pub expected_state: Option<LifecycleState>,
}

pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/orders", get(list_orders).post(create_order))
		.route(
			"/orders/{id}",
			get(get_order).put(edit_order).delete(delete_order),
		)
		.route(
			"/orders/{id}/actions",
			get(available_actions).post(perform_action),
		)
}

async fn list_orders(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>, APIError> {
	state
		.engine
		.list_orders(&actor, query)
		.await
		.map(Json)
		.map_err(|e| state.reject("Order listing", e))
}

async fn create_order(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Json(submission): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderOperationResponse>), APIError> {
	let today = Utc::now().date_naive();
	let report = state
		.engine
		.create_order(&actor, submission, today)
		.await
		.map_err(|e| state.reject("Order placement", e))?;
	Ok((StatusCode::CREATED, Json(report.into())))
}

async fn get_order(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(id): Path<u64>,
) -> Result<Json<Order>, APIError> {
	state
		.engine
		.get_order(&actor, id)
		.await
		.map(Json)
		.map_err(|e| state.reject("Order retrieval", e))
}

async fn edit_order(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(id): Path<u64>,
	Json(request): Json<EditOrderRequest>,
) -> Result<Json<OrderOperationResponse>, APIError> {
	state
		.engine
		.edit_order(&actor, id, request.edit, request.expected_state)
		.await
		.map(|report| Json(report.into()))
		.map_err(|e| state.reject("Order edit", e))
}

async fn delete_order(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(id): Path<u64>,
) -> Result<Json<OrderOperationResponse>, APIError> {
	state
		.engine
		.perform_action(&actor, id, Action::Delete, None)
		.await
		.map(|report| Json(report.into()))
		.map_err(|e| state.reject("Order deletion", e))
}

async fn available_actions(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(id): Path<u64>,
) -> Result<Json<AvailableActionsResponse>, APIError> {
	state
		.engine
		.available_actions(&actor, id)
		.await
		.map(Json)
		.map_err(|e| state.reject("Action lookup", e))
}

async fn perform_action(
	State(state): State<AppState>,
	Caller(actor): Caller,
	Path(id): Path<u64>,
	Json(request): Json<ActionRequest>,
) -> Result<Json<OrderOperationResponse>, APIError> {
	state
		.engine
		.perform_action(&actor, id, request.action, request.expected_state)
		.await
		.map(|report| Json(report.into()))
		.map_err(|e| state.reject("Order action", e))
}
