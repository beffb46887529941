//! Backend that talks to the shop's existing HTTP API.
//!
//! All routes live under `<base_url>/api/users/`. Status values are written
//! in the spelling that API stores (`Pending`, `in_progress`, `fitting`,
//! `Completed`). List results are filtered and sorted again locally so both
//! backends answer an [`OrderQuery`] the same way.

use crate::{BackendError, BackendFactory, BackendInterface, BackendRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tailor_storage::StorageService;
use tailor_types::{
	http_url, ConfigSchema, DashboardMetrics, Field, FieldType, ImplementationRegistry,
	Measurement, Order, OrderDraft, OrderEdit, OrderQuery, OrderStatus, Profile, ProfileUpdate,
	Schema, SecretString, StatusBucket, ValidationError,
};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const UNSPECIFIED_COLOR: &str = "Not specified";

pub struct RemoteBackend {
	client: reqwest::Client,
	base_url: String,
	api_token: Option<SecretString>,
}

impl RemoteBackend {
	pub fn new(
		base_url: &str,
		api_token: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, BackendError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| BackendError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
			api_token,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/api/users/{}", self.base_url, path)
	}

	fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
		match &self.api_token {
			Some(token) => request.header(reqwest::header::AUTHORIZATION, token.bearer()),
			None => request,
		}
	}

	async fn execute(
		&self,
		request: RequestBuilder,
		what: &str,
	) -> Result<reqwest::Response, BackendError> {
		let response = self
			.authorize(request)
			.send()
			.await
			.map_err(|e| BackendError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		let body = response.text().await.unwrap_or_default();
		tracing::debug!(status = status.as_u16(), what, "Backend request failed");
		Err(match status {
			StatusCode::NOT_FOUND => BackendError::NotFound(what.to_string()),
			StatusCode::CONFLICT => BackendError::Conflict(if body.is_empty() {
				what.to_string()
			} else {
				body
			}),
			_ => BackendError::Rejected {
				status: status.as_u16(),
				body,
			},
		})
	}

	async fn fetch<T: DeserializeOwned>(
		&self,
		request: RequestBuilder,
		what: &str,
	) -> Result<T, BackendError> {
		self.execute(request, what)
			.await?
			.json::<T>()
			.await
			.map_err(|e| BackendError::Serialization(format!("{}: {}", what, e)))
	}

	async fn send(&self, request: RequestBuilder, what: &str) -> Result<(), BackendError> {
		self.execute(request, what).await.map(|_| ())
	}
}

/// Wire form of an order as the shop API expects it.
fn order_payload(order: &Order) -> Value {
	json!({
		"username": order.client,
		"client": order.client,
		"event_type": order.event_type,
		"preferred_Color": order.preferred_color.as_deref().unwrap_or(UNSPECIFIED_COLOR),
		"material": order.material,
		"measurements": order.measurements,
		"comments": order.comments,
		"expected_date": order.expected_date,
	})
}

fn draft_payload(draft: &OrderDraft) -> Value {
	json!({
		"username": draft.client,
		"client": draft.client,
		"event_type": draft.event_type,
		"preferred_Color": draft.preferred_color.as_deref().unwrap_or(UNSPECIFIED_COLOR),
		"material": draft.material,
		"measurements": draft.measurements,
		"comments": draft.comments,
		"expected_date": draft.expected_date,
	})
}

/// Reverses the placeholder the shop API stores for a missing color.
fn normalize(mut order: Order) -> Order {
	if order.preferred_color.as_deref() == Some(UNSPECIFIED_COLOR) {
		order.preferred_color = None;
	}
	order
}

/// The measurement view answers with a record, a one-element list, or `{}`.
fn measurement_from_value(value: Value, username: &str) -> Result<Measurement, BackendError> {
	let record = match value {
		Value::Array(items) => items.into_iter().next(),
		Value::Object(map) if map.is_empty() => None,
		other => Some(other),
	};
	let mut record = record
		.ok_or_else(|| BackendError::NotFound(format!("measurements for {}", username)))?;
	if let Value::Object(map) = &mut record {
		map.entry("username")
			.or_insert_with(|| Value::String(username.to_string()));
	}
	serde_json::from_value(record).map_err(|e| BackendError::Serialization(e.to_string()))
}

#[async_trait]
impl BackendInterface for RemoteBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RemoteBackendSchema)
	}

	/// Buckets are always applied here, never by the shop API, whose `pending`
	/// means "unconfirmed". Administrators fetch every order.
	async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError> {
		let request = match &query.client {
			Some(client) => self
				.client
				.get(self.url("orders/"))
				.query(&[("username", client.as_str())]),
			None => self
				.client
				.get(self.url("admin/orders"))
				.query(&[("type", StatusBucket::All.as_str())]),
		};
		let orders: Vec<Order> = self.fetch(request, "orders").await?;
		Ok(query.apply(orders.into_iter().map(normalize).collect()))
	}

	async fn get_order(&self, id: u64) -> Result<Order, BackendError> {
		let request = self.client.get(self.url(&format!("orders/view/{}/", id)));
		self.fetch(request, &format!("order {}", id))
			.await
			.map(normalize)
	}

	async fn create_order(&self, draft: OrderDraft) -> Result<Order, BackendError> {
		let request = self
			.client
			.post(self.url("orders/new/"))
			.json(&draft_payload(&draft));
		self.fetch(request, "new order").await.map(normalize)
	}

	async fn update_order(&self, id: u64, edit: &OrderEdit) -> Result<Order, BackendError> {
		let mut order = self.get_order(id).await?;
		edit.apply(&mut order);
		let request = self
			.client
			.put(self.url(&format!("orders/update/{}/", id)))
			.json(&order_payload(&order));
		self.send(request, &format!("order {}", id)).await?;
		self.get_order(id).await
	}

	async fn update_status(
		&self,
		id: u64,
		status: OrderStatus,
		completed_at: Option<DateTime<Utc>>,
	) -> Result<Order, BackendError> {
		let mut body = json!({ "status": status.backend_str() });
		if let Some(at) = completed_at {
			body["completed"] = Value::Bool(true);
			body["completed_at"] = json!(at);
		}
		let request = self
			.client
			.put(self.url(&format!("orders/updatestatus/{}/", id)))
			.json(&body);
		self.send(request, &format!("order {}", id)).await?;
		self.get_order(id).await
	}

	async fn confirm_order(&self, id: u64, client: &str) -> Result<Order, BackendError> {
		let request = self
			.client
			.post(self.url(&format!("orders/confirm/{}/", id)))
			.json(&json!({ "client": client }));
		self.send(request, &format!("order {}", id)).await?;
		self.get_order(id).await
	}

	async fn delete_order(&self, id: u64) -> Result<(), BackendError> {
		let request = self
			.client
			.post(self.url(&format!("orders/delete/{}/", id)));
		self.send(request, &format!("order {}", id)).await
	}

	async fn dashboard_metrics(&self) -> Result<DashboardMetrics, BackendError> {
		let request = self.client.get(self.url("admin/dashboard"));
		self.fetch(request, "dashboard").await
	}

	async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
		let request = self.client.get(self.url("userprofile"));
		self.fetch(request, "profiles").await
	}

	async fn get_profile(&self, username: &str) -> Result<Profile, BackendError> {
		let request = self
			.client
			.get(self.url(&format!("profile/{}/", username)));
		self.fetch(request, &format!("profile {}", username)).await
	}

	async fn create_profile(&self, profile: Profile) -> Result<Profile, BackendError> {
		let request = self.client.post(self.url("signup/")).json(&profile);
		self.send(request, &format!("profile {}", profile.username))
			.await?;
		Ok(profile)
	}

	async fn update_profile(
		&self,
		username: &str,
		update: &ProfileUpdate,
	) -> Result<Profile, BackendError> {
		let mut profile = self.get_profile(username).await?;
		update.apply(&mut profile);
		let request = self
			.client
			.put(self.url(&format!("profile/{}/", username)))
			.json(&profile);
		self.send(request, &format!("profile {}", username)).await?;
		Ok(profile)
	}

	async fn delete_profile(&self, username: &str) -> Result<(), BackendError> {
		let request = self
			.client
			.delete(self.url(&format!("profile/{}/", username)));
		self.send(request, &format!("profile {}", username)).await
	}

	async fn get_measurement(&self, username: &str) -> Result<Measurement, BackendError> {
		let request = self
			.client
			.get(self.url("measurements/view/"))
			.query(&[("username", username)]);
		let value: Value = self
			.fetch(request, &format!("measurements for {}", username))
			.await?;
		measurement_from_value(value, username)
	}

	async fn create_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError> {
		let request = self
			.client
			.post(self.url("measurements/new/"))
			.json(&measurement);
		self.send(
			request,
			&format!("measurements for {}", measurement.username),
		)
		.await?;
		Ok(measurement)
	}

	async fn update_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError> {
		let mut current = self.get_measurement(&measurement.username).await?;
		current.merge(&measurement);
		let request = self
			.client
			.put(self.url("measurements/update/"))
			.json(&current);
		self.send(request, &format!("measurements for {}", current.username))
			.await?;
		Ok(current)
	}
}

pub struct RemoteBackendSchema;

impl ConfigSchema for RemoteBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(http_url)],
			vec![
				Field::new("api_token", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
			],
		)
		.validate(config)
	}
}

/// Builds the remote backend.
///
/// Options:
/// - `base_url` (required): root URL of the shop API
/// - `api_token`: bearer token
/// - `timeout_seconds`: request timeout (default 30)
pub fn create_backend(
	config: &toml::Value,
	_storage: Arc<StorageService>,
) -> Result<Box<dyn BackendInterface>, BackendError> {
	RemoteBackendSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| BackendError::Configuration("base_url is required".into()))?;
	let api_token = config
		.get("api_token")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.filter(|t| !t.is_empty());
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|s| s as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(RemoteBackend::new(
		base_url,
		api_token,
		Duration::from_secs(timeout),
	)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "remote";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn backend(server: &MockServer) -> RemoteBackend {
		RemoteBackend::new(
			&format!("{}/", server.uri()),
			Some(SecretString::from("shop-token")),
			Duration::from_secs(5),
		)
		.unwrap()
	}

	fn order_json(id: u64, status: &str, confirmed: bool) -> Value {
		json!({
			"id": id,
			"client": "ada",
			"event_type": "Wedding",
			"preferred_Color": "Not specified",
			"material": false,
			"measurements": "chest 40",
			"comments": "No additional comments",
			"expected_date": "2030-06-01",
			"order_date": "2030-05-01T09:30:00Z",
			"is_confirmed": confirmed,
			"status": status,
		})
	}

	#[tokio::test]
	async fn test_get_order_reads_legacy_fields() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/users/orders/view/4/"))
			.and(header("authorization", "Bearer shop-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(order_json(4, "in_progress", true)))
			.mount(&server)
			.await;

		let order = backend(&server).get_order(4).await.unwrap();
		assert_eq!(order.status, OrderStatus::InProgress);
		assert!(order.is_confirmed);
		assert_eq!(order.preferred_color, None);
	}

	#[tokio::test]
	async fn test_missing_order_maps_to_not_found() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		assert!(matches!(
			backend(&server).get_order(99).await,
			Err(BackendError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_create_sends_both_client_fields() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/users/orders/new/"))
			.and(body_json(json!({
				"username": "ada",
				"client": "ada",
				"event_type": "Wedding",
				"preferred_Color": "Not specified",
				"material": false,
				"measurements": "chest 40",
				"comments": "No additional comments",
				"expected_date": "2030-06-01",
			})))
			.respond_with(ResponseTemplate::new(201).set_body_json(order_json(12, "Pending", false)))
			.expect(1)
			.mount(&server)
			.await;

		let draft = OrderDraft {
			client: "ada".to_string(),
			event_type: "Wedding".to_string(),
			preferred_color: None,
			material: false,
			measurements: "chest 40".to_string(),
			comments: "No additional comments".to_string(),
			expected_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
		};
		let order = backend(&server).create_order(draft).await.unwrap();
		assert_eq!(order.id, 12);
		assert_eq!(order.status, OrderStatus::Pending);
	}

	#[tokio::test]
	async fn test_completion_writes_legacy_status() {
		let server = MockServer::start().await;
		Mock::given(method("PUT"))
			.and(path("/api/users/orders/updatestatus/4/"))
			.and(body_partial_json(json!({ "status": "Completed", "completed": true })))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/users/orders/view/4/"))
			.respond_with(ResponseTemplate::new(200).set_body_json(order_json(4, "Completed", true)))
			.mount(&server)
			.await;

		let order = backend(&server)
			.update_status(4, OrderStatus::Completed, Some(Utc::now()))
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::Completed);
	}

	#[tokio::test]
	async fn test_admin_list_fetches_all_and_buckets_locally() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/users/admin/orders"))
			.and(query_param("type", "all"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!([
				order_json(1, "fitting", true),
				order_json(2, "Pending", true),
				order_json(3, "Pending", false),
			])))
			.expect(3)
			.mount(&server)
			.await;
		let backend = backend(&server);

		let fitting = backend
			.list_orders(&OrderQuery::bucket(StatusBucket::Fitting))
			.await
			.unwrap();
		assert_eq!(fitting.len(), 1);
		assert_eq!(fitting[0].id, 1);

		// Confirmed and not started.
		let pending = backend
			.list_orders(&OrderQuery::bucket(StatusBucket::Pending))
			.await
			.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].id, 2);

		let unconfirmed = backend
			.list_orders(&OrderQuery::bucket(StatusBucket::Unconfirmed))
			.await
			.unwrap();
		assert_eq!(unconfirmed.len(), 1);
		assert_eq!(unconfirmed[0].id, 3);
	}

	#[tokio::test]
	async fn test_empty_measurement_view_is_not_found() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/users/measurements/view/"))
			.and(query_param("username", "ada"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
			.mount(&server)
			.await;

		assert!(matches!(
			backend(&server).get_measurement("ada").await,
			Err(BackendError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_measurement_view_accepts_list() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/users/measurements/view/"))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!([{ "chest": 40.0, "waist": 32.0 }])),
			)
			.mount(&server)
			.await;

		let measurement = backend(&server).get_measurement("ada").await.unwrap();
		assert_eq!(measurement.username, "ada");
		assert_eq!(measurement.chest, Some(40.0));
	}

	#[tokio::test]
	async fn test_server_error_is_unavailable() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
			.mount(&server)
			.await;

		let err = backend(&server).dashboard_metrics().await.unwrap_err();
		assert!(err.is_unavailable());
	}

	#[test]
	fn test_schema_requires_base_url() {
		let storage = Arc::new(StorageService::new(Box::new(
			tailor_storage::implementations::memory::MemoryStorage::new(),
		)));
		assert!(create_backend(&toml::Value::Table(Default::default()), storage).is_err());
	}
}
