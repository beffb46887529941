//! Order, profile and measurement store.
//!
//! The backend is the system of record. It either lives in this process on
//! top of `tailor-storage` (`local`) or is the shop's existing HTTP backend
//! (`remote`). Backends store what they are told; lifecycle rules are
//! enforced by the engine before any write reaches them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tailor_storage::StorageService;
use tailor_types::{
	ConfigSchema, DashboardMetrics, ImplementationRegistry, Measurement, Order, OrderDraft,
	OrderEdit, OrderQuery, OrderStatus, Profile, ProfileUpdate,
};
use thiserror::Error;

pub mod implementations {
	pub mod local;
	pub mod remote;
}

/// Errors that can occur during backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
	#[error("Not found: {0}")]
	NotFound(String),
	/// A record with the same key already exists.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The remote backend refused the request.
	#[error("Backend rejected request with status {status}: {body}")]
	Rejected { status: u16, body: String },
	#[error("Network error: {0}")]
	Network(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl BackendError {
	/// Whether the failure is an outage rather than a problem with the request.
	pub fn is_unavailable(&self) -> bool {
		match self {
			BackendError::Network(_) | BackendError::Storage(_) => true,
			BackendError::Rejected { status, .. } => *status >= 500,
			_ => false,
		}
	}
}

#[async_trait]
pub trait BackendInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError>;

	async fn get_order(&self, id: u64) -> Result<Order, BackendError>;

	/// Persists a new order and returns it with its assigned id and order date.
	async fn create_order(&self, draft: OrderDraft) -> Result<Order, BackendError>;

	async fn update_order(&self, id: u64, edit: &OrderEdit) -> Result<Order, BackendError>;

	/// Writes a new status. `completed_at` is set when the order is completed.
	async fn update_status(
		&self,
		id: u64,
		status: OrderStatus,
		completed_at: Option<DateTime<Utc>>,
	) -> Result<Order, BackendError>;

	/// Marks the order confirmed on behalf of `client`.
	async fn confirm_order(&self, id: u64, client: &str) -> Result<Order, BackendError>;

	async fn delete_order(&self, id: u64) -> Result<(), BackendError>;

	async fn dashboard_metrics(&self) -> Result<DashboardMetrics, BackendError>;

	async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError>;

	async fn get_profile(&self, username: &str) -> Result<Profile, BackendError>;

	async fn create_profile(&self, profile: Profile) -> Result<Profile, BackendError>;

	async fn update_profile(
		&self,
		username: &str,
		update: &ProfileUpdate,
	) -> Result<Profile, BackendError>;

	async fn delete_profile(&self, username: &str) -> Result<(), BackendError>;

	async fn get_measurement(&self, username: &str) -> Result<Measurement, BackendError>;

	/// `Conflict` when the user already has a record.
	async fn create_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError>;

	/// Overwrites the fields present in `measurement`; `NotFound` when there is no record.
	async fn update_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError>;
}

pub type BackendFactory =
	fn(&toml::Value, Arc<StorageService>) -> Result<Box<dyn BackendInterface>, BackendError>;

pub trait BackendRegistry: ImplementationRegistry<Factory = BackendFactory> {}

/// Returns `(name, factory)` for every backend implementation.
pub fn get_all_implementations() -> Vec<(&'static str, BackendFactory)> {
	use implementations::{local, remote};

	vec![
		(local::Registry::NAME, local::Registry::factory()),
		(remote::Registry::NAME, remote::Registry::factory()),
	]
}

/// Entry point the engine uses to reach the configured backend.
pub struct BackendService {
	implementation: Box<dyn BackendInterface>,
}

impl BackendService {
	pub fn new(implementation: Box<dyn BackendInterface>) -> Self {
		Self { implementation }
	}

	pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError> {
		self.implementation.list_orders(query).await
	}

	pub async fn get_order(&self, id: u64) -> Result<Order, BackendError> {
		self.implementation.get_order(id).await
	}

	pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, BackendError> {
		let order = self.implementation.create_order(draft).await?;
		tracing::debug!(order_id = order.id, client = %order.client, "Order stored");
		Ok(order)
	}

	pub async fn update_order(&self, id: u64, edit: &OrderEdit) -> Result<Order, BackendError> {
		self.implementation.update_order(id, edit).await
	}

	pub async fn update_status(
		&self,
		id: u64,
		status: OrderStatus,
		completed_at: Option<DateTime<Utc>>,
	) -> Result<Order, BackendError> {
		self.implementation
			.update_status(id, status, completed_at)
			.await
	}

	pub async fn confirm_order(&self, id: u64, client: &str) -> Result<Order, BackendError> {
		self.implementation.confirm_order(id, client).await
	}

	pub async fn delete_order(&self, id: u64) -> Result<(), BackendError> {
		self.implementation.delete_order(id).await
	}

	pub async fn dashboard_metrics(&self) -> Result<DashboardMetrics, BackendError> {
		self.implementation.dashboard_metrics().await
	}

	pub async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
		self.implementation.list_profiles().await
	}

	pub async fn get_profile(&self, username: &str) -> Result<Profile, BackendError> {
		self.implementation.get_profile(username).await
	}

	pub async fn create_profile(&self, profile: Profile) -> Result<Profile, BackendError> {
		self.implementation.create_profile(profile).await
	}

	pub async fn update_profile(
		&self,
		username: &str,
		update: &ProfileUpdate,
	) -> Result<Profile, BackendError> {
		self.implementation.update_profile(username, update).await
	}

	pub async fn delete_profile(&self, username: &str) -> Result<(), BackendError> {
		self.implementation.delete_profile(username).await
	}

	pub async fn get_measurement(&self, username: &str) -> Result<Measurement, BackendError> {
		self.implementation.get_measurement(username).await
	}

	pub async fn create_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError> {
		self.implementation.create_measurement(measurement).await
	}

	pub async fn update_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError> {
		self.implementation.update_measurement(measurement).await
	}
}
