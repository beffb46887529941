//! In-process backend on top of the storage service.
//!
//! Orders live under `orders:<id>`, profiles under `profiles:<username>` and
//! measurements under `measurements:<username>`. Order ids come from the
//! counter at `sequences:orders`.

use crate::{BackendError, BackendFactory, BackendInterface, BackendRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tailor_storage::{StorageError, StorageService};
use tailor_types::{
	ConfigSchema, DashboardMetrics, ImplementationRegistry, Measurement, Order, OrderDraft,
	OrderEdit, OrderQuery, OrderStatus, Profile, ProfileUpdate, Schema, StorageKey,
	ValidationError,
};
use tokio::sync::Mutex;

const ORDER_SEQUENCE: &str = "orders";

pub struct LocalBackend {
	storage: Arc<StorageService>,
	/// Serializes id allocation.
	sequence: Mutex<()>,
	/// Serializes read-check-write cycles on profiles and measurements.
	records: Mutex<()>,
}

impl LocalBackend {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			sequence: Mutex::new(()),
			records: Mutex::new(()),
		}
	}

	async fn next_order_id(&self) -> Result<u64, BackendError> {
		let _guard = self.sequence.lock().await;
		let namespace = StorageKey::Sequences.as_str();
		let current: u64 = match self.storage.retrieve(namespace, ORDER_SEQUENCE).await {
			Ok(value) => value,
			Err(StorageError::NotFound) => 0,
			Err(e) => return Err(storage_error(e, "order sequence")),
		};
		let next = current + 1;
		self.storage
			.store(namespace, ORDER_SEQUENCE, &next)
			.await
			.map_err(|e| storage_error(e, "order sequence"))?;
		Ok(next)
	}

	async fn save_order(&self, order: &Order) -> Result<(), BackendError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id.to_string(), order)
			.await
			.map_err(|e| storage_error(e, &format!("order {}", order.id)))
	}

	async fn all_orders(&self) -> Result<Vec<Order>, BackendError> {
		let entries = self
			.storage
			.retrieve_all::<Order>(StorageKey::Orders.as_str())
			.await
			.map_err(|e| storage_error(e, "orders"))?;
		Ok(entries.into_iter().map(|(_, order)| order).collect())
	}

	async fn all_profiles(&self) -> Result<Vec<Profile>, BackendError> {
		let entries = self
			.storage
			.retrieve_all::<Profile>(StorageKey::Profiles.as_str())
			.await
			.map_err(|e| storage_error(e, "profiles"))?;
		let mut profiles: Vec<Profile> = entries.into_iter().map(|(_, p)| p).collect();
		profiles.sort_by(|a, b| a.username.cmp(&b.username));
		Ok(profiles)
	}
}

fn storage_error(error: StorageError, what: &str) -> BackendError {
	match error {
		StorageError::NotFound => BackendError::NotFound(what.to_string()),
		StorageError::Serialization(e) => BackendError::Serialization(e),
		StorageError::Backend(e) | StorageError::Configuration(e) => BackendError::Storage(e),
	}
}

#[async_trait]
impl BackendInterface for LocalBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalBackendSchema)
	}

	async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError> {
		Ok(query.apply(self.all_orders().await?))
	}

	async fn get_order(&self, id: u64) -> Result<Order, BackendError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
			.map_err(|e| storage_error(e, &format!("order {}", id)))
	}

	async fn create_order(&self, draft: OrderDraft) -> Result<Order, BackendError> {
		let id = self.next_order_id().await?;
		let order = Order::from_draft(id, draft, Utc::now());
		self.save_order(&order).await?;
		Ok(order)
	}

	async fn update_order(&self, id: u64, edit: &OrderEdit) -> Result<Order, BackendError> {
		let mut order = self.get_order(id).await?;
		edit.apply(&mut order);
		self.save_order(&order).await?;
		Ok(order)
	}

	async fn update_status(
		&self,
		id: u64,
		status: OrderStatus,
		completed_at: Option<DateTime<Utc>>,
	) -> Result<Order, BackendError> {
		let mut order = self.get_order(id).await?;
		order.status = status;
		if completed_at.is_some() {
			order.completed_at = completed_at;
		}
		self.save_order(&order).await?;
		Ok(order)
	}

	async fn confirm_order(&self, id: u64, client: &str) -> Result<Order, BackendError> {
		let mut order = self.get_order(id).await?;
		if !order.is_owned_by(client) {
			return Err(BackendError::NotFound(format!(
				"order {} for client {}",
				id, client
			)));
		}
		order.is_confirmed = true;
		self.save_order(&order).await?;
		Ok(order)
	}

	async fn delete_order(&self, id: u64) -> Result<(), BackendError> {
		let namespace = StorageKey::Orders.as_str();
		let key = id.to_string();
		let what = format!("order {}", id);
		if !self
			.storage
			.exists(namespace, &key)
			.await
			.map_err(|e| storage_error(e, &what))?
		{
			return Err(BackendError::NotFound(what));
		}
		self.storage
			.remove(namespace, &key)
			.await
			.map_err(|e| storage_error(e, &what))
	}

	async fn dashboard_metrics(&self) -> Result<DashboardMetrics, BackendError> {
		let orders = self.all_orders().await?;
		let clients = self
			.all_profiles()
			.await?
			.iter()
			.filter(|p| p.is_client())
			.count() as u64;
		Ok(DashboardMetrics::from_orders(&orders, clients))
	}

	async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
		self.all_profiles().await
	}

	async fn get_profile(&self, username: &str) -> Result<Profile, BackendError> {
		self.storage
			.retrieve(StorageKey::Profiles.as_str(), username)
			.await
			.map_err(|e| storage_error(e, &format!("profile {}", username)))
	}

	async fn create_profile(&self, profile: Profile) -> Result<Profile, BackendError> {
		let namespace = StorageKey::Profiles.as_str();
		let what = format!("profile {}", profile.username);
		let _guard = self.records.lock().await;
		if self
			.storage
			.exists(namespace, &profile.username)
			.await
			.map_err(|e| storage_error(e, &what))?
		{
			return Err(BackendError::Conflict(format!("{} already exists", what)));
		}
		self.storage
			.store(namespace, &profile.username, &profile)
			.await
			.map_err(|e| storage_error(e, &what))?;
		Ok(profile)
	}

	async fn update_profile(
		&self,
		username: &str,
		update: &ProfileUpdate,
	) -> Result<Profile, BackendError> {
		let _guard = self.records.lock().await;
		let mut profile = self.get_profile(username).await?;
		update.apply(&mut profile);
		self.storage
			.update(StorageKey::Profiles.as_str(), username, &profile)
			.await
			.map_err(|e| storage_error(e, &format!("profile {}", username)))?;
		Ok(profile)
	}

	async fn delete_profile(&self, username: &str) -> Result<(), BackendError> {
		let what = format!("profile {}", username);
		let namespace = StorageKey::Profiles.as_str();
		let _guard = self.records.lock().await;
		if !self
			.storage
			.exists(namespace, username)
			.await
			.map_err(|e| storage_error(e, &what))?
		{
			return Err(BackendError::NotFound(what));
		}
		self.storage
			.remove(namespace, username)
			.await
			.map_err(|e| storage_error(e, &what))?;
		// Measurements belong to the profile; orders are kept for the shop's records.
		self.storage
			.remove(StorageKey::Measurements.as_str(), username)
			.await
			.map_err(|e| storage_error(e, &what))
	}

	async fn get_measurement(&self, username: &str) -> Result<Measurement, BackendError> {
		self.storage
			.retrieve(StorageKey::Measurements.as_str(), username)
			.await
			.map_err(|e| storage_error(e, &format!("measurements for {}", username)))
	}

	async fn create_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError> {
		let namespace = StorageKey::Measurements.as_str();
		let what = format!("measurements for {}", measurement.username);
		let _guard = self.records.lock().await;
		if self
			.storage
			.exists(namespace, &measurement.username)
			.await
			.map_err(|e| storage_error(e, &what))?
		{
			return Err(BackendError::Conflict(format!("{} already exist", what)));
		}
		self.storage
			.store(namespace, &measurement.username, &measurement)
			.await
			.map_err(|e| storage_error(e, &what))?;
		Ok(measurement)
	}

	async fn update_measurement(
		&self,
		measurement: Measurement,
	) -> Result<Measurement, BackendError> {
		let _guard = self.records.lock().await;
		let mut current = self.get_measurement(&measurement.username).await?;
		current.merge(&measurement);
		self.storage
			.update(
				StorageKey::Measurements.as_str(),
				&current.username,
				&current,
			)
			.await
			.map_err(|e| storage_error(e, &format!("measurements for {}", current.username)))?;
		Ok(current)
	}
}

pub struct LocalBackendSchema;

impl ConfigSchema for LocalBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Builds the local backend. It takes no options of its own.
pub fn create_backend(
	config: &toml::Value,
	storage: Arc<StorageService>,
) -> Result<Box<dyn BackendInterface>, BackendError> {
	LocalBackendSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;
	Ok(Box::new(LocalBackend::new(storage)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = BackendFactory;

	fn factory() -> Self::Factory {
		create_backend
	}
}

impl BackendRegistry for Registry {}
