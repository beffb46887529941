//! Fluent builder for in-memory `Config` values used in tests.

use crate::{
	ApiConfig, BackendConfig, Config, LifecycleConfig, NotificationConfig, ServiceConfig,
	StorageConfig,
};
use std::collections::HashMap;

/// Builds a `Config` wired to the memory storage, local backend and log
/// notifier unless told otherwise.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	shop_name: String,
	storage_primary: String,
	backend_primary: String,
	notification_primary: String,
	implementation_overrides: HashMap<(String, String), toml::Value>,
	lifecycle: LifecycleConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			service_id: "tailor-test".to_string(),
			shop_name: "JFK Tailor Shop".to_string(),
			storage_primary: "memory".to_string(),
			backend_primary: "local".to_string(),
			notification_primary: "log".to_string(),
			implementation_overrides: HashMap::new(),
			lifecycle: LifecycleConfig::default(),
			api: None,
		}
	}

	pub fn shop_name(mut self, name: impl Into<String>) -> Self {
		self.shop_name = name.into();
		self
	}

	pub fn storage_primary(mut self, primary: impl Into<String>) -> Self {
		self.storage_primary = primary.into();
		self
	}

	pub fn backend_primary(mut self, primary: impl Into<String>) -> Self {
		self.backend_primary = primary.into();
		self
	}

	pub fn notification_primary(mut self, primary: impl Into<String>) -> Self {
		self.notification_primary = primary.into();
		self
	}

	/// Sets the TOML table of one implementation, e.g. `("notification", "http")`.
	pub fn implementation(
		mut self,
		section: impl Into<String>,
		name: impl Into<String>,
		config: toml::Value,
	) -> Self {
		self.implementation_overrides
			.insert((section.into(), name.into()), config);
		self
	}

	pub fn optimistic_concurrency(mut self, enabled: bool) -> Self {
		self.lifecycle.optimistic_concurrency = enabled;
		self
	}

	pub fn notify_on_create(mut self, enabled: bool) -> Self {
		self.lifecycle.notify_on_create = enabled;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let overrides = self.implementation_overrides;
		let section = |name: &str, primary: &str| {
			let mut implementations = HashMap::new();
			implementations.insert(
				primary.to_string(),
				toml::Value::Table(toml::map::Map::new()),
			);
			for ((section, implementation), value) in &overrides {
				if section == name {
					implementations.insert(implementation.clone(), value.clone());
				}
			}
			implementations
		};

		Config {
			service: ServiceConfig {
				id: self.service_id,
				shop_name: self.shop_name,
			},
			storage: StorageConfig {
				implementations: section("storage", &self.storage_primary),
				primary: self.storage_primary,
				cleanup_interval_seconds: 60,
			},
			backend: BackendConfig {
				implementations: section("backend", &self.backend_primary),
				primary: self.backend_primary,
			},
			notification: NotificationConfig {
				implementations: section("notification", &self.notification_primary),
				primary: self.notification_primary,
			},
			lifecycle: self.lifecycle,
			api: self.api,
		}
	}
}
