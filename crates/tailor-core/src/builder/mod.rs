//! Builder for constructing tailor engines.
//!
//! Every implementation configured in a section is created through its
//! factory, which validates its options. The section's `primary` becomes the
//! live implementation.

use crate::engine::{event_bus::EventBus, TailorEngine};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tailor_backend::{BackendError, BackendInterface, BackendService};
use tailor_config::Config;
use tailor_notification::{NotificationError, NotificationInterface, NotificationService};
use tailor_storage::{StorageError, StorageInterface, StorageService};
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct TailorFactories<SF, BF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub backend_factories: HashMap<String, BF>,
	pub notification_factories: HashMap<String, NF>,
}

pub struct TailorBuilder {
	config: Config,
}

impl TailorBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub fn build<SF, BF, NF>(
		self,
		factories: TailorFactories<SF, BF, NF>,
	) -> Result<TailorEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		BF: Fn(
			&toml::Value,
			Arc<StorageService>,
		) -> Result<Box<dyn BackendInterface>, BackendError>,
		NF: Fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>,
	{
		let storage_backend = load_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			|name, config| {
				factories
					.storage_factories
					.get(name)
					.map(|factory| factory(config))
			},
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let backend = load_primary(
			"backend",
			&self.config.backend.primary,
			&self.config.backend.implementations,
			|name, config| {
				factories
					.backend_factories
					.get(name)
					.map(|factory| factory(config, storage.clone()))
			},
		)?;
		let backend = Arc::new(BackendService::new(backend));

		let notifier = load_primary(
			"notification",
			&self.config.notification.primary,
			&self.config.notification.implementations,
			|name, config| {
				factories
					.notification_factories
					.get(name)
					.map(|factory| factory(config))
			},
		)?;
		let notifier = Arc::new(NotificationService::new(notifier));

		Ok(TailorEngine::new(
			self.config,
			storage,
			backend,
			notifier,
			EventBus::default(),
		))
	}
}

/// Creates every configured implementation of one component and returns the primary.
fn load_primary<T, E, F>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	create: F,
) -> Result<T, BuilderError>
where
	E: Display,
	F: Fn(&str, &toml::Value) -> Option<Result<T, E>>,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		match create(name, config) {
			Some(Ok(implementation)) => {
				let is_primary = name == primary;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Some(Err(e)) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
			None => {
				tracing::warn!(component, implementation = %name, "Unknown implementation, skipping");
			},
		}
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"primary {} '{}' failed to load or is not a known implementation",
			component, primary
		))
	})
}
