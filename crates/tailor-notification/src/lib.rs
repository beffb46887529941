//! Client notification delivery.
//!
//! Lifecycle transitions produce [`Notification`] descriptors; this crate
//! hands them to a delivery implementation. Delivery happens after the order
//! change is persisted, so a failure here is reported to the caller but never
//! undoes the change.

use async_trait::async_trait;
use tailor_types::{ConfigSchema, ImplementationRegistry, Notification};
use thiserror::Error;

pub mod implementations {
	pub mod http;
	pub mod log;
}

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
	/// The endpoint could not be reached or timed out.
	#[error("Network error: {0}")]
	Network(String),
	/// The endpoint answered with a non-success status.
	#[error("Notification rejected with status {status}: {body}")]
	Rejected { status: u16, body: String },
	#[error("Configuration error: {0}")]
	Configuration(String),
}

#[async_trait]
pub trait NotificationInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

pub type NotificationFactory =
	fn(&toml::Value) -> Result<Box<dyn NotificationInterface>, NotificationError>;

pub trait NotificationRegistry: ImplementationRegistry<Factory = NotificationFactory> {}

/// Returns `(name, factory)` for every notification implementation.
pub fn get_all_implementations() -> Vec<(&'static str, NotificationFactory)> {
	use implementations::{http, log};

	vec![
		(http::Registry::NAME, http::Registry::factory()),
		(log::Registry::NAME, log::Registry::factory()),
	]
}

/// Sends notifications through the configured implementation.
pub struct NotificationService {
	implementation: Box<dyn NotificationInterface>,
}

impl NotificationService {
	pub fn new(implementation: Box<dyn NotificationInterface>) -> Self {
		Self { implementation }
	}

	pub async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
		match self.implementation.send(notification).await {
			Ok(()) => {
				tracing::debug!(
					order_id = notification.order_id,
					recipient = %notification.recipient,
					kind = ?notification.kind,
					"Notification delivered"
				);
				Ok(())
			},
			Err(e) => {
				tracing::warn!(
					order_id = notification.order_id,
					recipient = %notification.recipient,
					error = %e,
					"Notification delivery failed"
				);
				Err(e)
			},
		}
	}
}
