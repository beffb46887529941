//! Notification sink that only writes to the log. For development setups
//! without a mail endpoint.

use crate::{
	NotificationError, NotificationFactory, NotificationInterface, NotificationRegistry,
};
use async_trait::async_trait;
use tailor_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Notification, Schema, ValidationError,
};

pub struct LogNotifier {
	include_body: bool,
}

impl LogNotifier {
	pub fn new(include_body: bool) -> Self {
		Self { include_body }
	}
}

#[async_trait]
impl NotificationInterface for LogNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}

	async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
		if self.include_body {
			tracing::info!(
				order_id = notification.order_id,
				recipient = %notification.recipient,
				subject = %notification.subject,
				body = %notification.body,
				"Notification"
			);
		} else {
			tracing::info!(
				order_id = notification.order_id,
				recipient = %notification.recipient,
				subject = %notification.subject,
				"Notification"
			);
		}
		Ok(())
	}
}

pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![Field::new("include_body", FieldType::Boolean)]).validate(config)
	}
}

pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;
	let include_body = config
		.get("include_body")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	Ok(Box::new(LogNotifier::new(include_body)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotificationRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tailor_types::NotificationKind;

	#[tokio::test]
	async fn test_always_succeeds() {
		let notifier = create_notifier(&toml::Value::Table(Default::default())).unwrap();
		let notification = Notification {
			recipient: "bob".to_string(),
			subject: "Order #3 Cancelled".to_string(),
			body: String::new(),
			kind: NotificationKind::Cancelled,
			order_id: 3,
		};
		assert!(notifier.send(&notification).await.is_ok());
	}

	#[test]
	fn test_rejects_non_boolean_option() {
		let config: toml::Value = toml::from_str("include_body = \"yes\"").unwrap();
		assert!(create_notifier(&config).is_err());
	}
}
