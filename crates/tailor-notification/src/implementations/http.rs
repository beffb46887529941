//! Delivery through the shop's email endpoint.
//!
//! Posts `{username, subject, message}` to the configured URL. The endpoint
//! resolves the username to an address and sends the mail.

use crate::{
	NotificationError, NotificationFactory, NotificationInterface, NotificationRegistry,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tailor_types::{
	http_url, ConfigSchema, Field, FieldType, ImplementationRegistry, Notification, Schema,
	SecretString, ValidationError,
};

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Serialize)]
struct EmailRequest<'a> {
	username: &'a str,
	subject: &'a str,
	message: &'a str,
}

pub struct HttpNotifier {
	client: reqwest::Client,
	endpoint: String,
	api_token: Option<SecretString>,
}

impl HttpNotifier {
	pub fn new(
		endpoint: String,
		api_token: Option<SecretString>,
		timeout: Duration,
	) -> Result<Self, NotificationError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| NotificationError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			endpoint,
			api_token,
		})
	}
}

#[async_trait]
impl NotificationInterface for HttpNotifier {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpNotifierSchema)
	}

	async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
		let body = EmailRequest {
			username: &notification.recipient,
			subject: &notification.subject,
			message: &notification.body,
		};

		let mut request = self.client.post(&self.endpoint).json(&body);
		if let Some(token) = &self.api_token {
			request = request.header(reqwest::header::AUTHORIZATION, token.bearer());
		}

		let response = request
			.send()
			.await
			.map_err(|e| NotificationError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(());
		}
		let body = response.text().await.unwrap_or_default();
		Err(NotificationError::Rejected {
			status: status.as_u16(),
			body,
		})
	}
}

pub struct HttpNotifierSchema;

impl ConfigSchema for HttpNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("endpoint", FieldType::String).with_validator(http_url)],
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

/// Builds the HTTP notifier.
///
/// Options:
/// - `endpoint` (required): URL of the email endpoint
/// - `api_token`: bearer token
/// - `timeout_seconds`: request timeout (default 10)
pub fn create_notifier(
	config: &toml::Value,
) -> Result<Box<dyn NotificationInterface>, NotificationError> {
	HttpNotifierSchema
		.validate(config)
		.map_err(|e| NotificationError::Configuration(e.to_string()))?;

	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.ok_or_else(|| NotificationError::Configuration("endpoint is required".into()))?
		.to_string();
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

	Ok(Box::new(HttpNotifier::new(
		endpoint,
		api_token,
		Duration::from_secs(timeout),
	)?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = NotificationFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotificationRegistry for Registry {}
