//! Tailor engine that executes order, profile and measurement operations.
//!
//! The engine ties the lifecycle controller to the configured backend and
//! notification delivery. Lifecycle writes follow a fixed sequence: load the
//! latest snapshot, check legality, persist with a single backend call, then
//! announce the change and notify the client. A failed notification is
//! reported alongside the successful write and never undoes it.

pub mod event_bus;

use crate::lifecycle::{LifecycleError, OrderLifecycle, Outcome, Transition};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tailor_backend::{BackendError, BackendService};
use tailor_config::Config;
use tailor_notification::NotificationService;
use tailor_storage::StorageService;
use tailor_types::{
	is_valid_username, Action, Actor, AvailableActionsResponse, DashboardMetrics, FormError,
	LifecycleState, Measurement, NewOrder, NewProfile, Notification, NotificationStatus, Order,
	OrderEdit, OrderEvent, OrderOperationResponse, OrderQuery, Profile, ProfileUpdate,
	TailorEvent,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::instrument;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	IllegalTransition(#[from] LifecycleError),
	/// The stored order moved on since the caller last looked at it.
	#[error("Order {order_id} is '{actual}', expected '{expected}'")]
	StaleState {
		order_id: u64,
		expected: LifecycleState,
		actual: LifecycleState,
	},
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Forbidden: {0}")]
	Forbidden(String),
	#[error("Validation failed: {0}")]
	Validation(#[from] FormError),
	/// The backend could not record the change. The stored state is unchanged.
	#[error("Persistence failure: {0}")]
	Persistence(String),
	#[error("Backend error: {0}")]
	Backend(String),
}

impl From<BackendError> for EngineError {
	fn from(error: BackendError) -> Self {
		match error {
			BackendError::NotFound(what) => EngineError::NotFound(what),
			BackendError::Conflict(what) => EngineError::Conflict(what),
			e if e.is_unavailable() => EngineError::Persistence(e.to_string()),
			e => EngineError::Backend(e.to_string()),
		}
	}
}

/// Outcome of a create, edit or lifecycle action.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionReport {
	/// The stored order, `None` after deletion.
	pub order: Option<Order>,
	pub from: Option<LifecycleState>,
	pub to: Option<LifecycleState>,
	pub notification: NotificationStatus,
}

impl From<TransitionReport> for OrderOperationResponse {
	fn from(report: TransitionReport) -> Self {
		let warning = match &report.notification {
			NotificationStatus::Failed { reason } => Some(format!(
				"The order was updated but the client could not be notified: {}",
				reason
			)),
			_ => None,
		};
		OrderOperationResponse {
			order: report.order,
			from: report.from,
			to: report.to,
			notification: report.notification,
			warning,
		}
	}
}

/// Main engine behind the HTTP API.
#[derive(Clone)]
pub struct TailorEngine {
	pub(crate) config: Config,
	/// Backing storage, purged periodically by [`run`](Self::run).
	pub(crate) storage: Arc<StorageService>,
	pub(crate) backend: Arc<BackendService>,
	pub(crate) notifier: Arc<NotificationService>,
	pub(crate) lifecycle: Arc<OrderLifecycle>,
	pub(crate) event_bus: event_bus::EventBus,
	/// One order write in flight per engine.
	write_lock: Arc<Mutex<()>>,
}

impl TailorEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		backend: Arc<BackendService>,
		notifier: Arc<NotificationService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let lifecycle = Arc::new(OrderLifecycle::new(config.service.shop_name.clone()));
		Self {
			config,
			storage,
			backend,
			notifier,
			lifecycle,
			event_bus,
			write_lock: Arc::new(Mutex::new(())),
		}
	}

	/// Background loop: logs bus events and purges expired storage entries
	/// until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut events = self.event_bus.subscribe();

		let storage = self.storage.clone();
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			loop {
				cleanup_interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(event) => log_event(&event),
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event listener lagged behind");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				},

				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		cleanup_handle.abort();
		Ok(())
	}

	/// Orders visible to `actor`. Clients only ever see their own.
	#[instrument(skip_all, fields(actor = %actor.username))]
	pub async fn list_orders(
		&self,
		actor: &Actor,
		mut query: OrderQuery,
	) -> Result<Vec<Order>, EngineError> {
		if !actor.is_admin() {
			query.client = Some(actor.username.clone());
		}
		Ok(self.backend.list_orders(&query).await?)
	}

	#[instrument(skip_all, fields(order_id = id, actor = %actor.username))]
	pub async fn get_order(&self, actor: &Actor, id: u64) -> Result<Order, EngineError> {
		let order = self.backend.get_order(id).await?;
		if !actor.can_access(&order.client) {
			return Err(EngineError::Forbidden(format!(
				"order {} belongs to another client",
				id
			)));
		}
		Ok(order)
	}

	/// Places a new order. Clients order for themselves; administrators name the client.
	#[instrument(skip_all, fields(actor = %actor.username))]
	pub async fn create_order(
		&self,
		actor: &Actor,
		submission: NewOrder,
		today: NaiveDate,
	) -> Result<TransitionReport, EngineError> {
		let client = if actor.is_admin() {
			submission.client.clone().unwrap_or_default()
		} else {
			match submission.client.as_deref().map(str::trim) {
				Some(other) if !other.is_empty() && other != actor.username => {
					return Err(EngineError::Forbidden(
						"clients may only place orders for themselves".into(),
					));
				},
				_ => actor.username.clone(),
			}
		};
		let draft = submission.into_draft(client, today)?;

		let order = {
			let _guard = self.write_lock.lock().await;
			self.backend.create_order(draft).await?
		};
		tracing::info!(order_id = order.id, client = %order.client, "Order placed");
		self.event_bus
			.publish(TailorEvent::Order(OrderEvent::Created {
				order: order.clone(),
			}));

		let notification = if self.config.lifecycle.notify_on_create {
			self.dispatch(self.lifecycle.creation_notice(&order)).await
		} else {
			NotificationStatus::NotRequired
		};

		Ok(TransitionReport {
			to: Some(order.lifecycle_state()),
			order: Some(order),
			from: None,
			notification,
		})
	}

	/// Changes the details of an unconfirmed order on behalf of its owner.
	#[instrument(skip_all, fields(order_id = id, actor = %actor.username))]
	pub async fn edit_order(
		&self,
		actor: &Actor,
		id: u64,
		edit: OrderEdit,
		expected_state: Option<LifecycleState>,
	) -> Result<TransitionReport, EngineError> {
		edit.validate()?;

		let _guard = self.write_lock.lock().await;
		let current = self.backend.get_order(id).await?;
		self.check_expected_state(&current, expected_state)?;
		let transition = self
			.lifecycle
			.request_transition(&current, actor, Action::Edit)?;

		let order = self.backend.update_order(id, &edit).await.map_err(persistence)?;
		self.event_bus
			.publish(TailorEvent::Order(OrderEvent::Edited {
				order: order.clone(),
			}));

		Ok(TransitionReport {
			order: Some(order),
			from: Some(transition.from),
			to: transition.to,
			notification: NotificationStatus::NotRequired,
		})
	}

	/// Runs a lifecycle action (confirm, delete or one of the advances).
	///
	/// When `expected_state` is given and optimistic concurrency is enabled,
	/// the action only proceeds if the stored order is still in that state.
	#[instrument(skip_all, fields(order_id = id, action = %action, actor = %actor.username))]
	pub async fn perform_action(
		&self,
		actor: &Actor,
		id: u64,
		action: Action,
		expected_state: Option<LifecycleState>,
	) -> Result<TransitionReport, EngineError> {
		if action == Action::Edit {
			return Err(EngineError::Validation(FormError::single(
				"action",
				"Order details are changed through the edit operation",
			)));
		}

		let guard = self.write_lock.lock().await;
		let current = self.backend.get_order(id).await?;
		self.check_expected_state(&current, expected_state)?;
		let transition = self.lifecycle.request_transition(&current, actor, action)?;
		let stored = self.persist(&transition).await?;
		drop(guard);

		tracing::info!(
			from = %transition.from,
			to = transition.to.map(|s| s.as_str()).unwrap_or("removed"),
			"Order transitioned"
		);
		let event = match (&stored, transition.to) {
			(Some(order), Some(to)) => OrderEvent::Transitioned {
				order: order.clone(),
				action,
				from: transition.from,
				to,
			},
			_ => OrderEvent::Deleted {
				order_id: id,
				client: current.client.clone(),
			},
		};
		self.event_bus.publish(TailorEvent::Order(event));

		let notification = match transition.notification {
			Some(notification) => self.dispatch(notification).await,
			None => NotificationStatus::NotRequired,
		};

		Ok(TransitionReport {
			order: stored,
			from: Some(transition.from),
			to: transition.to,
			notification,
		})
	}

	/// Legal actions for `actor` on the order right now.
	#[instrument(skip_all, fields(order_id = id, actor = %actor.username))]
	pub async fn available_actions(
		&self,
		actor: &Actor,
		id: u64,
	) -> Result<AvailableActionsResponse, EngineError> {
		let order = self.get_order(actor, id).await?;
		Ok(AvailableActionsResponse {
			order_id: order.id,
			state: order.lifecycle_state(),
			actions: self.lifecycle.available_actions(&order, actor),
		})
	}

	pub async fn dashboard_metrics(&self, actor: &Actor) -> Result<DashboardMetrics, EngineError> {
		require_admin(actor)?;
		Ok(self.backend.dashboard_metrics().await?)
	}

	pub async fn list_profiles(&self, actor: &Actor) -> Result<Vec<Profile>, EngineError> {
		require_admin(actor)?;
		Ok(self.backend.list_profiles().await?)
	}

	#[instrument(skip_all, fields(actor = %actor.username))]
	pub async fn register_profile(
		&self,
		actor: &Actor,
		submission: NewProfile,
	) -> Result<Profile, EngineError> {
		require_admin(actor)?;
		let profile = submission.into_profile()?;
		let profile = self.backend.create_profile(profile).await?;
		tracing::info!(username = %profile.username, role = %profile.role, "Profile registered");
		Ok(profile)
	}

	pub async fn get_profile(&self, actor: &Actor, username: &str) -> Result<Profile, EngineError> {
		require_access(actor, username)?;
		Ok(self.backend.get_profile(username).await?)
	}

	#[instrument(skip_all, fields(username = %username, actor = %actor.username))]
	pub async fn update_profile(
		&self,
		actor: &Actor,
		username: &str,
		update: ProfileUpdate,
	) -> Result<Profile, EngineError> {
		require_access(actor, username)?;
		update.validate()?;
		Ok(self.backend.update_profile(username, &update).await?)
	}

	#[instrument(skip_all, fields(username = %username, actor = %actor.username))]
	pub async fn delete_profile(&self, actor: &Actor, username: &str) -> Result<(), EngineError> {
		require_admin(actor)?;
		check_username(username)?;
		self.backend.delete_profile(username).await?;
		tracing::info!("Profile deleted");
		Ok(())
	}

	pub async fn get_measurement(
		&self,
		actor: &Actor,
		username: &str,
	) -> Result<Measurement, EngineError> {
		require_access(actor, username)?;
		Ok(self.backend.get_measurement(username).await?)
	}

	/// Creates the measurement record of `username`. Each user has at most one.
	#[instrument(skip_all, fields(username = %username, actor = %actor.username))]
	pub async fn create_measurement(
		&self,
		actor: &Actor,
		username: &str,
		mut measurement: Measurement,
	) -> Result<Measurement, EngineError> {
		require_access(actor, username)?;
		measurement.username = username.to_string();
		measurement.validate_new()?;

		match self.backend.get_measurement(username).await {
			Ok(_) => {
				return Err(EngineError::Conflict(format!(
					"measurements for {} already exist",
					username
				)))
			},
			Err(BackendError::NotFound(_)) => {},
			Err(e) => return Err(e.into()),
		}
		Ok(self.backend.create_measurement(measurement).await?)
	}

	#[instrument(skip_all, fields(username = %username, actor = %actor.username))]
	pub async fn update_measurement(
		&self,
		actor: &Actor,
		username: &str,
		mut measurement: Measurement,
	) -> Result<Measurement, EngineError> {
		require_access(actor, username)?;
		measurement.username = username.to_string();
		measurement.validate()?;
		Ok(self.backend.update_measurement(measurement).await?)
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn lifecycle(&self) -> &OrderLifecycle {
		&self.lifecycle
	}

	fn check_expected_state(
		&self,
		order: &Order,
		expected: Option<LifecycleState>,
	) -> Result<(), EngineError> {
		let actual = order.lifecycle_state();
		match expected {
			Some(expected) if self.config.lifecycle.optimistic_concurrency && expected != actual => {
				Err(EngineError::StaleState {
					order_id: order.id,
					expected,
					actual,
				})
			},
			_ => Ok(()),
		}
	}

	/// Writes a transition with a single backend call.
	async fn persist(&self, transition: &Transition) -> Result<Option<Order>, EngineError> {
		match &transition.outcome {
			Outcome::Removed(order) => {
				self.backend
					.delete_order(order.id)
					.await
					.map_err(persistence)?;
				Ok(None)
			},
			Outcome::Updated(order) if transition.action == Action::Confirm => self
				.backend
				.confirm_order(order.id, &order.client)
				.await
				.map(Some)
				.map_err(persistence),
			Outcome::Updated(order) => self
				.backend
				.update_status(order.id, order.status, order.completed_at)
				.await
				.map(Some)
				.map_err(persistence),
		}
	}

	async fn dispatch(&self, notification: Notification) -> NotificationStatus {
		match self.notifier.send(&notification).await {
			Ok(()) => NotificationStatus::Sent,
			Err(e) => {
				let reason = e.to_string();
				self.event_bus.publish(TailorEvent::NotificationFailed {
					order_id: notification.order_id,
					reason: reason.clone(),
				});
				NotificationStatus::Failed { reason }
			},
		}
	}
}

/// Backend failures while writing a transition leave the order as it was.
fn persistence(error: BackendError) -> EngineError {
	match error {
		BackendError::NotFound(what) => EngineError::NotFound(what),
		BackendError::Conflict(what) => EngineError::Conflict(what),
		e => EngineError::Persistence(e.to_string()),
	}
}

fn require_admin(actor: &Actor) -> Result<(), EngineError> {
	if actor.is_admin() {
		Ok(())
	} else {
		Err(EngineError::Forbidden("administrator role required".into()))
	}
}

/// Usernames key stored records, so malformed ones are rejected up front.
fn check_username(username: &str) -> Result<(), EngineError> {
	if is_valid_username(username) {
		Ok(())
	} else {
		Err(EngineError::Validation(FormError::single(
			"username",
			format!("'{}' is not a valid username", username),
		)))
	}
}

fn require_access(actor: &Actor, username: &str) -> Result<(), EngineError> {
	check_username(username)?;
	if actor.can_access(username) {
		Ok(())
	} else {
		Err(EngineError::Forbidden(format!(
			"records of {} belong to another user",
			username
		)))
	}
}

fn log_event(event: &TailorEvent) {
	match event {
		TailorEvent::Order(OrderEvent::Created { order }) => {
			tracing::debug!(order_id = order.id, "Event: order created");
		},
		TailorEvent::Order(OrderEvent::Edited { order }) => {
			tracing::debug!(order_id = order.id, "Event: order edited");
		},
		TailorEvent::Order(OrderEvent::Transitioned {
			order,
			action,
			from,
			to,
		}) => {
			tracing::debug!(order_id = order.id, %action, %from, %to, "Event: order transitioned");
		},
		TailorEvent::Order(OrderEvent::Deleted { order_id, client }) => {
			tracing::debug!(order_id, %client, "Event: order deleted");
		},
		TailorEvent::NotificationFailed { order_id, reason } => {
			tracing::warn!(order_id, %reason, "Event: notification failed");
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use chrono::{DateTime, TimeZone, Utc};
	use mockall::mock;
	use tailor_backend::implementations::local::LocalBackend;
	use tailor_backend::BackendInterface;
	use tailor_config::builders::config::ConfigBuilder;
	use tailor_notification::{NotificationError, NotificationInterface};
	use tailor_storage::implementations::memory::MemoryStorage;
	use tailor_types::{ConfigSchema, OrderDraft, OrderStatus, Role, StatusBucket};

	mock! {
		pub Notifier {}

		#[async_trait]
		impl NotificationInterface for Notifier {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
		}
	}

	mock! {
		pub Backend {}

		#[async_trait]
		impl BackendInterface for Backend {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError>;
			async fn get_order(&self, id: u64) -> Result<Order, BackendError>;
			async fn create_order(&self, draft: OrderDraft) -> Result<Order, BackendError>;
			async fn update_order(&self, id: u64, edit: &OrderEdit) -> Result<Order, BackendError>;
			async fn update_status(
				&self,
				id: u64,
				status: OrderStatus,
				completed_at: Option<DateTime<Utc>>,
			) -> Result<Order, BackendError>;
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
			async fn create_measurement(
				&self,
				measurement: Measurement,
			) -> Result<Measurement, BackendError>;
			async fn update_measurement(
				&self,
				measurement: Measurement,
			) -> Result<Measurement, BackendError>;
		}
	}

	fn today() -> NaiveDate {
		NaiveDate::from_ymd_opt(2030, 5, 1).unwrap()
	}

	fn engine_with(notifier: MockNotifier, config: Config) -> TailorEngine {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let backend = LocalBackend::new(storage.clone());
		TailorEngine::new(
			config,
			storage,
			Arc::new(BackendService::new(Box::new(backend))),
			Arc::new(NotificationService::new(Box::new(notifier))),
			event_bus::EventBus::default(),
		)
	}

	fn quiet_notifier() -> MockNotifier {
		let mut notifier = MockNotifier::new();
		notifier.expect_send().returning(|_| Ok(()));
		notifier
	}

	fn failing_notifier() -> MockNotifier {
		let mut notifier = MockNotifier::new();
		notifier.expect_send().returning(|_| {
			Err(NotificationError::Rejected {
				status: 502,
				body: "mail relay down".to_string(),
			})
		});
		notifier
	}

	fn submission() -> NewOrder {
		NewOrder {
			event_type: "Wedding".to_string(),
			measurements: "chest 40".to_string(),
			expected_date: Some(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()),
			..NewOrder::default()
		}
	}

	async fn place(engine: &TailorEngine, client: &str) -> Order {
		engine
			.create_order(&Actor::client(client), submission(), today())
			.await
			.unwrap()
			.order
			.unwrap()
	}

	#[tokio::test]
	async fn test_create_sends_placement_notice() {
		let mut notifier = MockNotifier::new();
		notifier
			.expect_send()
			.withf(|n| n.subject == "Your Order #1 with JFK Tailor Shop" && n.recipient == "ada")
			.times(1)
			.returning(|_| Ok(()));
		let engine = engine_with(notifier, ConfigBuilder::new().build());

		let report = engine
			.create_order(&Actor::client("ada"), submission(), today())
			.await
			.unwrap();
		let order = report.order.unwrap();
		assert_eq!(order.client, "ada");
		assert_eq!(order.status, OrderStatus::Pending);
		assert!(!order.is_confirmed);
		assert_eq!(order.comments, "No additional comments");
		assert_eq!(report.to, Some(LifecycleState::Unconfirmed));
		assert_eq!(report.notification, NotificationStatus::Sent);
	}

	#[tokio::test]
	async fn test_create_reports_form_errors() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let late = NewOrder {
			expected_date: Some(NaiveDate::from_ymd_opt(2030, 4, 1).unwrap()),
			..submission()
		};

		let err = engine
			.create_order(&Actor::admin("jfk"), late, today())
			.await
			.unwrap_err();
		let EngineError::Validation(errors) = err else {
			panic!("expected validation error, got {:?}", err);
		};
		assert!(errors.contains("expected_date"));
		assert!(errors.contains("client"));
	}

	#[tokio::test]
	async fn test_client_cannot_order_for_someone_else() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let for_bob = NewOrder {
			client: Some("bob".to_string()),
			..submission()
		};
		assert!(matches!(
			engine
				.create_order(&Actor::client("ada"), for_bob, today())
				.await,
			Err(EngineError::Forbidden(_))
		));
	}

	#[tokio::test]
	async fn test_failed_notification_keeps_confirmation() {
		let engine = engine_with(
			failing_notifier(),
			ConfigBuilder::new().notify_on_create(false).build(),
		);
		let order = place(&engine, "ada").await;

		let report = engine
			.perform_action(&Actor::admin("jfk"), order.id, Action::Confirm, None)
			.await
			.unwrap();
		assert!(report.notification.is_failed());
		assert!(report.order.as_ref().unwrap().is_confirmed);

		let stored = engine.get_order(&Actor::admin("jfk"), order.id).await.unwrap();
		assert!(stored.is_confirmed);
		assert_eq!(stored.lifecycle_state(), LifecycleState::Confirmed);

		let response = OrderOperationResponse::from(report);
		assert!(response.warning.unwrap().contains("mail relay down"));
	}

	#[tokio::test]
	async fn test_stale_expected_state_conflicts() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let admin = Actor::admin("jfk");
		let order = place(&engine, "ada").await;
		engine
			.perform_action(&admin, order.id, Action::Confirm, Some(LifecycleState::Unconfirmed))
			.await
			.unwrap();

		let err = engine
			.perform_action(
				&admin,
				order.id,
				Action::AdvanceInProgress,
				Some(LifecycleState::Unconfirmed),
			)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			EngineError::StaleState {
				expected: LifecycleState::Unconfirmed,
				actual: LifecycleState::Confirmed,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_expected_state_ignored_when_disabled() {
		let engine = engine_with(
			quiet_notifier(),
			ConfigBuilder::new().optimistic_concurrency(false).build(),
		);
		let admin = Actor::admin("jfk");
		let order = place(&engine, "ada").await;
		engine
			.perform_action(&admin, order.id, Action::Confirm, None)
			.await
			.unwrap();

		let report = engine
			.perform_action(
				&admin,
				order.id,
				Action::AdvanceInProgress,
				Some(LifecycleState::Unconfirmed),
			)
			.await
			.unwrap();
		assert_eq!(report.to, Some(LifecycleState::InProgress));
	}

	#[tokio::test]
	async fn test_full_lifecycle_stamps_completion() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let admin = Actor::admin("jfk");
		let order = place(&engine, "ada").await;

		for action in [
			Action::Confirm,
			Action::AdvanceInProgress,
			Action::AdvanceFitting,
			Action::AdvanceCompleted,
		] {
			engine
				.perform_action(&admin, order.id, action, None)
				.await
				.unwrap();
		}

		let done = engine.get_order(&admin, order.id).await.unwrap();
		assert_eq!(done.status, OrderStatus::Completed);
		assert!(done.completed_at.is_some());
		assert!(engine
			.available_actions(&admin, order.id)
			.await
			.unwrap()
			.actions
			.is_empty());
	}

	#[tokio::test]
	async fn test_concurrent_confirms_apply_once() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let order = place(&engine, "ada").await;

		let first = {
			let engine = engine.clone();
			tokio::spawn(async move {
				engine
					.perform_action(&Actor::admin("jfk"), order.id, Action::Confirm, None)
					.await
			})
		};
		let second = {
			let engine = engine.clone();
			tokio::spawn(async move {
				engine
					.perform_action(&Actor::admin("amy"), order.id, Action::Confirm, None)
					.await
			})
		};
		let results = [first.await.unwrap(), second.await.unwrap()];

		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		assert!(results
			.iter()
			.any(|r| matches!(r, Err(EngineError::IllegalTransition(_)))));
	}

	#[tokio::test]
	async fn test_owner_delete_publishes_event() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let order = place(&engine, "ada").await;
		let mut events = engine.event_bus().subscribe();

		let report = engine
			.perform_action(&Actor::client("ada"), order.id, Action::Delete, None)
			.await
			.unwrap();
		assert!(report.order.is_none());
		assert_eq!(report.to, None);
		assert_eq!(report.notification, NotificationStatus::Sent);

		let event = events.recv().await.unwrap();
		assert!(matches!(
			event,
			TailorEvent::Order(OrderEvent::Deleted { order_id, .. }) if order_id == order.id
		));
		assert!(matches!(
			engine.get_order(&Actor::admin("jfk"), order.id).await,
			Err(EngineError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_edit_only_by_owner_while_unconfirmed() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let order = place(&engine, "ada").await;
		let edit = OrderEdit {
			event_type: Some("Graduation".to_string()),
			..OrderEdit::default()
		};

		assert!(matches!(
			engine
				.edit_order(&Actor::client("bob"), order.id, edit.clone(), None)
				.await,
			Err(EngineError::IllegalTransition(_))
		));
		let report = engine
			.edit_order(&Actor::client("ada"), order.id, edit.clone(), None)
			.await
			.unwrap();
		assert_eq!(report.order.unwrap().event_type, "Graduation");

		engine
			.perform_action(&Actor::admin("jfk"), order.id, Action::Confirm, None)
			.await
			.unwrap();
		assert!(matches!(
			engine
				.edit_order(&Actor::client("ada"), order.id, edit, None)
				.await,
			Err(EngineError::IllegalTransition(_))
		));
	}

	#[tokio::test]
	async fn test_clients_are_pinned_to_own_orders() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		place(&engine, "ada").await;
		let bobs = place(&engine, "bob").await;

		let visible = engine
			.list_orders(
				&Actor::client("ada"),
				OrderQuery::bucket(StatusBucket::All).with_client("bob"),
			)
			.await
			.unwrap();
		assert_eq!(visible.len(), 1);
		assert_eq!(visible[0].client, "ada");

		assert!(matches!(
			engine.get_order(&Actor::client("ada"), bobs.id).await,
			Err(EngineError::Forbidden(_))
		));
		assert_eq!(
			engine
				.list_orders(&Actor::admin("jfk"), OrderQuery::default())
				.await
				.unwrap()
				.len(),
			2
		);
	}

	#[tokio::test]
	async fn test_measurements_are_unique_per_user() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let ada = Actor::client("ada");
		let record = Measurement {
			neck: Some(15.5),
			chest: Some(38.0),
			waist: Some(32.0),
			hip: Some(40.0),
			shoulder: Some(18.0),
			..Measurement::default()
		};

		let created = engine
			.create_measurement(&ada, "ada", record.clone())
			.await
			.unwrap();
		assert_eq!(created.username, "ada");
		assert!(matches!(
			engine.create_measurement(&ada, "ada", record.clone()).await,
			Err(EngineError::Conflict(_))
		));
		assert!(matches!(
			engine
				.create_measurement(&Actor::client("bob"), "ada", record)
				.await,
			Err(EngineError::Forbidden(_))
		));
	}

	#[tokio::test]
	async fn test_dashboard_requires_admin() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		engine
			.register_profile(
				&Actor::admin("jfk"),
				NewProfile {
					username: "ada".to_string(),
					firstname: "Ada".to_string(),
					lastname: "Lovelace".to_string(),
					email: "ada@example.com".to_string(),
					phonenumber: "0712345678".to_string(),
					role: Some(Role::Client),
					..NewProfile::default()
				},
			)
			.await
			.unwrap();
		place(&engine, "ada").await;

		assert!(matches!(
			engine.dashboard_metrics(&Actor::client("ada")).await,
			Err(EngineError::Forbidden(_))
		));
		let metrics = engine
			.dashboard_metrics(&Actor::admin("jfk"))
			.await
			.unwrap();
		assert_eq!(metrics.total_clients, 1);
		assert_eq!(metrics.unconfirmed_orders, 1);
	}

	fn confirmed_order(id: u64) -> Order {
		Order {
			id,
			client: "ada".to_string(),
			event_type: "Wedding".to_string(),
			preferred_color: None,
			material: true,
			measurements: "chest 40".to_string(),
			comments: String::new(),
			expected_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
			order_date: Utc.with_ymd_and_hms(2030, 5, 1, 9, 30, 0).unwrap(),
			completed_at: None,
			is_confirmed: true,
			status: OrderStatus::Pending,
		}
	}

	#[tokio::test]
	async fn test_failed_write_leaves_order_untouched() {
		let mut backend = MockBackend::new();
		backend
			.expect_get_order()
			.returning(|id| Ok(confirmed_order(id)));
		backend
			.expect_update_status()
			.withf(|id, status, completed_at| {
				*id == 7 && *status == OrderStatus::InProgress && completed_at.is_none()
			})
			.times(1)
			.returning(|_, _, _| Err(BackendError::Network("connection refused".to_string())));
		let mut notifier = MockNotifier::new();
		notifier.expect_send().times(0);

		let engine = TailorEngine::new(
			ConfigBuilder::new().build(),
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			Arc::new(BackendService::new(Box::new(backend))),
			Arc::new(NotificationService::new(Box::new(notifier))),
			event_bus::EventBus::default(),
		);
		let mut events = engine.event_bus().subscribe();

		let err = engine
			.perform_action(&Actor::admin("jfk"), 7, Action::AdvanceInProgress, None)
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::Persistence(_)), "{:?}", err);
		assert!(matches!(
			events.try_recv(),
			Err(broadcast::error::TryRecvError::Empty)
		));

		let order = engine.get_order(&Actor::admin("jfk"), 7).await.unwrap();
		assert_eq!(order.lifecycle_state(), LifecycleState::Confirmed);
	}

	#[tokio::test]
	async fn test_malformed_usernames_are_rejected() {
		let engine = engine_with(quiet_notifier(), ConfigBuilder::new().build());
		let admin = Actor::admin("jfk");

		for username in [".ada", "ada/../bob", "ada lovelace", ""] {
			assert!(
				matches!(
					engine.get_measurement(&admin, username).await,
					Err(EngineError::Validation(_))
				),
				"{:?} accepted",
				username
			);
			assert!(matches!(
				engine.delete_profile(&admin, username).await,
				Err(EngineError::Validation(_))
			));
		}
	}
}
