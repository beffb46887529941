//! Order types for the tailor shop workflow.
//!
//! This module defines the order record, its status vocabulary, the ordered
//! lifecycle states derived from `(status, is_confirmed)`, the payloads used
//! to create and edit orders, and the list query applied to order
//! collections.

use crate::form::{is_blank, FormError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comment stored when the client leaves the comments field empty.
pub const DEFAULT_COMMENTS: &str = "No additional comments";

/// Status of an order as persisted by the backend.
///
/// The canonical wire form is snake_case. The legacy capitalised spellings
/// stored by the shop API (`Pending`, `Completed`) are accepted on
/// input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
	#[default]
	#[serde(rename = "pending", alias = "Pending")]
	Pending,
	#[serde(rename = "in_progress", alias = "In_progress", alias = "InProgress")]
	InProgress,
	#[serde(rename = "fitting", alias = "Fitting")]
	Fitting,
	#[serde(rename = "completed", alias = "Completed")]
	Completed,
}

impl OrderStatus {
	/// Returns the canonical string representation.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::InProgress => "in_progress",
			OrderStatus::Fitting => "fitting",
			OrderStatus::Completed => "completed",
		}
	}

	/// Returns the exact spelling the shop API stores.
	pub fn backend_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::InProgress => "in_progress",
			OrderStatus::Fitting => "fitting",
			OrderStatus::Completed => "Completed",
		}
	}

	/// Position in the forward-only sequence Pending < in_progress < fitting < Completed.
	pub fn rank(&self) -> u8 {
		match self {
			OrderStatus::Pending => 0,
			OrderStatus::InProgress => 1,
			OrderStatus::Fitting => 2,
			OrderStatus::Completed => 3,
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Lifecycle position of an order.
///
/// Collapses the orthogonal `status` and `is_confirmed` flags into a single
/// totally ordered state. Once an order has left `Pending` the confirmation
/// flag no longer influences its state.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
	Unconfirmed,
	Confirmed,
	InProgress,
	Fitting,
	Completed,
}

impl LifecycleState {
	/// Derives the lifecycle state from the persisted flags.
	pub fn of(status: OrderStatus, is_confirmed: bool) -> Self {
		match status {
			OrderStatus::Pending if is_confirmed => LifecycleState::Confirmed,
			OrderStatus::Pending => LifecycleState::Unconfirmed,
			OrderStatus::InProgress => LifecycleState::InProgress,
			OrderStatus::Fitting => LifecycleState::Fitting,
			OrderStatus::Completed => LifecycleState::Completed,
		}
	}

	/// The status value persisted for this state.
	pub fn status(&self) -> OrderStatus {
		match self {
			LifecycleState::Unconfirmed | LifecycleState::Confirmed => OrderStatus::Pending,
			LifecycleState::InProgress => OrderStatus::InProgress,
			LifecycleState::Fitting => OrderStatus::Fitting,
			LifecycleState::Completed => OrderStatus::Completed,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			LifecycleState::Unconfirmed => "unconfirmed",
			LifecycleState::Confirmed => "confirmed",
			LifecycleState::InProgress => "in_progress",
			LifecycleState::Fitting => "fitting",
			LifecycleState::Completed => "completed",
		}
	}

	/// Returns an iterator over all states in lifecycle order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Unconfirmed,
			Self::Confirmed,
			Self::InProgress,
			Self::Fitting,
			Self::Completed,
		]
		.into_iter()
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single tailoring job tied to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Backend-assigned identifier.
	pub id: u64,
	/// Username of the owning client.
	pub client: String,
	/// Occasion the garment is made for.
	pub event_type: String,
	/// Preferred fabric color, if the client gave one.
	#[serde(default, alias = "preferred_Color")]
	pub preferred_color: Option<String>,
	/// Whether the shop supplies the material.
	#[serde(default)]
	pub material: bool,
	/// Free-text measurement notes.
	pub measurements: String,
	#[serde(default)]
	pub comments: String,
	/// Expected delivery date.
	pub expected_date: NaiveDate,
	/// Timestamp when the order was placed.
	pub order_date: DateTime<Utc>,
	/// Timestamp when the order reached `Completed`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub is_confirmed: bool,
	#[serde(default)]
	pub status: OrderStatus,
}

impl Order {
	/// Builds a freshly placed order from a validated draft.
	pub fn from_draft(id: u64, draft: OrderDraft, order_date: DateTime<Utc>) -> Self {
		Self {
			id,
			client: draft.client,
			event_type: draft.event_type,
			preferred_color: draft.preferred_color,
			material: draft.material,
			measurements: draft.measurements,
			comments: draft.comments,
			expected_date: draft.expected_date,
			order_date,
			completed_at: None,
			is_confirmed: false,
			status: OrderStatus::Pending,
		}
	}

	pub fn lifecycle_state(&self) -> LifecycleState {
		LifecycleState::of(self.status, self.is_confirmed)
	}

	pub fn is_owned_by(&self, username: &str) -> bool {
		self.client == username
	}
}

/// Order submission as received from a client or administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrder {
	/// Client the order is placed for. Required when an administrator submits.
	#[serde(default)]
	pub client: Option<String>,
	#[serde(default)]
	pub event_type: String,
	#[serde(default, alias = "preferred_Color")]
	pub preferred_color: Option<String>,
	#[serde(default)]
	pub material: bool,
	#[serde(default)]
	pub measurements: String,
	#[serde(default)]
	pub comments: Option<String>,
	#[serde(default)]
	pub expected_date: Option<NaiveDate>,
}

impl NewOrder {
	/// Validates the submission and normalises it into a draft for `client`.
	///
	/// `today` is the reference date for the "not in the past" rule.
	pub fn into_draft(self, client: String, today: NaiveDate) -> Result<OrderDraft, FormError> {
		let mut errors = FormError::new();

		if self.measurements.trim().is_empty() {
			errors.add("measurements", "Measurements are required");
		}
		match self.expected_date {
			None => errors.add("expected_date", "Expected delivery date is required"),
			Some(date) if date < today => {
				errors.add("expected_date", "Delivery date cannot be in the past")
			},
			Some(_) => {},
		}
		if self.event_type.trim().is_empty() {
			errors.add("event_type", "Event type is required");
		}
		if client.trim().is_empty() {
			errors.add("client", "Please select a client");
		}
		errors.into_result()?;

		let comments = match self.comments {
			Some(c) if !c.trim().is_empty() => c.trim().to_string(),
			_ => DEFAULT_COMMENTS.to_string(),
		};
		let preferred_color = self
			.preferred_color
			.filter(|c| !c.trim().is_empty())
			.map(|c| c.trim().to_string());

		Ok(OrderDraft {
			client: client.trim().to_string(),
			event_type: self.event_type.trim().to_string(),
			preferred_color,
			material: self.material,
			measurements: self.measurements.trim().to_string(),
			comments,
			// Checked above.
			expected_date: self.expected_date.unwrap_or(today),
		})
	}
}

/// Validated order submission ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
	pub client: String,
	pub event_type: String,
	pub preferred_color: Option<String>,
	pub material: bool,
	pub measurements: String,
	pub comments: String,
	pub expected_date: NaiveDate,
}

/// Partial update of the editable order fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderEdit {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_type: Option<String>,
	#[serde(
		default,
		alias = "preferred_Color",
		skip_serializing_if = "Option::is_none"
	)]
	pub preferred_color: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub material: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub measurements: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub comments: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expected_date: Option<NaiveDate>,
}

impl OrderEdit {
	/// Rejects edits that would blank out a required field.
	pub fn validate(&self) -> Result<(), FormError> {
		let mut errors = FormError::new();
		if self.event_type.is_some() && is_blank(self.event_type.as_deref()) {
			errors.add("event_type", "Event type is required");
		}
		if self.measurements.is_some() && is_blank(self.measurements.as_deref()) {
			errors.add("measurements", "Measurements are required");
		}
		errors.into_result()
	}

	/// Applies the provided fields to `order`.
	pub fn apply(&self, order: &mut Order) {
		if let Some(event_type) = &self.event_type {
			order.event_type = event_type.trim().to_string();
		}
		if let Some(color) = &self.preferred_color {
			order.preferred_color = Some(color.trim().to_string()).filter(|c| !c.is_empty());
		}
		if let Some(material) = self.material {
			order.material = material;
		}
		if let Some(measurements) = &self.measurements {
			order.measurements = measurements.trim().to_string();
		}
		if let Some(comments) = &self.comments {
			order.comments = if comments.trim().is_empty() {
				DEFAULT_COMMENTS.to_string()
			} else {
				comments.trim().to_string()
			};
		}
		if let Some(date) = self.expected_date {
			order.expected_date = date;
		}
	}
}

/// Named groups used to filter order lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
	#[default]
	All,
	/// Confirmed but not yet started.
	Pending,
	/// Every order past confirmation.
	Confirmed,
	InProgress,
	Fitting,
	Completed,
	/// Awaiting administrator confirmation.
	Unconfirmed,
}

impl StatusBucket {
	pub fn as_str(&self) -> &'static str {
		match self {
			StatusBucket::All => "all",
			StatusBucket::Pending => "pending",
			StatusBucket::Confirmed => "confirmed",
			StatusBucket::InProgress => "in_progress",
			StatusBucket::Fitting => "fitting",
			StatusBucket::Completed => "completed",
			StatusBucket::Unconfirmed => "unconfirmed",
		}
	}

	/// Whether an order in `state` belongs to this bucket.
	pub fn matches(&self, state: LifecycleState) -> bool {
		match self {
			StatusBucket::All => true,
			StatusBucket::Pending => state == LifecycleState::Confirmed,
			StatusBucket::Confirmed => state >= LifecycleState::Confirmed,
			StatusBucket::InProgress => state == LifecycleState::InProgress,
			StatusBucket::Fitting => state == LifecycleState::Fitting,
			StatusBucket::Completed => state == LifecycleState::Completed,
			StatusBucket::Unconfirmed => state == LifecycleState::Unconfirmed,
		}
	}
}

/// Ordering applied to order lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
	#[default]
	Newest,
	Oldest,
	Id,
}

/// Filter, search and ordering for order lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderQuery {
	#[serde(default)]
	pub bucket: StatusBucket,
	/// Restrict to orders owned by this username.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client: Option<String>,
	/// Case-insensitive search over client, event type, color and id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub search: Option<String>,
	#[serde(default)]
	pub sort: SortOrder,
}

impl OrderQuery {
	pub fn bucket(bucket: StatusBucket) -> Self {
		Self {
			bucket,
			..Self::default()
		}
	}

	pub fn with_client(mut self, client: impl Into<String>) -> Self {
		self.client = Some(client.into());
		self
	}

	/// Whether `order` passes the bucket, client and search filters.
	pub fn matches(&self, order: &Order) -> bool {
		if !self.bucket.matches(order.lifecycle_state()) {
			return false;
		}
		if let Some(client) = &self.client {
			if &order.client != client {
				return false;
			}
		}
		match self.search.as_deref().map(str::trim) {
			Some(term) if !term.is_empty() => {
				let term = term.to_lowercase();
				order.client.to_lowercase().contains(&term)
					|| order.id.to_string().contains(&term)
					|| order.event_type.to_lowercase().contains(&term)
					|| order
						.preferred_color
						.as_deref()
						.is_some_and(|c| c.to_lowercase().contains(&term))
			},
			_ => true,
		}
	}

	/// Filters and sorts a collection of orders.
	pub fn apply(&self, orders: Vec<Order>) -> Vec<Order> {
		let mut filtered: Vec<Order> = orders.into_iter().filter(|o| self.matches(o)).collect();
		match self.sort {
			SortOrder::Newest => filtered.sort_by(|a, b| b.order_date.cmp(&a.order_date)),
			SortOrder::Oldest => filtered.sort_by(|a, b| a.order_date.cmp(&b.order_date)),
			SortOrder::Id => filtered.sort_by_key(|o| o.id),
		}
		filtered
	}
}

/// Aggregated counts shown on the administrator dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
	#[serde(default)]
	pub total_clients: u64,
	#[serde(default)]
	pub total_orders: u64,
	#[serde(default)]
	pub unconfirmed_orders: u64,
	#[serde(default)]
	pub pending_orders: u64,
	#[serde(default)]
	pub in_progress_orders: u64,
	#[serde(default)]
	pub fitting_orders: u64,
	#[serde(default)]
	pub completed_orders: u64,
}

impl DashboardMetrics {
	/// Counts orders per bucket.
	pub fn from_orders(orders: &[Order], total_clients: u64) -> Self {
		let mut metrics = Self {
			total_clients,
			total_orders: orders.len() as u64,
			..Self::default()
		};
		for order in orders {
			match order.lifecycle_state() {
				LifecycleState::Unconfirmed => metrics.unconfirmed_orders += 1,
				LifecycleState::Confirmed => metrics.pending_orders += 1,
				LifecycleState::InProgress => metrics.in_progress_orders += 1,
				LifecycleState::Fitting => metrics.fitting_orders += 1,
				LifecycleState::Completed => metrics.completed_orders += 1,
			}
		}
		metrics
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn order(id: u64, client: &str, status: OrderStatus, confirmed: bool, day: u32) -> Order {
		Order {
			id,
			client: client.to_string(),
			event_type: "Wedding".to_string(),
			preferred_color: Some("Navy".to_string()),
			material: true,
			measurements: "see file".to_string(),
			comments: DEFAULT_COMMENTS.to_string(),
			expected_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
			order_date: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
			completed_at: None,
			is_confirmed: confirmed,
			status,
		}
	}

	#[test]
	fn test_legacy_status_spellings_deserialize() {
		let pending: OrderStatus = serde_json::from_str("\"Pending\"").unwrap();
		let completed: OrderStatus = serde_json::from_str("\"Completed\"").unwrap();
		let fitting: OrderStatus = serde_json::from_str("\"fitting\"").unwrap();
		assert_eq!(pending, OrderStatus::Pending);
		assert_eq!(completed, OrderStatus::Completed);
		assert_eq!(fitting, OrderStatus::Fitting);
		assert_eq!(serde_json::to_string(&pending).unwrap(), "\"pending\"");
		assert_eq!(OrderStatus::Completed.backend_str(), "Completed");
	}

	#[test]
	fn test_lifecycle_state_ordering() {
		let states: Vec<_> = LifecycleState::all().collect();
		let mut sorted = states.clone();
		sorted.sort();
		assert_eq!(states, sorted);
		assert_eq!(
			LifecycleState::of(OrderStatus::Pending, true),
			LifecycleState::Confirmed
		);
		assert_eq!(
			LifecycleState::of(OrderStatus::Fitting, false),
			LifecycleState::Fitting
		);
	}

	#[test]
	fn test_order_accepts_backend_payload() {
		let json = r#"{
			"id": 42,
			"client": "ada",
			"event_type": "Gala",
			"preferred_Color": "Emerald",
			"material": false,
			"measurements": "chest 40",
			"comments": "none",
			"expected_date": "2030-06-01",
			"order_date": "2026-05-01T10:00:00Z",
			"is_confirmed": true,
			"status": "Pending"
		}"#;
		let order: Order = serde_json::from_str(json).unwrap();
		assert_eq!(order.preferred_color.as_deref(), Some("Emerald"));
		assert_eq!(order.lifecycle_state(), LifecycleState::Confirmed);
	}

	#[test]
	fn test_new_order_validation() {
		let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
		let draft = NewOrder {
			expected_date: Some(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()),
			..NewOrder::default()
		};
		let err = draft.into_draft(String::new(), today).unwrap_err();
		assert!(err.contains("measurements"));
		assert!(err.contains("event_type"));
		assert!(err.contains("client"));
		assert_eq!(
			err.fields["expected_date"],
			"Delivery date cannot be in the past"
		);
	}

	#[test]
	fn test_new_order_defaults() {
		let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
		let draft = NewOrder {
			event_type: " Wedding ".to_string(),
			measurements: "chest 40".to_string(),
			preferred_color: Some("   ".to_string()),
			comments: None,
			expected_date: Some(today),
			..NewOrder::default()
		}
		.into_draft("ada".to_string(), today)
		.unwrap();

		assert_eq!(draft.event_type, "Wedding");
		assert_eq!(draft.comments, DEFAULT_COMMENTS);
		assert_eq!(draft.preferred_color, None);
	}

	#[test]
	fn test_edit_rejects_blank_required_fields() {
		let edit = OrderEdit {
			event_type: Some("  ".to_string()),
			..OrderEdit::default()
		};
		assert!(edit.validate().unwrap_err().contains("event_type"));

		let mut target = order(1, "ada", OrderStatus::Pending, false, 1);
		OrderEdit {
			comments: Some(String::new()),
			material: Some(false),
			..OrderEdit::default()
		}
		.apply(&mut target);
		assert_eq!(target.comments, DEFAULT_COMMENTS);
		assert!(!target.material);
	}

	#[test]
	fn test_query_buckets_and_search() {
		let orders = vec![
			order(1, "ada", OrderStatus::Pending, false, 1),
			order(2, "ada", OrderStatus::Pending, true, 2),
			order(3, "bob", OrderStatus::InProgress, true, 3),
			order(4, "bob", OrderStatus::Completed, true, 4),
		];

		let unconfirmed = OrderQuery::bucket(StatusBucket::Unconfirmed).apply(orders.clone());
		assert_eq!(unconfirmed.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1]);

		let pending = OrderQuery::bucket(StatusBucket::Pending).apply(orders.clone());
		assert_eq!(pending.iter().map(|o| o.id).collect::<Vec<_>>(), vec![2]);

		let confirmed = OrderQuery::bucket(StatusBucket::Confirmed).apply(orders.clone());
		assert_eq!(confirmed.iter().map(|o| o.id).collect::<Vec<_>>(), vec![4, 3, 2]);

		let bobs = OrderQuery {
			search: Some("BOB".to_string()),
			sort: SortOrder::Id,
			..OrderQuery::default()
		}
		.apply(orders.clone());
		assert_eq!(bobs.iter().map(|o| o.id).collect::<Vec<_>>(), vec![3, 4]);

		let oldest_for_ada = OrderQuery {
			sort: SortOrder::Oldest,
			..OrderQuery::default()
		}
		.with_client("ada")
		.apply(orders);
		assert_eq!(oldest_for_ada.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
	}

	#[test]
	fn test_dashboard_metrics_counts() {
		let orders = vec![
			order(1, "ada", OrderStatus::Pending, false, 1),
			order(2, "ada", OrderStatus::Pending, true, 2),
			order(3, "bob", OrderStatus::Fitting, true, 3),
			order(4, "bob", OrderStatus::Completed, true, 4),
		];
		let metrics = DashboardMetrics::from_orders(&orders, 2);
		assert_eq!(metrics.total_orders, 4);
		assert_eq!(metrics.total_clients, 2);
		assert_eq!(metrics.unconfirmed_orders, 1);
		assert_eq!(metrics.pending_orders, 1);
		assert_eq!(metrics.fitting_orders, 1);
		assert_eq!(metrics.completed_orders, 1);
		assert_eq!(metrics.in_progress_orders, 0);
	}
}
