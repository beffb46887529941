//! Order lifecycle controller.
//!
//! Decides whether an actor may perform an action on an order and what the
//! order looks like afterwards:
//!
//! ```text
//! Unconfirmed --confirm(admin)--> Confirmed --advance_in_progress(admin)--> InProgress
//! InProgress --advance_fitting(admin)--> Fitting
//! InProgress | Fitting --advance_completed(admin)--> Completed
//! Unconfirmed --edit(owner)--> Unconfirmed
//! Unconfirmed --delete(owner)--> removed
//! ```
//!
//! Every check in the service, including the list of actions offered to a
//! caller, goes through the single table below. The controller does no I/O:
//! persisting the result and delivering the notification are left to the
//! engine.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tailor_types::{
	Action, Actor, LifecycleState, Notification, NotificationKind, Order, Role,
};
use thiserror::Error;

/// Errors raised by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
	#[error("Action '{action}' is not allowed for {role} on an order in state '{state}'")]
	IllegalTransition {
		state: LifecycleState,
		action: Action,
		role: Role,
	},
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy)]
struct Rule {
	role: Role,
	/// `None` removes the order.
	to: Option<LifecycleState>,
	/// Only the client who owns the order may act.
	owner_only: bool,
	notify: Option<NotificationKind>,
}

static TRANSITIONS: Lazy<HashMap<(LifecycleState, Action), Rule>> = Lazy::new(|| {
	use LifecycleState::*;

	let admin = |to, notify| Rule {
		role: Role::Admin,
		to: Some(to),
		owner_only: false,
		notify,
	};
	let owner = |to, notify| Rule {
		role: Role::Client,
		to,
		owner_only: true,
		notify,
	};

	HashMap::from([
		(
			(Unconfirmed, Action::Confirm),
			admin(Confirmed, Some(NotificationKind::Confirmed)),
		),
		((Unconfirmed, Action::Edit), owner(Some(Unconfirmed), None)),
		(
			(Unconfirmed, Action::Delete),
			owner(None, Some(NotificationKind::Cancelled)),
		),
		((Confirmed, Action::AdvanceInProgress), admin(InProgress, None)),
		((InProgress, Action::AdvanceFitting), admin(Fitting, None)),
		((InProgress, Action::AdvanceCompleted), admin(Completed, None)),
		((Fitting, Action::AdvanceCompleted), admin(Completed, None)),
	])
});

/// What happened to the order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	/// The order with the transition applied.
	Updated(Order),
	/// The order is to be deleted; holds the last snapshot.
	Removed(Order),
}

/// Result of a legal transition request.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
	pub action: Action,
	pub from: LifecycleState,
	/// `None` when the order is removed.
	pub to: Option<LifecycleState>,
	pub outcome: Outcome,
	pub notification: Option<Notification>,
}

impl Transition {
	/// The updated order, if it still exists.
	pub fn order(&self) -> Option<&Order> {
		match &self.outcome {
			Outcome::Updated(order) => Some(order),
			Outcome::Removed(_) => None,
		}
	}
}

/// Applies the transition table and composes client notifications.
#[derive(Debug, Clone)]
pub struct OrderLifecycle {
	shop_name: String,
}

impl OrderLifecycle {
	pub fn new(shop_name: impl Into<String>) -> Self {
		Self {
			shop_name: shop_name.into(),
		}
	}

	pub fn shop_name(&self) -> &str {
		&self.shop_name
	}

	fn rule_for(&self, order: &Order, actor: &Actor, action: Action) -> Option<Rule> {
		TRANSITIONS
			.get(&(order.lifecycle_state(), action))
			.copied()
			.filter(|rule| rule.role == actor.role)
			.filter(|rule| !rule.owner_only || order.is_owned_by(&actor.username))
	}

	/// Validates `action` against the table and returns the resulting order.
	///
	/// Rejected requests never fall back to a different action.
	pub fn request_transition(
		&self,
		order: &Order,
		actor: &Actor,
		action: Action,
	) -> Result<Transition, LifecycleError> {
		self.request_transition_at(order, actor, action, Utc::now())
	}

	/// Same as [`request_transition`](Self::request_transition) with an explicit clock.
	pub fn request_transition_at(
		&self,
		order: &Order,
		actor: &Actor,
		action: Action,
		now: DateTime<Utc>,
	) -> Result<Transition, LifecycleError> {
		let from = order.lifecycle_state();
		let rule =
			self.rule_for(order, actor, action)
				.ok_or(LifecycleError::IllegalTransition {
					state: from,
					action,
					role: actor.role,
				})?;

		let outcome = match rule.to {
			Some(to) => {
				let mut updated = order.clone();
				if to == LifecycleState::Confirmed {
					updated.is_confirmed = true;
				}
				updated.status = to.status();
				if to == LifecycleState::Completed && from != LifecycleState::Completed {
					updated.completed_at = Some(now);
				}
				Outcome::Updated(updated)
			},
			None => Outcome::Removed(order.clone()),
		};

		let notification = rule.notify.map(|kind| {
			let subject_order = match &outcome {
				Outcome::Updated(o) | Outcome::Removed(o) => o,
			};
			self.notice(subject_order, kind)
		});

		Ok(Transition {
			action,
			from,
			to: rule.to,
			outcome,
			notification,
		})
	}

	/// Actions `actor` may perform on `order` right now.
	pub fn available_actions(&self, order: &Order, actor: &Actor) -> Vec<Action> {
		Action::all()
			.filter(|action| self.rule_for(order, actor, *action).is_some())
			.collect()
	}

	/// Message sent to the client after an order is placed.
	pub fn creation_notice(&self, order: &Order) -> Notification {
		self.notice(order, NotificationKind::Placed)
	}

	fn notice(&self, order: &Order, kind: NotificationKind) -> Notification {
		let (subject, headline) = match kind {
			NotificationKind::Placed => (
				format!("Your Order #{} with {}", order.id, self.shop_name),
				"Thank you for your order. We have received it and will confirm it shortly.",
			),
			NotificationKind::Confirmed => (
				format!("Order #{} Confirmed", order.id),
				"Your order has been confirmed and is now being processed.",
			),
			NotificationKind::Cancelled => (
				format!("Order #{} Cancelled", order.id),
				"Your order has been deleted at your request.",
			),
		};
		let status = match kind {
			NotificationKind::Cancelled => "cancelled",
			_ => order.lifecycle_state().as_str(),
		};

		let body = format!(
			concat!(
				"<html><body>",
				"<h2>{shop}</h2>",
				"<p>Hello <strong>{client}</strong>,</p>",
				"<p>{headline}</p>",
				"<ul>",
				"<li>Order Number: {id}</li>",
				"<li>Status: {status}</li>",
				"<li>Event: {event}</li>",
				"<li>Expected Delivery: {date}</li>",
				"</ul>",
				"</body></html>"
			),
			shop = escape_html(&self.shop_name),
			client = escape_html(&order.client),
			headline = headline,
			id = order.id,
			status = status,
			event = escape_html(&order.event_type),
			date = order.expected_date.format("%B %-d, %Y"),
		);

		Notification {
			recipient: order.client.clone(),
			subject,
			body,
			kind,
			order_id: order.id,
		}
	}
}

fn escape_html(input: &str) -> String {
	let mut escaped = String::with_capacity(input.len());
	for c in input.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			c => escaped.push(c),
		}
	}
	escaped
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{NaiveDate, TimeZone};
	use tailor_types::OrderStatus;

	fn lifecycle() -> OrderLifecycle {
		OrderLifecycle::new("JFK Tailor Shop")
	}

	fn order(id: u64, status: OrderStatus, is_confirmed: bool) -> Order {
		Order {
			id,
			client: "ada".to_string(),
			event_type: "Wedding".to_string(),
			preferred_color: Some("Navy".to_string()),
			material: true,
			measurements: "chest 40".to_string(),
			comments: "No additional comments".to_string(),
			expected_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
			order_date: Utc.with_ymd_and_hms(2030, 5, 1, 9, 0, 0).unwrap(),
			completed_at: None,
			is_confirmed,
			status,
		}
	}

	fn in_state(state: LifecycleState) -> Order {
		order(1, state.status(), state != LifecycleState::Unconfirmed)
	}

	fn is_illegal(result: Result<Transition, LifecycleError>) -> bool {
		matches!(result, Err(LifecycleError::IllegalTransition { .. }))
	}

	#[test]
	fn test_admin_confirms_unconfirmed_order() {
		let before = order(42, OrderStatus::Pending, false);
		let transition = lifecycle()
			.request_transition(&before, &Actor::admin("jfk"), Action::Confirm)
			.unwrap();

		let after = transition.order().unwrap();
		assert_eq!(after.id, 42);
		assert_eq!(after.status, OrderStatus::Pending);
		assert!(after.is_confirmed);
		assert_eq!(transition.from, LifecycleState::Unconfirmed);
		assert_eq!(transition.to, Some(LifecycleState::Confirmed));

		let notification = transition.notification.unwrap();
		assert_eq!(notification.recipient, "ada");
		assert_eq!(notification.kind, NotificationKind::Confirmed);
		assert_eq!(notification.subject, "Order #42 Confirmed");
	}

	#[test]
	fn test_fitting_cannot_be_reached_from_confirmed() {
		let confirmed = order(42, OrderStatus::Pending, true);
		let result =
			lifecycle().request_transition(&confirmed, &Actor::admin("jfk"), Action::AdvanceFitting);
		assert_eq!(
			result.unwrap_err(),
			LifecycleError::IllegalTransition {
				state: LifecycleState::Confirmed,
				action: Action::AdvanceFitting,
				role: Role::Admin,
			}
		);
	}

	#[test]
	fn test_in_progress_order_completes_without_notification() {
		let now = Utc.with_ymd_and_hms(2030, 5, 20, 12, 0, 0).unwrap();
		let started = order(7, OrderStatus::InProgress, true);
		let transition = lifecycle()
			.request_transition_at(&started, &Actor::admin("jfk"), Action::AdvanceCompleted, now)
			.unwrap();

		let after = transition.order().unwrap();
		assert_eq!(after.id, 7);
		assert_eq!(after.status, OrderStatus::Completed);
		assert_eq!(after.completed_at, Some(now));
		assert!(transition.notification.is_none());
	}

	#[test]
	fn test_non_owner_cannot_delete() {
		let unconfirmed = order(9, OrderStatus::Pending, false);
		assert!(is_illegal(lifecycle().request_transition(
			&unconfirmed,
			&Actor::client("mallory"),
			Action::Delete
		)));
	}

	#[test]
	fn test_no_backward_transition_from_fitting() {
		let fitting = order(11, OrderStatus::Fitting, true);
		assert!(is_illegal(lifecycle().request_transition(
			&fitting,
			&Actor::admin("jfk"),
			Action::AdvanceInProgress
		)));
	}

	#[test]
	fn test_owner_delete_removes_and_notifies() {
		let unconfirmed = order(9, OrderStatus::Pending, false);
		let transition = lifecycle()
			.request_transition(&unconfirmed, &Actor::client("ada"), Action::Delete)
			.unwrap();

		assert_eq!(transition.to, None);
		assert!(transition.order().is_none());
		assert_eq!(transition.outcome, Outcome::Removed(unconfirmed));
		let notification = transition.notification.unwrap();
		assert_eq!(notification.subject, "Order #9 Cancelled");
		assert_eq!(notification.kind, NotificationKind::Cancelled);
	}

	#[test]
	fn test_every_combination_matches_table() {
		let lifecycle = lifecycle();
		let admin = Actor::admin("jfk");
		let owner = Actor::client("ada");
		let stranger = Actor::client("bob");

		let expected = |state: LifecycleState, actor: &Actor| -> Vec<Action> {
			match (state, actor.role, actor.username == "ada") {
				(LifecycleState::Unconfirmed, Role::Admin, _) => vec![Action::Confirm],
				(LifecycleState::Unconfirmed, Role::Client, true) => {
					vec![Action::Delete, Action::Edit]
				},
				(LifecycleState::Confirmed, Role::Admin, _) => vec![Action::AdvanceInProgress],
				(LifecycleState::InProgress, Role::Admin, _) => {
					vec![Action::AdvanceFitting, Action::AdvanceCompleted]
				},
				(LifecycleState::Fitting, Role::Admin, _) => vec![Action::AdvanceCompleted],
				_ => vec![],
			}
		};

		for state in LifecycleState::all() {
			let order = in_state(state);
			for actor in [&admin, &owner, &stranger] {
				let legal = expected(state, actor);
				for action in Action::all() {
					let result = lifecycle.request_transition(&order, actor, action);
					assert_eq!(
						result.is_ok(),
						legal.contains(&action),
						"{} by {} in {}",
						action,
						actor.username,
						state
					);
				}
				let mut available = lifecycle.available_actions(&order, actor);
				let mut legal = legal;
				available.sort_by_key(|a| a.as_str());
				legal.sort_by_key(|a| a.as_str());
				assert_eq!(available, legal);
			}
		}
	}

	#[test]
	fn test_completed_is_terminal() {
		let lifecycle = lifecycle();
		let done = order(3, OrderStatus::Completed, true);
		let unconfirmed_done = order(4, OrderStatus::Completed, false);
		for actor in [Actor::admin("jfk"), Actor::client("ada")] {
			for action in Action::all() {
				assert!(is_illegal(lifecycle.request_transition(&done, &actor, action)));
				assert!(is_illegal(
					lifecycle.request_transition(&unconfirmed_done, &actor, action)
				));
			}
		}
	}

	#[test]
	fn test_legal_sequences_are_monotonic() {
		let lifecycle = lifecycle();
		let admin = Actor::admin("jfk");
		let owner = Actor::client("ada");

		// Walk every state reachable through legal transitions.
		let mut frontier = vec![order(1, OrderStatus::Pending, false)];
		let mut seen = Vec::new();
		while let Some(current) = frontier.pop() {
			if seen.contains(&current.lifecycle_state()) {
				continue;
			}
			seen.push(current.lifecycle_state());
			for actor in [&admin, &owner] {
				for action in Action::all() {
					let Ok(transition) = lifecycle.request_transition(&current, actor, action)
					else {
						continue;
					};
					if let Some(next) = transition.order() {
						assert!(next.status.rank() >= current.status.rank());
						assert!(next.is_confirmed || !current.is_confirmed);
						assert!(next.lifecycle_state() >= current.lifecycle_state());
						frontier.push(next.clone());
					}
				}
			}
		}
		seen.sort();
		assert_eq!(seen, LifecycleState::all().collect::<Vec<_>>());
	}

	#[test]
	fn test_edit_keeps_order_unchanged() {
		let unconfirmed = order(5, OrderStatus::Pending, false);
		let transition = lifecycle()
			.request_transition(&unconfirmed, &Actor::client("ada"), Action::Edit)
			.unwrap();
		assert_eq!(transition.order(), Some(&unconfirmed));
		assert!(transition.notification.is_none());
	}

	#[test]
	fn test_creation_notice_names_shop_and_escapes() {
		let mut placed = order(12, OrderStatus::Pending, false);
		placed.event_type = "Gala <black tie>".to_string();
		let notice = lifecycle().creation_notice(&placed);

		assert_eq!(notice.subject, "Your Order #12 with JFK Tailor Shop");
		assert_eq!(notice.kind, NotificationKind::Placed);
		assert!(notice.body.contains("Gala &lt;black tie&gt;"));
		assert!(notice.body.contains("June 1, 2030"));
	}
}
