//! Lifecycle vocabulary shared by the controller, engine and API.
//!
//! Defines who is acting (`Actor`, `Role`), what they ask for (`Action`)
//! and the notification descriptors produced by transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of the user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Admin,
	Client,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::Client => "client",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"admin" => Ok(Role::Admin),
			"client" => Ok(Role::Client),
			other => Err(format!("Unknown role: {}", other)),
		}
	}
}

/// Session context injected into every lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub username: String,
	pub role: Role,
}

impl Actor {
	pub fn new(username: impl Into<String>, role: Role) -> Self {
		Self {
			username: username.into(),
			role,
		}
	}

	pub fn admin(username: impl Into<String>) -> Self {
		Self::new(username, Role::Admin)
	}

	pub fn client(username: impl Into<String>) -> Self {
		Self::new(username, Role::Client)
	}

	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}

	/// Administrators may act on any user's records, clients only on their own.
	pub fn can_access(&self, username: &str) -> bool {
		self.is_admin() || self.username == username
	}
}

/// Operation requested against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Confirm,
	AdvanceInProgress,
	AdvanceFitting,
	AdvanceCompleted,
	Delete,
	Edit,
}

impl Action {
	pub fn as_str(&self) -> &'static str {
		match self {
			Action::Confirm => "confirm",
			Action::AdvanceInProgress => "advance_in_progress",
			Action::AdvanceFitting => "advance_fitting",
			Action::AdvanceCompleted => "advance_completed",
			Action::Delete => "delete",
			Action::Edit => "edit",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Confirm,
			Self::AdvanceInProgress,
			Self::AdvanceFitting,
			Self::AdvanceCompleted,
			Self::Delete,
			Self::Edit,
		]
		.into_iter()
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Action::all()
			.find(|a| a.as_str() == s)
			.ok_or_else(|| format!("Unknown action: {}", s))
	}
}

/// Reason a notification is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
	Placed,
	Confirmed,
	Cancelled,
}

/// Outbound message descriptor produced by a transition.
///
/// Delivery is performed by a notification implementation after the state
/// change has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	/// Username of the client to notify.
	pub recipient: String,
	pub subject: String,
	/// Short HTML body.
	pub body: String,
	pub kind: NotificationKind,
	pub order_id: u64,
}
