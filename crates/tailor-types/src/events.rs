//! Events published on the engine's event bus.
//!
//! Every successful order write is announced here so that list views and the
//! background loop can react without polling the backend.

use crate::lifecycle::Action;
use crate::order::{LifecycleState, Order};
use serde::{Deserialize, Serialize};

/// Main event type published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TailorEvent {
	Order(OrderEvent),
	/// A notification could not be delivered after a successful write.
	NotificationFailed { order_id: u64, reason: String },
}

/// Changes to orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order was placed.
	Created { order: Order },
	/// The editable fields of an unconfirmed order changed.
	Edited { order: Order },
	/// The order moved to a new lifecycle state.
	Transitioned {
		order: Order,
		action: Action,
		from: LifecycleState,
		to: LifecycleState,
	},
	/// The order was removed by its owner.
	Deleted { order_id: u64, client: String },
}

impl TailorEvent {
	/// Id of the order the event is about.
	pub fn order_id(&self) -> u64 {
		match self {
			TailorEvent::Order(OrderEvent::Created { order })
			| TailorEvent::Order(OrderEvent::Edited { order })
			| TailorEvent::Order(OrderEvent::Transitioned { order, .. }) => order.id,
			TailorEvent::Order(OrderEvent::Deleted { order_id, .. })
			| TailorEvent::NotificationFailed { order_id, .. } => *order_id,
		}
	}
}
