//! Broadcast channel carrying [`TailorEvent`]s.
//!
//! Publishing never blocks and never fails the operation that triggered it;
//! events published while nobody listens are dropped.

use tailor_types::TailorEvent;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TailorEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TailorEvent> {
		self.sender.subscribe()
	}

	/// Returns the number of receivers that got the event.
	pub fn publish(&self, event: TailorEvent) -> usize {
		self.sender.send(event).unwrap_or(0)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
