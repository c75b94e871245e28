//! Lifecycle events and the broadcast bus they travel on.

use crate::{LifecycleState, Stage};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
	StageStarted { stage: Stage },
	StageCompleted { stage: Stage, state: LifecycleState },
	StageFailed { stage: Stage, error: String },
	Reset,
}

/// Event bus for broadcasting lifecycle events to any number of subscribers.
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
	/// Creates a new EventBus with the specified channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error if there are no active subscribers.
	pub fn publish(
		&self,
		event: LifecycleEvent,
	) -> Result<(), broadcast::error::SendError<LifecycleEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(4);
		assert!(bus.publish(LifecycleEvent::Reset).is_err());

		let mut rx = bus.subscribe();
		bus.clone()
			.publish(LifecycleEvent::StageStarted {
				stage: Stage::Submit,
			})
			.unwrap();
		assert_eq!(
			rx.try_recv().unwrap(),
			LifecycleEvent::StageStarted {
				stage: Stage::Submit
			}
		);
	}
}
