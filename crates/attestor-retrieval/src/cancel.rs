//! Cooperative cancellation of long waits.
//!
//! Cancelling only abandons waiting. Transactions already sent stay sent.

use tokio::sync::watch;

/// Triggers cancellation for every [`Cancellation`] cloned from its pair.
#[derive(Debug)]
pub struct CancelHandle {
	sender: watch::Sender<bool>,
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct Cancellation {
	receiver: watch::Receiver<bool>,
}

/// Creates a connected handle and observer.
pub fn cancellation() -> (CancelHandle, Cancellation) {
	let (sender, receiver) = watch::channel(false);
	(CancelHandle { sender }, Cancellation { receiver })
}

impl CancelHandle {
	pub fn cancel(&self) {
		self.sender.send_replace(true);
	}
}

impl Cancellation {
	/// An observer that is never cancelled.
	pub fn never() -> Self {
		let (_, observer) = cancellation();
		observer
	}

	pub fn is_cancelled(&self) -> bool {
		*self.receiver.borrow()
	}

	/// Resolves once cancellation is requested. Pends forever if the handle is
	/// dropped without cancelling.
	pub async fn cancelled(&self) {
		let mut receiver = self.receiver.clone();
		loop {
			if *receiver.borrow_and_update() {
				return;
			}
			if receiver.changed().await.is_err() {
				std::future::pending::<()>().await;
			}
		}
	}
}
