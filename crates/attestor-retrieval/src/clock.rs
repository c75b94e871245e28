//! Time source for the pollers.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
	/// Time elapsed since the clock was created.
	fn now(&self) -> Duration;

	async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by the tokio timer.
pub struct TokioClock {
	origin: tokio::time::Instant,
}

impl TokioClock {
	pub fn new() -> Self {
		Self {
			origin: tokio::time::Instant::now(),
		}
	}
}

impl Default for TokioClock {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Clock for TokioClock {
	fn now(&self) -> Duration {
		self.origin.elapsed()
	}

	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

#[cfg(any(test, feature = "testing"))]
pub use fake::FakeClock;

#[cfg(any(test, feature = "testing"))]
mod fake {
	use super::Clock;
	use async_trait::async_trait;
	use std::sync::Mutex;
	use std::time::Duration;

	/// Clock whose sleeps return immediately after advancing virtual time.
	#[derive(Default)]
	pub struct FakeClock {
		elapsed: Mutex<Duration>,
		sleeps: Mutex<Vec<Duration>>,
	}

	impl FakeClock {
		pub fn new() -> Self {
			Self::default()
		}

		/// Every sleep requested so far, in order.
		pub fn sleeps(&self) -> Vec<Duration> {
			self.sleeps
				.lock()
				.map(|sleeps| sleeps.clone())
				.unwrap_or_default()
		}

		pub fn advance(&self, duration: Duration) {
			if let Ok(mut elapsed) = self.elapsed.lock() {
				*elapsed += duration;
			}
		}
	}

	#[async_trait]
	impl Clock for FakeClock {
		fn now(&self) -> Duration {
			self.elapsed.lock().map(|elapsed| *elapsed).unwrap_or_default()
		}

		async fn sleep(&self, duration: Duration) {
			self.advance(duration);
			if let Ok(mut sleeps) = self.sleeps.lock() {
				sleeps.push(duration);
			}
			tokio::task::yield_now().await;
		}
	}
}
