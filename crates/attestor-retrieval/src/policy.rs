//! Polling decisions, separated from the waiting itself.
//!
//! Each poller turns the outcome of one observation into a [`Step`]: stop
//! with a value, wait and observe again, or give up. The retriever owns the
//! clock and performs the waits, so these functions can be driven directly
//! in tests.

use crate::RetrievalError;
use attestor_types::{DaProofResponse, Proof};
use backoff::{backoff::Backoff, ExponentialBackoff};
use std::time::Duration;

/// Next action for a poll loop.
#[derive(Debug)]
pub enum Step<T> {
	Ready(T),
	Wait(Duration),
	Fail(RetrievalError),
}

/// Intervals and bounds for both polling phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
	pub finalization_interval: Duration,
	/// `None` waits for finalization indefinitely.
	pub finalization_max_wait: Option<Duration>,
	/// Pause between finalization and the first proof request.
	pub settle_delay: Duration,
	pub proof_interval: Duration,
	/// Not-ready responses tolerated; the next one fails.
	pub proof_max_attempts: u32,
	/// Consecutive transport failures tolerated; the next one fails.
	pub transport_max_retries: u32,
	pub transport_initial_backoff: Duration,
}

impl Default for PollPolicy {
	fn default() -> Self {
		Self {
			finalization_interval: Duration::from_secs(10),
			finalization_max_wait: Some(Duration::from_secs(300)),
			settle_delay: Duration::from_secs(10),
			proof_interval: Duration::from_secs(5),
			proof_max_attempts: 36,
			transport_max_retries: 4,
			transport_initial_backoff: Duration::from_secs(1),
		}
	}
}

/// Decides the next finalization step given the latest relay answer and the
/// time spent waiting so far.
pub fn finalization_step(
	policy: &PollPolicy,
	round_id: u64,
	finalized: bool,
	waited: Duration,
) -> Step<()> {
	if finalized {
		return Step::Ready(());
	}
	match policy.finalization_max_wait {
		Some(max_wait) if waited >= max_wait => Step::Fail(RetrievalError::FinalizationTimeout {
			round_id,
			waited_secs: waited.as_secs(),
		}),
		_ => Step::Wait(policy.finalization_interval),
	}
}

/// Result of one proof request.
#[derive(Debug)]
pub enum ProofObservation {
	/// The response carries a proof payload.
	Available(DaProofResponse),
	/// The service answered but the proof is not there yet.
	NotReady,
	/// The request itself failed.
	TransportFailure(String),
}

/// Tracks the two independent retry budgets of the proof phase.
///
/// Not-ready answers are retried at a fixed interval; transport failures are
/// retried with exponential backoff. Any successful answer resets the
/// transport budget.
pub struct ProofPoller {
	round_id: u64,
	interval: Duration,
	max_not_ready: u32,
	max_transport_retries: u32,
	backoff: ExponentialBackoff,
	requests: u32,
	not_ready: u32,
	transport_failures: u32,
}

impl ProofPoller {
	pub fn new(policy: &PollPolicy, round_id: u64) -> Self {
		let backoff = ExponentialBackoff {
			current_interval: policy.transport_initial_backoff,
			initial_interval: policy.transport_initial_backoff,
			randomization_factor: 0.0,
			multiplier: 2.0,
			max_elapsed_time: None,
			..Default::default()
		};

		Self {
			round_id,
			interval: policy.proof_interval,
			max_not_ready: policy.proof_max_attempts,
			max_transport_retries: policy.transport_max_retries,
			backoff,
			requests: 0,
			not_ready: 0,
			transport_failures: 0,
		}
	}

	/// Requests observed so far.
	pub fn requests(&self) -> u32 {
		self.requests
	}

	pub fn step(&mut self, observation: ProofObservation) -> Step<Proof> {
		self.requests += 1;

		match observation {
			ProofObservation::Available(response) => match response.into_proof() {
				Ok(proof) => Step::Ready(proof),
				Err(e) => Step::Fail(RetrievalError::MalformedProof(e.to_string())),
			},
			ProofObservation::NotReady => {
				self.transport_failures = 0;
				self.backoff.reset();
				self.not_ready += 1;
				if self.not_ready > self.max_not_ready {
					Step::Fail(RetrievalError::ProofNotReady {
						round_id: self.round_id,
						attempts: self.requests,
					})
				} else {
					Step::Wait(self.interval)
				}
			}
			ProofObservation::TransportFailure(reason) => {
				self.transport_failures += 1;
				if self.transport_failures > self.max_transport_retries {
					return Step::Fail(RetrievalError::ProofRetrieval {
						attempts: self.transport_failures,
						reason,
					});
				}
				match self.backoff.next_backoff() {
					Some(delay) => Step::Wait(delay),
					None => Step::Fail(RetrievalError::ProofRetrieval {
						attempts: self.transport_failures,
						reason,
					}),
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn policy() -> PollPolicy {
		PollPolicy {
			finalization_max_wait: Some(Duration::from_secs(30)),
			proof_max_attempts: 2,
			transport_max_retries: 3,
			..Default::default()
		}
	}

	fn ready() -> ProofObservation {
		ProofObservation::Available(DaProofResponse {
			response_hex: Some("0x01".into()),
			..Default::default()
		})
	}

	#[test]
	fn test_finalization_steps() {
		let policy = policy();
		assert!(matches!(
			finalization_step(&policy, 7, true, Duration::from_secs(500)),
			Step::Ready(())
		));
		assert!(matches!(
			finalization_step(&policy, 7, false, Duration::from_secs(29)),
			Step::Wait(d) if d == Duration::from_secs(10)
		));
		assert!(matches!(
			finalization_step(&policy, 7, false, Duration::from_secs(30)),
			Step::Fail(RetrievalError::FinalizationTimeout { round_id: 7, waited_secs: 30 })
		));

		let unbounded = PollPolicy {
			finalization_max_wait: None,
			..policy
		};
		assert!(matches!(
			finalization_step(&unbounded, 7, false, Duration::from_secs(86_400)),
			Step::Wait(_)
		));
	}

	#[test]
	fn test_not_ready_budget() {
		let mut poller = ProofPoller::new(&policy(), 9);
		assert!(matches!(poller.step(ProofObservation::NotReady), Step::Wait(d) if d == Duration::from_secs(5)));
		assert!(matches!(poller.step(ProofObservation::NotReady), Step::Wait(_)));
		assert!(matches!(
			poller.step(ProofObservation::NotReady),
			Step::Fail(RetrievalError::ProofNotReady { round_id: 9, attempts: 3 })
		));
	}

	#[test]
	fn test_transport_backoff_doubles_then_fails() {
		let mut poller = ProofPoller::new(&policy(), 9);
		let mut delays = Vec::new();
		for _ in 0..3 {
			match poller.step(ProofObservation::TransportFailure("502".into())) {
				Step::Wait(delay) => delays.push(delay),
				other => panic!("unexpected step: {other:?}"),
			}
		}
		assert_eq!(
			delays,
			vec![
				Duration::from_secs(1),
				Duration::from_secs(2),
				Duration::from_secs(4)
			]
		);
		assert!(matches!(
			poller.step(ProofObservation::TransportFailure("502".into())),
			Step::Fail(RetrievalError::ProofRetrieval { attempts: 4, .. })
		));
	}

	#[test]
	fn test_answer_resets_transport_budget() {
		let mut poller = ProofPoller::new(&policy(), 9);
		for _ in 0..3 {
			poller.step(ProofObservation::TransportFailure("timeout".into()));
		}
		assert!(matches!(poller.step(ProofObservation::NotReady), Step::Wait(_)));
		assert!(matches!(
			poller.step(ProofObservation::TransportFailure("timeout".into())),
			Step::Wait(d) if d == Duration::from_secs(1)
		));
		assert!(matches!(poller.step(ready()), Step::Ready(_)));
		assert_eq!(poller.requests(), 6);
	}

	#[test]
	fn test_malformed_proof_fails() {
		let mut poller = ProofPoller::new(&policy(), 9);
		let observation = ProofObservation::Available(DaProofResponse {
			response_hex: Some("0xzz".into()),
			..Default::default()
		});
		assert!(matches!(
			poller.step(observation),
			Step::Fail(RetrievalError::MalformedProof(_))
		));
	}
}
