//! Submission artifacts and voting-round arithmetic.

use crate::TransactionHash;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of submitting an encoded request on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
	pub transaction_hash: TransactionHash,
	pub block_number: u64,
	/// Voting round the request was submitted in; derived, never read from chain.
	pub round_id: u64,
	pub fee_paid: U256,
}

/// Fee-bearing request transaction that was sent but whose voting round is
/// not derived yet.
///
/// Held across retries so a failure after sending never pays the fee twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
	pub transaction_hash: TransactionHash,
	pub fee_paid: U256,
	/// Epoch parameters read before sending.
	pub epoch: VotingEpoch,
}

/// Errors raised while deriving a voting round.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoundIdError {
	#[error("Voting epoch duration is zero")]
	ZeroDuration,
	#[error("Timestamp {timestamp} precedes the first voting round start {first_round_start}")]
	BeforeFirstRound { timestamp: u64, first_round_start: u64 },
}

/// Voting epoch parameters published by the systems manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingEpoch {
	/// `T0`: start of voting round zero, in unix seconds.
	pub first_round_start_ts: u64,
	/// `D`: length of one voting round in seconds.
	pub duration_secs: u64,
}

impl VotingEpoch {
	pub fn new(first_round_start_ts: u64, duration_secs: u64) -> Self {
		Self {
			first_round_start_ts,
			duration_secs,
		}
	}

	/// Voting round containing `timestamp`: `floor((T - T0) / D)`.
	pub fn round_id_at(&self, timestamp: u64) -> Result<u64, RoundIdError> {
		if self.duration_secs == 0 {
			return Err(RoundIdError::ZeroDuration);
		}
		let elapsed = timestamp.checked_sub(self.first_round_start_ts).ok_or(
			RoundIdError::BeforeFirstRound {
				timestamp,
				first_round_start: self.first_round_start_ts,
			},
		)?;
		Ok(elapsed / self.duration_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const T0: u64 = 1_658_430_000;
	const D: u64 = 90;

	#[test]
	fn test_round_id_boundaries() {
		let epoch = VotingEpoch::new(T0, D);
		assert_eq!(epoch.round_id_at(T0), Ok(0));
		assert_eq!(epoch.round_id_at(T0 + D - 1), Ok(0));
		assert_eq!(epoch.round_id_at(T0 + D), Ok(1));
		assert_eq!(epoch.round_id_at(T0 + 1000 * D + 45), Ok(1000));
	}

	#[test]
	fn test_round_id_is_stable() {
		let epoch = VotingEpoch::new(T0, D);
		let ts = T0 + 123_456;
		assert_eq!(epoch.round_id_at(ts), epoch.round_id_at(ts));
		let round = epoch.round_id_at(ts).unwrap();
		assert!(T0 + round * D <= ts);
		assert!(ts < T0 + (round + 1) * D);
	}

	#[test]
	fn test_round_id_rejects_bad_inputs() {
		assert_eq!(
			VotingEpoch::new(T0, 0).round_id_at(T0),
			Err(RoundIdError::ZeroDuration)
		);
		assert_eq!(
			VotingEpoch::new(T0, D).round_id_at(T0 - 1),
			Err(RoundIdError::BeforeFirstRound {
				timestamp: T0 - 1,
				first_round_start: T0,
			})
		);
	}
}
