//! Lifecycle controller for transfer attestations.
//!
//! [`AttestationLifecycle`] sequences the four stages of a run (prepare,
//! submit, retrieve, interact), keeps the artifact each stage hands to the
//! next and refuses to run a stage out of order. [`LifecycleBuilder`] wires
//! the stage components from configuration, with every backend replaceable.

use attestor_consumer::ConsumerError;
use attestor_retrieval::RetrievalError;
use attestor_submission::SubmissionError;
use attestor_types::{LifecycleState, Stage};
use attestor_verifier::VerifierError;
use thiserror::Error;

mod builder;
mod lifecycle;
mod persistence;

pub use builder::{poll_policy, LifecycleBuilder};
pub use lifecycle::{AttestationLifecycle, LifecycleSnapshot};
pub use persistence::SnapshotStore;

#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("Cannot {stage} while {state}")]
	InvalidState { stage: Stage, state: LifecycleState },

	#[error("{stage}: connected to chain {actual}, expected {expected}")]
	NetworkMismatch {
		stage: Stage,
		expected: u64,
		actual: u64,
	},

	#[error("{stage}: network error: {reason}")]
	Network { stage: Stage, reason: String },

	#[error("Configuration error: {reason}")]
	Configuration {
		stage: Option<Stage>,
		reason: String,
	},

	#[error("prepare: {0}")]
	Prepare(#[from] VerifierError),

	#[error("submit: {0}")]
	Submit(#[from] SubmissionError),

	#[error("retrieve: {0}")]
	Retrieve(#[from] RetrievalError),

	#[error("interact: {0}")]
	Interact(#[from] ConsumerError),

	#[error("Storage error: {0}")]
	Storage(String),
}

impl LifecycleError {
	/// Stage the error was raised in; `None` for failures outside any stage.
	pub fn stage(&self) -> Option<Stage> {
		match self {
			LifecycleError::InvalidState { stage, .. }
			| LifecycleError::NetworkMismatch { stage, .. }
			| LifecycleError::Network { stage, .. } => Some(*stage),
			LifecycleError::Configuration { stage, .. } => *stage,
			LifecycleError::Prepare(_) => Some(Stage::Prepare),
			LifecycleError::Submit(_) => Some(Stage::Submit),
			LifecycleError::Retrieve(_) => Some(Stage::Retrieve),
			LifecycleError::Interact(_) => Some(Stage::Interact),
			LifecycleError::Storage(_) => None,
		}
	}

	pub(crate) fn configuration(stage: Option<Stage>, reason: impl Into<String>) -> Self {
		LifecycleError::Configuration {
			stage,
			reason: reason.into(),
		}
	}
}
