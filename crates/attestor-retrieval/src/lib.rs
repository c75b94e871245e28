//! Finalization wait and proof retrieval.
//!
//! After submission the request's voting round has to be finalized by the
//! relay before the data-availability layer can serve a proof for it.
//! [`ProofRetriever::await_proof`] waits for finalization on-chain, pauses
//! briefly for replication, then polls the data-availability layer until the
//! proof payload appears. Both waits observe a [`Cancellation`] between
//! iterations and during sleeps.

use alloy_primitives::U256;
use async_trait::async_trait;
use attestor_chain::{ChainService, ContractRegistry, RegistryError};
use attestor_types::contracts::{names, IFdcVerification, IRelay};
use attestor_types::{DaProofResponse, EncodedRequest, Proof};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod cancel;
pub mod clock;
pub mod policy;

pub mod implementations {
	pub mod http;
}

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use clock::{Clock, TokioClock};
pub use implementations::http::HttpDataAvailability;
pub use policy::{finalization_step, PollPolicy, ProofObservation, ProofPoller, Step};

#[cfg(any(test, feature = "testing"))]
pub use clock::FakeClock;

#[derive(Debug, Error)]
pub enum RetrievalError {
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error("Chain error: {0}")]
	Chain(String),
	#[error("Round {round_id} not finalized after {waited_secs}s")]
	FinalizationTimeout { round_id: u64, waited_secs: u64 },
	#[error("Proof retrieval failed after {attempts} consecutive attempts: {reason}")]
	ProofRetrieval { attempts: u32, reason: String },
	#[error("Proof for round {round_id} not available after {attempts} requests")]
	ProofNotReady { round_id: u64, attempts: u32 },
	#[error("Malformed proof: {0}")]
	MalformedProof(String),
	#[error("Cancelled")]
	Cancelled,
}

#[derive(Debug, Error)]
pub enum DataAvailabilityError {
	#[error("Request failed with status {status}: {body}")]
	Status { status: u16, body: String },
	#[error("Transport error: {0}")]
	Transport(String),
	#[error("Malformed response: {0}")]
	Malformed(String),
}

#[async_trait]
pub trait DataAvailabilityInterface: Send + Sync {
	/// Asks for the proof of `request` in voting round `round_id`.
	async fn proof_by_round(
		&self,
		round_id: u64,
		request: &EncodedRequest,
	) -> Result<DaProofResponse, DataAvailabilityError>;
}

pub struct ProofRetriever {
	chain: ChainService,
	registry: Arc<dyn ContractRegistry>,
	data_availability: Arc<dyn DataAvailabilityInterface>,
	clock: Arc<dyn Clock>,
	policy: PollPolicy,
}

impl ProofRetriever {
	pub fn new(
		chain: ChainService,
		registry: Arc<dyn ContractRegistry>,
		data_availability: Arc<dyn DataAvailabilityInterface>,
		clock: Arc<dyn Clock>,
		policy: PollPolicy,
	) -> Self {
		Self {
			chain,
			registry,
			data_availability,
			clock,
			policy,
		}
	}

	pub fn policy(&self) -> &PollPolicy {
		&self.policy
	}

	/// Waits for `round_id` to be finalized and returns the first available proof.
	pub async fn await_proof(
		&self,
		encoded: &EncodedRequest,
		round_id: u64,
		cancel: &Cancellation,
	) -> Result<Proof, RetrievalError> {
		ensure_active(cancel)?;

		self.wait_for_finalization(round_id, cancel).await?;

		tracing::debug!(delay = ?self.policy.settle_delay, "Round finalized, settling");
		self.sleep(self.policy.settle_delay, cancel).await?;

		self.poll_proof(encoded, round_id, cancel).await
	}

	async fn wait_for_finalization(
		&self,
		round_id: u64,
		cancel: &Cancellation,
	) -> Result<(), RetrievalError> {
		let relay = self.registry.resolve(names::RELAY).await?;
		let verification = self.registry.resolve(names::FDC_VERIFICATION).await?;

		let protocol_id = self
			.chain
			.call_contract(verification, &IFdcVerification::fdcProtocolIdCall {})
			.await
			.map_err(|e| RetrievalError::Chain(e.to_string()))?
			._0;

		let query = IRelay::isFinalizedCall {
			protocolId: protocol_id,
			votingRoundId: U256::from(round_id),
		};

		tracing::info!(round_id = round_id, protocol_id = %protocol_id, "Waiting for round finalization");

		let started = self.clock.now();
		let mut polls = 0u32;
		loop {
			ensure_active(cancel)?;

			let finalized = self
				.chain
				.call_contract(relay, &query)
				.await
				.map_err(|e| RetrievalError::Chain(e.to_string()))?
				._0;
			polls += 1;

			let waited = self.clock.now().saturating_sub(started);
			match finalization_step(&self.policy, round_id, finalized, waited) {
				Step::Ready(()) => {
					tracing::info!(round_id = round_id, polls = polls, "Round finalized");
					return Ok(());
				}
				Step::Wait(delay) => {
					tracing::debug!(round_id = round_id, polls = polls, "Round not finalized yet");
					self.sleep(delay, cancel).await?;
				}
				Step::Fail(e) => return Err(e),
			}
		}
	}

	async fn poll_proof(
		&self,
		encoded: &EncodedRequest,
		round_id: u64,
		cancel: &Cancellation,
	) -> Result<Proof, RetrievalError> {
		let mut poller = ProofPoller::new(&self.policy, round_id);

		loop {
			ensure_active(cancel)?;

			let observation = match self.data_availability.proof_by_round(round_id, encoded).await {
				Ok(response) if response.is_ready() => ProofObservation::Available(response),
				Ok(_) => ProofObservation::NotReady,
				Err(e) => {
					tracing::warn!(round_id = round_id, error = %e, "Proof request failed");
					ProofObservation::TransportFailure(e.to_string())
				}
			};

			match poller.step(observation) {
				Step::Ready(proof) => {
					tracing::info!(
						round_id = round_id,
						requests = poller.requests(),
						merkle_depth = proof.merkle_proof.len(),
						"Proof retrieved"
					);
					return Ok(proof);
				}
				Step::Wait(delay) => {
					tracing::debug!(round_id = round_id, requests = poller.requests(), "Proof not available yet");
					self.sleep(delay, cancel).await?;
				}
				Step::Fail(e) => return Err(e),
			}
		}
	}

	async fn sleep(&self, delay: Duration, cancel: &Cancellation) -> Result<(), RetrievalError> {
		tokio::select! {
			_ = self.clock.sleep(delay) => Ok(()),
			_ = cancel.cancelled() => Err(RetrievalError::Cancelled),
		}
	}
}

fn ensure_active(cancel: &Cancellation) -> Result<(), RetrievalError> {
	if cancel.is_cancelled() {
		Err(RetrievalError::Cancelled)
	} else {
		Ok(())
	}
}
