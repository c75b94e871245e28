use crate::LifecycleError;
use alloy_primitives::Address;
use attestor_account::SigningIdentity;
use attestor_chain::ChainService;
use attestor_consumer::TransferListConsumer;
use attestor_retrieval::{Cancellation, ProofRetriever};
use attestor_submission::{SubmissionEngine, SubmissionError};
use attestor_types::{
	utils::truncate_hash, ContractResult, EncodedRequest, EventBus, LifecycleEvent, LifecycleState,
	PendingSubmission, Proof, Stage, SubmissionReceipt,
};
use attestor_verifier::RequestEncoder;
use serde::{Deserialize, Serialize};

/// State of a run together with every artifact produced so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
	pub state: LifecycleState,
	#[serde(default)]
	pub transfer_id: Option<String>,
	#[serde(default)]
	pub encoded_request: Option<EncodedRequest>,
	/// Request sent and paid for, awaiting round derivation.
	#[serde(default)]
	pub pending_submission: Option<PendingSubmission>,
	#[serde(default)]
	pub submission: Option<SubmissionReceipt>,
	#[serde(default)]
	pub proof: Option<Proof>,
	#[serde(default)]
	pub result: Option<ContractResult>,
}

impl LifecycleSnapshot {
	/// Checks that every artifact the state depends on is present.
	pub fn validate(&self) -> Result<(), LifecycleError> {
		if self.pending_submission.is_some() && self.state != LifecycleState::Submitting {
			return Err(LifecycleError::configuration(
				None,
				format!("snapshot in state {} holds a pending submission", self.state),
			));
		}

		let missing = match self.state {
			LifecycleState::Preparing => None,
			_ if self.encoded_request.is_none() => Some("encoded request"),
			LifecycleState::Submitting => None,
			_ if self.submission.is_none() => Some("submission receipt"),
			LifecycleState::Retrieving => None,
			_ if self.proof.is_none() => Some("proof"),
			LifecycleState::Interacting => None,
			_ if self.result.is_none() => Some("contract result"),
			LifecycleState::Complete => None,
		};

		match missing {
			Some(artifact) => Err(LifecycleError::configuration(
				None,
				format!("snapshot in state {} has no {}", self.state, artifact),
			)),
			None => Ok(()),
		}
	}
}

/// Sequencer of one attestation run.
///
/// Stages run strictly in order and each one needs the artifact of the one
/// before it. A failed stage leaves the state where it was, so the same
/// stage can be retried without repeating the ones that already succeeded.
/// Every stage method takes `&mut self`, which keeps a single stage in
/// flight per run.
pub struct AttestationLifecycle {
	pub(crate) chain: ChainService,
	pub(crate) expected_chain_id: u64,
	pub(crate) encoder: RequestEncoder,
	pub(crate) submission: SubmissionEngine,
	pub(crate) retriever: ProofRetriever,
	pub(crate) consumer: TransferListConsumer,
	pub(crate) contract: Option<Address>,
	pub(crate) identity: SigningIdentity,
	pub(crate) event_bus: EventBus,
	pub(crate) snapshot: LifecycleSnapshot,
}

impl AttestationLifecycle {
	pub fn state(&self) -> LifecycleState {
		self.snapshot.state
	}

	pub fn snapshot(&self) -> &LifecycleSnapshot {
		&self.snapshot
	}

	/// Resumes a run from a previously taken snapshot.
	pub fn restore(&mut self, snapshot: LifecycleSnapshot) -> Result<(), LifecycleError> {
		snapshot.validate()?;
		tracing::debug!(state = %snapshot.state, "Restored lifecycle snapshot");
		self.snapshot = snapshot;
		Ok(())
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn identity(&self) -> &SigningIdentity {
		&self.identity
	}

	pub fn contract(&self) -> Option<Address> {
		self.contract
	}

	/// Overrides the consumer contract the interact stage targets.
	pub fn set_contract(&mut self, contract: Address) {
		self.contract = Some(contract);
	}

	/// Stage 1: builds the request for `transfer_id` and has the verifier encode it.
	pub async fn prepare(
		&mut self,
		transfer_id: &str,
		credential: &str,
	) -> Result<EncodedRequest, LifecycleError> {
		self.begin(Stage::Prepare).await?;

		let outcome = self.encoder.build_and_submit(transfer_id, credential).await;
		let encoded = self.settle(Stage::Prepare, outcome)?;

		self.snapshot.transfer_id = Some(transfer_id.to_string());
		self.snapshot.encoded_request = Some(encoded.clone());
		self.advance(Stage::Prepare);
		Ok(encoded)
	}

	/// Stage 2: pays the fee and submits the encoded request on-chain.
	///
	/// Once the request is sent it is kept as a pending submission, and a
	/// retry after a later failure only waits for it again instead of paying
	/// a second fee. A reverted request is dropped so the retry sends anew.
	pub async fn submit(&mut self) -> Result<SubmissionReceipt, LifecycleError> {
		self.begin(Stage::Submit).await?;

		let pending = match self.snapshot.pending_submission.clone() {
			Some(pending) => {
				tracing::info!(
					tx_hash = %truncate_hash(&pending.transaction_hash.to_string()),
					"Resuming sent attestation request"
				);
				pending
			}
			None => {
				let encoded =
					require(Stage::Submit, &self.snapshot.encoded_request, "encoded request")?;
				let outcome = self.submission.send(&encoded, &self.identity).await;
				let pending = self.settle(Stage::Submit, outcome)?;
				self.snapshot.pending_submission = Some(pending.clone());
				pending
			}
		};

		let outcome = self.submission.complete(&pending).await;
		if matches!(outcome, Err(SubmissionError::Reverted(_))) {
			self.snapshot.pending_submission = None;
		}
		let receipt = self.settle(Stage::Submit, outcome)?;

		self.snapshot.pending_submission = None;
		self.snapshot.submission = Some(receipt.clone());
		self.advance(Stage::Submit);
		Ok(receipt)
	}

	/// Stage 3: waits for the round to finalize and fetches the proof.
	pub async fn retrieve(&mut self, cancel: &Cancellation) -> Result<Proof, LifecycleError> {
		self.begin(Stage::Retrieve).await?;
		let encoded = require(Stage::Retrieve, &self.snapshot.encoded_request, "encoded request")?;
		let receipt = require(Stage::Retrieve, &self.snapshot.submission, "submission receipt")?;

		let outcome = self
			.retriever
			.await_proof(&encoded, receipt.round_id, cancel)
			.await;
		let proof = self.settle(Stage::Retrieve, outcome)?;

		self.snapshot.proof = Some(proof.clone());
		self.advance(Stage::Retrieve);
		Ok(proof)
	}

	/// Stage 4: applies the proof to the consumer contract.
	pub async fn interact(&mut self) -> Result<ContractResult, LifecycleError> {
		self.ensure_state(Stage::Interact)?;
		let contract = self.contract.ok_or_else(|| {
			LifecycleError::configuration(
				Some(Stage::Interact),
				"consumer.contract_address is not set",
			)
		})?;

		self.begin(Stage::Interact).await?;
		let proof = require(Stage::Interact, &self.snapshot.proof, "proof")?;

		let outcome = self.consumer.apply(&proof, contract, &self.identity).await;
		let result = self.settle(Stage::Interact, outcome)?;

		tracing::info!(
			tx_hash = %truncate_hash(&result.transaction_hash.to_string()),
			transfers = result.transfers.len(),
			"Transfer recorded"
		);
		self.snapshot.result = Some(result.clone());
		self.advance(Stage::Interact);
		Ok(result)
	}

	/// Executes the stage the run is waiting on and returns it, or `None`
	/// once the run is complete.
	///
	/// A run that was already started for another transfer must be reset first.
	pub async fn step(
		&mut self,
		transfer_id: &str,
		credential: &str,
		cancel: &Cancellation,
	) -> Result<Option<Stage>, LifecycleError> {
		if let Some(current) = self.snapshot.transfer_id.as_deref() {
			if current != transfer_id {
				return Err(LifecycleError::configuration(
					None,
					format!("a run for transfer {} is in progress; reset it first", current),
				));
			}
		}

		let Some(stage) = Stage::for_state(self.state()) else {
			return Ok(None);
		};
		match stage {
			Stage::Prepare => {
				self.prepare(transfer_id, credential).await?;
			}
			Stage::Submit => {
				self.submit().await?;
			}
			Stage::Retrieve => {
				self.retrieve(cancel).await?;
			}
			Stage::Interact => {
				self.interact().await?;
			}
		}
		Ok(Some(stage))
	}

	/// Runs every remaining stage for `transfer_id` through to completion.
	pub async fn run(
		&mut self,
		transfer_id: &str,
		credential: &str,
		cancel: &Cancellation,
	) -> Result<ContractResult, LifecycleError> {
		while self.step(transfer_id, credential, cancel).await?.is_some() {}
		require(Stage::Interact, &self.snapshot.result, "contract result")
	}

	/// Returns to `Preparing` and discards every artifact.
	pub fn reset(&mut self) {
		tracing::info!(from = %self.snapshot.state, "Resetting lifecycle");
		self.snapshot = LifecycleSnapshot::default();
		self.publish(LifecycleEvent::Reset);
	}

	fn ensure_state(&self, stage: Stage) -> Result<(), LifecycleError> {
		let state = self.snapshot.state;
		if state != stage.required_state() {
			return Err(LifecycleError::InvalidState { stage, state });
		}
		Ok(())
	}

	async fn begin(&self, stage: Stage) -> Result<(), LifecycleError> {
		self.ensure_state(stage)?;
		self.check_network(stage).await?;

		tracing::info!(stage = %stage, "Stage started");
		self.publish(LifecycleEvent::StageStarted { stage });
		Ok(())
	}

	/// Refuses to run against any chain other than the configured one.
	async fn check_network(&self, stage: Stage) -> Result<(), LifecycleError> {
		let actual = self
			.chain
			.chain_id()
			.await
			.map_err(|e| LifecycleError::Network {
				stage,
				reason: e.to_string(),
			})?;

		if actual != self.expected_chain_id {
			return Err(LifecycleError::NetworkMismatch {
				stage,
				expected: self.expected_chain_id,
				actual,
			});
		}
		Ok(())
	}

	fn settle<T, E>(&self, stage: Stage, outcome: Result<T, E>) -> Result<T, LifecycleError>
	where
		E: Into<LifecycleError>,
	{
		outcome.map_err(|e| {
			let err = e.into();
			tracing::error!(stage = %stage, error = %err, "Stage failed");
			self.publish(LifecycleEvent::StageFailed {
				stage,
				error: err.to_string(),
			});
			err
		})
	}

	fn advance(&mut self, stage: Stage) {
		self.snapshot.state = stage.next_state();
		tracing::info!(stage = %stage, state = %self.snapshot.state, "Stage completed");
		self.publish(LifecycleEvent::StageCompleted {
			stage,
			state: self.snapshot.state,
		});
	}

	fn publish(&self, event: LifecycleEvent) {
		self.event_bus.publish(event).ok();
	}
}

fn require<T: Clone>(stage: Stage, artifact: &Option<T>, name: &str) -> Result<T, LifecycleError> {
	artifact.clone().ok_or_else(|| {
		LifecycleError::configuration(Some(stage), format!("{} artifact is missing", name))
	})
}
