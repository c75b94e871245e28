use crate::{AttestationLifecycle, LifecycleError, LifecycleSnapshot};
use attestor_account::SigningIdentity;
use attestor_chain::implementations::alloy::AlloyChain;
use attestor_chain::{ChainInterface, ChainService, ContractRegistry, OnChainRegistry};
use attestor_config::{Config, RetrievalConfig};
use attestor_consumer::TransferListConsumer;
use attestor_retrieval::{
	Clock, DataAvailabilityInterface, HttpDataAvailability, PollPolicy, ProofRetriever, TokioClock,
};
use attestor_submission::SubmissionEngine;
use attestor_types::EventBus;
use attestor_verifier::implementations::http::HttpVerifier;
use attestor_verifier::{RequestEncoder, VerifierInterface};
use std::sync::Arc;

/// Polling policy described by the `[retrieval]` section.
pub fn poll_policy(config: &RetrievalConfig) -> PollPolicy {
	PollPolicy {
		finalization_interval: config.finalization_interval(),
		finalization_max_wait: config.finalization_max_wait(),
		settle_delay: config.settle_delay(),
		proof_interval: config.proof_interval(),
		proof_max_attempts: config.proof_max_attempts,
		transport_max_retries: config.transport_max_retries,
		transport_initial_backoff: config.transport_initial_backoff(),
	}
}

/// Wires an [`AttestationLifecycle`] from configuration.
///
/// Every collaborator defaults to the backend the configuration describes
/// and can be replaced before [`build`](Self::build).
pub struct LifecycleBuilder {
	config: Config,
	chain: Option<Arc<dyn ChainInterface>>,
	registry: Option<Arc<dyn ContractRegistry>>,
	verifier: Option<Arc<dyn VerifierInterface>>,
	data_availability: Option<Arc<dyn DataAvailabilityInterface>>,
	clock: Option<Arc<dyn Clock>>,
	identity: Option<SigningIdentity>,
	event_bus: Option<EventBus>,
}

impl LifecycleBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			chain: None,
			registry: None,
			verifier: None,
			data_availability: None,
			clock: None,
			identity: None,
			event_bus: None,
		}
	}

	pub fn with_chain(mut self, chain: Arc<dyn ChainInterface>) -> Self {
		self.chain = Some(chain);
		self
	}

	pub fn with_registry(mut self, registry: Arc<dyn ContractRegistry>) -> Self {
		self.registry = Some(registry);
		self
	}

	pub fn with_verifier(mut self, verifier: Arc<dyn VerifierInterface>) -> Self {
		self.verifier = Some(verifier);
		self
	}

	pub fn with_data_availability(
		mut self,
		data_availability: Arc<dyn DataAvailabilityInterface>,
	) -> Self {
		self.data_availability = Some(data_availability);
		self
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	/// Signs with `identity` instead of the configured private key.
	pub fn with_identity(mut self, identity: SigningIdentity) -> Self {
		self.identity = Some(identity);
		self
	}

	pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
		self.event_bus = Some(event_bus);
		self
	}

	pub fn build(self) -> Result<AttestationLifecycle, LifecycleError> {
		let config = self.config;

		let backend: Arc<dyn ChainInterface> = match self.chain {
			Some(chain) => chain,
			None => Arc::new(
				AlloyChain::new(&config.network.rpc_url)
					.map_err(|e| LifecycleError::configuration(None, e.to_string()))?
					.with_receipt_polling(
						config.network.receipt_poll_interval(),
						config.network.receipt_timeout(),
					),
			),
		};
		let chain = ChainService::new(backend);

		let registry = self.registry.unwrap_or_else(|| {
			Arc::new(OnChainRegistry::new(
				chain.clone(),
				config.network.registry_address,
			)) as Arc<dyn ContractRegistry>
		});

		let verifier: Arc<dyn VerifierInterface> = match self.verifier {
			Some(verifier) => verifier,
			None => Arc::new(
				HttpVerifier::new(&config.verifier.url, config.verifier.api_key.clone())
					.map_err(|e| LifecycleError::configuration(None, e.to_string()))?,
			),
		};

		let data_availability: Arc<dyn DataAvailabilityInterface> = match self.data_availability {
			Some(data_availability) => data_availability,
			None => Arc::new(
				HttpDataAvailability::new(&config.data_availability.url)
					.map_err(|e| LifecycleError::configuration(None, e.to_string()))?,
			),
		};

		let identity = match self.identity {
			Some(identity) => identity,
			None => SigningIdentity::from_private_key(&config.account.private_key)
				.map_err(|e| LifecycleError::configuration(None, e.to_string()))?,
		};

		let clock = self
			.clock
			.unwrap_or_else(|| Arc::new(TokioClock::new()) as Arc<dyn Clock>);
		let confirmations = config.network.confirmations;

		Ok(AttestationLifecycle {
			expected_chain_id: config.network.chain_id,
			encoder: RequestEncoder::new(verifier, config.upstream.transfer_api_url.clone()),
			submission: SubmissionEngine::new(chain.clone(), registry.clone(), confirmations),
			retriever: ProofRetriever::new(
				chain.clone(),
				registry,
				data_availability,
				clock,
				poll_policy(&config.retrieval),
			),
			consumer: TransferListConsumer::new(
				chain.clone(),
				config.consumer.gas_margin_percent,
				confirmations,
			),
			contract: config.consumer.contract_address,
			identity,
			event_bus: self.event_bus.unwrap_or_default(),
			snapshot: LifecycleSnapshot::default(),
			chain,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address, U256};
	use async_trait::async_trait;
	use attestor_chain::mock::MockChain;
	use attestor_config::ConfigLoader;
	use attestor_retrieval::{Cancellation, DataAvailabilityError, FakeClock};
	use attestor_types::{
		AttestationRequest, DaProofResponse, EncodedRequest, LifecycleEvent, LifecycleState, Stage,
	};
	use attestor_verifier::VerifierError;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	const CONFIG: &str = r#"
[network]
chain_id = 114
rpc_url = "http://127.0.0.1:8545"

[verifier]
url = "http://127.0.0.1:9000/verifier/web2/"
api_key = "verifier-key"

[data_availability]
url = "http://127.0.0.1:9001/"

[account]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[retrieval]
finalization_interval_secs = 7
finalization_max_wait_secs = 0
proof_max_attempts = 3
"#;

	const CONSUMER: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

	fn config() -> Config {
		ConfigLoader::new()
			.with_env_prefix("ATTESTOR_CORE_TEST_")
			.load_from_str(CONFIG)
			.unwrap()
	}

	#[derive(Default)]
	struct CountingVerifier {
		calls: AtomicUsize,
	}

	#[async_trait]
	impl VerifierInterface for CountingVerifier {
		async fn prepare_request(
			&self,
			_request: &AttestationRequest,
		) -> Result<EncodedRequest, VerifierError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(EncodedRequest::new(vec![0x57, 0x65, 0x62, 0x32]))
		}
	}

	struct PendingDa;

	#[async_trait]
	impl DataAvailabilityInterface for PendingDa {
		async fn proof_by_round(
			&self,
			_round_id: u64,
			_request: &EncodedRequest,
		) -> Result<DaProofResponse, DataAvailabilityError> {
			Ok(DaProofResponse::default())
		}
	}

	fn lifecycle(mock: Arc<MockChain>, verifier: Arc<CountingVerifier>) -> AttestationLifecycle {
		LifecycleBuilder::new(config())
			.with_chain(mock)
			.with_verifier(verifier)
			.with_data_availability(Arc::new(PendingDa))
			.with_clock(Arc::new(FakeClock::new()))
			.build()
			.unwrap()
	}

	#[test]
	fn test_poll_policy_from_config() {
		let policy = poll_policy(&config().retrieval);
		assert_eq!(policy.finalization_interval, Duration::from_secs(7));
		assert_eq!(policy.finalization_max_wait, None);
		assert_eq!(policy.proof_interval, Duration::from_secs(5));
		assert_eq!(policy.proof_max_attempts, 3);
		assert_eq!(policy.transport_initial_backoff, Duration::from_secs(1));
	}

	#[tokio::test]
	async fn test_build_with_default_backends() {
		let lifecycle = LifecycleBuilder::new(config()).build().unwrap();
		assert_eq!(lifecycle.state(), LifecycleState::Preparing);
		assert_eq!(lifecycle.contract(), None);
	}

	#[tokio::test]
	async fn test_prepare_advances_and_records_artifact() {
		let verifier = Arc::new(CountingVerifier::default());
		let mut lifecycle = lifecycle(Arc::new(MockChain::new(114)), verifier.clone());
		let mut events = lifecycle.event_bus().subscribe();

		let encoded = lifecycle.prepare("1614003520", "token").await.unwrap();

		assert_eq!(lifecycle.state(), LifecycleState::Submitting);
		assert_eq!(lifecycle.snapshot().encoded_request.as_ref(), Some(&encoded));
		assert_eq!(lifecycle.snapshot().transfer_id.as_deref(), Some("1614003520"));
		assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);

		assert_eq!(
			events.try_recv().unwrap(),
			LifecycleEvent::StageStarted {
				stage: Stage::Prepare
			}
		);
		assert_eq!(
			events.try_recv().unwrap(),
			LifecycleEvent::StageCompleted {
				stage: Stage::Prepare,
				state: LifecycleState::Submitting,
			}
		);
	}

	#[tokio::test]
	async fn test_out_of_order_stages_are_rejected() {
		let verifier = Arc::new(CountingVerifier::default());
		let mut lifecycle = lifecycle(Arc::new(MockChain::new(114)), verifier.clone());

		let err = lifecycle.submit().await.unwrap_err();
		assert!(matches!(
			err,
			LifecycleError::InvalidState {
				stage: Stage::Submit,
				state: LifecycleState::Preparing
			}
		));
		assert!(matches!(
			lifecycle.retrieve(&Cancellation::never()).await,
			Err(LifecycleError::InvalidState { .. })
		));

		lifecycle.prepare("1", "token").await.unwrap();
		let err = lifecycle.prepare("1", "token").await.unwrap_err();
		assert_eq!(err.stage(), Some(Stage::Prepare));
		assert!(matches!(err, LifecycleError::InvalidState { .. }));
		assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
		assert_eq!(lifecycle.state(), LifecycleState::Submitting);
	}

	#[tokio::test]
	async fn test_wrong_network_is_refused() {
		let verifier = Arc::new(CountingVerifier::default());
		let mock = Arc::new(MockChain::new(14));
		let mut lifecycle = lifecycle(mock.clone(), verifier.clone());

		let err = lifecycle.prepare("1614003520", "token").await.unwrap_err();
		assert!(matches!(
			err,
			LifecycleError::NetworkMismatch {
				stage: Stage::Prepare,
				expected: 114,
				actual: 14
			}
		));
		assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
		assert_eq!(lifecycle.state(), LifecycleState::Preparing);

		mock.set_chain_id(114);
		lifecycle.prepare("1614003520", "token").await.unwrap();
	}

	#[tokio::test]
	async fn test_failed_stage_keeps_state() {
		let verifier = Arc::new(CountingVerifier::default());
		let mut lifecycle = lifecycle(Arc::new(MockChain::new(114)), verifier.clone());
		let mut events = lifecycle.event_bus().subscribe();

		let err = lifecycle.prepare("16140x3520", "token").await.unwrap_err();
		assert!(matches!(err, LifecycleError::Prepare(VerifierError::InvalidInput(_))));
		assert_eq!(lifecycle.state(), LifecycleState::Preparing);
		assert_eq!(lifecycle.snapshot(), &LifecycleSnapshot::default());

		events.try_recv().unwrap();
		assert!(matches!(
			events.try_recv().unwrap(),
			LifecycleEvent::StageFailed {
				stage: Stage::Prepare,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_interact_requires_contract_before_network() {
		let verifier = Arc::new(CountingVerifier::default());
		let mock = Arc::new(MockChain::new(14));
		let mut lifecycle = lifecycle(mock, verifier);
		lifecycle
			.restore(LifecycleSnapshot {
				state: LifecycleState::Interacting,
				transfer_id: Some("1".into()),
				encoded_request: Some(EncodedRequest::new(vec![1])),
				submission: Some(attestor_types::SubmissionReceipt {
					transaction_hash: Default::default(),
					block_number: 1,
					round_id: 1,
					fee_paid: U256::ZERO,
				}),
				proof: Some(attestor_types::Proof {
					response_hex: vec![1u8].into(),
					attestation_type: None,
					merkle_proof: vec![],
				}),
				result: None,
				..Default::default()
			})
			.unwrap();

		// The chain id is wrong, but the missing contract is reported first
		let err = lifecycle.interact().await.unwrap_err();
		assert!(matches!(
			err,
			LifecycleError::Configuration {
				stage: Some(Stage::Interact),
				..
			}
		));

		lifecycle.set_contract(CONSUMER);
		assert!(matches!(
			lifecycle.interact().await,
			Err(LifecycleError::NetworkMismatch { .. })
		));
		assert_eq!(lifecycle.state(), LifecycleState::Interacting);
	}

	#[tokio::test]
	async fn test_reset_discards_artifacts() {
		let verifier = Arc::new(CountingVerifier::default());
		let mut lifecycle = lifecycle(Arc::new(MockChain::new(114)), verifier);
		lifecycle.prepare("1614003520", "token").await.unwrap();

		let mut events = lifecycle.event_bus().subscribe();
		lifecycle.reset();

		assert_eq!(lifecycle.snapshot(), &LifecycleSnapshot::default());
		assert_eq!(events.try_recv().unwrap(), LifecycleEvent::Reset);
		lifecycle.prepare("1614003521", "token").await.unwrap();
	}

	#[tokio::test]
	async fn test_restore_rejects_inconsistent_snapshot() {
		let verifier = Arc::new(CountingVerifier::default());
		let mut lifecycle = lifecycle(Arc::new(MockChain::new(114)), verifier);

		let err = lifecycle
			.restore(LifecycleSnapshot {
				state: LifecycleState::Submitting,
				..Default::default()
			})
			.unwrap_err();
		assert!(matches!(err, LifecycleError::Configuration { stage: None, .. }));
		assert_eq!(lifecycle.state(), LifecycleState::Preparing);
	}

	#[tokio::test]
	async fn test_run_refuses_other_transfer() {
		let verifier = Arc::new(CountingVerifier::default());
		let mut lifecycle = lifecycle(Arc::new(MockChain::new(114)), verifier.clone());
		lifecycle.prepare("1614003520", "token").await.unwrap();

		let err = lifecycle
			.run("42", "token", &Cancellation::never())
			.await
			.unwrap_err();
		assert!(err.to_string().contains("1614003520"));
		assert_eq!(lifecycle.state(), LifecycleState::Submitting);
		assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
	}
}
