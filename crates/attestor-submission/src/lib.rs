//! Fee computation and on-chain submission of encoded requests.
//!
//! The engine resolves the protocol contracts by name, prices the request,
//! refuses to send when the signer cannot cover the fee, submits the request
//! with the fee attached and derives the voting round it landed in from the
//! inclusion block's timestamp.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use attestor_account::SigningIdentity;
use attestor_chain::{ChainService, ContractRegistry, RegistryError};
use attestor_types::contracts::{
	names, IFdcHub, IFdcRequestFeeConfigurations, IFlareSystemsManager,
};
use attestor_types::{
	utils::truncate_hash, EncodedRequest, PendingSubmission, SubmissionReceipt, Transaction,
	VotingEpoch,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmissionError {
	#[error(transparent)]
	Registry(#[from] RegistryError),
	#[error("Fee query failed: {0}")]
	FeeQuery(String),
	#[error("Insufficient balance: required {required} wei, available {available} wei")]
	InsufficientBalance { required: U256, available: U256 },
	#[error("Submission failed: {0}")]
	Submission(String),
	#[error("Attestation request {0} reverted")]
	Reverted(String),
	#[error("Voting round derivation failed: {0}")]
	RoundDerivation(String),
}

/// Contracts involved in a submission.
#[derive(Debug, Clone, Copy)]
struct ProtocolContracts {
	hub: Address,
	fee_configurations: Address,
	systems_manager: Address,
}

pub struct SubmissionEngine {
	chain: ChainService,
	registry: Arc<dyn ContractRegistry>,
	confirmations: u64,
}

impl SubmissionEngine {
	pub fn new(chain: ChainService, registry: Arc<dyn ContractRegistry>, confirmations: u64) -> Self {
		Self {
			chain,
			registry,
			confirmations,
		}
	}

	/// Submits `encoded` as a fee-bearing attestation request signed by `identity`
	/// and derives the voting round it landed in.
	pub async fn submit(
		&self,
		encoded: &EncodedRequest,
		identity: &SigningIdentity,
	) -> Result<SubmissionReceipt, SubmissionError> {
		let pending = self.send(encoded, identity).await?;
		self.complete(&pending).await
	}

	/// Pays the fee and sends the request, without waiting for inclusion.
	///
	/// Nothing is sent when the balance does not cover the fee. Voting epoch
	/// parameters are read before sending, so once the fee is paid only the
	/// inclusion block's timestamp remains to be fetched.
	pub async fn send(
		&self,
		encoded: &EncodedRequest,
		identity: &SigningIdentity,
	) -> Result<PendingSubmission, SubmissionError> {
		let contracts = self.resolve_contracts().await?;

		let fee = self.request_fee(contracts.fee_configurations, encoded).await?;
		let epoch = self.voting_epoch(contracts.systems_manager).await?;

		let sender = identity
			.address()
			.await
			.map_err(|e| SubmissionError::Submission(e.to_string()))?;
		let available = self
			.chain
			.balance(sender)
			.await
			.map_err(|e| SubmissionError::Submission(format!("Failed to read balance: {}", e)))?;

		tracing::info!(fee = %fee, balance = %available, sender = %sender, "Request fee");

		if available < fee {
			return Err(SubmissionError::InsufficientBalance {
				required: fee,
				available,
			});
		}

		let call = IFdcHub::requestAttestationCall {
			data: encoded.as_bytes().clone(),
		};
		let tx = Transaction::call(contracts.hub, call.abi_encode()).with_value(fee);

		let hash = self
			.chain
			.submit(tx, identity)
			.await
			.map_err(|e| SubmissionError::Submission(e.to_string()))?;
		tracing::info!(tx_hash = %truncate_hash(&hash.to_string()), "Attestation request sent");

		Ok(PendingSubmission {
			transaction_hash: hash,
			fee_paid: fee,
			epoch,
		})
	}

	/// Waits for `pending` to be included and derives its voting round.
	///
	/// Safe to repeat after a failure: nothing is sent. A reverted request
	/// fails with [`SubmissionError::Reverted`], after which it has to be sent again.
	pub async fn complete(
		&self,
		pending: &PendingSubmission,
	) -> Result<SubmissionReceipt, SubmissionError> {
		let hash = pending.transaction_hash;
		let receipt = self
			.chain
			.wait_for_confirmation(&hash, self.confirmations)
			.await
			.map_err(|e| SubmissionError::Submission(e.to_string()))?;

		if !receipt.success {
			return Err(SubmissionError::Reverted(hash.to_string()));
		}

		let timestamp = self
			.chain
			.block_timestamp(receipt.block_number)
			.await
			.map_err(|e| SubmissionError::RoundDerivation(e.to_string()))?;
		let round_id = pending
			.epoch
			.round_id_at(timestamp)
			.map_err(|e| SubmissionError::RoundDerivation(e.to_string()))?;

		tracing::info!(
			tx_hash = %truncate_hash(&hash.to_string()),
			block = receipt.block_number,
			block_timestamp = timestamp,
			round_id = round_id,
			"Attestation request included"
		);
		self.log_current_epoch(round_id).await;

		Ok(SubmissionReceipt {
			transaction_hash: hash,
			block_number: receipt.block_number,
			round_id,
			fee_paid: pending.fee_paid,
		})
	}

	async fn resolve_contracts(&self) -> Result<ProtocolContracts, SubmissionError> {
		Ok(ProtocolContracts {
			hub: self.registry.resolve(names::FDC_HUB).await?,
			fee_configurations: self
				.registry
				.resolve(names::FDC_REQUEST_FEE_CONFIGURATIONS)
				.await?,
			systems_manager: self.registry.resolve(names::FLARE_SYSTEMS_MANAGER).await?,
		})
	}

	async fn request_fee(
		&self,
		fee_configurations: Address,
		encoded: &EncodedRequest,
	) -> Result<U256, SubmissionError> {
		let call = IFdcRequestFeeConfigurations::getRequestFeeCall {
			data: encoded.as_bytes().clone(),
		};
		Ok(self
			.chain
			.call_contract(fee_configurations, &call)
			.await
			.map_err(|e| SubmissionError::FeeQuery(e.to_string()))?
			._0)
	}

	async fn voting_epoch(&self, systems_manager: Address) -> Result<VotingEpoch, SubmissionError> {
		let first_round_start = self
			.chain
			.call_contract(
				systems_manager,
				&IFlareSystemsManager::firstVotingRoundStartTsCall {},
			)
			.await
			.map_err(|e| SubmissionError::RoundDerivation(e.to_string()))?
			._0;
		let duration = self
			.chain
			.call_contract(
				systems_manager,
				&IFlareSystemsManager::votingEpochDurationSecondsCall {},
			)
			.await
			.map_err(|e| SubmissionError::RoundDerivation(e.to_string()))?
			._0;

		Ok(VotingEpoch::new(
			to_u64("firstVotingRoundStartTs", first_round_start)?,
			to_u64("votingEpochDurationSeconds", duration)?,
		))
	}

	/// Logs the manager's current epoch next to the derived round; only informational.
	async fn log_current_epoch(&self, round_id: u64) {
		let systems_manager = match self.registry.resolve(names::FLARE_SYSTEMS_MANAGER).await {
			Ok(address) => address,
			Err(e) => {
				tracing::warn!(error = %e, "Could not resolve the systems manager");
				return;
			}
		};
		match self
			.chain
			.call_contract(
				systems_manager,
				&IFlareSystemsManager::getCurrentVotingEpochIdCall {},
			)
			.await
		{
			Ok(current) => {
				tracing::info!(round_id = round_id, current_epoch = %current._0, "Voting epoch")
			}
			Err(e) => tracing::warn!(error = %e, "Could not read current voting epoch"),
		}
	}
}

fn to_u64(field: &str, value: U256) -> Result<u64, SubmissionError> {
	u64::try_from(value)
		.map_err(|_| SubmissionError::RoundDerivation(format!("{} out of range: {}", field, value)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use attestor_chain::mock::MockChain;
	use attestor_chain::{ChainService, OnChainRegistry, RegistryError};
	use attestor_types::contracts::CONTRACT_REGISTRY_ADDRESS;

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const HUB: Address = address!("48aC463d7975828989331F4De43341627b9c5f1D");
	const FEES: Address = address!("191a1282Ac700edE65c5B0AaF313BAcC3eA7fC7e");
	const MANAGER: Address = address!("A90Db6D10F856799b10ef2A77EBCbF460aC71e52");
	const T0: u64 = 1_658_430_000;
	const D: u64 = 90;

	struct Fixture {
		mock: Arc<MockChain>,
		engine: SubmissionEngine,
		identity: SigningIdentity,
		sender: Address,
	}

	async fn fixture(fee: u64, balance: u64) -> Fixture {
		let mock = Arc::new(MockChain::new(114));
		mock.with_registry(
			CONTRACT_REGISTRY_ADDRESS,
			&[
				(names::FDC_HUB, HUB),
				(names::FDC_REQUEST_FEE_CONFIGURATIONS, FEES),
				(names::FLARE_SYSTEMS_MANAGER, MANAGER),
			],
		);
		mock.on_sol_call::<IFdcRequestFeeConfigurations::getRequestFeeCall, _>(FEES, move |_| {
			Ok(IFdcRequestFeeConfigurations::getRequestFeeCall::abi_encode_returns(&(
				U256::from(fee),
			)))
		});
		mock.on_sol_call::<IFlareSystemsManager::firstVotingRoundStartTsCall, _>(MANAGER, |_| {
			Ok(IFlareSystemsManager::firstVotingRoundStartTsCall::abi_encode_returns(&(
				U256::from(T0),
			)))
		});
		mock.on_sol_call::<IFlareSystemsManager::votingEpochDurationSecondsCall, _>(MANAGER, |_| {
			Ok(IFlareSystemsManager::votingEpochDurationSecondsCall::abi_encode_returns(&(
				U256::from(D),
			)))
		});

		let identity = SigningIdentity::from_private_key(DEV_KEY).unwrap();
		let sender = identity.address().await.unwrap();
		mock.set_balance(sender, U256::from(balance));
		// Inclusion lands one block later, one second before round 1000 ends
		mock.set_block(99, T0 + 1000 * D + D - 1);

		let chain = ChainService::new(mock.clone());
		let registry = Arc::new(OnChainRegistry::new(chain.clone(), CONTRACT_REGISTRY_ADDRESS));
		Fixture {
			mock,
			engine: SubmissionEngine::new(chain, registry, 1),
			identity,
			sender,
		}
	}

	fn encoded() -> EncodedRequest {
		EncodedRequest::new(vec![0x57, 0x65, 0x62, 0x32])
	}

	#[tokio::test]
	async fn test_submit_pays_fee_and_derives_round() {
		let f = fixture(1_000_000, 5_000_000).await;

		let receipt = f.engine.submit(&encoded(), &f.identity).await.unwrap();

		assert_eq!(receipt.round_id, 1000);
		assert_eq!(receipt.block_number, 100);
		assert_eq!(receipt.fee_paid, U256::from(1_000_000));

		let submitted = f.mock.submitted();
		assert_eq!(submitted.len(), 1);
		assert_eq!(submitted[0].to, HUB);
		assert_eq!(submitted[0].value, U256::from(1_000_000));
		let call = IFdcHub::requestAttestationCall::abi_decode(&submitted[0].data, true).unwrap();
		assert_eq!(call.data, *encoded().as_bytes());
		assert_eq!(f.mock.balance_of(f.sender), U256::from(4_000_000));
	}

	#[tokio::test]
	async fn test_insufficient_balance_submits_nothing() {
		let f = fixture(1_000_000, 999_999).await;

		let err = f.engine.submit(&encoded(), &f.identity).await.unwrap_err();

		match err {
			SubmissionError::InsufficientBalance {
				required,
				available,
			} => {
				assert_eq!(required, U256::from(1_000_000));
				assert_eq!(available, U256::from(999_999));
			}
			other => panic!("unexpected error: {other:?}"),
		}
		assert!(f.mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_balance_equal_to_fee_is_enough() {
		let f = fixture(1_000_000, 1_000_000).await;
		assert!(f.engine.submit(&encoded(), &f.identity).await.is_ok());
	}

	#[tokio::test]
	async fn test_reverted_request_is_reported() {
		let f = fixture(10, 1_000).await;
		f.mock
			.on_submit(HUB, IFdcHub::requestAttestationCall::SELECTOR, |_| Ok(false));

		assert!(matches!(
			f.engine.submit(&encoded(), &f.identity).await,
			Err(SubmissionError::Reverted(_))
		));
	}

	#[tokio::test]
	async fn test_complete_after_round_failure_does_not_resend() {
		let f = fixture(1_000_000, 5_000_000).await;
		// Inclusion block predates round zero, so the round cannot be derived
		f.mock.set_block(99, T0 - 1);

		let pending = f.engine.send(&encoded(), &f.identity).await.unwrap();
		assert!(matches!(
			f.engine.complete(&pending).await,
			Err(SubmissionError::RoundDerivation(_))
		));

		f.mock.set_block(100, T0 + 1000 * D + 1);
		let receipt = f.engine.complete(&pending).await.unwrap();

		assert_eq!(receipt.round_id, 1000);
		assert_eq!(receipt.transaction_hash, pending.transaction_hash);
		assert_eq!(f.mock.submitted().len(), 1);
		assert_eq!(f.mock.balance_of(f.sender), U256::from(4_000_000));
	}

	#[tokio::test]
	async fn test_unregistered_contract() {
		let f = fixture(10, 1_000).await;
		f.mock.with_registry(
			CONTRACT_REGISTRY_ADDRESS,
			&[(names::FDC_HUB, HUB), (names::FLARE_SYSTEMS_MANAGER, MANAGER)],
		);

		let err = f.engine.submit(&encoded(), &f.identity).await.unwrap_err();
		assert!(matches!(
			err,
			SubmissionError::Registry(RegistryError::ContractNotFound(ref name))
				if name == names::FDC_REQUEST_FEE_CONFIGURATIONS
		));
		assert!(f.mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_fee_query_failure() {
		let f = fixture(10, 1_000).await;
		f.mock
			.on_sol_call::<IFdcRequestFeeConfigurations::getRequestFeeCall, _>(FEES, |_| {
				Err("execution reverted".to_string())
			});

		assert!(matches!(
			f.engine.submit(&encoded(), &f.identity).await,
			Err(SubmissionError::FeeQuery(_))
		));
		assert!(f.mock.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_current_epoch_read_failure_only_warns() {
		// getCurrentVotingEpochId has no handler in the fixture
		let f = fixture(10, 1_000).await;
		let receipt = f.engine.submit(&encoded(), &f.identity).await.unwrap();
		assert_eq!(receipt.round_id, 1000);
		assert_eq!(
			f.mock.call_count(
				MANAGER,
				IFlareSystemsManager::getCurrentVotingEpochIdCall::SELECTOR
			),
			1
		);
	}
}
