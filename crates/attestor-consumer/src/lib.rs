//! Delivery of attested transfers to the transfer list contract.
//!
//! The proof's `response_hex` is the ABI-encoded attestation response. Its
//! response body carries the projected transfer tuple, which is decoded to
//! learn the transfer id before anything is sent. A transfer the contract
//! already holds is refused, so the same attested fact is never applied
//! twice.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, SolValue};
use attestor_account::SigningIdentity;
use attestor_chain::ChainService;
use attestor_types::contracts::{
	DataTransportObject, IWiseTransferList, Web2JsonProof, Web2JsonResponse,
};
use attestor_types::{
	utils::truncate_hash, ContractResult, DecodedResponse, Proof, Transaction, TransferRecord,
};
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[derive(Debug, Error)]
pub enum ConsumerError {
	#[error("Failed to decode attested response: {0}")]
	Decode(String),
	#[error("Transfer {0} is already recorded")]
	DuplicateTransfer(U256),
	#[error("Contract call failed: {0}")]
	ContractCall(String),
}

/// Attested response split into the envelope and the transfer it carries.
#[derive(Debug, Clone)]
pub struct AttestedTransfer {
	pub envelope: Web2JsonResponse,
	pub transfer: DecodedResponse,
}

/// Decodes the attestation envelope and the transfer tuple inside it.
pub fn decode_response(proof: &Proof) -> Result<AttestedTransfer, ConsumerError> {
	let envelope = Web2JsonResponse::abi_decode(&proof.response_hex, true)
		.map_err(|e| ConsumerError::Decode(format!("response envelope: {}", e)))?;

	let dto = DataTransportObject::abi_decode(&envelope.responseBody.abiEncodedData, true)
		.map_err(|e| ConsumerError::Decode(format!("transfer tuple: {}", e)))?;

	Ok(AttestedTransfer {
		envelope,
		transfer: dto.into(),
	})
}

/// Assembles the proof struct the contract verifies.
pub fn build_proof(proof: &Proof, envelope: Web2JsonResponse) -> Web2JsonProof {
	Web2JsonProof {
		merkleProof: proof.merkle_proof.clone(),
		data: envelope,
	}
}

/// Client of the transfer list contract.
pub struct TransferListConsumer {
	chain: ChainService,
	gas_margin_percent: u64,
	confirmations: u64,
}

impl TransferListConsumer {
	pub fn new(chain: ChainService, gas_margin_percent: u64, confirmations: u64) -> Self {
		Self {
			chain,
			gas_margin_percent,
			confirmations,
		}
	}

	/// Submits `proof` to the contract at `contract`, signed by `identity`.
	pub async fn apply(
		&self,
		proof: &Proof,
		contract: Address,
		identity: &SigningIdentity,
	) -> Result<ContractResult, ConsumerError> {
		let AttestedTransfer { envelope, transfer } = decode_response(proof)?;
		tracing::info!(
			transfer_id = %transfer.id,
			status = %transfer.status,
			value = %transfer.value,
			currency = %transfer.currency,
			"Decoded attested transfer"
		);

		if self.find_transfer(contract, transfer.id).await?.is_some() {
			return Err(ConsumerError::DuplicateTransfer(transfer.id));
		}

		let sender = identity
			.address()
			.await
			.map_err(|e| ConsumerError::ContractCall(e.to_string()))?;
		let call = IWiseTransferList::addTransferCall {
			data: build_proof(proof, envelope),
		};
		let tx = Transaction::call(contract, call.abi_encode()).with_from(sender);

		let estimate = self
			.chain
			.estimate_gas(&tx)
			.await
			.map_err(|e| ConsumerError::ContractCall(e.to_string()))?;
		let gas_limit = with_margin(estimate, self.gas_margin_percent);
		tracing::debug!(estimate = estimate, gas_limit = gas_limit, "Gas estimated");

		let hash = self
			.chain
			.submit(tx.with_gas_limit(gas_limit), identity)
			.await
			.map_err(|e| ConsumerError::ContractCall(e.to_string()))?;
		let receipt = self
			.chain
			.wait_for_confirmation(&hash, self.confirmations)
			.await
			.map_err(|e| ConsumerError::ContractCall(e.to_string()))?;

		if !receipt.success {
			return Err(ConsumerError::ContractCall(format!(
				"addTransfer transaction {} reverted",
				hash
			)));
		}

		let transfers = self.all_transfers(contract).await?;
		let result = ContractResult {
			transaction_hash: hash,
			block_number: receipt.block_number,
			applied: transfer,
			transfers,
		};

		if !result.contains(result.applied.id) {
			tracing::warn!(transfer_id = %result.applied.id, "Applied transfer missing from contract listing");
		}
		tracing::info!(
			tx_hash = %truncate_hash(&hash.to_string()),
			block = receipt.block_number,
			recorded = result.transfers.len(),
			"Transfer recorded"
		);

		Ok(result)
	}

	/// Looks up a recorded transfer; an id of zero in the record means absent.
	pub async fn find_transfer(
		&self,
		contract: Address,
		id: U256,
	) -> Result<Option<TransferRecord>, ConsumerError> {
		let record = self
			.chain
			.call_contract(contract, &IWiseTransferList::transfersCall { transferId: id })
			.await
			.map_err(|e| ConsumerError::ContractCall(e.to_string()))?;

		if record.id.is_zero() {
			return Ok(None);
		}

		Ok(Some(TransferRecord {
			id: record.id,
			target_account: record.targetAccount,
			status: record.status,
			message_reference: record.userMessage,
			value: record.targetValue,
			currency: record.targetCurrency,
		}))
	}

	pub async fn all_transfers(&self, contract: Address) -> Result<Vec<TransferRecord>, ConsumerError> {
		let listing = self
			.chain
			.call_contract(contract, &IWiseTransferList::getAllTransfersCall {})
			.await
			.map_err(|e| ConsumerError::ContractCall(e.to_string()))?;

		Ok(listing._0.into_iter().map(TransferRecord::from).collect())
	}
}

fn with_margin(estimate: u64, margin_percent: u64) -> u64 {
	let scaled = u128::from(estimate) * u128::from(100 + margin_percent) / 100;
	u64::try_from(scaled).unwrap_or(u64::MAX)
}
