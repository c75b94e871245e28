//! Transfer data decoded from proofs and read back from the consumer contract.

use crate::contracts::{DataTransportObject, WiseTransfer};
use crate::TransactionHash;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Attested projection of an upstream transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedResponse {
	/// Upstream transfer identifier, unique per transfer.
	pub id: U256,
	pub target_account: U256,
	pub status: String,
	/// Payment reference, carried in an address-shaped field.
	pub message_reference: Address,
	/// Transfer value scaled by 100 and floored.
	pub value: U256,
	pub currency: String,
}

impl From<DataTransportObject> for DecodedResponse {
	fn from(dto: DataTransportObject) -> Self {
		Self {
			id: dto.id,
			target_account: dto.targetAccount,
			status: dto.status,
			message_reference: dto.userMessage,
			value: dto.targetValue,
			currency: dto.targetCurrency,
		}
	}
}

impl From<DecodedResponse> for DataTransportObject {
	fn from(response: DecodedResponse) -> Self {
		Self {
			id: response.id,
			targetAccount: response.target_account,
			status: response.status,
			userMessage: response.message_reference,
			targetValue: response.value,
			targetCurrency: response.currency,
		}
	}
}

/// Transfer as stored by the consumer contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
	pub id: U256,
	pub target_account: U256,
	pub status: bool,
	pub message_reference: Address,
	pub value: U256,
	pub currency: String,
}

impl From<WiseTransfer> for TransferRecord {
	fn from(transfer: WiseTransfer) -> Self {
		Self {
			id: transfer.id,
			target_account: transfer.targetAccount,
			status: transfer.status,
			message_reference: transfer.userMessage,
			value: transfer.targetValue,
			currency: transfer.targetCurrency,
		}
	}
}

/// Outcome of applying a proof to the consumer contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResult {
	pub transaction_hash: TransactionHash,
	pub block_number: u64,
	/// Decoded response that was applied.
	pub applied: DecodedResponse,
	/// Full record set read back after inclusion.
	pub transfers: Vec<TransferRecord>,
}

impl ContractResult {
	pub fn contains(&self, id: U256) -> bool {
		self.transfers.iter().any(|t| t.id == id)
	}
}
