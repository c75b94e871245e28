//! Transaction types shared by the ledger-facing crates.
//!
//! A [`Transaction`] is what the submission engine and the proof consumer
//! build; the chain backend turns it into an Alloy request, signs it with the
//! caller's identity and reports back a [`TransactionReceipt`].

use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use serde::{Deserialize, Serialize};

/// Hash identifying a submitted transaction.
pub type TransactionHash = B256;

/// A contract call to be sent to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
	/// Contract being called.
	pub to: Address,
	/// ABI-encoded calldata.
	pub data: Bytes,
	/// Native currency attached to the call.
	pub value: U256,
	/// Sender, when known ahead of signing (used for estimation).
	pub from: Option<Address>,
	/// Chain ID for replay protection; filled by the provider when absent.
	pub chain_id: Option<u64>,
	/// Transaction nonce; filled by the provider when absent.
	pub nonce: Option<u64>,
	/// Gas limit; estimated by the provider when absent.
	pub gas_limit: Option<u64>,
	/// Maximum fee per gas (EIP-1559).
	pub max_fee_per_gas: Option<u128>,
	/// Maximum priority fee per gas (EIP-1559).
	pub max_priority_fee_per_gas: Option<u128>,
}

impl Transaction {
	/// Creates a call to `to` with the given calldata and no attached value.
	pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to,
			data: data.into(),
			value: U256::ZERO,
			from: None,
			chain_id: None,
			nonce: None,
			gas_limit: None,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_from(mut self, from: Address) -> Self {
		self.from = Some(from);
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}
}

/// Conversion from our Transaction type to Alloy's TransactionRequest.
impl From<Transaction> for TransactionRequest {
	fn from(tx: Transaction) -> Self {
		TransactionRequest {
			from: tx.from,
			to: Some(TxKind::Call(tx.to)),
			value: Some(tx.value),
			chain_id: tx.chain_id,
			nonce: tx.nonce,
			gas: tx.gas_limit,
			max_fee_per_gas: tx.max_fee_per_gas,
			max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
			input: TransactionInput {
				input: Some(tx.data),
				data: None,
			},
			..Default::default()
		}
	}
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_transaction_into_request() {
		let to = address!("0c13aDA1C7143Cf0a0795FFaB93eEBb6FAD6e4e3");
		let from = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
		let tx = Transaction::call(to, vec![0xde, 0xad])
			.with_value(U256::from(5))
			.with_from(from)
			.with_gas_limit(21_000);

		let request: TransactionRequest = tx.into();
		assert_eq!(request.to, Some(TxKind::Call(to)));
		assert_eq!(request.from, Some(from));
		assert_eq!(request.value, Some(U256::from(5)));
		assert_eq!(request.gas, Some(21_000));
		assert_eq!(request.input.input, Some(Bytes::from(vec![0xde, 0xad])));
	}
}
