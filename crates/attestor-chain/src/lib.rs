//! Ledger access for the attestation lifecycle.
//!
//! [`ChainInterface`] is the narrow set of ledger operations the stages need:
//! view calls, balance and gas queries, block timestamps, and sending a
//! transaction signed by a caller-supplied identity. [`ChainService`] wraps
//! an implementation and adds typed Solidity calls on top.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use attestor_account::{AccountError, SigningIdentity};
use attestor_types::{Transaction, TransactionHash, TransactionReceipt};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod alloy;
}

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub mod registry;

pub use registry::{ContractRegistry, OnChainRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Call to {to} failed: {reason}")]
	Call { to: Address, reason: String },
	#[error("Failed to decode {signature} output: {reason}")]
	Decode { signature: String, reason: String },
	#[error("Transaction submission failed: {0}")]
	Submission(String),
	#[error("Timeout: {0}")]
	Timeout(String),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
}

#[async_trait]
pub trait ChainInterface: Send + Sync {
	/// Chain ID reported by the connected node.
	async fn chain_id(&self) -> Result<u64, ChainError>;

	async fn balance(&self, address: Address) -> Result<U256, ChainError>;

	/// Executes a read-only call against the latest block.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

	async fn estimate_gas(&self, tx: &Transaction) -> Result<u64, ChainError>;

	/// Timestamp, in unix seconds, of the given block.
	async fn block_timestamp(&self, block_number: u64) -> Result<u64, ChainError>;

	/// Signs `tx` with `identity` and broadcasts it.
	async fn submit(
		&self,
		tx: Transaction,
		identity: &SigningIdentity,
	) -> Result<TransactionHash, ChainError>;

	/// Waits until the transaction is included with the requested confirmations.
	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ChainError>;
}

/// Shared handle on a ledger backend.
#[derive(Clone)]
pub struct ChainService {
	backend: Arc<dyn ChainInterface>,
}

impl ChainService {
	pub fn new(backend: Arc<dyn ChainInterface>) -> Self {
		Self { backend }
	}

	pub async fn chain_id(&self) -> Result<u64, ChainError> {
		self.backend.chain_id().await
	}

	pub async fn balance(&self, address: Address) -> Result<U256, ChainError> {
		self.backend.balance(address).await
	}

	/// ABI-encodes `call`, executes it against `to` and decodes the return values.
	pub async fn call_contract<C>(&self, to: Address, call: &C) -> Result<C::Return, ChainError>
	where
		C: SolCall + Sync,
		C::Return: Send,
	{
		let output = self
			.backend
			.call(to, Bytes::from(call.abi_encode()))
			.await?;

		C::abi_decode_returns(&output, true).map_err(|e| ChainError::Decode {
			signature: C::SIGNATURE.to_string(),
			reason: e.to_string(),
		})
	}

	pub async fn estimate_gas(&self, tx: &Transaction) -> Result<u64, ChainError> {
		self.backend.estimate_gas(tx).await
	}

	pub async fn block_timestamp(&self, block_number: u64) -> Result<u64, ChainError> {
		self.backend.block_timestamp(block_number).await
	}

	pub async fn submit(
		&self,
		tx: Transaction,
		identity: &SigningIdentity,
	) -> Result<TransactionHash, ChainError> {
		self.backend.submit(tx, identity).await
	}

	pub async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ChainError> {
		self.backend.wait_for_confirmation(hash, confirmations).await
	}
}
