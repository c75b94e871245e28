//! Alloy-based EVM ledger backend.
//!
//! Reads go through a plain HTTP provider. Writes build a provider with the
//! recommended fillers and the caller's wallet attached, so nonce, gas and
//! fees are filled and the transaction is signed as part of sending.

use crate::{ChainError, ChainInterface};
use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, TransactionRequest};
use alloy_transport_http::Http;
use async_trait::async_trait;
use attestor_account::SigningIdentity;
use attestor_types::{
	utils::truncate_hash, Transaction, TransactionHash, TransactionReceipt,
};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// EVM ledger access over JSON-RPC.
pub struct AlloyChain {
	rpc_url: Url,
	/// Read-only provider shared by every query.
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	/// Delay between receipt polls while awaiting inclusion.
	poll_interval: Duration,
	/// Upper bound on the inclusion wait.
	receipt_timeout: Duration,
}

impl AlloyChain {
	pub fn new(rpc_url: &str) -> Result<Self, ChainError> {
		let url: Url = rpc_url
			.parse()
			.map_err(|e| ChainError::Network(format!("Invalid RPC URL: {}", e)))?;

		let provider = RootProvider::<Http<reqwest::Client>>::new_http(url.clone());

		Ok(Self {
			rpc_url: url,
			provider: Arc::new(provider),
			poll_interval: Duration::from_secs(2),
			receipt_timeout: Duration::from_secs(120),
		})
	}

	pub fn with_receipt_polling(mut self, poll_interval: Duration, timeout: Duration) -> Self {
		self.poll_interval = poll_interval;
		self.receipt_timeout = timeout;
		self
	}
}

#[async_trait]
impl ChainInterface for AlloyChain {
	async fn chain_id(&self) -> Result<u64, ChainError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get chain id: {}", e)))
	}

	async fn balance(&self, address: Address) -> Result<U256, ChainError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		let request: TransactionRequest = Transaction::call(to, data).into();

		self.provider
			.call(&request)
			.await
			.map_err(|e| ChainError::Call {
				to,
				reason: e.to_string(),
			})
	}

	async fn estimate_gas(&self, tx: &Transaction) -> Result<u64, ChainError> {
		let request: TransactionRequest = tx.clone().into();

		self.provider
			.estimate_gas(&request)
			.await
			.map_err(|e| ChainError::Call {
				to: tx.to,
				reason: format!("Gas estimation failed: {}", e),
			})
	}

	async fn block_timestamp(&self, block_number: u64) -> Result<u64, ChainError> {
		let block = self
			.provider
			.get_block_by_number(
				BlockNumberOrTag::Number(block_number),
				BlockTransactionsKind::Hashes,
			)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get block: {}", e)))?;

		Ok(block
			.ok_or_else(|| ChainError::Network(format!("Block {} not found", block_number)))?
			.header
			.timestamp)
	}

	async fn submit(
		&self,
		tx: Transaction,
		identity: &SigningIdentity,
	) -> Result<TransactionHash, ChainError> {
		let chain_id = self.chain_id().await?;
		let from = identity.address().await?;

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(identity.wallet(chain_id))
			.on_http(self.rpc_url.clone());

		let request: TransactionRequest = tx.with_from(from).into();

		let pending_tx = provider
			.send_transaction(request)
			.await
			.map_err(|e| ChainError::Submission(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = *pending_tx.tx_hash();
		tracing::info!(tx_hash = %truncate_hash(&tx_hash.to_string()), "Submitted transaction");

		Ok(tx_hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, ChainError> {
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %truncate_hash(&hash.to_string()),
			"Waiting for {} confirmations (timeout: {}s)",
			confirmations,
			self.receipt_timeout.as_secs()
		);

		loop {
			if start_time.elapsed() > self.receipt_timeout {
				return Err(ChainError::Timeout(format!(
					"No receipt for {} after {} seconds",
					hash,
					self.receipt_timeout.as_secs()
				)));
			}

			let receipt = match self.provider.get_transaction_receipt(*hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					// Not mined yet
					tokio::time::sleep(self.poll_interval).await;
					continue;
				}
				Err(e) => {
					return Err(ChainError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				}
			};

			let current_block = self.provider.get_block_number().await.map_err(|e| {
				ChainError::Network(format!("Failed to get block number: {}", e))
			})?;

			let tx_block = receipt.block_number.unwrap_or(0);
			// The inclusion block counts as the first confirmation
			let current_confirmations = current_block.saturating_sub(tx_block) + 1;

			if current_confirmations >= confirmations {
				return Ok(TransactionReceipt {
					hash: receipt.transaction_hash,
					block_number: tx_block,
					success: receipt.status(),
				});
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				confirmations.saturating_sub(current_confirmations)
			);

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}
