//! Signing identity used for every ledger write.
//!
//! The lifecycle never handles raw key material past construction: stages
//! receive a [`SigningIdentity`] and hand its wallet to the chain backend,
//! which signs as part of sending.

use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

pub use implementations::local::LocalWallet;

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

#[async_trait]
pub trait AccountInterface: Send + Sync {
	async fn address(&self) -> Result<Address, AccountError>;

	/// Wallet bound to `chain_id`, ready to be attached to a provider.
	fn wallet(&self, chain_id: u64) -> EthereumWallet;
}

/// Shared handle on the account that authorizes ledger writes.
#[derive(Clone)]
pub struct SigningIdentity {
	provider: Arc<dyn AccountInterface>,
}

impl SigningIdentity {
	pub fn new(provider: Arc<dyn AccountInterface>) -> Self {
		Self { provider }
	}

	/// Builds an identity from a hex-encoded private key.
	pub fn from_private_key(private_key_hex: &str) -> Result<Self, AccountError> {
		Ok(Self::new(Arc::new(LocalWallet::new(private_key_hex)?)))
	}

	pub async fn address(&self) -> Result<Address, AccountError> {
		self.provider.address().await
	}

	pub fn wallet(&self, chain_id: u64) -> EthereumWallet {
		self.provider.wallet(chain_id)
	}
}

impl std::fmt::Debug for SigningIdentity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SigningIdentity").finish_non_exhaustive()
	}
}
