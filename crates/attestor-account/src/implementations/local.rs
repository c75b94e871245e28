//! Local private key wallet.

use crate::{AccountError, AccountInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

/// Keeps a secp256k1 key in memory and signs with it directly.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a new LocalWallet from a hex-encoded private key, with or without `0x`.
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		let trimmed = private_key_hex.trim();
		let key = trimmed.strip_prefix("0x").unwrap_or(trimmed);

		if key.len() != 64 {
			return Err(AccountError::InvalidKey(
				"Private key must be 64 hex characters (32 bytes)".to_string(),
			));
		}
		if hex::decode(key).is_err() {
			return Err(AccountError::InvalidKey(
				"Private key must be valid hexadecimal".to_string(),
			));
		}

		let signer = key
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn wallet(&self, chain_id: u64) -> EthereumWallet {
		let signer = self.signer.clone().with_chain_id(Some(chain_id));
		EthereumWallet::from(signer)
	}
}
