//! Resolution of contract addresses by name.
//!
//! Protocol contracts are looked up through the contract registry, which is
//! deployed at the same address on every network.

use crate::{ChainError, ChainService};
use alloy_primitives::Address;
use async_trait::async_trait;
use attestor_types::contracts::IFlareContractRegistry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("Registry lookup for {name} failed: {reason}")]
	LookupFailed { name: String, reason: String },
	#[error("Contract {0} is not registered")]
	ContractNotFound(String),
}

#[async_trait]
pub trait ContractRegistry: Send + Sync {
	/// Returns the address registered under `name`.
	///
	/// A zero address means the name is unknown and is reported as
	/// [`RegistryError::ContractNotFound`].
	async fn resolve(&self, name: &str) -> Result<Address, RegistryError>;
}

/// Registry backed by the on-chain `getContractAddressByName` view.
pub struct OnChainRegistry {
	chain: ChainService,
	registry_address: Address,
}

impl OnChainRegistry {
	pub fn new(chain: ChainService, registry_address: Address) -> Self {
		Self {
			chain,
			registry_address,
		}
	}
}

#[async_trait]
impl ContractRegistry for OnChainRegistry {
	async fn resolve(&self, name: &str) -> Result<Address, RegistryError> {
		let call = IFlareContractRegistry::getContractAddressByNameCall {
			name: name.to_string(),
		};

		let address = self
			.chain
			.call_contract(self.registry_address, &call)
			.await
			.map_err(|e: ChainError| RegistryError::LookupFailed {
				name: name.to_string(),
				reason: e.to_string(),
			})?
			._0;

		if address == Address::ZERO {
			return Err(RegistryError::ContractNotFound(name.to_string()));
		}

		tracing::debug!(contract = %name, address = %address, "Resolved contract");
		Ok(address)
	}
}
