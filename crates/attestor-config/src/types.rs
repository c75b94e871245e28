//! Configuration types for the attestor.

use alloy_primitives::Address;
use attestor_types::contracts::CONTRACT_REGISTRY_ADDRESS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Chain ID of the Coston2 test network.
pub const COSTON2_CHAIN_ID: u64 = 114;

/// Complete attestor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Ledger connection and deployment expectations
	pub network: NetworkConfig,
	/// Attestation verifier service
	pub verifier: VerifierConfig,
	/// Data-availability service serving proofs
	pub data_availability: DataAvailabilityConfig,
	/// Upstream transfer API the attestation targets
	#[serde(default)]
	pub upstream: UpstreamConfig,
	/// Signing identity
	pub account: AccountConfig,
	/// Consumer contract settings
	#[serde(default)]
	pub consumer: ConsumerConfig,
	/// Finalization and proof polling
	#[serde(default)]
	pub retrieval: RetrievalConfig,
	/// Lifecycle snapshot persistence
	#[serde(default)]
	pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Chain ID the deployment expects; any other chain is refused
	#[serde(default = "default_chain_id")]
	pub chain_id: u64,
	/// HTTP JSON-RPC endpoint
	pub rpc_url: String,
	/// Contract registry address
	#[serde(default = "default_registry_address")]
	pub registry_address: Address,
	/// Confirmations awaited for each submitted transaction
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Delay between receipt polls while awaiting inclusion
	#[serde(default = "default_receipt_poll_interval_secs")]
	pub receipt_poll_interval_secs: u64,
	/// Upper bound on the inclusion wait of a submitted transaction
	#[serde(default = "default_receipt_timeout_secs")]
	pub receipt_timeout_secs: u64,
}

impl NetworkConfig {
	pub fn receipt_poll_interval(&self) -> Duration {
		Duration::from_secs(self.receipt_poll_interval_secs)
	}

	pub fn receipt_timeout(&self) -> Duration {
		Duration::from_secs(self.receipt_timeout_secs)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifierConfig {
	/// Base URL of the verifier, e.g. `https://verifier.example/verifier/web2/`
	pub url: String,
	/// Sent as the `X-API-KEY` header
	pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataAvailabilityConfig {
	/// Base URL of the data-availability layer
	pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
	/// Transfer lookup resource; the transfer id is appended
	#[serde(default = "default_transfer_api_url")]
	pub transfer_api_url: String,
}

impl Default for UpstreamConfig {
	fn default() -> Self {
		Self {
			transfer_api_url: default_transfer_api_url(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex-encoded secp256k1 private key
	pub private_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
	/// Transfer list contract; required before the interact stage
	#[serde(default)]
	pub contract_address: Option<Address>,
	/// Percentage added on top of the gas estimate
	#[serde(default = "default_gas_margin_percent")]
	pub gas_margin_percent: u64,
}

impl Default for ConsumerConfig {
	fn default() -> Self {
		Self {
			contract_address: None,
			gas_margin_percent: default_gas_margin_percent(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
	#[serde(default = "default_finalization_interval_secs")]
	pub finalization_interval_secs: u64,
	/// Upper bound on the finalization wait; 0 waits indefinitely
	#[serde(default = "default_finalization_max_wait_secs")]
	pub finalization_max_wait_secs: u64,
	/// Pause between finalization and the first proof request
	#[serde(default = "default_settle_delay_secs")]
	pub settle_delay_secs: u64,
	#[serde(default = "default_proof_interval_secs")]
	pub proof_interval_secs: u64,
	/// Not-ready responses tolerated before giving up
	#[serde(default = "default_proof_max_attempts")]
	pub proof_max_attempts: u32,
	/// Consecutive transport failures tolerated before giving up
	#[serde(default = "default_transport_max_retries")]
	pub transport_max_retries: u32,
	#[serde(default = "default_transport_initial_backoff_ms")]
	pub transport_initial_backoff_ms: u64,
}

impl RetrievalConfig {
	pub fn finalization_interval(&self) -> Duration {
		Duration::from_secs(self.finalization_interval_secs)
	}

	pub fn finalization_max_wait(&self) -> Option<Duration> {
		match self.finalization_max_wait_secs {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}

	pub fn settle_delay(&self) -> Duration {
		Duration::from_secs(self.settle_delay_secs)
	}

	pub fn proof_interval(&self) -> Duration {
		Duration::from_secs(self.proof_interval_secs)
	}

	pub fn transport_initial_backoff(&self) -> Duration {
		Duration::from_millis(self.transport_initial_backoff_ms)
	}
}

impl Default for RetrievalConfig {
	fn default() -> Self {
		Self {
			finalization_interval_secs: default_finalization_interval_secs(),
			finalization_max_wait_secs: default_finalization_max_wait_secs(),
			settle_delay_secs: default_settle_delay_secs(),
			proof_interval_secs: default_proof_interval_secs(),
			proof_max_attempts: default_proof_max_attempts(),
			transport_max_retries: default_transport_max_retries(),
			transport_initial_backoff_ms: default_transport_initial_backoff_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	#[serde(default = "default_storage_path")]
	pub path: PathBuf,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			path: default_storage_path(),
		}
	}
}

fn default_chain_id() -> u64 {
	COSTON2_CHAIN_ID
}

fn default_registry_address() -> Address {
	CONTRACT_REGISTRY_ADDRESS
}

fn default_confirmations() -> u64 {
	1
}

fn default_receipt_poll_interval_secs() -> u64 {
	2
}

fn default_receipt_timeout_secs() -> u64 {
	120
}

fn default_transfer_api_url() -> String {
	"https://api.transferwise.com/v1/transfers/".to_string()
}

fn default_gas_margin_percent() -> u64 {
	20
}

fn default_finalization_interval_secs() -> u64 {
	10
}

fn default_finalization_max_wait_secs() -> u64 {
	300
}

fn default_settle_delay_secs() -> u64 {
	10
}

fn default_proof_interval_secs() -> u64 {
	5
}

fn default_proof_max_attempts() -> u32 {
	36
}

fn default_transport_max_retries() -> u32 {
	4
}

fn default_transport_initial_backoff_ms() -> u64 {
	1000
}

fn default_storage_path() -> PathBuf {
	PathBuf::from("./data/attestor")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_toml_parsing_with_defaults() {
		let toml = r#"
[network]
rpc_url = "https://coston2-api.flare.network/ext/C/rpc"

[verifier]
url = "https://verifier.example/verifier/web2/"
api_key = "00000000-0000-0000-0000-000000000000"

[data_availability]
url = "https://ctn2-data-availability.flare.network/"

[account]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
"#;
		let config: Config = toml::from_str(toml).unwrap();
		assert_eq!(config.network.chain_id, COSTON2_CHAIN_ID);
		assert_eq!(config.network.registry_address, CONTRACT_REGISTRY_ADDRESS);
		assert_eq!(config.network.confirmations, 1);
		assert_eq!(config.network.receipt_poll_interval(), Duration::from_secs(2));
		assert_eq!(config.network.receipt_timeout(), Duration::from_secs(120));
		assert_eq!(config.consumer.contract_address, None);
		assert_eq!(config.consumer.gas_margin_percent, 20);
		assert_eq!(config.retrieval.proof_max_attempts, 36);
		assert_eq!(
			config.retrieval.finalization_max_wait(),
			Some(Duration::from_secs(300))
		);
		assert_eq!(
			config.upstream.transfer_api_url,
			"https://api.transferwise.com/v1/transfers/"
		);
	}

	#[test]
	fn test_zero_max_wait_disables_cap() {
		let retrieval = RetrievalConfig {
			finalization_max_wait_secs: 0,
			..Default::default()
		};
		assert_eq!(retrieval.finalization_max_wait(), None);
	}
}
