//! Solidity bindings for every contract the lifecycle talks to.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// The contract registry is deployed at the same address on every network.
pub const CONTRACT_REGISTRY_ADDRESS: Address = address!("aD67FE66660Fb8dFE9d6b1b4240d8650e30F6019");

/// Registry names of the contracts resolved at runtime.
pub mod names {
	pub const FDC_HUB: &str = "FdcHub";
	pub const FDC_REQUEST_FEE_CONFIGURATIONS: &str = "FdcRequestFeeConfigurations";
	pub const FLARE_SYSTEMS_MANAGER: &str = "FlareSystemsManager";
	pub const RELAY: &str = "Relay";
	pub const FDC_VERIFICATION: &str = "FdcVerification";
}

sol! {
	#![sol(all_derives)]

	interface IFlareContractRegistry {
		function getContractAddressByName(string calldata name) external view returns (address);
	}

	interface IFdcHub {
		function requestAttestation(bytes calldata data) external payable;
	}

	interface IFdcRequestFeeConfigurations {
		function getRequestFee(bytes calldata data) external view returns (uint256);
	}

	interface IFlareSystemsManager {
		function firstVotingRoundStartTs() external view returns (uint256);
		function votingEpochDurationSeconds() external view returns (uint256);
		function getCurrentVotingEpochId() external view returns (uint256);
	}

	interface IRelay {
		function isFinalized(uint256 protocolId, uint256 votingRoundId) external view returns (bool);
	}

	interface IFdcVerification {
		function fdcProtocolId() external view returns (uint256);
	}

	/// Projection of an upstream transfer, as produced by the post-process expression.
	struct DataTransportObject {
		uint256 id;
		uint256 targetAccount;
		string status;
		address userMessage;
		uint256 targetValue;
		string targetCurrency;
	}

	struct Web2JsonRequestBody {
		string url;
		string httpMethod;
		string headers;
		string queryParams;
		string body;
		string postProcessJq;
		string abiSignature;
	}

	struct Web2JsonResponseBody {
		bytes abiEncodedData;
	}

	/// Attested envelope, ABI-encoded in the data-availability `response_hex`.
	struct Web2JsonResponse {
		bytes32 attestationType;
		bytes32 sourceId;
		uint256 votingRound;
		uint256 lowestUsedTimestamp;
		Web2JsonRequestBody requestBody;
		Web2JsonResponseBody responseBody;
	}

	struct Web2JsonProof {
		bytes32[] merkleProof;
		Web2JsonResponse data;
	}

	/// Record stored by the transfer list contract.
	struct WiseTransfer {
		uint256 id;
		uint256 targetAccount;
		bool status;
		address userMessage;
		uint256 targetValue;
		string targetCurrency;
	}

	interface IWiseTransferList {
		function addTransfer(Web2JsonProof calldata data) external;
		function getAllTransfers() external view returns (WiseTransfer[] memory);
		function transfers(uint256 transferId) external view returns (
			uint256 id,
			uint256 targetAccount,
			bool status,
			address userMessage,
			uint256 targetValue,
			string memory targetCurrency
		);
	}
}
