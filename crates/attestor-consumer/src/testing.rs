//! Test doubles for the transfer list contract.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use attestor_chain::mock::MockChain;
use attestor_types::contracts::{
	DataTransportObject, IWiseTransferList, Web2JsonRequestBody, Web2JsonResponse,
	Web2JsonResponseBody, WiseTransfer,
};
use attestor_types::{
	encode_identifier, DecodedResponse, Proof, PUBLIC_WEB2_SOURCE_ID, WEB2JSON_ATTESTATION_TYPE,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Status string the stub records as a completed transfer.
pub const COMPLETED_STATUS: &str = "outgoing_payment_sent";

/// Builds a proof whose response carries `transfer`, as the data-availability layer serves it.
pub fn attested_proof(transfer: &DecodedResponse, voting_round: u64) -> Proof {
	let envelope = Web2JsonResponse {
		attestationType: encode_identifier(WEB2JSON_ATTESTATION_TYPE).unwrap_or_default(),
		sourceId: encode_identifier(PUBLIC_WEB2_SOURCE_ID).unwrap_or_default(),
		votingRound: U256::from(voting_round),
		lowestUsedTimestamp: U256::from(1_700_000_000u64),
		requestBody: Web2JsonRequestBody {
			url: format!("https://api.transferwise.com/v1/transfers/{}", transfer.id),
			httpMethod: "GET".to_string(),
			headers: "{}".to_string(),
			queryParams: "{}".to_string(),
			body: "{}".to_string(),
			postProcessJq: ".".to_string(),
			abiSignature: "{}".to_string(),
		},
		responseBody: Web2JsonResponseBody {
			abiEncodedData: DataTransportObject::from(transfer.clone()).abi_encode().into(),
		},
	};

	Proof {
		response_hex: envelope.abi_encode().into(),
		attestation_type: Some(envelope.attestationType),
		merkle_proof: vec![B256::repeat_byte(0x11), B256::repeat_byte(0x22)],
	}
}

/// In-memory transfer list served through a [`MockChain`].
#[derive(Clone)]
pub struct TransferListStub {
	transfers: Arc<Mutex<Vec<WiseTransfer>>>,
	reject: Arc<AtomicBool>,
}

impl TransferListStub {
	/// Routes the contract's calls at `address` on `mock` to a fresh stub.
	pub fn install(mock: &MockChain, address: Address) -> Self {
		let stub = Self {
			transfers: Arc::new(Mutex::new(Vec::new())),
			reject: Arc::new(AtomicBool::new(false)),
		};

		let store = stub.clone();
		mock.on_sol_call::<IWiseTransferList::transfersCall, _>(address, move |call| {
			let found = store
				.transfers()
				.into_iter()
				.find(|t| t.id == call.transferId)
				.unwrap_or(WiseTransfer {
					id: U256::ZERO,
					targetAccount: U256::ZERO,
					status: false,
					userMessage: Address::ZERO,
					targetValue: U256::ZERO,
					targetCurrency: String::new(),
				});
			Ok(IWiseTransferList::transfersCall::abi_encode_returns(&(
				found.id,
				found.targetAccount,
				found.status,
				found.userMessage,
				found.targetValue,
				found.targetCurrency,
			)))
		});

		let store = stub.clone();
		mock.on_sol_call::<IWiseTransferList::getAllTransfersCall, _>(address, move |_| {
			Ok(IWiseTransferList::getAllTransfersCall::abi_encode_returns(&(
				store.transfers(),
			)))
		});

		let store = stub.clone();
		mock.on_submit(address, IWiseTransferList::addTransferCall::SELECTOR, move |tx| {
			if store.reject.load(Ordering::SeqCst) {
				return Ok(false);
			}
			let call = IWiseTransferList::addTransferCall::abi_decode(&tx.data, true)
				.map_err(|e| e.to_string())?;
			let dto = DataTransportObject::abi_decode(
				&call.data.data.responseBody.abiEncodedData,
				true,
			)
			.map_err(|e| e.to_string())?;

			let mut transfers = store.transfers.lock().map_err(|e| e.to_string())?;
			if transfers.iter().any(|t| t.id == dto.id) {
				return Ok(false);
			}
			transfers.push(WiseTransfer {
				id: dto.id,
				targetAccount: dto.targetAccount,
				status: dto.status == COMPLETED_STATUS,
				userMessage: dto.userMessage,
				targetValue: dto.targetValue,
				targetCurrency: dto.targetCurrency,
			});
			Ok(true)
		});

		stub
	}

	pub fn transfers(&self) -> Vec<WiseTransfer> {
		self.transfers
			.lock()
			.map(|transfers| transfers.clone())
			.unwrap_or_default()
	}

	/// Makes every later `addTransfer` revert.
	pub fn reject_proofs(&self) {
		self.reject.store(true, Ordering::SeqCst);
	}
}
