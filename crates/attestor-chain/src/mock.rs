//! In-memory ledger for tests.
//!
//! Contract behaviour is scripted per `(address, selector)`: view calls are
//! answered by call handlers, and submitted transactions run submit handlers
//! that decide whether the receipt reports success. Every call and submission
//! is recorded so tests can assert on what reached the ledger.

use crate::{ChainError, ChainInterface};
use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use attestor_account::SigningIdentity;
use attestor_types::contracts::IFlareContractRegistry;
use attestor_types::{Transaction, TransactionHash, TransactionReceipt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Answers a view call given its full calldata.
pub type CallHandler = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync>;

/// Executes a submitted transaction; `Ok(false)` yields a reverted receipt.
pub type SubmitHandler = Arc<dyn Fn(&Transaction) -> Result<bool, String> + Send + Sync>;

type Route = (Address, [u8; 4]);

struct MockState {
	chain_id: u64,
	balances: HashMap<Address, U256>,
	call_handlers: HashMap<Route, CallHandler>,
	submit_handlers: HashMap<Route, SubmitHandler>,
	call_counts: HashMap<Route, usize>,
	submitted: Vec<Transaction>,
	receipts: HashMap<TransactionHash, TransactionReceipt>,
	block_number: u64,
	block_timestamp: u64,
	gas_estimate: u64,
}

pub struct MockChain {
	state: Mutex<MockState>,
}

impl MockChain {
	pub fn new(chain_id: u64) -> Self {
		Self {
			state: Mutex::new(MockState {
				chain_id,
				balances: HashMap::new(),
				call_handlers: HashMap::new(),
				submit_handlers: HashMap::new(),
				call_counts: HashMap::new(),
				submitted: Vec::new(),
				receipts: HashMap::new(),
				block_number: 1,
				block_timestamp: 0,
				gas_estimate: 100_000,
			}),
		}
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		// A handler panicking inside a test poisons the lock; keep serving the data.
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	pub fn set_chain_id(&self, chain_id: u64) {
		self.state().chain_id = chain_id;
	}

	pub fn set_balance(&self, address: Address, balance: U256) {
		self.state().balances.insert(address, balance);
	}

	pub fn balance_of(&self, address: Address) -> U256 {
		self.state()
			.balances
			.get(&address)
			.copied()
			.unwrap_or(U256::ZERO)
	}

	/// Sets the number of the last mined block and the timestamp reported for any block.
	pub fn set_block(&self, block_number: u64, timestamp: u64) {
		let mut state = self.state();
		state.block_number = block_number;
		state.block_timestamp = timestamp;
	}

	pub fn set_gas_estimate(&self, gas: u64) {
		self.state().gas_estimate = gas;
	}

	pub fn on_call<F>(&self, to: Address, selector: [u8; 4], handler: F)
	where
		F: Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync + 'static,
	{
		self.state()
			.call_handlers
			.insert((to, selector), Arc::new(handler));
	}

	/// Like [`on_call`](Self::on_call), with the calldata decoded as `C`.
	pub fn on_sol_call<C, F>(&self, to: Address, handler: F)
	where
		C: SolCall + 'static,
		F: Fn(C) -> Result<Vec<u8>, String> + Send + Sync + 'static,
	{
		self.on_call(to, C::SELECTOR, move |data| {
			let call = C::abi_decode(data, true).map_err(|e| e.to_string())?;
			handler(call)
		});
	}

	/// Serves a contract registry at `registry`; unknown names resolve to the zero address.
	pub fn with_registry(&self, registry: Address, entries: &[(&str, Address)]) {
		let entries: HashMap<String, Address> = entries
			.iter()
			.map(|(name, address)| (name.to_string(), *address))
			.collect();
		self.on_sol_call::<IFlareContractRegistry::getContractAddressByNameCall, _>(
			registry,
			move |call| {
				let address = entries.get(&call.name).copied().unwrap_or(Address::ZERO);
				Ok(address.abi_encode())
			},
		);
	}

	pub fn on_submit<F>(&self, to: Address, selector: [u8; 4], handler: F)
	where
		F: Fn(&Transaction) -> Result<bool, String> + Send + Sync + 'static,
	{
		self.state()
			.submit_handlers
			.insert((to, selector), Arc::new(handler));
	}

	/// Transactions that reached the ledger, in submission order.
	pub fn submitted(&self) -> Vec<Transaction> {
		self.state().submitted.clone()
	}

	pub fn call_count(&self, to: Address, selector: [u8; 4]) -> usize {
		self.state()
			.call_counts
			.get(&(to, selector))
			.copied()
			.unwrap_or(0)
	}
}

fn route(to: Address, data: &[u8]) -> Option<Route> {
	let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
	Some((to, selector))
}

#[async_trait]
impl ChainInterface for MockChain {
	async fn chain_id(&self) -> Result<u64, ChainError> {
		Ok(self.state().chain_id)
	}

	async fn balance(&self, address: Address) -> Result<U256, ChainError> {
		Ok(self.balance_of(address))
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
		let key = route(to, &data).ok_or_else(|| ChainError::Call {
			to,
			reason: "calldata shorter than a selector".to_string(),
		})?;

		let handler = {
			let mut state = self.state();
			*state.call_counts.entry(key).or_insert(0) += 1;
			state.call_handlers.get(&key).cloned()
		};

		let handler = handler.ok_or_else(|| ChainError::Call {
			to,
			reason: format!("no mock handler for selector 0x{}", alloy_primitives::hex::encode(key.1)),
		})?;

		handler(&data)
			.map(Bytes::from)
			.map_err(|reason| ChainError::Call { to, reason })
	}

	async fn estimate_gas(&self, _tx: &Transaction) -> Result<u64, ChainError> {
		Ok(self.state().gas_estimate)
	}

	async fn block_timestamp(&self, _block_number: u64) -> Result<u64, ChainError> {
		Ok(self.state().block_timestamp)
	}

	async fn submit(
		&self,
		tx: Transaction,
		identity: &SigningIdentity,
	) -> Result<TransactionHash, ChainError> {
		let from = identity.address().await?;
		let tx = tx.with_from(from);

		if self.balance_of(from) < tx.value {
			return Err(ChainError::Submission(
				"insufficient funds for transfer".to_string(),
			));
		}

		let handler = route(tx.to, &tx.data)
			.and_then(|key| self.state().submit_handlers.get(&key).cloned());
		let success = match handler {
			Some(handler) => handler(&tx).map_err(ChainError::Submission)?,
			None => true,
		};

		let mut state = self.state();
		let available = state.balances.get(&from).copied().unwrap_or(U256::ZERO);
		if success {
			state.balances.insert(from, available - tx.value);
		}

		state.block_number += 1;
		let hash = keccak256((state.submitted.len() as u64).to_be_bytes());
		let receipt = TransactionReceipt {
			hash,
			block_number: state.block_number,
			success,
		};
		state.receipts.insert(hash, receipt);
		state.submitted.push(tx);

		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_confirmations: u64,
	) -> Result<TransactionReceipt, ChainError> {
		self.state()
			.receipts
			.get(hash)
			.cloned()
			.ok_or_else(|| ChainError::Timeout(format!("No receipt for {}", hash)))
	}
}
