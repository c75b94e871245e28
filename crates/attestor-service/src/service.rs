//! Runs lifecycle stages across process invocations.

use anyhow::{Context, Result};
use attestor_config::Config;
use attestor_core::{
	AttestationLifecycle, LifecycleBuilder, LifecycleError, LifecycleSnapshot, SnapshotStore,
};
use attestor_retrieval::Cancellation;
use attestor_types::{utils::truncate_hash, LifecycleEvent, LifecycleState};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Lifecycle whose snapshot is persisted after every stage attempt.
///
/// Failed attempts are persisted too: a failed submit may still hold a paid
/// request that the next invocation has to resume rather than send again.
pub struct AttestorService {
	lifecycle: AttestationLifecycle,
	store: SnapshotStore,
}

impl AttestorService {
	/// Builds the lifecycle from `config` and resumes the stored run, if any.
	pub async fn open(config: Config) -> Result<Self> {
		let store = SnapshotStore::file(config.storage.path.clone());
		let lifecycle = LifecycleBuilder::new(config)
			.build()
			.context("Failed to build lifecycle")?;
		Self::resume(lifecycle, store).await
	}

	pub async fn resume(mut lifecycle: AttestationLifecycle, store: SnapshotStore) -> Result<Self> {
		if let Some(snapshot) = store.load().await.context("Failed to load snapshot")? {
			info!(state = %snapshot.state, "Resuming stored run");
			lifecycle
				.restore(snapshot)
				.context("Stored snapshot is inconsistent; run `reset`")?;
		}
		spawn_event_logger(&lifecycle);
		Ok(Self { lifecycle, store })
	}

	pub fn lifecycle_mut(&mut self) -> &mut AttestationLifecycle {
		&mut self.lifecycle
	}

	pub async fn prepare(&mut self, transfer_id: &str, credential: &str) -> Result<()> {
		let outcome = self.lifecycle.prepare(transfer_id, credential).await;
		let encoded = self.persist_after(outcome).await?;
		println!("Encoded request: {}", encoded);
		Ok(())
	}

	pub async fn submit(&mut self) -> Result<()> {
		let outcome = self.lifecycle.submit().await;
		let receipt = self.persist_after(outcome).await?;
		println!(
			"Submitted in round {} (tx {}, fee {} wei)",
			receipt.round_id, receipt.transaction_hash, receipt.fee_paid
		);
		Ok(())
	}

	pub async fn retrieve(&mut self, cancel: &Cancellation) -> Result<()> {
		let outcome = self.lifecycle.retrieve(cancel).await;
		let proof = self.persist_after(outcome).await?;
		println!(
			"Proof retrieved ({} bytes, {} merkle nodes)",
			proof.response_hex.len(),
			proof.merkle_proof.len()
		);
		Ok(())
	}

	pub async fn interact(&mut self) -> Result<()> {
		let outcome = self.lifecycle.interact().await;
		let result = self.persist_after(outcome).await?;
		println!(
			"Transfer {} recorded in tx {}; contract holds {} transfers",
			result.applied.id,
			result.transaction_hash,
			result.transfers.len()
		);
		Ok(())
	}

	/// Runs the remaining stages, persisting after each one.
	pub async fn run(
		&mut self,
		transfer_id: &str,
		credential: &str,
		cancel: &Cancellation,
	) -> Result<()> {
		loop {
			let outcome = self.lifecycle.step(transfer_id, credential, cancel).await;
			match self.persist_after(outcome).await? {
				Some(stage) => {
					info!(stage = %stage, state = %self.lifecycle.state(), "Progress saved")
				}
				None => break,
			}
		}
		print!("{}", render_status(self.lifecycle.snapshot()));
		Ok(())
	}

	/// Saves the snapshot whatever the stage outcome was, then returns the outcome.
	async fn persist_after<T>(&self, outcome: Result<T, LifecycleError>) -> Result<T> {
		self.store
			.save(self.lifecycle.snapshot())
			.await
			.context("Failed to save snapshot")?;
		Ok(outcome?)
	}
}

/// Status of the stored run, as text or as the raw snapshot in JSON.
///
/// Only the snapshot store is opened; no ledger or signing key is needed.
pub async fn status_report(store: &SnapshotStore, json: bool) -> Result<String> {
	let snapshot = store
		.load()
		.await
		.context("Failed to load snapshot")?
		.unwrap_or_default();

	if json {
		let rendered =
			serde_json::to_string_pretty(&snapshot).context("Failed to render snapshot")?;
		Ok(format!("{}\n", rendered))
	} else {
		Ok(render_status(&snapshot))
	}
}

/// Deletes the stored run.
pub async fn discard_run(store: &SnapshotStore) -> Result<()> {
	store.clear().await.context("Failed to delete snapshot")?;
	info!("Stored run discarded");
	Ok(())
}

/// Forwards lifecycle events to the log until the lifecycle is dropped.
fn spawn_event_logger(lifecycle: &AttestationLifecycle) {
	let mut events = lifecycle.event_bus().subscribe();
	tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(LifecycleEvent::StageFailed { stage, error }) => {
					warn!(stage = %stage, error = %error, "Lifecycle event: stage failed")
				}
				Ok(event) => debug!(event = ?event, "Lifecycle event"),
				Err(RecvError::Lagged(skipped)) => {
					warn!(skipped = skipped, "Dropped lifecycle events")
				}
				Err(RecvError::Closed) => break,
			}
		}
	});
}

/// Human-readable summary of a run.
pub fn render_status(snapshot: &LifecycleSnapshot) -> String {
	let mut lines = vec![format!("State:        {}", snapshot.state)];

	if let Some(transfer_id) = &snapshot.transfer_id {
		lines.push(format!("Transfer:     {}", transfer_id));
	}
	if let Some(encoded) = &snapshot.encoded_request {
		lines.push(format!("Request:      {} bytes", encoded.len()));
	}
	if let Some(pending) = &snapshot.pending_submission {
		lines.push(format!(
			"Pending:      tx {} sent, fee {} wei paid, round not derived",
			truncate_hash(&pending.transaction_hash.to_string()),
			pending.fee_paid
		));
	}
	if let Some(receipt) = &snapshot.submission {
		lines.push(format!(
			"Submission:   round {} in block {} (tx {}, fee {} wei)",
			receipt.round_id,
			receipt.block_number,
			truncate_hash(&receipt.transaction_hash.to_string()),
			receipt.fee_paid
		));
	}
	if let Some(proof) = &snapshot.proof {
		lines.push(format!("Proof:        {} merkle nodes", proof.merkle_proof.len()));
	}
	if let Some(result) = &snapshot.result {
		lines.push(format!(
			"Result:       transfer {} in tx {}, {} transfers recorded",
			result.applied.id,
			truncate_hash(&result.transaction_hash.to_string()),
			result.transfers.len()
		));
	}
	if snapshot.state != LifecycleState::Complete {
		lines.push(format!("Next:         {}", next_command(snapshot.state)));
	}

	let mut out = lines.join("\n");
	out.push('\n');
	out
}

fn next_command(state: LifecycleState) -> &'static str {
	match state {
		LifecycleState::Preparing => "prepare --transfer-id <ID>",
		LifecycleState::Submitting => "submit",
		LifecycleState::Retrieving => "retrieve",
		LifecycleState::Interacting => "interact",
		LifecycleState::Complete => "reset",
	}
}

/// Summary printed by `validate`.
pub fn render_config_summary(config: &Config) -> String {
	let consumer = match config.consumer.contract_address {
		Some(address) => address.to_string(),
		None => "not configured".to_string(),
	};
	format!(
		"Configuration is valid\n\
		 Chain ID: {}\n\
		 RPC URL: {}\n\
		 Verifier: {}\n\
		 Data availability: {}\n\
		 Consumer contract: {}\n\
		 Snapshots: {}\n",
		config.network.chain_id,
		config.network.rpc_url,
		config.verifier.url,
		config.data_availability.url,
		consumer,
		config.storage.path.display()
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{B256, U256};
	use attestor_types::{EncodedRequest, SubmissionReceipt};

	#[test]
	fn test_render_fresh_run() {
		let out = render_status(&LifecycleSnapshot::default());
		assert!(out.contains("State:        preparing"));
		assert!(out.contains("Next:         prepare"));
		assert!(!out.contains("Submission"));
	}

	#[test]
	fn test_render_submitted_run() {
		let snapshot = LifecycleSnapshot {
			state: LifecycleState::Retrieving,
			transfer_id: Some("1614003520".into()),
			encoded_request: Some(EncodedRequest::new(vec![0u8; 64])),
			submission: Some(SubmissionReceipt {
				transaction_hash: B256::repeat_byte(0xab),
				block_number: 100,
				round_id: 1000,
				fee_paid: U256::from(1_000_000u64),
			}),
			proof: None,
			result: None,
			..Default::default()
		};

		let out = render_status(&snapshot);
		assert!(out.contains("Transfer:     1614003520"));
		assert!(out.contains("Request:      64 bytes"));
		assert!(out.contains("round 1000 in block 100"));
		assert!(out.contains("fee 1000000 wei"));
		assert!(out.contains("Next:         retrieve"));
	}

	#[tokio::test]
	async fn test_status_and_discard_need_only_the_store() {
		let dir = tempfile::tempdir().unwrap();
		let store = SnapshotStore::file(dir.path());

		let fresh = status_report(&store, false).await.unwrap();
		assert!(fresh.contains("State:        preparing"));

		let snapshot = LifecycleSnapshot {
			state: LifecycleState::Submitting,
			transfer_id: Some("1614003520".into()),
			encoded_request: Some(EncodedRequest::new(vec![1, 2, 3])),
			..Default::default()
		};
		store.save(&snapshot).await.unwrap();

		let json = status_report(&store, true).await.unwrap();
		let parsed: LifecycleSnapshot = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, snapshot);
		assert!(status_report(&store, false)
			.await
			.unwrap()
			.contains("Next:         submit"));

		discard_run(&store).await.unwrap();
		assert!(store.load().await.unwrap().is_none());
	}

	#[test]
	fn test_render_config_summary() {
		let config = attestor_config::ConfigLoader::new()
			.with_env_prefix("ATTESTOR_SERVICE_TEST_")
			.load_from_str(
				r#"
[network]
rpc_url = "https://coston2-api.flare.network/ext/C/rpc"

[verifier]
url = "https://verifier.example/verifier/web2/"
api_key = "verifier-key"

[data_availability]
url = "https://ctn2-data-availability.flare.network/"

[account]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
"#,
			)
			.unwrap();

		let summary = render_config_summary(&config);
		assert!(summary.starts_with("Configuration is valid\n"));
		assert!(summary.contains("\nChain ID: 114\n"));
		assert!(summary.contains("Consumer contract: not configured"));
	}
}
