use crate::{LifecycleError, LifecycleSnapshot};
use attestor_storage::implementations::file::FileStorage;
use attestor_storage::StorageService;
use std::path::PathBuf;

const NAMESPACE: &str = "lifecycle";
const CURRENT: &str = "current";

/// Keeps the snapshot of the current run between process invocations.
pub struct SnapshotStore {
	storage: StorageService,
}

impl SnapshotStore {
	pub fn new(storage: StorageService) -> Self {
		Self { storage }
	}

	/// File-backed store rooted at `path`.
	pub fn file(path: impl Into<PathBuf>) -> Self {
		Self::new(StorageService::new(Box::new(FileStorage::new(path.into()))))
	}

	pub async fn load(&self) -> Result<Option<LifecycleSnapshot>, LifecycleError> {
		self.storage
			.retrieve_optional(NAMESPACE, CURRENT)
			.await
			.map_err(|e| LifecycleError::Storage(e.to_string()))
	}

	pub async fn save(&self, snapshot: &LifecycleSnapshot) -> Result<(), LifecycleError> {
		self.storage
			.store(NAMESPACE, CURRENT, snapshot)
			.await
			.map_err(|e| LifecycleError::Storage(e.to_string()))?;
		tracing::debug!(state = %snapshot.state, "Saved lifecycle snapshot");
		Ok(())
	}

	pub async fn clear(&self) -> Result<(), LifecycleError> {
		self.storage
			.remove(NAMESPACE, CURRENT)
			.await
			.map_err(|e| LifecycleError::Storage(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use attestor_storage::implementations::memory::MemoryStorage;
	use attestor_types::{EncodedRequest, LifecycleState};

	#[tokio::test]
	async fn test_save_load_clear() {
		let store = SnapshotStore::new(StorageService::new(Box::new(MemoryStorage::new())));
		assert_eq!(store.load().await.unwrap(), None);

		let snapshot = LifecycleSnapshot {
			state: LifecycleState::Submitting,
			transfer_id: Some("1614003520".into()),
			encoded_request: Some(EncodedRequest::new(vec![1, 2, 3])),
			..Default::default()
		};
		store.save(&snapshot).await.unwrap();
		assert_eq!(store.load().await.unwrap(), Some(snapshot));

		store.clear().await.unwrap();
		assert_eq!(store.load().await.unwrap(), None);
		store.clear().await.unwrap();
	}
}
