//! Persistence of lifecycle snapshots.
//!
//! A lifecycle run spans several process invocations when driven from the
//! command line, so the artifacts each stage produces are stored between
//! them. Backends implement [`StorageInterface`]; [`StorageService`] adds
//! typed JSON access on top.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Low-level key-value interface implemented by storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key. Missing keys are not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed storage on top of a backend.
///
/// The namespace and id are combined into the backend key; values are
/// serialized as JSON.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec_pretty(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key(namespace, id), bytes).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve), mapping a missing key to `None`.
	pub async fn retrieve_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(namespace, id).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&key(namespace, id)).await
	}
}

fn key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::MemoryStorage;
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Snapshot {
		state: String,
		round: u64,
	}

	#[tokio::test]
	async fn test_typed_round_trip_and_removal() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let snapshot = Snapshot {
			state: "retrieving".into(),
			round: 1_048_576,
		};

		storage.store("lifecycle", "current", &snapshot).await.unwrap();
		let loaded: Snapshot = storage.retrieve("lifecycle", "current").await.unwrap();
		assert_eq!(loaded, snapshot);

		storage.remove("lifecycle", "current").await.unwrap();
		let missing: Option<Snapshot> = storage
			.retrieve_optional("lifecycle", "current")
			.await
			.unwrap();
		assert_eq!(missing, None);
	}

	#[tokio::test]
	async fn test_corrupt_value_is_serialization_error() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("lifecycle:current", b"not json".to_vec())
			.await
			.unwrap();
		let storage = StorageService::new(Box::new(backend));
		let result: Result<Snapshot, _> = storage.retrieve("lifecycle", "current").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}
}
