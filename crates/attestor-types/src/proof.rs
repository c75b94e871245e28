//! Proofs served by the data-availability layer.

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while converting a raw data-availability response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofFormatError {
	#[error("Proof payload is missing `response_hex`")]
	MissingResponse,
	#[error("Invalid hex in `{field}`: {reason}")]
	InvalidHex { field: &'static str, reason: String },
}

/// Raw body of a `proof-by-request-round-raw` response.
///
/// Every field is optional: a body without `response_hex` means the proof is
/// not available yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaProofResponse {
	#[serde(default)]
	pub response_hex: Option<String>,
	#[serde(default)]
	pub attestation_type: Option<String>,
	#[serde(default)]
	pub proof: Option<Vec<String>>,
}

impl DaProofResponse {
	/// Whether the response carries a non-empty proof payload.
	pub fn is_ready(&self) -> bool {
		self.response_hex
			.as_deref()
			.map(|hex| !hex.trim_start_matches("0x").is_empty())
			.unwrap_or(false)
	}

	pub fn into_proof(self) -> Result<Proof, ProofFormatError> {
		if !self.is_ready() {
			return Err(ProofFormatError::MissingResponse);
		}
		let response_hex = self.response_hex.unwrap_or_default();
		let response_hex = response_hex
			.parse::<Bytes>()
			.map_err(|e| ProofFormatError::InvalidHex {
				field: "response_hex",
				reason: e.to_string(),
			})?;

		let attestation_type = self
			.attestation_type
			.map(|value| {
				value.parse::<B256>().map_err(|e| ProofFormatError::InvalidHex {
					field: "attestation_type",
					reason: e.to_string(),
				})
			})
			.transpose()?;

		let merkle_proof = self
			.proof
			.unwrap_or_default()
			.iter()
			.map(|node| {
				node.parse::<B256>().map_err(|e| ProofFormatError::InvalidHex {
					field: "proof",
					reason: e.to_string(),
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Proof {
			response_hex,
			attestation_type,
			merkle_proof,
		})
	}
}

/// A finalized attestation proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
	/// ABI-encoded attested response envelope.
	pub response_hex: Bytes,
	pub attestation_type: Option<B256>,
	/// Merkle path from the response leaf to the round's committed root.
	pub merkle_proof: Vec<B256>,
}
