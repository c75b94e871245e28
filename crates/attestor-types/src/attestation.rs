//! Attestation request types.
//!
//! An [`AttestationRequest`] is the verifier-facing description of the web
//! resource to attest; the verifier answers with an [`EncodedRequest`], the
//! opaque payload that is later submitted on-chain and used to look up the
//! proof.

use alloy_primitives::{hex, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Attestation type name used for JSON web resources.
pub const WEB2JSON_ATTESTATION_TYPE: &str = "Web2Json";

/// Source identifier name for publicly reachable web APIs.
pub const PUBLIC_WEB2_SOURCE_ID: &str = "PublicWeb2";

/// Errors raised while building identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
	#[error("Identifier {name:?} is {len} bytes, at most 32 fit")]
	TooLong { name: String, len: usize },
}

/// Encodes a provider name as a fixed-width 32-byte identifier.
///
/// The UTF-8 bytes are left-aligned and zero-padded on the right, which is
/// how the attestation protocol names types and sources.
pub fn encode_identifier(name: &str) -> Result<B256, IdentifierError> {
	let raw = name.as_bytes();
	if raw.len() > 32 {
		return Err(IdentifierError::TooLong {
			name: name.to_string(),
			len: raw.len(),
		});
	}
	let mut out = [0u8; 32];
	out[..raw.len()].copy_from_slice(raw);
	Ok(B256::from(out))
}

/// Body of a Web2Json request: where to fetch and how to project the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
	pub url: String,
	pub http_method: String,
	/// JSON-encoded header map.
	pub headers: String,
	/// JSON-encoded query parameter map.
	pub query_params: String,
	pub body: String,
	/// jq expression applied to the upstream JSON response.
	#[serde(rename = "postProcessJq")]
	pub post_process_expression: String,
	/// JSON ABI of the tuple the projection is encoded as.
	#[serde(rename = "abiSignature")]
	pub output_abi_signature: String,
}

/// Canonical attestation request sent to the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequest {
	pub attestation_type: B256,
	pub source_id: B256,
	pub request_body: RequestBody,
}

impl AttestationRequest {
	/// Builds a Web2Json request against a public web source.
	pub fn web2json(request_body: RequestBody) -> Result<Self, IdentifierError> {
		Ok(Self {
			attestation_type: encode_identifier(WEB2JSON_ATTESTATION_TYPE)?,
			source_id: encode_identifier(PUBLIC_WEB2_SOURCE_ID)?,
			request_body,
		})
	}
}

/// Opaque encoded request returned by the verifier.
///
/// Never parsed by the client; it is submitted on-chain as is and presented
/// again to the data-availability layer when fetching the proof.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedRequest(Bytes);

impl EncodedRequest {
	pub fn new(bytes: impl Into<Bytes>) -> Self {
		Self(bytes.into())
	}

	pub fn as_bytes(&self) -> &Bytes {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Lowercase `0x`-prefixed hex rendering, the form HTTP services expect.
	pub fn to_hex(&self) -> String {
		hex::encode_prefixed(&self.0)
	}
}

impl fmt::Display for EncodedRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl fmt::Debug for EncodedRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let hex = self.to_hex();
		if hex.len() > 26 {
			write!(f, "EncodedRequest({}.. {} bytes)", &hex[..26], self.len())
		} else {
			write!(f, "EncodedRequest({})", hex)
		}
	}
}
