//! Request encoding against the attestation verifier.
//!
//! [`RequestEncoder`] builds the Web2Json request describing the upstream
//! transfer lookup and hands it to a [`VerifierInterface`], which returns the
//! opaque encoded request used by every later stage. A failed prepare call is
//! not retried here; the caller decides whether to try again.

use async_trait::async_trait;
use attestor_types::{AttestationRequest, EncodedRequest, RequestBody};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod http;
}

pub use implementations::http::HttpVerifier;

/// jq projection of an upstream transfer onto the attested tuple.
pub const TRANSFER_POST_PROCESS_JQ: &str = "{id: .id, targetAccount: .targetAccount, status: .status, userMessage: .reference, targetValue: (.targetValue * 100 | floor), targetCurrency: .targetCurrency}";

/// JSON ABI of the attested tuple produced by [`TRANSFER_POST_PROCESS_JQ`].
pub const TRANSFER_ABI_SIGNATURE: &str = r#"{"components": [{"internalType": "uint256", "name": "id", "type": "uint256"},{"internalType": "uint256", "name": "targetAccount", "type": "uint256"},{"internalType": "string", "name": "status", "type": "string"},{"internalType": "address", "name": "userMessage", "type": "address"},{"internalType": "uint256", "name": "targetValue", "type": "uint256"},{"internalType": "string", "name": "targetCurrency", "type": "string"}],"name": "task","type": "tuple"}"#;

#[derive(Debug, Error)]
pub enum VerifierError {
	#[error("Verifier rejected the request with status {status}: {body}")]
	Rejected { status: u16, body: String },
	#[error("Malformed verifier response: {0}")]
	MalformedResponse(String),
	#[error("HTTP error: {0}")]
	Http(String),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
}

#[async_trait]
pub trait VerifierInterface: Send + Sync {
	/// Submits `request` to the verifier's prepare endpoint.
	async fn prepare_request(
		&self,
		request: &AttestationRequest,
	) -> Result<EncodedRequest, VerifierError>;
}

/// Builds transfer attestation requests and obtains their encoding.
pub struct RequestEncoder {
	verifier: Arc<dyn VerifierInterface>,
	/// Upstream transfer resource; the transfer id is appended.
	transfer_api_url: String,
}

impl RequestEncoder {
	pub fn new(verifier: Arc<dyn VerifierInterface>, transfer_api_url: impl Into<String>) -> Self {
		Self {
			verifier,
			transfer_api_url: transfer_api_url.into(),
		}
	}

	/// Builds the canonical request for `transfer_id`, authenticating upstream with `credential`.
	pub fn build_request(
		&self,
		transfer_id: &str,
		credential: &str,
	) -> Result<AttestationRequest, VerifierError> {
		validate_transfer_id(transfer_id)?;
		if credential.trim().is_empty() {
			return Err(VerifierError::InvalidInput(
				"upstream credential is empty".to_string(),
			));
		}

		let authorization = serde_json::to_string(&format!("Bearer {}", credential))
			.map_err(|e| VerifierError::InvalidInput(e.to_string()))?;
		let headers = format!(
			r#"{{"Content-Type":"application/json","Authorization":{}}}"#,
			authorization
		);

		let body = RequestBody {
			url: format!(
				"{}/{}",
				self.transfer_api_url.trim_end_matches('/'),
				transfer_id
			),
			http_method: "GET".to_string(),
			headers,
			query_params: "{}".to_string(),
			body: "{}".to_string(),
			post_process_expression: TRANSFER_POST_PROCESS_JQ.to_string(),
			output_abi_signature: TRANSFER_ABI_SIGNATURE.to_string(),
		};

		AttestationRequest::web2json(body).map_err(|e| VerifierError::InvalidInput(e.to_string()))
	}

	/// Builds the request for `transfer_id` and submits it to the verifier.
	///
	/// Either returns a non-empty [`EncodedRequest`] or fails; no partial
	/// artifact is ever produced.
	pub async fn build_and_submit(
		&self,
		transfer_id: &str,
		credential: &str,
	) -> Result<EncodedRequest, VerifierError> {
		let request = self.build_request(transfer_id, credential)?;
		tracing::info!(
			transfer_id = %transfer_id,
			url = %request.request_body.url,
			"Preparing attestation request"
		);

		let encoded = self.verifier.prepare_request(&request).await?;
		if encoded.is_empty() {
			return Err(VerifierError::MalformedResponse(
				"encoded request is empty".to_string(),
			));
		}

		tracing::info!(bytes = encoded.len(), "Verifier accepted request");
		Ok(encoded)
	}
}

/// Transfer ids are upstream numeric identifiers.
fn validate_transfer_id(transfer_id: &str) -> Result<(), VerifierError> {
	if transfer_id.is_empty() {
		return Err(VerifierError::InvalidInput("transfer id is empty".to_string()));
	}
	if !transfer_id.chars().all(|c| c.is_ascii_digit()) {
		return Err(VerifierError::InvalidInput(format!(
			"transfer id {:?} must be decimal digits",
			transfer_id
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	struct RecordingVerifier {
		seen: Mutex<Vec<AttestationRequest>>,
		response: Vec<u8>,
	}

	#[async_trait]
	impl VerifierInterface for RecordingVerifier {
		async fn prepare_request(
			&self,
			request: &AttestationRequest,
		) -> Result<EncodedRequest, VerifierError> {
			self.seen.lock().unwrap().push(request.clone());
			Ok(EncodedRequest::new(self.response.clone()))
		}
	}

	fn encoder(response: Vec<u8>) -> (Arc<RecordingVerifier>, RequestEncoder) {
		let verifier = Arc::new(RecordingVerifier {
			seen: Mutex::new(Vec::new()),
			response,
		});
		let encoder = RequestEncoder::new(
			verifier.clone(),
			"https://api.transferwise.com/v1/transfers/",
		);
		(verifier, encoder)
	}

	#[test]
	fn test_build_request_shape() {
		let (_, encoder) = encoder(vec![1]);
		let request = encoder.build_request("1614003520", "secret").unwrap();
		let body = &request.request_body;

		assert_eq!(body.url, "https://api.transferwise.com/v1/transfers/1614003520");
		assert_eq!(body.http_method, "GET");
		assert_eq!(body.query_params, "{}");
		assert_eq!(body.body, "{}");
		assert_eq!(
			body.headers,
			r#"{"Content-Type":"application/json","Authorization":"Bearer secret"}"#
		);
		assert_eq!(body.post_process_expression, TRANSFER_POST_PROCESS_JQ);

		let abi: serde_json::Value = serde_json::from_str(&body.output_abi_signature).unwrap();
		assert_eq!(abi["name"], "task");
		assert_eq!(abi["components"].as_array().unwrap().len(), 6);
		assert_eq!(abi["components"][3]["type"], "address");
	}

	#[test]
	fn test_build_request_is_deterministic() {
		let (_, encoder) = encoder(vec![1]);
		assert_eq!(
			encoder.build_request("42", "token").unwrap(),
			encoder.build_request("42", "token").unwrap()
		);
	}

	#[test]
	fn test_credential_is_escaped_in_headers() {
		let (_, encoder) = encoder(vec![1]);
		let request = encoder.build_request("42", "a\"b").unwrap();
		let headers: serde_json::Value = serde_json::from_str(&request.request_body.headers).unwrap();
		assert_eq!(headers["Authorization"], "Bearer a\"b");
	}

	#[tokio::test]
	async fn test_rejects_bad_inputs_without_calling_verifier() {
		let (verifier, encoder) = encoder(vec![1]);
		for id in ["", "12a4", " 1"] {
			assert!(matches!(
				encoder.build_and_submit(id, "token").await,
				Err(VerifierError::InvalidInput(_))
			));
		}
		assert!(matches!(
			encoder.build_and_submit("1", " ").await,
			Err(VerifierError::InvalidInput(_))
		));
		assert!(verifier.seen.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_empty_encoding_is_malformed() {
		let (verifier, encoder) = encoder(Vec::new());
		assert!(matches!(
			encoder.build_and_submit("1614003520", "token").await,
			Err(VerifierError::MalformedResponse(_))
		));
		assert_eq!(verifier.seen.lock().unwrap().len(), 1);
	}
}
