//! HTTP client for the Web2Json verifier.

use crate::{VerifierError, VerifierInterface};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use attestor_types::{AttestationRequest, EncodedRequest};
use serde::Deserialize;
use std::time::Duration;

/// Path of the prepare endpoint, relative to the verifier base URL.
const PREPARE_PATH: &str = "Web2Json/prepareRequest";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrepareResponse {
	#[serde(default)]
	status: Option<String>,
	#[serde(default)]
	abi_encoded_request: Option<String>,
}

/// Verifier reached over HTTP, authenticated with an `X-API-KEY` header.
pub struct HttpVerifier {
	client: reqwest::Client,
	endpoint: String,
	api_key: String,
}

impl HttpVerifier {
	pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, VerifierError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.map_err(|e| VerifierError::Http(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: format!("{}/{}", base_url.trim_end_matches('/'), PREPARE_PATH),
			api_key: api_key.into(),
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl VerifierInterface for HttpVerifier {
	async fn prepare_request(
		&self,
		request: &AttestationRequest,
	) -> Result<EncodedRequest, VerifierError> {
		let response = self
			.client
			.post(&self.endpoint)
			.header("X-API-KEY", &self.api_key)
			.json(request)
			.send()
			.await
			.map_err(|e| VerifierError::Http(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			tracing::warn!(status = status.as_u16(), "Verifier rejected request");
			return Err(VerifierError::Rejected {
				status: status.as_u16(),
				body,
			});
		}

		let parsed: PrepareResponse = response
			.json()
			.await
			.map_err(|e| VerifierError::MalformedResponse(e.to_string()))?;

		tracing::debug!(status = ?parsed.status, "Verifier response");

		let encoded = parsed.abi_encoded_request.ok_or_else(|| {
			VerifierError::MalformedResponse("missing `abiEncodedRequest`".to_string())
		})?;

		let bytes = encoded.parse::<Bytes>().map_err(|e| {
			VerifierError::MalformedResponse(format!("`abiEncodedRequest` is not hex: {}", e))
		})?;

		Ok(EncodedRequest::new(bytes))
	}
}
