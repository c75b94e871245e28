//! HTTP client for the data-availability layer.

use crate::{DataAvailabilityError, DataAvailabilityInterface};
use async_trait::async_trait;
use attestor_types::{DaProofResponse, EncodedRequest};
use serde::Serialize;
use std::time::Duration;

const PROOF_BY_ROUND_PATH: &str = "api/v1/fdc/proof-by-request-round-raw";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofByRoundRequest {
	voting_round_id: u64,
	request_bytes: String,
}

pub struct HttpDataAvailability {
	client: reqwest::Client,
	endpoint: String,
}

impl HttpDataAvailability {
	pub fn new(base_url: &str) -> Result<Self, DataAvailabilityError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.map_err(|e| {
				DataAvailabilityError::Transport(format!("Failed to create HTTP client: {}", e))
			})?;

		Ok(Self {
			client,
			endpoint: format!("{}/{}", base_url.trim_end_matches('/'), PROOF_BY_ROUND_PATH),
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl DataAvailabilityInterface for HttpDataAvailability {
	async fn proof_by_round(
		&self,
		round_id: u64,
		request: &EncodedRequest,
	) -> Result<DaProofResponse, DataAvailabilityError> {
		let body = ProofByRoundRequest {
			voting_round_id: round_id,
			request_bytes: request.to_hex(),
		};

		let response = self
			.client
			.post(&self.endpoint)
			.json(&body)
			.send()
			.await
			.map_err(|e| DataAvailabilityError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(DataAvailabilityError::Status {
				status: status.as_u16(),
				body,
			});
		}

		response
			.json()
			.await
			.map_err(|e| DataAvailabilityError::Malformed(e.to_string()))
	}
}
