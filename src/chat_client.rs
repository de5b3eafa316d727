//! delivers rendered messages to hangouts chat incoming webhooks
use std::time::Duration;

use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use serde::Serialize;
use url::Url;

use crate::error::RelayError;

/// longest response body kept as diagnostic of a failed delivery
const MAX_DIAGNOSTIC_CHARS: usize = 512;

#[derive(Debug, Serialize)]
/// message body understood by hangouts chat webhooks
pub struct ChatEnvelope<'a> {
	pub text: &'a str,
}

impl<'a> ChatEnvelope<'a> {
	pub fn new(text: &'a str) -> Self {
		Self { text }
	}

	/// `{"text": ...}` as json bytes
	pub fn to_bytes(&self) -> Result<Vec<u8>, RelayError> {
		serde_json::to_vec(self).map_err(RelayError::Encode)
	}
}

#[derive(Debug, Clone)]
/// http client shared by all requests. Never retries, alertmanager redelivers
/// notifications we answer with an error.
pub struct ChatClient {
	/// http client, owns the connection pool
	client: reqwest::Client,
}

impl ChatClient {
	/// construct a client whose requests give up after `timeout`
	pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(timeout)
				.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
				.build()?,
		})
	}

	/// post `envelope` to `destination`. Anything but `200 OK` is a failed delivery.
	///
	/// Transport errors drop the url, its query holds the webhook credentials.
	pub async fn deliver(&self, destination: &Url, envelope: Vec<u8>) -> Result<(), RelayError> {
		let response = self
			.client
			.post(destination.clone())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.body(envelope)
			.send()
			.await
			.map_err(transport_error)?;

		let status = response.status();
		// drain the body so the connection can go back into the pool
		let body = response.bytes().await.map_err(transport_error)?;

		if status != StatusCode::OK {
			return Err(RelayError::Upstream { status, body: diagnostic(&body) });
		}

		Ok(())
	}
}

fn transport_error(err: reqwest::Error) -> RelayError {
	RelayError::Transport(err.without_url())
}

/// response body as short, printable text
fn diagnostic(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	match text.char_indices().nth(MAX_DIAGNOSTIC_CHARS) {
		Some((end, _)) => format!("{}...", &text[..end]),
		None => text.to_owned(),
	}
}
