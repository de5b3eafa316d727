//! errors that can occur while forwarding a single alert notification
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

use crate::alert_renderer::TemplateError;

#[derive(Error, Debug)]
/// everything that stops a notification from reaching the chat room
pub enum RelayError {
	#[error("failed to decode alertmanager payload: {0}")]
	Decode(#[source] serde_json::Error),

	#[error(transparent)]
	Template(#[from] TemplateError),

	#[error("invalid destination url: {0}")]
	Destination(String),

	#[error("failed to encode chat message: {0}")]
	Encode(#[source] serde_json::Error),

	/// built from errors stripped of their url, see [ChatClient::deliver](crate::chat_client::ChatClient::deliver)
	#[error("chat webhook request failed: {0}")]
	Transport(#[source] reqwest::Error),

	#[error("chat webhook returned {status}: {body}")]
	Upstream { status: StatusCode, body: String },
}

impl RelayError {
	/// stable label used in log records and metrics
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Decode(_) => "decode",
			Self::Template(_) => "template",
			Self::Destination(_) => "destination",
			Self::Encode(_) => "encode",
			Self::Transport(_) => "transport",
			Self::Upstream { .. } => "upstream",
		}
	}

	/// alertmanager re-delivers on 5xx, so every failure is reported as one
	pub fn status_code(&self) -> StatusCode {
		StatusCode::INTERNAL_SERVER_ERROR
	}
}

impl IntoResponse for RelayError {
	fn into_response(self) -> Response {
		tracing::error!(kind = self.kind(), error = %self, "failed to forward alert notification");

		self.status_code().into_response()
	}
}
