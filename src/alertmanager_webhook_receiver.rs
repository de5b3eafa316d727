//! receives alertmanager webhook notifications and forwards them into the chat
//! room given by the `url` query parameter
use std::sync::Arc;

use axum::extract::{Extension, RawQuery};
use bytes::Bytes;
use http::StatusCode;

use crate::{
	alert::{self, RenderModel},
	alert_renderer::AlertRenderer,
	chat_client::{ChatClient, ChatEnvelope},
	error::RelayError,
	query_params::QueryParams,
	telemetry_endpoint::Telemetry,
};

/// everything a request needs, created once at startup
pub struct State {
	renderer: AlertRenderer,
	client: ChatClient,
	telemetry: Arc<Telemetry>,
}

impl State {
	pub fn new(renderer: AlertRenderer, client: ChatClient, telemetry: Arc<Telemetry>) -> Self {
		Self { renderer, client, telemetry }
	}

	/// render one notification and post it to the chat webhook
	pub async fn forward(&self, query: &str, body: &[u8]) -> Result<(), RelayError> {
		let params = QueryParams::parse(query);
		let destination = params.destination()?;

		let data: alert::Data = serde_json::from_slice(body).map_err(RelayError::Decode)?;
		for alert in data.alerts.iter() {
			self.telemetry.record_alert(&alert.status);
		}

		let text = self.renderer.render(&RenderModel::new(&data, &params))?;
		let envelope = ChatEnvelope::new(&text).to_bytes()?;

		self.client.deliver(&destination, envelope).await?;

		tracing::debug!(
			status = %data.status,
			alerts = data.alerts.len(),
			host = destination.host_str().unwrap_or_default(),
			"forwarded alert notification"
		);

		Ok(())
	}
}

/// `POST <path>?url=<chat webhook>&...` with an alertmanager payload
pub async fn alertmanager_receiver(
	Extension(state): Extension<Arc<State>>,
	RawQuery(query): RawQuery,
	body: Bytes,
) -> Result<StatusCode, RelayError> {
	let result = state.forward(query.as_deref().unwrap_or_default(), &body).await;

	match &result {
		Ok(()) => state.telemetry.record_notification("delivered"),
		Err(err) => state.telemetry.record_notification(err.kind()),
	}

	result.map(|()| StatusCode::OK)
}
