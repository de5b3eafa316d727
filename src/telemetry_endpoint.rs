//! Here we expose prometheus metrics about the relay and log the requests we serve
use std::{sync::Arc, time::Instant};

use axum::{
	extract::{Extension, MatchedPath},
	http::{header::CONTENT_TYPE, Request, StatusCode},
	middleware::Next,
	response::{IntoResponse, Response},
};
use prometheus::{
	exponential_buckets, histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, Registry,
	TextEncoder,
};

use crate::alert::{FIRING, RESOLVED};

/// path of the prometheus scrape endpoint
pub const METRICS_PATH: &str = "/metrics";
/// path of the liveness endpoint
pub const HEALTH_PATH: &str = "/health";

/// requests to these paths are neither logged nor measured by the request log
const UNLOGGED_PATHS: [&str; 2] = [HEALTH_PATH, METRICS_PATH];

const NAMESPACE: &str = "alertmanager2hangoutschat";

#[derive(Debug, Clone)]
/// prometheus meters of one relay instance
pub struct Telemetry {
	/// registry the meters are registered with, scraped by [metrics_handler]
	registry: Registry,
	/// served http requests by method, route and status
	http_requests: IntCounterVec,
	/// time spent serving http requests
	http_request_duration: HistogramVec,
	/// alerts contained in decoded notifications, by alert status
	received_alerts: IntCounterVec,
	/// outcome of forwarded notifications, `delivered` or the error kind
	notifications: IntCounterVec,
}

impl Telemetry {
	/// construct and register the meters
	pub fn new() -> Result<Self, prometheus::Error> {
		let registry = Registry::new();

		let http_requests = IntCounterVec::new(
			opts!("requests_total", "total number of served http requests")
				.namespace(NAMESPACE)
				.subsystem("http"),
			&["method", "path", "status"],
		)?;

		let http_request_duration = HistogramVec::new(
			histogram_opts!(
				"request_duration_seconds",
				"time spent serving http requests in seconds",
				exponential_buckets(0.005, 2., 12)?
			)
			.namespace(NAMESPACE)
			.subsystem("http"),
			&["method", "path", "status"],
		)?;

		let received_alerts = IntCounterVec::new(
			opts!("received_alerts_total", "total number of deserialized alerts")
				.namespace(NAMESPACE)
				.subsystem("alertmanager_webhook"),
			&["status"],
		)?;

		let notifications = IntCounterVec::new(
			opts!("notifications_total", "forwarded alert notifications by outcome")
				.namespace(NAMESPACE)
				.subsystem("alertmanager_webhook"),
			&["result"],
		)?;

		registry.register(Box::new(http_requests.clone()))?;
		registry.register(Box::new(http_request_duration.clone()))?;
		registry.register(Box::new(received_alerts.clone()))?;
		registry.register(Box::new(notifications.clone()))?;

		Ok(Self { registry, http_requests, http_request_duration, received_alerts, notifications })
	}

	/// counts one received alert. The status comes from the caller, anything
	/// unknown is counted as `other` to keep the label set bounded.
	pub fn record_alert(&self, status: &str) {
		let status = match status {
			FIRING | RESOLVED => status,
			_ => "other",
		};
		self.received_alerts.with_label_values(&[status]).inc();
	}

	/// counts the outcome of one notification
	pub fn record_notification(&self, result: &str) {
		self.notifications.with_label_values(&[result]).inc();
	}

	fn record_request(&self, method: &str, path: &str, status: StatusCode, started: Instant) {
		let status = status.as_str();
		self.http_requests.with_label_values(&[method, path, status]).inc();
		self.http_request_duration
			.with_label_values(&[method, path, status])
			.observe(started.elapsed().as_secs_f64());
	}

	/// prometheus text exposition of all meters
	pub fn encode(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
		let mut buffer = vec![];
		let encoder = TextEncoder::new();
		encoder.encode(&self.registry.gather(), &mut buffer)?;

		Ok((encoder.format_type().to_owned(), buffer))
	}
}

/// `GET /metrics`
pub async fn metrics_handler(Extension(telemetry): Extension<Arc<Telemetry>>) -> Response {
	match telemetry.encode() {
		Ok((content_type, buffer)) => ([(CONTENT_TYPE, content_type)], buffer).into_response(),
		Err(err) => {
			tracing::error!(error = %err, "failed to encode prometheus metrics");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		}
	}
}

/// `GET /health`
pub async fn health_handler() -> StatusCode {
	StatusCode::OK
}

/// middleware counting requests by method, route and status
pub async fn http_metrics<B>(req: Request<B>, next: Next<B>) -> Response {
	let path = req
		.extensions()
		.get::<MatchedPath>()
		.map(|path| path.as_str().to_owned())
		.unwrap_or_else(|| "unmatched".to_owned());

	// don't measure the scrapes themselves
	if path == METRICS_PATH {
		return next.run(req).await;
	}

	let telemetry = req.extensions().get::<Arc<Telemetry>>().cloned();
	let method = req.method().to_string();
	let started = Instant::now();

	let response = next.run(req).await;

	if let Some(telemetry) = telemetry {
		telemetry.record_request(&method, &path, response.status(), started);
	}

	response
}

/// middleware logging every request except health checks and scrapes. The
/// query string is left out, it carries the webhook credentials.
pub async fn request_log<B>(req: Request<B>, next: Next<B>) -> Response {
	let path = req.uri().path().to_owned();
	if UNLOGGED_PATHS.contains(&path.as_str()) {
		return next.run(req).await;
	}

	let method = req.method().clone();
	let started = Instant::now();

	let response = next.run(req).await;

	tracing::info!(
		method = %method,
		path = %path,
		status = response.status().as_u16(),
		duration_ms = started.elapsed().as_secs_f64() * 1000.0,
		"served request"
	);

	response
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_meters_show_up_in_exposition() {
		let telemetry = Telemetry::new().unwrap();
		telemetry.record_alert("firing");
		telemetry.record_notification("delivered");
		telemetry.record_request("POST", "/alertmanager", StatusCode::OK, Instant::now());

		let (content_type, buffer) = telemetry.encode().unwrap();
		let text = String::from_utf8(buffer).unwrap();

		assert!(content_type.starts_with("text/plain"));
		assert!(text.contains(
			"alertmanager2hangoutschat_alertmanager_webhook_received_alerts_total{status=\"firing\"} 1"
		));
		assert!(text.contains(
			"alertmanager2hangoutschat_alertmanager_webhook_notifications_total{result=\"delivered\"} 1"
		));
		assert!(text.contains("alertmanager2hangoutschat_http_requests_total{method=\"POST\",path=\"/alertmanager\",status=\"200\"} 1"));
		assert!(text.contains("alertmanager2hangoutschat_http_request_duration_seconds_bucket"));
	}

	#[test]
	fn test_unknown_alert_statuses_share_one_series() {
		let telemetry = Telemetry::new().unwrap();
		for status in ["pending", "x-1", "x-2", ""] {
			telemetry.record_alert(status);
		}
		telemetry.record_alert("resolved");

		let (_, buffer) = telemetry.encode().unwrap();
		let text = String::from_utf8(buffer).unwrap();

		assert!(text.contains("received_alerts_total{status=\"other\"} 4"));
		assert!(text.contains("received_alerts_total{status=\"resolved\"} 1"));
		assert!(!text.contains("pending"));
		assert!(!text.contains("x-1"));
	}

	#[test]
	fn test_instances_do_not_share_meters() {
		let first = Telemetry::new().unwrap();
		let second = Telemetry::new().unwrap();
		first.record_alert("resolved");

		let (_, buffer) = second.encode().unwrap();
		assert!(!String::from_utf8(buffer).unwrap().contains("resolved"));
	}
}
