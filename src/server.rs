//! http ingress: route table, middleware and the serving loop
use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
	extract::Extension,
	middleware,
	routing::{get, post},
	Router,
};
use tokio::sync::oneshot;
use tower_http::catch_panic::CatchPanicLayer;

use crate::{
	alert_renderer::AlertRenderer,
	alertmanager_webhook_receiver::{self, State},
	chat_client::ChatClient,
	settings::Settings,
	telemetry_endpoint::{self, Telemetry, HEALTH_PATH, METRICS_PATH},
};

/// build the router for `path`. The receiver path must not collide with
/// [HEALTH_PATH] or [METRICS_PATH], [Settings::validate] checks that.
pub fn create_router(path: &str, state: Arc<State>, telemetry: Arc<Telemetry>) -> Router {
	let routes = Router::new()
		.route(HEALTH_PATH, get(telemetry_endpoint::health_handler))
		.route(METRICS_PATH, get(telemetry_endpoint::metrics_handler))
		.route(path, post(alertmanager_webhook_receiver::alertmanager_receiver));

	with_middleware(routes, state, telemetry)
}

/// wrap `routes` in panic recovery, request logging and metrics, and hand
/// them the shared state. Panicking handlers answer 500.
pub fn with_middleware(routes: Router, state: Arc<State>, telemetry: Arc<Telemetry>) -> Router {
	routes
		.layer(CatchPanicLayer::new())
		.layer(middleware::from_fn(telemetry_endpoint::request_log))
		.layer(middleware::from_fn(telemetry_endpoint::http_metrics))
		.layer(Extension(state))
		.layer(Extension(telemetry))
}

/// construct everything the router needs from `settings`
pub fn build(settings: &Settings) -> Result<Router> {
	let source = settings.template_source().context("failed to load message template")?;
	let renderer = AlertRenderer::new(&source).context("invalid message template")?;
	let client =
		ChatClient::new(settings.delivery_timeout).context("failed to build http client")?;
	let telemetry = Arc::new(Telemetry::new().context("failed to register prometheus meters")?);

	let state = Arc::new(State::new(renderer, client, Arc::clone(&telemetry)));

	Ok(create_router(&settings.path, state, telemetry))
}

/// resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %err, "failed to listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				tracing::error!(error = %err, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

/// serve `router` until `shutdown` resolves, then wait at most `drain` for
/// in-flight requests before giving up on them
pub async fn serve(
	settings: &Settings,
	router: Router,
	shutdown: impl Future<Output = ()>,
	drain: Duration,
) -> Result<()> {
	let addr = settings.socket_addr();
	let (tx_draining, rx_draining) = oneshot::channel::<()>();

	let server = axum::Server::try_bind(&addr)
		.with_context(|| format!("failed to bind {addr}"))?
		.serve(router.into_make_service())
		.with_graceful_shutdown(async move {
			shutdown.await;
			tracing::info!(seconds = drain.as_secs_f64(), "shutdown signal received, draining requests");
			let _ = tx_draining.send(());
		});

	tracing::info!(%addr, path = %settings.path, "listening for alertmanager notifications");

	let drain_deadline = async move {
		// the sender is dropped without sending if the server stops on its own
		match rx_draining.await {
			Ok(()) => tokio::time::sleep(drain).await,
			Err(_) => std::future::pending::<()>().await,
		}
	};

	tokio::select! {
		result = server => result.context("http server crashed")?,
		_ = drain_deadline => {
			tracing::warn!("drain window elapsed, abandoning in-flight requests");
		}
	}

	tracing::info!("shutdown complete");

	Ok(())
}

/// run the relay with `settings` until SIGINT or SIGTERM
pub async fn run(settings: Settings) -> Result<()> {
	let router = build(&settings)?;

	serve(&settings, router, shutdown_signal(), settings.shutdown_timeout).await
}
