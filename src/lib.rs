//! relays prometheus alertmanager webhook notifications into google hangouts
//! chat rooms
//!
//! Every request carries its destination: alertmanager posts to
//! `<path>?url=<chat webhook>&env=<label>`, the payload is rendered with a tera
//! template and the text is posted to the chat webhook. Nothing is stored
//! between requests.
pub mod alert;
pub mod alert_renderer;
pub mod alertmanager_webhook_receiver;
pub mod chat_client;
pub mod error;
pub mod log;
pub mod query_params;
pub mod server;
pub mod settings;
pub mod template_helpers;
pub mod telemetry_endpoint;
