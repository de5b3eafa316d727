use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter, Layer,
};

use crate::settings::{LogFormat, Settings};

/// parse a log level name. `fatal` and `panic` are accepted as aliases of
/// `error`, tracing has nothing above it.
pub fn parse_level(level: &str) -> Result<Level> {
	match level.to_ascii_lowercase().as_str() {
		"trace" => Ok(Level::TRACE),
		"debug" => Ok(Level::DEBUG),
		"info" => Ok(Level::INFO),
		"warn" | "warning" => Ok(Level::WARN),
		"error" | "fatal" | "panic" => Ok(Level::ERROR),
		_ => Err(anyhow!("unknown log level `{level}`")),
	}
}

pub fn setup_logging(settings: &Settings) -> Result<()> {
	let level = parse_level(&settings.log_level)?;

	let fmt_layer = match settings.log_format() {
		LogFormat::Json => fmt::layer().json().boxed(),
		LogFormat::Text => fmt::layer().boxed(),
	};

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	tracing_subscriber::registry().with(filter_layer).with(fmt_layer).try_init()?;

	Ok(())
}
