use std::{
	ffi::OsString,
	net::{IpAddr, SocketAddr},
	path::PathBuf,
	time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use crate::{
	alert_renderer::DEFAULT_TEMPLATE,
	log,
	telemetry_endpoint::{HEALTH_PATH, METRICS_PATH},
};

/// prefix of environment variables overriding settings, e.g. `AM2HC_PORT`
pub const ENV_PREFIX: &str = "AM2HC";

/// flags which map one to one onto a settings key
const OVERRIDABLE: [&str; 9] = [
	"bind_address",
	"port",
	"path",
	"log_format",
	"log_level",
	"template_string",
	"template_file",
	"delivery_timeout",
	"shutdown_timeout",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// `json` selects json lines, any other value human readable records
pub enum LogFormat {
	Json,
	Text,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub bind_address: IpAddr,
	pub port: u16,
	/// path alertmanager posts notifications to
	pub path: String,
	pub log_format: String,
	pub log_level: String,
	/// inline template, takes precedence over `template_file`
	#[serde(default)]
	pub template_string: Option<String>,
	#[serde(default)]
	pub template_file: Option<PathBuf>,
	/// timeout of requests to the chat webhook
	#[serde_as(as = "DurationSeconds<f64>")]
	pub delivery_timeout: Duration,
	/// how long in-flight requests may take after a shutdown signal
	#[serde_as(as = "DurationSeconds<f64>")]
	pub shutdown_timeout: Duration,
}

fn command() -> Command<'static> {
	Command::new(clap::crate_name!())
		.version(clap::crate_version!())
		.about(clap::crate_description!())
		.args(&[
			Arg::new("config")
				.help("path of an optional config file (yaml, toml or json)")
				.takes_value(true)
				.short('c')
				.long("config"),
			Arg::new("bind_address")
				.help("address to listen on [default: 0.0.0.0]")
				.takes_value(true)
				.long("bind-address"),
			Arg::new("port")
				.help("port to listen on [default: 8080]")
				.takes_value(true)
				.long("port"),
			Arg::new("path")
				.help("path alertmanager posts notifications to [default: /alertmanager]")
				.takes_value(true)
				.long("path"),
			Arg::new("log_format")
				.help("`json` for json lines, anything else for human readable records [default: json]")
				.takes_value(true)
				.long("log-format"),
			Arg::new("log_level")
				.help("minimum level of log records [default: info]")
				.takes_value(true)
				.long("log-level"),
			Arg::new("template_string")
				.help("inline message template")
				.takes_value(true)
				.long("template-string"),
			Arg::new("template_file")
				.help("path of a message template file")
				.takes_value(true)
				.long("template-file"),
			Arg::new("delivery_timeout")
				.help("timeout of requests to the chat webhook in seconds [default: 10]")
				.takes_value(true)
				.long("delivery-timeout"),
			Arg::new("shutdown_timeout")
				.help("seconds in-flight requests may take after a shutdown signal [default: 5]")
				.takes_value(true)
				.long("shutdown-timeout"),
		])
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
	Ok(Config::builder()
		.set_default("bind_address", "0.0.0.0")?
		.set_default("port", 8080)?
		.set_default("path", "/alertmanager")?
		.set_default("log_format", "json")?
		.set_default("log_level", "info")?
		.set_default("delivery_timeout", 10.0)?
		.set_default("shutdown_timeout", 5.0)?)
}

impl Settings {
	/// settings from the process command line, environment and config file
	pub fn load() -> Result<Self> {
		Self::from_matches(&command().get_matches())
	}

	/// like [Settings::load] but with an explicit command line, `args[0]` is
	/// the program name
	pub fn load_from<I, T>(args: I) -> Result<Self>
	where
		I: IntoIterator<Item = T>,
		T: Into<OsString> + Clone,
	{
		let matches = command().try_get_matches_from(args).context("invalid command line")?;

		Self::from_matches(&matches)
	}

	fn from_matches(matches: &ArgMatches) -> Result<Self> {
		let mut builder = defaults()?;

		if let Some(path) = matches.value_of("config") {
			builder = builder.add_source(File::with_name(path));
		}

		builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

		for key in OVERRIDABLE {
			if let Some(value) = matches.value_of(key) {
				builder = builder.set_override(key, value)?;
			}
		}

		let settings: Settings = builder
			.build()
			.context("can't load config")?
			.try_deserialize()
			.context("can't load config")?;

		settings.validate()?;

		Ok(settings)
	}

	/// reject settings the relay can't run with
	pub fn validate(&self) -> Result<()> {
		if !self.path.starts_with('/') {
			bail!("path `{}` must start with `/`", self.path);
		}

		if self.path == HEALTH_PATH || self.path == METRICS_PATH {
			bail!("path `{}` is reserved", self.path);
		}

		log::parse_level(&self.log_level)?;

		if self.delivery_timeout.is_zero() {
			bail!("delivery timeout must not be zero");
		}

		if self.shutdown_timeout.is_zero() {
			bail!("shutdown timeout must not be zero");
		}

		Ok(())
	}

	pub fn log_format(&self) -> LogFormat {
		if self.log_format.eq_ignore_ascii_case("json") {
			LogFormat::Json
		} else {
			LogFormat::Text
		}
	}

	pub fn socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}

	/// source of the message template: the non-empty inline template, the
	/// template file or the built-in default, in that order
	pub fn template_source(&self) -> Result<String> {
		if let Some(source) = self.template_string.as_deref().filter(|source| !source.is_empty()) {
			return Ok(source.to_owned());
		}

		match &self.template_file {
			Some(path) => std::fs::read_to_string(path)
				.with_context(|| format!("can't read template file {}", path.display())),
			None => Ok(DEFAULT_TEMPLATE.to_owned()),
		}
	}
}
