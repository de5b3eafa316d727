use alertmanager2hangoutschat::{log, server, settings::Settings};
use anyhow::{Context, Result};

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings).context("could not setup logging")?;

	server::run(settings).await
}
