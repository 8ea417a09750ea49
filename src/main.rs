// Entrypoint for the CLI application.
// - Parses settings from flags and environment, sets up logging.
// - Hands control to the interactive shell until the user exits.

use clap::Parser;
use honulabs_cli::{logging, settings::Settings, ui::Shell};

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    logging::init_tracing(&settings.log_filter);
    tracing::debug!(api_url = %settings.api_url, "starting Honulabs CLI");

    let mut shell = Shell::new(settings)?;
    shell.run()
}
