use anyhow::Context;
use clap::Parser;
use immich_autostack::config::Args;
use immich_autostack::immich::ImmichClient;
use immich_autostack::logging::init_logging;
use immich_autostack::StackRunner;

fn main() -> anyhow::Result<()> {
    init_logging();

    let settings = Args::parse()
        .into_settings()
        .context("Failed to load configuration")?;

    let client = ImmichClient::new(settings.api).context("Failed to create Immich client")?;
    let runner = StackRunner::new(client, settings.run);

    let summary = runner.run().context("Stacking run failed")?;
    if summary.failed > 0 {
        tracing::warn!("{} stack submissions failed", summary.failed);
    }

    Ok(())
}
