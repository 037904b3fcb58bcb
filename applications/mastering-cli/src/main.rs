/// Soul Master - offline mastering from the command line
use clap::Parser;
use mastering_cli::{commands, Cli, CliConfig, Command, SettingsArgs};
use mastering_core::MasteringSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mastering_cli=info,mastering_audio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Export {
            input,
            output,
            settings,
        } => {
            let output = output.unwrap_or_else(|| config.default_output_path());
            let report = commands::export(&input, &output, resolve(&config, &settings)).await?;
            println!("Wrote {} ({} bytes)", report.path.display(), report.bytes);
            println!("Chain: {}", report.route);
        }
        Command::Play { input, settings } => {
            commands::play(&input, resolve(&config, &settings)).await?;
        }
        Command::Info { input, settings } => {
            println!("{}", commands::info(&input, &resolve(&config, &settings)).await?);
        }
    }

    Ok(())
}

fn resolve(config: &CliConfig, args: &SettingsArgs) -> MasteringSettings {
    let mut settings = config.mastering();
    args.apply(&mut settings);
    tracing::debug!(?settings, "Resolved settings");
    settings
}
