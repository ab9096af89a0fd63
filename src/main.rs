//! Decision - command line entry point

use clap::Parser;
use decision_core::cli::{cmd_explain, cmd_health, cmd_info, cmd_predict, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decision_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, target, model, task, validation_split, output } => {
            cmd_train(&data, &target, &model, &task, validation_split, output.as_deref())?;
        }
        Commands::Predict { model, features, extract } => {
            cmd_predict(&model, &features, extract)?;
        }
        Commands::Explain { model, features, method, extract, top } => {
            cmd_explain(&model, &features, &method, extract, top)?;
        }
        Commands::Info { model } => {
            cmd_info(&model)?;
        }
        Commands::Health { dir } => {
            cmd_health(dir.as_deref()).await?;
        }
    }

    Ok(())
}
