mod cli;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use stagerun::{Runtime, RuntimeConfig, logging};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Check { config } => {
            let loaded = RuntimeConfig::load(&config.paths())?;
            Runtime::new(loaded.clone())?;
            println!(
                "Configuration OK: {} states, {} tasks, initial state `{}`",
                loaded.state_machine.states.len(),
                loaded.grammar.tasks.len(),
                loaded.state_machine.initial
            );
        }
        Command::Run {
            config,
            prompt,
            template,
            destination,
            score,
            json,
        } => {
            let loaded = RuntimeConfig::load(&config.paths())?;
            let settings = cli::pipeline_settings(&prompt, &template, &destination);

            if json {
                let mut runtime = Runtime::builder(loaded)
                    .settings(settings)
                    .score(score)
                    .build()?;
                let record = runtime.run().await?;
                println!("{}", serde_json::to_string_pretty(&record)?);
                return Ok(());
            }

            let progress = Arc::new(ui::RunProgress::start());
            let mut runtime = Runtime::builder(loaded)
                .logger(progress.clone())
                .settings(settings)
                .score(score)
                .build()?;
            match runtime.run().await {
                Ok(record) => {
                    progress.complete(&record);
                    progress.print_record(&record);
                }
                Err(err) => {
                    progress.abort(&err);
                    return Err(err.into());
                }
            }
        }
    }

    Ok(())
}
