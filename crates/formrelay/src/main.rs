//! `formrelay` - serve a static site and record its form submissions
//!
//! This binary runs the HTTP front end and the message receiver, and offers
//! a few commands for inspecting configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tracing::info;

use formrelay::cli::{Cli, Command, ConfigCommand, ServeCommand};
use formrelay::{init_logging, Config, ListenerKind, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd).await,
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_serve(mut config: Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    cmd.apply(&mut config);

    let mut supervisor = Supervisor::from_config(&config)
        .await
        .context("failed to start listeners")?;

    if let Some(addr) = supervisor.local_addr(ListenerKind::Http) {
        info!("Serving {} on http://{addr}", config.http.site_root.display());
    }
    if let Some(addr) = supervisor.local_addr(ListenerKind::Receiver) {
        info!(
            "Recording messages from {addr} to {}",
            config.store_path().display()
        );
    }

    supervisor.run_until_signal().await?;
    info!("Goodbye");
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[HTTP]");
                println!("  Address:            {}", config.http_addr());
                println!("  Site root:          {}", config.http.site_root.display());
                println!("  Index document:     {}", config.http.index_document);
                println!("  Message document:   {}", config.http.message_document);
                println!("  Error document:     {}", config.http.error_document);
                println!();
                println!("[Relay]");
                println!("  Address:            {}", config.relay_addr());
                println!("  Buffer size:        {}", config.relay.buffer_size);
                println!();
                println!("[Storage]");
                println!("  Store path:         {}", config.store_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
