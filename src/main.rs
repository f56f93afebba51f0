//! CLI entry point for the mesh chat node.
//!
//! This binary provides a command-line interface for the node library,
//! supporting configuration management and running an interactive node.

use anyhow::Result;
use clap::{Parser, Subcommand};
use irc_mesh::{
    console::{Lang, StdoutConsole},
    utils::{NodeConfig, DEFAULT_CONFIG_FILE},
    App,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

/// IRC Mesh - serverless IRC-style chat over a flooding peer mesh
#[derive(Parser)]
#[command(name = "irc-node")]
#[command(about = "A serverless IRC-style chat node that floods messages across a peer mesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the mesh and chat on this terminal
    Run {
        /// Nickname announced to other nodes
        #[arg(short, long)]
        nickname: Option<String>,
        /// Host to listen on
        #[arg(long)]
        host: Option<String>,
        /// Host other nodes reach this one at (defaults to the listen host)
        #[arg(long, value_name = "HOST")]
        advertise_host: Option<String>,
        /// Port to listen on (0 picks a free one)
        #[arg(short, long)]
        port: Option<u16>,
        /// Known peer as host:port (repeatable)
        #[arg(short, long)]
        seed: Vec<String>,
        /// Console language (en, fr)
        #[arg(short, long)]
        lang: Option<Lang>,
    },
    /// Generate and validate configuration files
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        file: Option<PathBuf>,
    },
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = NodeConfig::load(cli.config.as_deref())?;

    // Initialize logging
    setup_logging(cli.verbose, cli.quiet, &config.logging.level);

    match cli.command {
        Commands::Run {
            nickname,
            host,
            advertise_host,
            port,
            seed,
            lang,
        } => {
            let overrides = RunOverrides {
                nickname,
                host,
                advertise_host,
                port,
                seed,
                lang,
            };
            handle_run_command(overrides, config).await
        }
        Commands::Config { action } => handle_config_commands(action, &config),
    }
}

fn setup_logging(verbose: u8, quiet: bool, configured: &str) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

/// Command line options of `run` that override the configuration
struct RunOverrides {
    nickname: Option<String>,
    host: Option<String>,
    advertise_host: Option<String>,
    port: Option<u16>,
    seed: Vec<String>,
    lang: Option<Lang>,
}

async fn handle_run_command(overrides: RunOverrides, mut config: NodeConfig) -> Result<()> {
    // Override config with command line options
    if let Some(nickname) = overrides.nickname {
        config.node.nickname = nickname;
    }
    if let Some(host) = overrides.host {
        config.network.listen_host = host;
    }
    if let Some(host) = overrides.advertise_host {
        config.network.advertise_host = Some(host);
    }
    if let Some(port) = overrides.port {
        config.network.listen_port = port;
    }
    if !overrides.seed.is_empty() {
        config.network.seed_peers = overrides.seed;
    }
    if let Some(lang) = overrides.lang {
        config.node.language = lang;
    }

    info!("Starting mesh node...");
    info!("Nickname: {}", config.node.nickname);
    info!("Seed peers: {:?}", config.network.seed_peers);

    let app = App::bind(config, Arc::new(StdoutConsole)).await?;
    if let Err(e) = app.run().await {
        error!("Node error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn handle_config_commands(action: ConfigCommands, config: &NodeConfig) -> Result<()> {
    match action {
        ConfigCommands::Generate { output } => {
            let default_config = NodeConfig::default();
            let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

            default_config.save(&output_path)?;
            println!("✓ Configuration generated: {}", output_path.display());
        }
        ConfigCommands::Validate { file } => {
            let config_to_validate = if let Some(path) = file {
                NodeConfig::from_file(path)?
            } else {
                config.clone()
            };

            config_to_validate.validate()?;
            println!("✓ Configuration is valid");
        }
        ConfigCommands::Show => {
            println!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}
