//! ShieldChat - Privacy-protected LLM chat service
//!
//! Chat backend that scans user input and model output for sensitive data,
//! enforces guardrail decisions, and persists every turn with its audit
//! trail.

use anyhow::Result;
use clap::{Parser, Subcommand};
use shieldchat::{
    config::{resolve_api_keys_from_env, ScannerBackend, ShieldChatConfig},
    server::ChatServerBuilder,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shieldchat")]
#[command(version)]
#[command(about = "Privacy-protected LLM chat service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SHIELDCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ShieldChat server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Disable input/output scanning (development only)
        #[arg(long)]
        no_protection: bool,
    },

    /// Run configuration diagnostics
    Doctor,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("shieldchat={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        ShieldChatConfig::default()
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            no_protection,
        } => {
            run_serve(config, host, port, no_protection).await?;
        }
        Commands::Doctor => {
            run_doctor(&config, cli.config.as_deref())?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_serve(
    mut config: ShieldChatConfig,
    host: Option<String>,
    port: Option<u16>,
    no_protection: bool,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if no_protection {
        tracing::warn!("running with input/output scanning disabled");
        config.protection.input_scan = false;
        config.protection.output_scan = false;
    }

    let server = ChatServerBuilder::new().config(config).build().await?;
    server.start().await?;

    tracing::info!("ShieldChat is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    server.stop().await?;

    Ok(())
}

fn run_doctor(config: &ShieldChatConfig, config_path: Option<&std::path::Path>) -> Result<()> {
    println!("ShieldChat Doctor");
    println!();

    println!("Configuration:");
    match config_path {
        Some(path) if path.exists() => println!("  ✓ Config file: {}", path.display()),
        Some(path) => println!("  ✗ Config file not found: {}", path.display()),
        None => println!("  ℹ No config file (using defaults)"),
    }

    println!();
    println!("Scanner:");
    match config.scanner.backend {
        ScannerBackend::Rules => {
            println!("  ✓ Rule-based backend ({} rules)", config.scanner.rules.len());
        }
        ScannerBackend::Remote => {
            println!("  ℹ Remote backend");
            println!("    classify:  {}", config.scanner.classify_url);
            println!("    guardrail: {}", config.scanner.guardrail_url);
        }
    }

    println!();
    println!("Model provider:");
    let keys = resolve_api_keys_from_env(&config.models);
    let default = &config.models.default_provider;
    match config.models.providers.get(default) {
        Some(provider_cfg) => {
            if default == "echo" || keys.contains_key(default) {
                println!("  ✓ '{}' (model: {})", default, provider_cfg.default_model);
            } else {
                println!(
                    "  ✗ '{}' configured but ${} is not set",
                    default,
                    provider_cfg.api_key_ref.to_uppercase()
                );
            }
        }
        None => println!("  ✗ default provider '{}' has no configuration", default),
    }

    println!();
    println!("Storage:");
    println!("  ℹ {}", config.storage.base_dir.display());

    println!();
    println!("Users: {} configured", config.auth.users.len());

    Ok(())
}

fn show_config(config: Option<&ShieldChatConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
