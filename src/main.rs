// src/main.rs - Caigentan entry point

use clap::Parser;

use caigentan::cli::{Cli, Commands};
use caigentan::infra::config::Config;
use caigentan::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging (respects RUST_LOG / CAIGENTAN_LOG)
    logger::init_logging(cli.command.default_log_level());

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load config (falls back to defaults if no config.toml)
    let config = match cli.config {
        Some(ref path) => {
            let mut config = Config::load_from(std::path::Path::new(path))?;
            config.apply_env_overrides();
            config
        }
        None => Config::load()?,
    };

    match cli.command {
        Commands::Chat { backend, direct } => {
            caigentan::cli::chat::run_chat(&config, backend, direct).await
        }
        Commands::Prefs(args) => caigentan::cli::prefs::run_prefs(args, &config).await,
        Commands::Serve { port } => caigentan::cli::serve::run_serve(&config, port).await,
    }
}
