// src/cli/mod.rs - CLI definition (clap derive)

pub mod chat;
pub mod prefs;
pub mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "caigentan", about = "Campus food assistant", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session
    Chat {
        /// Chat backend base URL (overrides [chat].backend_url)
        #[arg(long)]
        backend: Option<String>,
        /// Talk to the LLM provider directly instead of the backend
        #[arg(long)]
        direct: bool,
    },
    /// Edit, stage and upload dining preferences
    Prefs(PrefsArgs),
    /// Run the chat backend server
    Serve {
        /// Port to listen on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct PrefsArgs {
    /// Price slider range as MIN-MAX, each 0-100 (e.g. 10-60)
    #[arg(long)]
    pub price: Option<String>,

    /// Criterion score as KEY=VALUE (e.g. spiciness=4); repeatable
    #[arg(long = "rating", value_name = "KEY=VALUE")]
    pub ratings: Vec<String>,

    #[arg(long)]
    pub allergies: Option<String>,

    #[arg(long)]
    pub likes: Option<String>,

    #[arg(long)]
    pub dislikes: Option<String>,

    /// Print the record after applying changes
    #[arg(long)]
    pub show: bool,

    /// Upload the record to the chat backend
    #[arg(long)]
    pub upload: bool,

    /// Chat backend base URL for --upload
    #[arg(long)]
    pub backend: Option<String>,
}

impl Commands {
    /// Default log level when neither RUST_LOG nor CAIGENTAN_LOG is set.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "info",
            _ => "warn",
        }
    }
}
