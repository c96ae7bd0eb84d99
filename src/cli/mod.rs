pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "entity-crud-api")]
#[command(about = "Filtered, paginated CRUD API over PostgreSQL tables")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Create tables for every registered entity")]
    Migrate,

    #[command(about = "Mint a bearer token for local testing")]
    Token {
        #[arg(long, help = "User id placed in the token")]
        user: i64,
        #[arg(long, default_value = "device", help = "Platform: device or client")]
        platform: String,
        #[arg(long, default_value_t = crate::auth::user_types::USER, help = "User type")]
        user_type: i64,
        #[arg(long, default_value = "developer", help = "Username placed in the token")]
        username: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Token {
            user,
            platform,
            user_type,
            username,
        } => commands::token::handle(user, &platform, user_type, &username, output_format),
    }
}
