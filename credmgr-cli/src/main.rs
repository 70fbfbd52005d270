//! credmgr CLI
//!
//! Command-line interface for inspecting and editing a credential registry.
//!
//! # Usage
//!
//! ```bash
//! # Show the configured identity providers
//! credmgr providers
//!
//! # Store an OAuth2 credential (enriched by the provider, then saved)
//! credmgr add twitch <access-token> --scopes chat:read,chat:edit
//!
//! # Find OAuth2 credentials holding a scope
//! credmgr find --provider twitch --scopes chat:read
//!
//! # Which credential belongs to a user id
//! credmgr whois 12345
//! ```

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credmgr_core::{CredentialManagerBuilder, OAuth2Filter};
use tracing_subscriber::{fmt, EnvFilter};

use crate::commands::{parse_scopes, NewCredential};

#[derive(Parser)]
#[command(name = "credmgr")]
#[command(about = "Credential registry for third-party identity providers")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered identity providers
    Providers,

    /// List stored credentials
    List {
        /// Filter by identity provider (exact match)
        #[arg(short, long)]
        provider: Option<String>,

        /// Filter by user id (exact match)
        #[arg(short, long)]
        user_id: Option<String>,
    },

    /// Add an OAuth2 credential and save the registry
    Add {
        /// Identity provider name
        provider: String,

        /// Access token
        access_token: String,

        /// Refresh token
        #[arg(long)]
        refresh_token: Option<String>,

        /// Granted scopes (comma-separated)
        #[arg(short, long)]
        scopes: Option<String>,

        /// User id, if known
        #[arg(long)]
        user_id: Option<String>,

        /// User name, if known
        #[arg(long)]
        user_name: Option<String>,
    },

    /// Find OAuth2 credentials matching every given criterion
    Find {
        #[arg(short, long)]
        provider: Option<String>,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        user_name: Option<String>,

        /// Match on an exact access token value
        #[arg(long)]
        access_token: Option<String>,

        /// Required scopes (comma-separated)
        #[arg(short, long)]
        scopes: Option<String>,
    },

    /// Show the OAuth2 credential owned by a user id (case-insensitive)
    Whois {
        user_id: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let manager = CredentialManagerBuilder::from_config_file(cli.config.as_deref())
        .context("Failed to load configuration")?
        .build()
        .await
        .context("Failed to open credential registry")?;

    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Providers => commands::list_providers(&manager, &mut out),
        Commands::List { provider, user_id } => {
            commands::list_credentials(&manager, provider.as_deref(), user_id.as_deref(), &mut out)
                .await
        }
        Commands::Add {
            provider,
            access_token,
            refresh_token,
            scopes,
            user_id,
            user_name,
        } => {
            let new = NewCredential {
                access_token,
                refresh_token,
                user_id,
                user_name,
                scopes: parse_scopes(scopes.as_deref()),
            };
            commands::add_credential(&manager, &provider, new, &mut out).await
        }
        Commands::Find {
            provider,
            user_id,
            user_name,
            access_token,
            scopes,
        } => {
            let filter = OAuth2Filter {
                identity_provider: provider,
                user_id,
                access_token,
                refresh_token: None,
                user_name,
                scopes: scopes.map(|s| parse_scopes(Some(&s))),
            };
            commands::find_credentials(&manager, &filter, &mut out).await
        }
        Commands::Whois { user_id } => commands::whois(&manager, &user_id, &mut out).await,
    }
}
