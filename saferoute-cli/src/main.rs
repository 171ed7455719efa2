//! SafeRoute CLI
//!
//! Command-line access to the SafeRoute backend using the same credential
//! store and device identity as the app.
//!
//! # Usage
//!
//! ```bash
//! # Log in with email and password (prompts for the password)
//! saferoute login --email jane@example.com
//!
//! # Call an endpoint with the stored token
//! saferoute request GET /v1/users/me
//!
//! # Send a JSON body
//! saferoute request POST users/update --body '{"name":"Jane"}'
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use saferoute_core::{AppConfig, Method, config::default_config_path};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "saferoute")]
#[command(about = "Authenticated access to the SafeRoute API")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request to the backend
    Request {
        /// HTTP method (GET, POST, PUT, DELETE)
        method: Method,

        /// Endpoint path, e.g. /v1/users/me
        endpoint: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Extra header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Send without the stored token and device id
        #[arg(long)]
        skip_auth: bool,

        /// Per-request timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Log in with email and password
    Login {
        /// Account email (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Print the hosted login page URL
    AuthorizeUrl {
        /// Open the sign-up tab instead of the login form
        #[arg(long)]
        signup: bool,
    },

    /// Remove stored tokens and profile
    Logout,

    /// Show the stored user profile
    Whoami,

    /// Show this install's device identifier
    DeviceId,

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    init_logging(cli.verbose, &config.log_level);

    match cli.command {
        Commands::Request {
            method,
            endpoint,
            body,
            headers,
            skip_auth,
            timeout,
        } => {
            let request = commands::RequestArgs {
                method,
                endpoint,
                body,
                headers,
                skip_auth,
                timeout,
            };
            commands::request(&config, request).await
        }
        Commands::Login { email } => commands::login(&config, email).await,
        Commands::AuthorizeUrl { signup } => commands::authorize_url(&config, signup),
        Commands::Logout => commands::logout(&config).await,
        Commands::Whoami => commands::whoami(&config).await,
        Commands::DeviceId => commands::device_id(&config).await,
        Commands::Config => commands::show_config(&config),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let path = path.unwrap_or_else(default_config_path);
    AppConfig::load_from_path(&path, |key| std::env::var(key).ok())
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// `RUST_LOG` wins; otherwise `--verbose` or the configured level.
fn init_logging(verbose: bool, default_level: &str) {
    let fallback = if verbose { "debug" } else { default_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
