//! Subcommand implementations.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use saferoute_core::{
    AppConfig, AuthSession, CredentialKey, IdentityProvider, Method, RequestOptions, bootstrap,
};
use tracing::debug;

pub struct RequestArgs {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<String>,
    pub headers: Vec<String>,
    pub skip_auth: bool,
    pub timeout: Option<u64>,
}

async fn connect(config: &AppConfig) -> Result<AuthSession> {
    bootstrap::connect(config)
        .await
        .context("Failed to initialize SafeRoute client")
}

/// Split a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Invalid header {:?}, expected \"Name: value\"", raw))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header {:?}, name is empty", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn build_options(args: &RequestArgs) -> Result<RequestOptions> {
    let mut options = RequestOptions::new(args.method);

    if let Some(body) = &args.body {
        let value: serde_json::Value =
            serde_json::from_str(body).context("Request body is not valid JSON")?;
        options = options.json(&value)?;
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        options = options.header(name, value);
    }
    if args.skip_auth {
        options = options.skip_auth();
    }
    if let Some(secs) = args.timeout {
        if secs == 0 {
            bail!("Timeout must be at least one second");
        }
        options = options.timeout(Duration::from_secs(secs));
    }

    Ok(options)
}

pub async fn request(config: &AppConfig, args: RequestArgs) -> Result<()> {
    let options = build_options(&args)?;
    let session = connect(config).await?;

    let response = session.api().request(&args.endpoint, options).await?;
    let status = response.status();
    let text = response.text().await.context("Failed to read response body")?;
    debug!(status = status.as_u16(), bytes = text.len(), "Response received");

    // Pretty-print JSON, pass anything else through
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if text.is_empty() => println!("{}", status),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub async fn login(config: &AppConfig, email: Option<String>) -> Result<()> {
    let session = connect(config).await?;

    if let Some(profile) = session.restore().await {
        println!("Already logged in as {}", profile.display_name());
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.trim().is_empty() {
        bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    println!("Logging in...");
    let profile = session.login_with_password(&email, &password).await?;
    println!("Logged in as {}", profile.display_name());
    Ok(())
}

pub fn authorize_url(config: &AppConfig, signup: bool) -> Result<()> {
    let provider = IdentityProvider::init(&config.identity);
    let client = provider.client()?;
    let url = client.authorize_url(&client.authorize_request(signup))?;
    println!("{}", url);
    Ok(())
}

pub async fn logout(config: &AppConfig) -> Result<()> {
    let session = connect(config).await?;
    session.logout().await;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(config: &AppConfig) -> Result<()> {
    let session = connect(config).await?;
    match session.restore().await {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("Not logged in"),
    }
    Ok(())
}

pub async fn device_id(config: &AppConfig) -> Result<()> {
    let session = connect(config).await?;
    if session.credentials().get(CredentialKey::DeviceId).await.is_none() {
        debug!("No stored device identifier, one will be generated");
    }
    println!("{}", session.api().device().get_or_create().await);
    Ok(())
}

pub fn show_config(config: &AppConfig) -> Result<()> {
    println!("Config file:  {}", config.config_path.display());
    println!("Platform:     {}", config.platform);
    println!("API URL:      {}", config.api.base_url());
    println!("Timeout:      {}s", config.api.request_timeout().as_secs());
    println!("Storage:      {}", config.storage);
    println!("Data dir:     {}", config.data_dir.display());
    match config.identity.missing_setting() {
        None => {
            println!("Identity:     {}", config.identity.issuer_url());
            println!("Client ID:    {}", config.identity.client_id);
            println!("Audience:     {}", config.identity.audience());
        }
        Some(reason) => println!("Identity:     unavailable ({})", reason),
    }
    Ok(())
}
