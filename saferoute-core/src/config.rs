//! Application configuration.
//!
//! Configuration is resolved once at startup into an [`AppConfig`] and then
//! passed by reference to the components that need it. Sources, later ones
//! winning:
//!
//! 1. Built-in defaults (including per-platform development base URLs)
//! 2. `config.toml` in the platform config directory
//! 3. Environment variables (`SAFEROUTE_*`)
//!
//! # Example file
//!
//! ```toml
//! platform = "android"
//!
//! [api]
//! base_url = "https://api.saferoute.app"
//! timeout_secs = 20
//!
//! [storage]
//! backend = "keyring"
//!
//! [identity]
//! domain = "saferouteapp.eu.auth0.com"
//! client_id = "abc123"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::store::StoreBackend;

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Database connection used for the password grant.
pub const DEFAULT_REALM: &str = "Username-Password-Authentication";

/// Scopes requested on every login.
pub const DEFAULT_SCOPE: &str = "openid profile email offline_access";

/// Redirect URI registered for the hosted login page.
pub const DEFAULT_REDIRECT_URI: &str = "saferouteapp://auth/callback";

pub const ENV_API_URL: &str = "SAFEROUTE_API_URL";
pub const ENV_PLATFORM: &str = "SAFEROUTE_PLATFORM";
pub const ENV_STORAGE: &str = "SAFEROUTE_STORAGE";
pub const ENV_TIMEOUT_SECS: &str = "SAFEROUTE_REQUEST_TIMEOUT_SECS";
pub const ENV_AUTH0_DOMAIN: &str = "SAFEROUTE_AUTH0_DOMAIN";
pub const ENV_AUTH0_CLIENT_ID: &str = "SAFEROUTE_AUTH0_CLIENT_ID";
pub const ENV_AUTH0_AUDIENCE: &str = "SAFEROUTE_AUTH0_AUDIENCE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The API base URL is not an absolute http(s) URL.
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A setting has a value outside its domain.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Runtime target. Only used to pick development defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
    #[default]
    Desktop,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else {
            Platform::Desktop
        }
    }

    /// Local development API address.
    ///
    /// The Android emulator reaches the host loopback through `10.0.2.2`.
    /// These are not meant for production builds.
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Platform::Android => "http://10.0.2.2:20000",
            Platform::Ios | Platform::Web | Platform::Desktop => "http://localhost:20000",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
            Platform::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            "desktop" => Ok(Platform::Desktop),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Settings for the API dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
    request_timeout: Duration,
}

impl ApiConfig {
    /// Validate `base_url` and use the default timeout.
    ///
    /// Trailing slashes are trimmed so endpoint joining never doubles them.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
        let raw = base_url.as_ref().trim();
        let parsed = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: "base URL must not carry a query or fragment".to_string(),
            });
        }

        Ok(Self {
            base_url: raw.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Override the timeout applied to every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Identity provider (Auth0 tenant) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Tenant domain, e.g. `saferouteapp.eu.auth0.com`. A value that carries
    /// a scheme is used as the issuer URL verbatim.
    pub domain: String,
    pub client_id: String,
    /// API audience. Defaults to the tenant management API.
    pub audience: Option<String>,
    pub realm: String,
    pub scope: String,
    pub redirect_uri: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            client_id: String::new(),
            audience: None,
            realm: DEFAULT_REALM.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl IdentityConfig {
    pub fn new(domain: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Base URL of the tenant, without trailing slash.
    pub fn issuer_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }

    /// Audience sent with token requests.
    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| format!("{}/api/v2/", self.issuer_url()))
    }

    /// Why the provider cannot be used, if it cannot.
    pub fn missing_setting(&self) -> Option<&'static str> {
        if is_placeholder(&self.domain) {
            Some("identity domain is not configured")
        } else if is_placeholder(&self.client_id) {
            Some("identity client id is not configured")
        } else {
            None
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.starts_with("YOUR_")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    platform: Option<Platform>,
    log_level: Option<String>,
    api: ApiSection,
    storage: StorageSection,
    identity: IdentityConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSection {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageSection {
    backend: Option<StoreBackend>,
    data_dir: Option<PathBuf>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub platform: Platform,
    pub api: ApiConfig,
    pub identity: IdentityConfig,
    pub storage: StoreBackend,
    /// Directory for the file credential store.
    pub data_dir: PathBuf,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// File the configuration was read from (may not exist).
    pub config_path: PathBuf,
}

impl AppConfig {
    /// Load from the default location and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(default_config_path(), |key| std::env::var(key).ok())
    }

    /// Load from `path`, reading environment overrides through `env`.
    ///
    /// A missing file is not an error.
    pub fn load_from_path(
        path: impl AsRef<Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            ConfigFile::default()
        };

        Self::resolve(file, path, env)
    }

    fn resolve(
        file: ConfigFile,
        config_path: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let platform = match env(ENV_PLATFORM) {
            Some(value) => value.parse::<Platform>().map_err(|message| ConfigError::InvalidValue {
                key: ENV_PLATFORM.to_string(),
                message,
            })?,
            None => file.platform.unwrap_or_else(Platform::current),
        };

        let storage = match env(ENV_STORAGE) {
            Some(value) => value.parse::<StoreBackend>().map_err(|message| ConfigError::InvalidValue {
                key: ENV_STORAGE.to_string(),
                message,
            })?,
            None => file.storage.backend.unwrap_or_default(),
        };

        let timeout_secs = match env(ENV_TIMEOUT_SECS) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: ENV_TIMEOUT_SECS.to_string(),
                    message: e.to_string(),
                })?,
            None => file.api.timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.timeout_secs".to_string(),
                message: "timeout must be at least one second".to_string(),
            });
        }

        let base_url = env(ENV_API_URL)
            .or(file.api.base_url)
            .unwrap_or_else(|| platform.default_api_url().to_string());
        let api = ApiConfig::new(base_url)?.with_timeout(Duration::from_secs(timeout_secs));

        let mut identity = file.identity;
        if let Some(domain) = env(ENV_AUTH0_DOMAIN) {
            identity.domain = domain;
        }
        if let Some(client_id) = env(ENV_AUTH0_CLIENT_ID) {
            identity.client_id = client_id;
        }
        if let Some(audience) = env(ENV_AUTH0_AUDIENCE) {
            identity.audience = Some(audience);
        }

        let data_dir = file.storage.data_dir.unwrap_or_else(default_data_dir);

        Ok(Self {
            platform,
            api,
            identity,
            storage,
            data_dir,
            log_level: file.log_level.unwrap_or_else(|| "info".to_string()),
            config_path,
        })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("app", "saferoute", "saferoute")
}

/// `<config dir>/config.toml`, or `./saferoute.toml` without a home directory.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("saferoute.toml"))
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".saferoute"))
}
