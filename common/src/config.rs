// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the portal and the canister client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub web_server_addr: String,
    /// Externally reachable base URL, used to build the login callback
    pub public_url: String,

    // Replica and canister addressing
    pub icp_node_endpoint: String,
    pub vts_canister_id: String,
    pub identity_provider_endpoint: String,
    /// Local replicas are not signed by the IC root key
    pub fetch_root_key: bool,

    /// Browser session TTL in seconds
    pub session_ttl_secs: i64,

    pub auth: AuthConfig,
    pub client: ClientConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret for signing login state tokens
    pub state_secret: String,
    pub login_timeout_secs: u64,
    pub identity_ttl_secs: i64,
    /// Logins allowed to wait for a callback at the same time
    pub max_pending_logins: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Extra attempts for read-only calls after a transport failure
    pub query_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    pub path: String,
    pub index: String,
    pub enable_compression: bool,
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_age: u32,
    pub immutable: bool,
    pub must_revalidate: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            state_secret: DEV_STATE_SECRET.to_string(),
            login_timeout_secs: 300,
            // Same lifetime the identity provider grants a delegation by default
            identity_ttl_secs: 8 * 3600,
            max_pending_logins: 10_000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            query_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            path: "./static".to_string(),
            index: "index.html".to_string(),
            enable_compression: true,
            cache: CacheConfig {
                max_age: 3600,
                immutable: false,
                must_revalidate: true,
            },
        }
    }
}

// Secret shipped in the defaults; only acceptable for plain-http development setups
const DEV_STATE_SECRET: &str = "dev_state_secret";

fn run_mode() -> String {
    env::var("RUN_MODE").unwrap_or_else(|_| "development".into())
}

/// Only local replicas need their root key fetched; mainnet's is built into the agent
fn fetch_root_key_for(run_mode: &str) -> bool {
    run_mode == "development"
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            public_url: "http://127.0.0.1:8081".to_string(),

            icp_node_endpoint: "http://127.0.0.1:7777".to_string(),
            vts_canister_id: "bkyz2-fmaaa-aaaaa-qaaaq-cai".to_string(),
            identity_provider_endpoint: "http://bd3sg-teaaa-aaaaa-qaaba-cai.localhost:7777".to_string(),
            fetch_root_key: fetch_root_key_for(&run_mode()),

            session_ttl_secs: 86400,

            auth: AuthConfig::default(),
            client: ClientConfig::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = run_mode();

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            // Start with defaults
            .add_source(ConfigFile::try_from(&Self::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "VTS"
            .add_source(Environment::with_prefix("VTS").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Self::default();

                let auth = AuthConfig {
                    state_secret: env::var("AUTH_STATE_SECRET")
                        .unwrap_or(defaults.auth.state_secret),
                    login_timeout_secs: env::var("AUTH_LOGIN_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(defaults.auth.login_timeout_secs),
                    ..defaults.auth
                };

                let static_files = StaticFilesConfig {
                    path: env::var("STATIC_FILES_PATH")
                        .unwrap_or(defaults.static_files.path),
                    ..defaults.static_files
                };

                Self {
                    web_server_addr: env::var("WEB_SERVER_ADDR")
                        .unwrap_or(defaults.web_server_addr),
                    public_url: env::var("PUBLIC_URL")
                        .unwrap_or(defaults.public_url),
                    icp_node_endpoint: env::var("ICP_NODE_ENDPOINT")
                        .unwrap_or(defaults.icp_node_endpoint),
                    vts_canister_id: env::var("VTS_CANISTER_ID")
                        .unwrap_or(defaults.vts_canister_id),
                    identity_provider_endpoint: env::var("INTERNET_IDENTITY_CANISTER_ENDPOINT")
                        .unwrap_or(defaults.identity_provider_endpoint),
                    fetch_root_key: env::var("FETCH_ROOT_KEY")
                        .map(|v| v.to_lowercase() == "true")
                        .unwrap_or(defaults.fetch_root_key),
                    session_ttl_secs: defaults.session_ttl_secs,
                    auth,
                    client: defaults.client,
                    static_files,
                }
            }
        }
    }

    /// Reject settings that are only safe on a development machine
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.public_url.starts_with("https://") && self.auth.state_secret == DEV_STATE_SECRET {
            return Err(config::ConfigError::Message(
                "auth.state_secret must be set for a public deployment".to_string(),
            ));
        }
        Ok(())
    }

    /// URL the identity provider sends the user agent back to
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.public_url.trim_end_matches('/'))
    }
}
