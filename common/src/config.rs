// common/src/config.rs
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Central configuration for the platform services
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub session_server_addr: String,
    /// Secret used to sign wallet-bound session tokens
    pub token_secret: String,

    pub anchor: AnchorConfig,
    pub sessions: SessionLimitsConfig,
}

/// How the service talks to the on-chain anchor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// "mock" until the gasless network endpoint is live, "rpc" otherwise
    pub mode: String,
    pub rpc_url: String,
    pub request_timeout_secs: u64,
}

/// Bounds applied to every session the service opens
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionLimitsConfig {
    /// Chains the gasless network currently serves
    pub supported_chains: Vec<u64>,
    pub max_duration_secs: u64,
    /// How often the registry sweeps for removable sessions
    pub cleanup_interval_secs: u64,
    /// How long settled or abandoned sessions are kept for audit reads
    pub retention_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_server_addr: "127.0.0.1:8081".to_string(),
            token_secret: "dev_secret".to_string(),

            anchor: AnchorConfig {
                mode: "mock".to_string(),
                rpc_url: "http://127.0.0.1:8545".to_string(),
                request_timeout_secs: 30,
            },
            sessions: SessionLimitsConfig {
                supported_chains: vec![1, 8453, 84532],
                max_duration_secs: 86400,
                cleanup_interval_secs: 3600,
                retention_secs: 86400,
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

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

        // Build configuration
        let config = ConfigFile::builder()
            // Start with defaults
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Build and deserialize
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from environment variables directly (backward compatibility)
    pub fn from_env() -> Self {
        // Try to load from file first
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Config::default();

                let session_server_addr = env::var("SESSION_SERVER_ADDR")
                    .unwrap_or(defaults.session_server_addr);

                let token_secret = env::var("TOKEN_SECRET").unwrap_or(defaults.token_secret);

                let anchor_mode = env::var("ANCHOR_MODE").unwrap_or(defaults.anchor.mode);

                let anchor_rpc_url = env::var("ANCHOR_RPC_URL").unwrap_or(defaults.anchor.rpc_url);

                let anchor_timeout = env::var("ANCHOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.anchor.request_timeout_secs);

                let supported_chains = env::var("SUPPORTED_CHAINS")
                    .ok()
                    .map(|v| {
                        v.split(',')
                            .filter_map(|part| part.trim().parse::<u64>().ok())
                            .collect::<Vec<u64>>()
                    })
                    .filter(|chains| !chains.is_empty())
                    .unwrap_or(defaults.sessions.supported_chains);

                let max_duration = env::var("SESSION_MAX_DURATION_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.sessions.max_duration_secs);

                let cleanup_interval = env::var("SESSION_CLEANUP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.sessions.cleanup_interval_secs);

                let retention = env::var("SESSION_RETENTION_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.sessions.retention_secs);

                Self {
                    session_server_addr,
                    token_secret,
                    anchor: AnchorConfig {
                        mode: anchor_mode,
                        rpc_url: anchor_rpc_url,
                        request_timeout_secs: anchor_timeout,
                    },
                    sessions: SessionLimitsConfig {
                        supported_chains,
                        max_duration_secs: max_duration,
                        cleanup_interval_secs: cleanup_interval,
                        retention_secs: retention,
                    },
                }
            }
        }
    }

    /// Whether the gasless network serves the given chain
    pub fn is_chain_supported(&self, chain_id: u64) -> bool {
        self.sessions.supported_chains.contains(&chain_id)
    }
}
