use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Pitstop presence and messaging server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "pitstop-server", version, about = "Pitstop presence and messaging server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PITSTOP_PORT", default_value = "5001")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PITSTOP_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./pitstop.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PITSTOP_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "PITSTOP_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Also write an offline status record when a connection drops without
    /// an explicit sign-out. Off by default: only explicit sign-out persists
    /// offline, so brief network drops do not flap the stored status.
    #[arg(long, env = "PITSTOP_PERSIST_OFFLINE_ON_ABRUPT_DISCONNECT")]
    pub persist_offline_on_abrupt_disconnect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5001,
            bind_address: "0.0.0.0".to_string(),
            config: "./pitstop.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            persist_offline_on_abrupt_disconnect: false,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PITSTOP_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PITSTOP_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Pitstop Server Configuration
# Place this file at ./pitstop.toml or specify with --config <path>
# All settings can be overridden via environment variables (PITSTOP_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5001)
# port = 5001

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# Persist an offline status record when a connection drops without an
# explicit sign-out. Default: false — only explicit sign-out persists
# offline. Enabling this keeps the stored status in step with the live
# registry after crashes, at the cost of status flapping on brief
# reconnects.
# persist_offline_on_abrupt_disconnect = false
"#
    .to_string()
}
