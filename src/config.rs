//! Server configuration from command line and environment

use crate::snowflake_client::SnowflakeConfig;
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Snowflake SQL REST API
    Snowflake,
    /// `<data-dir>/<table>.json` files
    Files,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "songlike-server", version, about = "Read-only table proxy and song recommender")]
pub struct ServerConfig {
    #[arg(long, env = "SONGLIKE_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(long, env = "SONGLIKE_PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "SONGLIKE_SOURCE", value_enum, default_value_t = SourceKind::Files)]
    pub source: SourceKind,

    #[arg(long, env = "SONGLIKE_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Tables `/get_data` may serve; repeat for more than one
    #[arg(long = "allowed-table", default_value = "spotify_songs")]
    pub allowed_tables: Vec<String>,

    /// Table the recommender catalog is loaded from at startup
    #[arg(long, env = "SONGLIKE_CATALOG_TABLE", default_value = "spotify_songs")]
    pub catalog_table: String,

    #[arg(long, env = "SNOWFLAKE_ACCOUNT")]
    pub snowflake_account: Option<String>,

    #[arg(long, env = "SNOWFLAKE_TOKEN", hide_env_values = true)]
    pub snowflake_token: Option<String>,

    #[arg(long, env = "SNOWFLAKE_TOKEN_TYPE", default_value = "OAUTH")]
    pub snowflake_token_type: String,

    #[arg(long, env = "SNOWFLAKE_WAREHOUSE", default_value = "MUSIC_WAREHOUSE")]
    pub snowflake_warehouse: String,

    #[arg(long, env = "SNOWFLAKE_DATABASE", default_value = "SPOTIFY_SNOWFLAKE")]
    pub snowflake_database: String,

    #[arg(long, env = "SNOWFLAKE_SCHEMA", default_value = "MUSIC_SCHEMA")]
    pub snowflake_schema: String,

    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub snowflake_role: Option<String>,

    #[arg(long, env = "SNOWFLAKE_BASE_URL")]
    pub snowflake_base_url: Option<String>,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.allowed_tables.is_empty() {
            bail!("at least one --allowed-table is required");
        }
        if self.source == SourceKind::Snowflake {
            if self.snowflake_account.as_deref().map_or(true, str::is_empty) {
                bail!("SNOWFLAKE_ACCOUNT is required for the snowflake source");
            }
            if self.snowflake_token.as_deref().map_or(true, str::is_empty) {
                bail!("SNOWFLAKE_TOKEN is required for the snowflake source");
            }
        }
        Ok(())
    }

    pub fn snowflake(&self) -> Option<SnowflakeConfig> {
        Some(SnowflakeConfig {
            account: self.snowflake_account.clone()?,
            base_url: self.snowflake_base_url.clone(),
            token: self.snowflake_token.clone()?,
            token_type: self.snowflake_token_type.clone(),
            warehouse: self.snowflake_warehouse.clone(),
            database: self.snowflake_database.clone(),
            schema: self.snowflake_schema.clone(),
            role: self.snowflake_role.clone(),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
