//! Table source backed by the Snowflake SQL REST API

use crate::error::SourceError;
use crate::sources::TableSource;
use crate::types::Row;
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const STATEMENTS_PATH: &str = "/api/v2/statements";
const STATEMENT_TIMEOUT_SECS: u64 = 60;
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_POLLS: usize = 120;

/// Connection settings for the SQL API
#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    pub account: String,
    /// Overrides `https://<account>.snowflakecomputing.com`
    pub base_url: Option<String>,
    pub token: String,
    /// `OAUTH` or `KEYPAIR_JWT`
    pub token_type: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: Option<String>,
}

/// Request body for statement submission
#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: String,
    timeout: u64,
    warehouse: &'a str,
    database: &'a str,
    schema: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    statement_handle: String,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartitionInfo {
    #[serde(default)]
    row_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

enum StatementState {
    Done(StatementResponse),
    Pending(String),
}

/// SQL API table source
pub struct SnowflakeSource {
    config: SnowflakeConfig,
    base_url: String,
    client: reqwest::Client,
}

impl SnowflakeSource {
    pub fn new(config: SnowflakeConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.snowflakecomputing.com", config.account))
            .trim_end_matches('/')
            .to_string();
        Self {
            config,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Fully qualified `SELECT *` for a table
    fn statement_for(&self, table: &str) -> String {
        format!(
            "SELECT * FROM {}.{}.{}",
            self.config.database, self.config.schema, table
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.config.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.config.token_type)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn submit(&self, statement: String) -> Result<StatementResponse, SourceError> {
        let request = StatementRequest {
            statement,
            timeout: STATEMENT_TIMEOUT_SECS,
            warehouse: &self.config.warehouse,
            database: &self.config.database,
            schema: &self.config.schema,
            role: self.config.role.as_deref(),
        };

        let url = format!("{}{}", self.base_url, STATEMENTS_PATH);
        let response = self
            .authorized(self.client.post(&url))
            .json(&request)
            .send()
            .await?;

        match read_state(response).await? {
            StatementState::Done(body) => Ok(body),
            StatementState::Pending(handle) => self.wait_for(&handle).await,
        }
    }

    /// Poll an asynchronously executing statement until it has a result
    async fn wait_for(&self, handle: &str) -> Result<StatementResponse, SourceError> {
        let url = self.statement_url(handle);
        for attempt in 0..MAX_POLLS {
            tokio::time::sleep(POLL_INTERVAL).await;
            debug!("Polling statement {} (attempt {})", handle, attempt + 1);
            let response = self.authorized(self.client.get(&url)).send().await?;
            if let StatementState::Done(body) = read_state(response).await? {
                return Ok(body);
            }
        }
        Err(SourceError::Query(format!(
            "statement {} still running after {} polls",
            handle, MAX_POLLS
        )))
    }

    fn statement_url(&self, handle: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            STATEMENTS_PATH,
            urlencoding::encode(handle)
        )
    }

    async fn fetch_partition(
        &self,
        handle: &str,
        partition: usize,
    ) -> Result<Vec<Vec<Option<String>>>, SourceError> {
        let url = format!("{}?partition={}", self.statement_url(handle), partition);
        let response = self.authorized(self.client.get(&url)).send().await?;
        match read_state(response).await? {
            StatementState::Done(body) => Ok(body.data),
            StatementState::Pending(_) => Err(SourceError::Decode(format!(
                "partition {} of {} not ready",
                partition, handle
            ))),
        }
    }
}

async fn read_state(response: reqwest::Response) -> Result<StatementState, SourceError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status == StatusCode::ACCEPTED {
        let body: StatementResponse = decode(&bytes)?;
        return Ok(StatementState::Pending(body.statement_handle));
    }
    if status.is_success() {
        return Ok(StatementState::Done(decode(&bytes)?));
    }

    let message = match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(ErrorBody {
            code: Some(code),
            message,
        }) => format!("{} ({})", message, code),
        Ok(ErrorBody { message, .. }) => message,
        Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
    };
    warn!("Snowflake returned {}: {}", status, message);
    Err(SourceError::Query(message))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, SourceError> {
    serde_json::from_slice(bytes).map_err(|e| SourceError::Decode(e.to_string()))
}

/// Turn positional string cells into named, typed JSON values
fn rows_from(columns: &[ColumnType], data: Vec<Vec<Option<String>>>) -> Vec<Row> {
    data.into_iter()
        .map(|cells| {
            columns
                .iter()
                .zip(cells)
                .map(|(col, cell)| (col.name.clone(), typed_value(col, cell)))
                .collect()
        })
        .collect()
}

fn typed_value(col: &ColumnType, cell: Option<String>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    let parsed = match col.kind.to_ascii_lowercase().as_str() {
        "fixed" if col.scale.unwrap_or(0) == 0 => text.parse::<i64>().ok().map(Value::from),
        "fixed" | "real" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        "boolean" => text.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    parsed.unwrap_or(Value::String(text))
}

#[async_trait]
impl TableSource for SnowflakeSource {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    async fn fetch_table(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        let statement = self.statement_for(table);
        info!("Running statement: {}", statement);

        let first = self.submit(statement).await?;
        let meta = first
            .result_set_meta_data
            .ok_or_else(|| SourceError::Decode("response has no resultSetMetaData".to_string()))?;

        let mut data = first.data;
        let partitions = meta.partition_info.len();
        if partitions > 1 {
            let expected: u64 = meta.partition_info.iter().filter_map(|p| p.row_count).sum();
            debug!(
                "Fetching {} more partitions ({} rows total)",
                partitions - 1,
                expected
            );
            let rest = try_join_all(
                (1..partitions).map(|i| self.fetch_partition(&first.statement_handle, i)),
            )
            .await?;
            data.extend(rest.into_iter().flatten());
        }

        let rows = rows_from(&meta.row_type, data);
        info!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }
}
