//! Databricks SQL warehouse engine.
//!
//! Uses the SQL Statement Execution REST API:
//! - `POST /api/2.0/sql/statements` with the statement, warehouse id,
//!   `INLINE` disposition and `JSON_ARRAY` format
//! - `GET /api/2.0/sql/statements/{id}` while the statement is still running
//! - `GET <next_chunk_internal_link>` for additional result chunks
//!
//! Polling is bounded; a statement that is still running after the last poll
//! is reported as an execution error.

use crate::config::WarehouseConfig;
use crate::error::{Result, TrendError};
use crate::execution::QueryExecutor;
use crate::frame::ResultFrame;
use crate::sql::Dialect;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";

pub struct DatabricksEngine {
    client: Client,
    base_url: String,
    warehouse_id: String,
    token: String,
    max_polls: u32,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    manifest: Option<Manifest>,
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    message: Option<String>,
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema: Option<ManifestSchema>,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResultChunk {
    data_array: Option<Vec<Vec<Value>>>,
    next_chunk_internal_link: Option<String>,
}

impl DatabricksEngine {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TrendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            warehouse_id: config.warehouse_id()?,
            token: config.access_token.clone(),
            max_polls: 30,
            poll_interval: Duration::from_secs(2),
        })
    }

    /// Submit and wait up to the server-side wait timeout.
    async fn submit(&self, sql: &str) -> Result<StatementResponse> {
        let body = serde_json::json!({
            "statement": sql,
            "warehouse_id": self.warehouse_id,
            "wait_timeout": "30s",
            "on_wait_timeout": "CONTINUE",
            "disposition": "INLINE",
            "format": "JSON_ARRAY",
        });

        let response = self
            .client
            .post(format!("{}{}", self.base_url, STATEMENTS_PATH))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrendError::Execution(format!("Failed to submit statement: {}", e)))?;

        self.parse(response).await
    }

    async fn poll(&self, statement_id: &str) -> Result<StatementResponse> {
        let response = self
            .client
            .get(format!("{}{}/{}", self.base_url, STATEMENTS_PATH, statement_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| TrendError::Execution(format!("Failed to poll statement: {}", e)))?;

        self.parse(response).await
    }

    async fn fetch_chunk(&self, link: &str) -> Result<ResultChunk> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, link))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| TrendError::Execution(format!("Failed to fetch result chunk: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TrendError::Execution(format!(
                "Result chunk fetch failed with status {}: {}",
                status, text
            )));
        }
        Ok(response.json().await?)
    }

    async fn parse(&self, response: reqwest::Response) -> Result<StatementResponse> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TrendError::Execution(format!(
                "Statement API returned status {}: {}",
                status, text
            )));
        }
        Ok(response.json().await?)
    }

    async fn collect(&self, statement: StatementResponse) -> Result<ResultFrame> {
        let columns: Vec<String> = statement
            .manifest
            .and_then(|m| m.schema)
            .map(|s| s.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();

        let mut rows = Vec::new();
        let mut next = None;
        if let Some(chunk) = statement.result {
            rows.extend(chunk.data_array.unwrap_or_default());
            next = chunk.next_chunk_internal_link;
        }
        while let Some(link) = next {
            let chunk = self.fetch_chunk(&link).await?;
            rows.extend(chunk.data_array.unwrap_or_default());
            next = chunk.next_chunk_internal_link;
        }

        ResultFrame::new(columns, rows)
    }
}

fn statement_failure(status: &StatementStatus) -> TrendError {
    let (message, code) = status
        .error
        .as_ref()
        .map(|e| (e.message.clone(), e.error_code.clone()))
        .unwrap_or((None, None));
    TrendError::Execution(format!(
        "Statement {}: {} (code: {})",
        status.state.to_lowercase(),
        message.unwrap_or_else(|| "no message".to_string()),
        code.unwrap_or_else(|| "unknown".to_string())
    ))
}

#[async_trait]
impl QueryExecutor for DatabricksEngine {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Databricks
    }

    async fn execute(&self, sql: &str) -> Result<ResultFrame> {
        let started = Instant::now();
        debug!("databricks: {}", sql.trim());

        let mut statement = self.submit(sql).await?;
        let mut polls = 0;
        loop {
            match statement.status.state.as_str() {
                "SUCCEEDED" => break,
                "PENDING" | "RUNNING" => {
                    if polls >= self.max_polls {
                        warn!(
                            "Statement {} still {} after {} polls",
                            statement.statement_id, statement.status.state, polls
                        );
                        return Err(TrendError::Execution(format!(
                            "Statement {} did not finish in time",
                            statement.statement_id
                        )));
                    }
                    polls += 1;
                    tokio::time::sleep(self.poll_interval).await;
                    statement = self.poll(&statement.statement_id).await?;
                }
                _ => return Err(statement_failure(&statement.status)),
            }
        }

        let frame = self.collect(statement).await?;
        info!(
            "databricks returned {} rows in {}ms",
            frame.row_count(),
            started.elapsed().as_millis()
        );
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_response_parses() {
        let body = r#"{
            "statement_id": "01ef",
            "status": {"state": "SUCCEEDED"},
            "manifest": {"schema": {"column_count": 2, "columns": [
                {"name": "hashtag", "type_name": "STRING", "position": 0},
                {"name": "view_count", "type_name": "LONG", "position": 1}
            ]}},
            "result": {"chunk_index": 0, "row_count": 1, "data_array": [["food", "42"]]}
        }"#;
        let parsed: StatementResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status.state, "SUCCEEDED");
        let columns: Vec<String> = parsed
            .manifest
            .unwrap()
            .schema
            .unwrap()
            .columns
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(columns, vec!["hashtag", "view_count"]);
        assert_eq!(parsed.result.unwrap().data_array.unwrap()[0][1], "42");
    }

    #[test]
    fn test_failure_message() {
        let status: StatementStatus = serde_json::from_str(
            r#"{"state": "FAILED", "error": {"message": "Table not found", "error_code": "BAD_REQUEST"}}"#,
        )
        .unwrap();
        let err = statement_failure(&status).to_string();
        assert!(err.contains("failed"));
        assert!(err.contains("Table not found"));
        assert!(err.contains("BAD_REQUEST"));
    }

    #[test]
    fn test_new_requires_warehouse_id() {
        let config = WarehouseConfig {
            server_hostname: "adb-1.azuredatabricks.net".to_string(),
            http_path: String::new(),
            access_token: "token".to_string(),
        };
        assert!(DatabricksEngine::new(&config).is_err());
    }
}
