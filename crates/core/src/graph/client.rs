//! HTTP client for the property-graph store.
//!
//! Talks to the store's transaction-commit endpoint
//! (`POST {uri}/db/{database}/tx/commit`) with basic auth. Each call opens
//! and commits a single read transaction; the client holds no session state
//! and is safe to share across concurrent requests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{templates, GraphStore};
use crate::errors::GraphError;
use crate::models::{Commit, Row, Value};
use crate::plan::GraphQuery;

/// Asynchronous client for the graph store's HTTP query endpoint.
#[derive(Clone)]
pub struct HttpGraphClient {
    http: reqwest::Client,
    tx_url: String,
    username: String,
    password: String,
}

impl HttpGraphClient {
    /// Create a client for `uri` (e.g. `http://localhost:7474`) targeting
    /// the named database.
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let uri = uri.into().trim_end_matches('/').to_string();
        let tx_url = format!("{}/db/{}/tx/commit", uri, database.into());

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");

        let client = Self {
            http,
            tx_url,
            username: username.into(),
            password: password.into(),
        };
        debug!(url = %client.tx_url, "created HttpGraphClient");
        client
    }

    async fn execute(&self, query: &GraphQuery) -> Result<Vec<Row>, GraphError> {
        let body = serde_json::json!({
            "statements": [{
                "statement": query.statement,
                "parameters": query.parameters,
            }]
        });

        let response = self
            .http
            .post(&self.tx_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GraphError::Unavailable(format!(
                "authentication failed (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "graph endpoint returned error status");
            return Err(GraphError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        let envelope: TxResponse = response
            .json()
            .await
            .map_err(|e| GraphError::MalformedResponse(e.to_string()))?;
        rows_from_response(envelope)
    }
}

#[async_trait]
impl GraphStore for HttpGraphClient {
    #[instrument(skip(self, query), fields(url = %self.tx_url))]
    async fn read(&self, query: &GraphQuery) -> Result<Vec<Row>, GraphError> {
        let rows = self.execute(query).await?;
        debug!(rows = rows.len(), "graph read completed");
        Ok(rows)
    }

    #[instrument(skip(self, ids), fields(batch = ids.len()))]
    async fn parents_of(
        &self,
        ids: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, GraphError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let rows = self.execute(&templates::parents_of(ids)).await?;

        let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in &rows {
            let child = row.get_str("child").ok_or_else(|| {
                GraphError::MalformedResponse("parents_of row missing 'child'".into())
            })?;
            let parent = row.get_str("parent").ok_or_else(|| {
                GraphError::MalformedResponse("parents_of row missing 'parent'".into())
            })?;
            adjacency
                .entry(child.to_string())
                .or_default()
                .push(parent.to_string());
        }
        // The template orders rows, but traversal determinism is this
        // method's contract, not the store's.
        for parents in adjacency.values_mut() {
            parents.sort();
            parents.dedup();
        }
        Ok(adjacency)
    }

    #[instrument(skip(self))]
    async fn head_commit(&self, branch: &str) -> Result<Option<Commit>, GraphError> {
        let rows = self.execute(&templates::head_of_branch(branch)).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let id = row.get_str("id").ok_or_else(|| {
            GraphError::MalformedResponse("head_commit row missing 'id'".into())
        })?;
        let message = row.get_str("message").unwrap_or_default();
        let timestamp = row
            .get("timestamp")
            .and_then(parse_timestamp)
            .ok_or_else(|| {
                GraphError::MalformedResponse(format!(
                    "commit '{}' has an unparseable timestamp",
                    id
                ))
            })?;
        Ok(Some(Commit {
            id: id.to_string(),
            message: message.to_string(),
            timestamp,
        }))
    }
}

/// Parse a commit timestamp field: RFC 3339 text or epoch seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0),
        Value::Float(secs) => DateTime::from_timestamp(*secs as i64, 0),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxDatum>,
}

#[derive(Debug, Deserialize)]
struct TxDatum {
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Turn a transaction-endpoint envelope into rows, surfacing store-side
/// errors as `QueryRejected`.
fn rows_from_response(envelope: TxResponse) -> Result<Vec<Row>, GraphError> {
    if let Some(err) = envelope.errors.into_iter().next() {
        return Err(GraphError::QueryRejected {
            code: err.code,
            message: err.message,
        });
    }
    let Some(result) = envelope.results.into_iter().next() else {
        return Err(GraphError::MalformedResponse(
            "response carried neither results nor errors".into(),
        ));
    };

    let mut rows = Vec::with_capacity(result.data.len());
    for datum in result.data {
        if datum.row.len() != result.columns.len() {
            return Err(GraphError::MalformedResponse(format!(
                "row has {} values for {} columns",
                datum.row.len(),
                result.columns.len()
            )));
        }
        let mut row = Row::new();
        for (column, value) in result.columns.iter().zip(datum.row) {
            row.insert(column.clone(), Value::from(value));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: serde_json::Value) -> TxResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_rows_from_response() {
        let rows = rows_from_response(envelope(serde_json::json!({
            "results": [{
                "columns": ["source_id", "target_id", "merge_base_id"],
                "data": [
                    {"row": ["c7", "c9", null]},
                    {"row": ["c7", "c9", "c2"]}
                ]
            }],
            "errors": []
        })))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_str("source_id"), Some("c7"));
        assert!(rows[0].get("merge_base_id").unwrap().is_null());
        assert_eq!(rows[1].get_str("merge_base_id"), Some("c2"));
    }

    #[test]
    fn test_store_errors_become_query_rejected() {
        let err = rows_from_response(envelope(serde_json::json!({
            "results": [],
            "errors": [{
                "code": "Neo.ClientError.Statement.SyntaxError",
                "message": "Invalid input 'RETRN'"
            }]
        })))
        .unwrap_err();

        assert!(matches!(err, GraphError::QueryRejected { ref code, .. }
            if code == "Neo.ClientError.Statement.SyntaxError"));
    }

    #[test]
    fn test_column_row_length_mismatch_is_malformed() {
        let err = rows_from_response(envelope(serde_json::json!({
            "results": [{"columns": ["a", "b"], "data": [{"row": ["only-one"]}]}],
            "errors": []
        })))
        .unwrap_err();
        assert!(matches!(err, GraphError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let dt = parse_timestamp(&Value::String("2024-03-01T12:00:00Z".into())).unwrap();
        assert_eq!(dt.timestamp(), 1709294400);
        assert!(parse_timestamp(&Value::Int(1709294400)).is_some());
        assert!(parse_timestamp(&Value::String("yesterday".into())).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }
}
