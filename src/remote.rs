// HTTP backend speaking the hosted REST + functions protocol
//
//   GET  {base}/rest/v1/{table}?select=..&order=..&offset=..&limit=..&col=eq.v
//   POST {base}/functions/v1/{name}
//
// Table selects ask for an exact count and read it from Content-Range.

use crate::client::DataClient;
use crate::error::{LoadError, LoadResult};
use crate::query::{Constraint, FunctionBody, QueryRequest, QueryResponse, TableQuery};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_RANGE;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated: no API key configured";

pub struct HttpClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> LoadResult<RequestBuilder> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LoadError::missing(NOT_AUTHENTICATED_MESSAGE))?;
        Ok(request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key)))
    }

    fn select(&self, query: &TableQuery) -> LoadResult<QueryResponse> {
        let url = select_url(&self.base_url, query);
        debug!(url = %url, "remote select");

        let request = self.authorized(self.http.get(&url))?.header("Prefer", "count=exact");
        let response = request.send().map_err(|e| LoadError::query(e.to_string()))?;
        let response = check_status(response)?;

        let count = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let data: Value = response
            .json()
            .map_err(|e| LoadError::shape(format!("Failed to parse response: {}", e)))?;

        let response = QueryResponse::ok(data);
        Ok(match count {
            Some(count) => response.with_count(count),
            None => response,
        })
    }

    fn invoke(&self, name: &str, body: &FunctionBody) -> LoadResult<QueryResponse> {
        let url = format!("{}/functions/v1/{}", self.base_url, urlencoding::encode(name));
        debug!(url = %url, "remote function");

        let request = self.authorized(self.http.post(&url))?.json(body);
        let response = request.send().map_err(|e| LoadError::query(e.to_string()))?;
        let response = check_status(response)?;
        let data: Value = response
            .json()
            .map_err(|e| LoadError::shape(format!("Failed to parse response: {}", e)))?;

        // Functions may report failure inside a 200 body.
        if let Some(message) = data.get("error").and_then(error_text) {
            return Err(LoadError::query(message));
        }
        Ok(QueryResponse::ok(data))
    }
}

impl DataClient for HttpClient {
    fn execute(&self, request: &QueryRequest) -> QueryResponse {
        let result = match request {
            QueryRequest::Select(query) => self.select(query),
            QueryRequest::Function { name, body } => self.invoke(name, body),
        };
        result.unwrap_or_else(QueryResponse::failed)
    }

    fn backend(&self) -> &'static str {
        "remote"
    }
}

/// Non-2xx answers become query errors carrying the backend's message when
/// the body has one.
fn check_status(response: Response) -> LoadResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Option<Value> = response.json().ok();
    let message = body
        .as_ref()
        .and_then(|b| b.get("message").or_else(|| b.get("error")))
        .and_then(error_text)
        .unwrap_or_else(|| format!("API returned error: {}", status));
    Err(LoadError::query(message))
}

fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("message").and_then(error_text),
        other => Some(other.to_string()),
    }
}

/// REST url for a table select.
pub fn select_url(base_url: &str, query: &TableQuery) -> String {
    let mut params = vec![format!("select={}", urlencoding::encode(&query.select_list()))];

    if let Some(order) = &query.order {
        params.push(format!(
            "order={}.{}",
            urlencoding::encode(&order.column),
            if order.ascending { "asc" } else { "desc" }
        ));
    }
    if let Some(range) = query.range {
        params.push(format!("offset={}", range.offset));
        params.push(format!("limit={}", range.limit));
    }
    for constraint in &query.constraints {
        let (column, filter) = match constraint {
            Constraint::Eq { column, value } => {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => "null".to_string(),
                    other => other.to_string(),
                };
                (column, format!("eq.{}", value))
            }
            Constraint::ILike { column, pattern } => (column, format!("ilike.*{}*", pattern)),
        };
        params.push(format!(
            "{}={}",
            urlencoding::encode(column),
            urlencoding::encode(&filter)
        ));
    }

    format!(
        "{}/rest/v1/{}?{}",
        base_url,
        urlencoding::encode(&query.table),
        params.join("&")
    )
}

/// Total from `Content-Range: 0-9/25` (or `*/0`); `None` when unknown.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}
