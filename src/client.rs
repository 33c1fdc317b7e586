// Data access seam
//
// Views never reach for a global client: whatever implements DataClient is
// built once at startup and handed to each loader.

use crate::error::LoadError;
use crate::query::{QueryRequest, QueryResponse, TableQuery, DB_QUERY_FUNCTION};
use crate::record::Record;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const NO_CONNECTION_MESSAGE: &str = "No active database connection found";

/// Read-only access to backend collections.
pub trait DataClient: Send + Sync {
    fn execute(&self, request: &QueryRequest) -> QueryResponse;

    /// Backend label for logs.
    fn backend(&self) -> &'static str;
}

impl<T: DataClient + ?Sized> DataClient for Arc<T> {
    fn execute(&self, request: &QueryRequest) -> QueryResponse {
        (**self).execute(request)
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

// ============================================================================
// IN-MEMORY CLIENT
// ============================================================================

/// Client over records held in memory.
///
/// Understands table selects fully and `db-query` invocations of the form
/// `SELECT * FROM <table> [ORDER BY <column> [ASC|DESC]]`. A failure can be
/// injected to exercise error paths; every call is counted.
#[derive(Default)]
pub struct MemoryClient {
    collections: HashMap<String, Vec<Record>>,
    connections: Vec<String>,
    failure: Mutex<Option<LoadError>>,
    calls: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: &str, records: Vec<Record>) -> Self {
        self.collections.insert(name.to_string(), records);
        self
    }

    pub fn with_connection(mut self, connection_id: &str) -> Self {
        self.connections.push(connection_id.to_string());
        self
    }

    /// Every following call fails with `error` until cleared.
    pub fn fail_with(&self, error: LoadError) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = Some(error);
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = None;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn select(&self, query: &TableQuery) -> QueryResponse {
        let Some(rows) = self.collections.get(&query.table) else {
            return QueryResponse::failed(LoadError::UnknownCollection(query.table.clone()));
        };

        let mut matched: Vec<&Record> = rows
            .iter()
            .filter(|r| query.constraints.iter().all(|c| c.matches(r)))
            .collect();

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        let total = matched.len() as u64;
        let window: Vec<&Record> = match query.range {
            Some(range) => matched.into_iter().skip(range.offset).take(range.limit).collect(),
            None => matched,
        };

        let data: Vec<Value> = window
            .into_iter()
            .map(|record| project(record, &query.columns).into_value())
            .collect();

        QueryResponse::ok(Value::Array(data)).with_count(total)
    }

    fn invoke(&self, name: &str, connection_id: Option<&str>, query: Option<&str>) -> QueryResponse {
        if name != DB_QUERY_FUNCTION {
            return QueryResponse::failed(LoadError::query(format!(
                "Function not found: {}",
                name
            )));
        }
        match connection_id {
            Some(id) if self.connections.iter().any(|c| c == id) => {}
            _ => return QueryResponse::failed(LoadError::missing(NO_CONNECTION_MESSAGE)),
        }
        let Some(sql) = query else {
            return QueryResponse::failed(LoadError::UnsupportedQuery("empty query".to_string()));
        };
        let Some(table_query) = parse_simple_select(sql) else {
            return QueryResponse::failed(LoadError::UnsupportedQuery(sql.to_string()));
        };

        // Functions answer with an envelope, like the remote db-query function.
        let response = self.select(&table_query);
        match response.data {
            Some(rows) if response.error.is_none() => {
                QueryResponse::ok(serde_json::json!({ "data": rows }))
            }
            _ => response,
        }
    }
}

impl DataClient for MemoryClient {
    fn execute(&self, request: &QueryRequest) -> QueryResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Ok(slot) = self.failure.lock() {
            if let Some(error) = slot.as_ref() {
                return QueryResponse::failed(error.clone());
            }
        }

        match request {
            QueryRequest::Select(query) => self.select(query),
            QueryRequest::Function { name, body } => {
                self.invoke(name, body.connection_id.as_deref(), body.query.as_deref())
            }
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

fn project(record: &Record, columns: &[String]) -> Record {
    if columns.is_empty() {
        return record.clone();
    }
    let mut projected = Record::new();
    for column in columns {
        projected.insert(column.clone(), record.get(column).cloned().unwrap_or(Value::Null));
    }
    projected
}

/// Total order used for sorting loaded rows: nulls first, then by type.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Less,
        (_, Value::Null) => CmpOrdering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Parse `SELECT * FROM <table> [ORDER BY <column> [ASC|DESC]]`.
pub fn parse_simple_select(sql: &str) -> Option<TableQuery> {
    let tokens: Vec<&str> = sql
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect();

    let upper: Vec<String> = tokens.iter().map(|t| t.to_uppercase()).collect();
    if upper.len() < 4 || upper[0] != "SELECT" || upper[1] != "*" || upper[2] != "FROM" {
        return None;
    }

    let mut query = TableQuery::from(tokens[3]);
    match upper.len() {
        4 => {}
        7 | 8 if upper[4] == "ORDER" && upper[5] == "BY" => {
            let ascending = match upper.get(7).map(String::as_str) {
                None | Some("ASC") => true,
                Some("DESC") => false,
                Some(_) => return None,
            };
            query = query.order(tokens[6], ascending);
        }
        _ => return None,
    }
    Some(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn currencies() -> Vec<Record> {
        vec![
            Record::new().with("id", "1").with("code", "USD").with("name", "US Dollar").with("is_active", true),
            Record::new().with("id", "2").with("code", "EUR").with("name", "Euro").with("is_active", false),
            Record::new().with("id", "3").with("code", "JPY").with("name", "Japanese Yen").with("is_active", true),
        ]
    }

    fn client() -> MemoryClient {
        MemoryClient::new()
            .with_collection("currencies", currencies())
            .with_connection("conn-1")
    }

    #[test]
    fn test_select_orders_filters_and_windows() {
        let client = client();
        let request: QueryRequest = TableQuery::from("currencies")
            .select(&["code"])
            .eq("is_active", true)
            .order("name", false)
            .range(0, 1)
            .into();

        let fetched = client.execute(&request).into_result().unwrap();
        assert_eq!(fetched.count, Some(2));
        assert_eq!(fetched.records.len(), 1);
        assert_eq!(fetched.records[0].text("code"), Some("USD"));
        assert_eq!(fetched.records[0].len(), 1);
    }

    #[test]
    fn test_function_requires_known_connection() {
        let client = client();
        let err = client
            .execute(&QueryRequest::sql("other", "SELECT * FROM currencies"))
            .into_result()
            .unwrap_err();
        assert_eq!(err, LoadError::missing(NO_CONNECTION_MESSAGE));

        let fetched = client
            .execute(&QueryRequest::sql("conn-1", "SELECT * FROM currencies ORDER BY name ASC"))
            .into_result()
            .unwrap();
        let names: Vec<&str> = fetched.records.iter().filter_map(|r| r.text("name")).collect();
        assert_eq!(names, vec!["Euro", "Japanese Yen", "US Dollar"]);
    }

    #[test]
    fn test_injected_failure_and_call_count() {
        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        let response = client.execute(&TableQuery::from("currencies").into());
        assert_eq!(response.error, Some(LoadError::query("connection refused")));

        client.clear_failure();
        assert!(client.execute(&TableQuery::from("currencies").into()).error.is_none());
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn test_unknown_collection() {
        let response = client().execute(&TableQuery::from("widgets").into());
        assert_eq!(response.error, Some(LoadError::UnknownCollection("widgets".to_string())));
    }

    #[test]
    fn test_parse_simple_select() {
        let q = parse_simple_select("select * from ai_provider_configs order by created_at desc;").unwrap();
        assert_eq!(q.table, "ai_provider_configs");
        assert_eq!(q.order.map(|o| (o.column, o.ascending)), Some(("created_at".to_string(), false)));

        assert!(parse_simple_select("SELECT * FROM roles").is_some());
        assert!(parse_simple_select("SELECT id FROM roles").is_none());
        assert!(parse_simple_select("DELETE FROM roles").is_none());
        assert!(parse_simple_select("SELECT * FROM roles ORDER BY").is_none());
    }

    #[test]
    fn test_compare_values_puts_nulls_first() {
        assert_eq!(compare_values(None, Some(&json!("a"))), CmpOrdering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), CmpOrdering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), CmpOrdering::Greater);
    }
}
