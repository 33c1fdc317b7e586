// Query requests and responses exchanged with a DataClient
//
// Two request styles exist: a table select (`from(table).select(columns)`)
// and a named function invoked with a literal query string. Both come back
// as `{ data, error, count }` and callers check `error` first.

use crate::error::{LoadError, LoadResult};
use crate::record::{records_from_payload, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the query-execution function.
pub const DB_QUERY_FUNCTION: &str = "db-query";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub column: String,
    pub ascending: bool,
}

/// Offset/limit window of a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// `column = value`
    Eq { column: String, value: Value },
    /// Case-insensitive substring match on a text column.
    ILike { column: String, pattern: String },
}

impl Constraint {
    pub fn column(&self) -> &str {
        match self {
            Constraint::Eq { column, .. } | Constraint::ILike { column, .. } => column,
        }
    }

    /// Evaluate against an already loaded record (used by in-memory backends).
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Constraint::Eq { column, value } => match (record.get(column), value) {
                (Some(Value::Bool(b)), Value::Number(n)) | (Some(Value::Number(n)), Value::Bool(b)) => {
                    n.as_i64().map(|v| (v != 0) == *b).unwrap_or(false)
                }
                (Some(actual), expected) => actual == expected,
                (None, Value::Null) => true,
                (None, _) => false,
            },
            Constraint::ILike { column, pattern } => record
                .text(column)
                .map(|text| text.to_lowercase().contains(&pattern.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

/// Table-select request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    /// Empty means every column.
    pub columns: Vec<String>,
    pub order: Option<Ordering>,
    pub range: Option<Range>,
    pub constraints: Vec<Constraint>,
}

impl TableQuery {
    pub fn from(table: &str) -> Self {
        TableQuery {
            table: table.to_string(),
            columns: Vec::new(),
            order: None,
            range: None,
            constraints: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Ordering {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.constraints.push(Constraint::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.constraints.push(Constraint::ILike {
            column: column.to_string(),
            pattern: pattern.to_string(),
        });
        self
    }

    /// Comma-separated column list, `*` when empty.
    pub fn select_list(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        }
    }
}

/// Body of a function invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionBody {
    #[serde(rename = "connectionId", skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryRequest {
    Select(TableQuery),
    Function { name: String, body: FunctionBody },
}

impl QueryRequest {
    /// `db-query` invocation with a literal query string.
    pub fn sql(connection_id: &str, query: &str) -> Self {
        QueryRequest::Function {
            name: DB_QUERY_FUNCTION.to_string(),
            body: FunctionBody {
                connection_id: Some(connection_id.to_string()),
                query: Some(query.to_string()),
                select: None,
            },
        }
    }

    /// Table or function name, for logs and error messages.
    pub fn target(&self) -> &str {
        match self {
            QueryRequest::Select(q) => &q.table,
            QueryRequest::Function { name, .. } => name,
        }
    }

    /// Same request restricted to a window. Only selects can be windowed;
    /// function requests are returned unchanged.
    pub fn windowed(&self, range: Range) -> QueryRequest {
        match self {
            QueryRequest::Select(q) => {
                let mut q = q.clone();
                q.range = Some(range);
                QueryRequest::Select(q)
            }
            other => other.clone(),
        }
    }
}

impl From<TableQuery> for QueryRequest {
    fn from(query: TableQuery) -> Self {
        QueryRequest::Select(query)
    }
}

/// Raw `{ data, error, count }` answer from a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub data: Option<Value>,
    pub error: Option<LoadError>,
    /// Total matching rows when the backend reports it (ignores the range).
    pub count: Option<u64>,
}

/// Checked response: rows plus the optional server total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    pub records: Vec<Record>,
    pub count: Option<u64>,
}

impl QueryResponse {
    pub fn ok(data: Value) -> Self {
        QueryResponse {
            data: Some(data),
            error: None,
            count: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn failed(error: LoadError) -> Self {
        QueryResponse {
            data: None,
            error: Some(error),
            count: None,
        }
    }

    pub fn from_result(result: LoadResult<Value>) -> Self {
        match result {
            Ok(data) => QueryResponse::ok(data),
            Err(e) => QueryResponse::failed(e),
        }
    }

    /// Error wins over data; data is then shape-checked.
    pub fn into_result(self) -> LoadResult<Fetched> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let records = records_from_payload(self.data.unwrap_or(Value::Null))?;
        Ok(Fetched {
            records,
            count: self.count,
        })
    }
}
