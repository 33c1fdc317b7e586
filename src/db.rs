use crate::client::{DataClient, NO_CONNECTION_MESSAGE};
use crate::error::{LoadError, LoadResult};
use crate::query::{Constraint, QueryRequest, QueryResponse, TableQuery, DB_QUERY_FUNCTION};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Statement};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Collections created by `setup_database`, in seeding order.
pub const COLLECTIONS: [&str; 7] = [
    "currencies",
    "languages",
    "tenants",
    "roles",
    "users",
    "ai_provider_configs",
    "players",
];

/// SQLite-backed DataClient.
///
/// Answers table selects and `db-query` invocations for the connection ids it
/// was opened with. Every statement it runs is checked to be read-only.
pub struct SqliteClient {
    conn: Mutex<Connection>,
    connections: Vec<String>,
}

impl SqliteClient {
    pub fn open(db_path: &Path, connection_id: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        setup_database(&conn)?;
        info!(path = %db_path.display(), "sqlite backend opened");
        Ok(Self::from_connection(conn, vec![connection_id.to_string()]))
    }

    pub fn open_in_memory(connection_id: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn, vec![connection_id.to_string()]))
    }

    pub fn from_connection(conn: Connection, connections: Vec<String>) -> Self {
        SqliteClient {
            conn: Mutex::new(conn),
            connections,
        }
    }

    /// Run a closure against the underlying connection (seeding, tests).
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection poisoned"))?;
        f(&conn)
    }

    fn lock(&self) -> LoadResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LoadError::query("database connection poisoned"))
    }

    fn run_select(&self, query: &TableQuery) -> LoadResult<QueryResponse> {
        let conn = self.lock()?;
        let known = table_columns(&conn, &query.table)?;

        let check = |column: &str| -> LoadResult<()> {
            if known.iter().any(|c| c == column) {
                Ok(())
            } else {
                Err(LoadError::UnsupportedQuery(format!(
                    "unknown column {}.{}",
                    query.table, column
                )))
            }
        };

        for column in &query.columns {
            check(column)?;
        }
        for constraint in &query.constraints {
            check(constraint.column())?;
        }
        if let Some(order) = &query.order {
            check(&order.column)?;
        }

        let (where_sql, args) = where_clause(&query.constraints);
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            query
                .columns
                .iter()
                .map(|c| quote(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}{}", columns, quote(&query.table), where_sql);
        if let Some(order) = &query.order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                quote(&order.column),
                if order.ascending { "ASC" } else { "DESC" }
            ));
        }
        if let Some(range) = query.range {
            // SQLite integers are i64
            let cap = i64::MAX as usize;
            sql.push_str(&format!(" LIMIT {} OFFSET {}", range.limit.min(cap), range.offset.min(cap)));
        }

        debug!(table = %query.table, sql = %sql, "sqlite select");

        let mut stmt = conn.prepare(&sql)?;
        let rows = rows_to_json(&mut stmt, &args)?;

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", quote(&query.table), where_sql);
        let total: i64 = conn.query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))?;

        Ok(QueryResponse::ok(Value::Array(rows)).with_count(total.max(0) as u64))
    }

    fn run_function(&self, name: &str, connection_id: Option<&str>, sql: Option<&str>) -> LoadResult<Value> {
        if name != DB_QUERY_FUNCTION {
            return Err(LoadError::query(format!("Function not found: {}", name)));
        }
        match connection_id {
            Some(id) if self.connections.iter().any(|c| c == id) => {}
            _ => return Err(LoadError::missing(NO_CONNECTION_MESSAGE)),
        }
        let sql = sql
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoadError::UnsupportedQuery("empty query".to_string()))?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(LoadError::UnsupportedQuery(format!(
                "only read-only statements are allowed: {}",
                sql
            )));
        }

        debug!(sql = %sql, "sqlite db-query");
        let rows = rows_to_json(&mut stmt, &[])?;
        Ok(json!({ "data": rows }))
    }
}

impl DataClient for SqliteClient {
    fn execute(&self, request: &QueryRequest) -> QueryResponse {
        match request {
            QueryRequest::Select(query) => self.run_select(query).unwrap_or_else(QueryResponse::failed),
            QueryRequest::Function { name, body } => QueryResponse::from_result(self.run_function(
                name,
                body.connection_id.as_deref(),
                body.query.as_deref(),
            )),
        }
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn where_clause(constraints: &[Constraint]) -> (String, Vec<SqlValue>) {
    if constraints.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut parts = Vec::new();
    let mut args = Vec::new();
    for constraint in constraints {
        match constraint {
            Constraint::Eq { column, value } => {
                parts.push(format!("{} = ?", quote(column)));
                args.push(json_to_sql(value));
            }
            Constraint::ILike { column, pattern } => {
                parts.push(format!("LOWER({}) LIKE ? ESCAPE '\\'", quote(column)));
                let escaped = pattern
                    .to_lowercase()
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                args.push(SqlValue::Text(format!("%{}%", escaped)));
            }
        }
    }
    (format!(" WHERE {}", parts.join(" AND ")), args)
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Column names of a table; unknown tables are rejected.
fn table_columns(conn: &Connection, table: &str) -> LoadResult<Vec<String>> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(LoadError::UnknownCollection(table.to_string()));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Read every row of a prepared statement as a JSON object.
///
/// Declared column types drive the conversion: BOOLEAN columns become JSON
/// booleans, JSON columns are parsed.
fn rows_to_json(stmt: &mut Statement<'_>, args: &[SqlValue]) -> LoadResult<Vec<Value>> {
    let columns: Vec<(String, Option<String>)> = stmt
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.decl_type().map(|t| t.to_uppercase())))
        .collect();

    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = serde_json::Map::new();
        for (i, (name, decl)) in columns.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) if decl.as_deref() == Some("BOOLEAN") => Value::Bool(v != 0),
                ValueRef::Integer(v) => Value::from(v),
                ValueRef::Real(v) => Value::from(v),
                ValueRef::Text(bytes) => {
                    let text = String::from_utf8_lossy(bytes).into_owned();
                    if decl.as_deref() == Some("JSON") {
                        serde_json::from_str(&text).unwrap_or(Value::String(text))
                    } else {
                        Value::String(text)
                    }
                }
                ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
            };
            object.insert(name.clone(), value);
        }
        out.push(Value::Object(object));
    }
    Ok(out)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL only applies to file databases; in-memory ones report "memory".
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS currencies (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            symbol TEXT NOT NULL,
            decimal_places INTEGER NOT NULL DEFAULT 2,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS languages (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            native_name TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            domain TEXT,
            contact_email TEXT,
            description TEXT,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS roles (
            role_id TEXT PRIMARY KEY,
            role_name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            last_login_at TEXT,
            is_active BOOLEAN NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS ai_provider_configs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            provider_type TEXT NOT NULL,
            base_url TEXT NOT NULL,
            api_key_name TEXT NOT NULL,
            organization_id TEXT,
            model_name TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            created_by TEXT,
            logo_url TEXT,
            additional_params JSON
        );

        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tenants_created_at ON tenants(created_at);
        CREATE INDEX IF NOT EXISTS idx_ai_provider_configs_created_at ON ai_provider_configs(created_at);
        CREATE INDEX IF NOT EXISTS idx_players_created_at ON players(created_at);",
    )?;

    Ok(())
}

/// Number of rows in a known collection.
pub fn collection_count(conn: &Connection, collection: &str) -> Result<i64> {
    if !COLLECTIONS.contains(&collection) {
        anyhow::bail!("Unknown collection: {}", collection);
    }
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote(collection)),
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Fill the demo collections. With `force` existing rows are removed first;
/// otherwise non-empty collections are left alone. Returns rows inserted.
pub fn seed_demo_data(conn: &Connection, force: bool) -> Result<usize> {
    if force {
        for collection in COLLECTIONS {
            conn.execute(&format!("DELETE FROM {}", quote(collection)), [])?;
        }
    }

    let now = Utc::now();
    let stamp = |days_ago: i64| (now - Duration::days(days_ago)).to_rfc3339();
    let new_id = || uuid::Uuid::new_v4().to_string();
    let mut inserted = 0;

    if collection_count(conn, "currencies")? == 0 {
        let rows = [
            ("USD", "US Dollar", "$", 2, true),
            ("EUR", "Euro", "€", 2, true),
            ("GBP", "British Pound", "£", 2, true),
            ("JPY", "Japanese Yen", "¥", 0, true),
            ("MXN", "Mexican Peso", "$", 2, false),
        ];
        for (i, (code, name, symbol, places, active)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO currencies (id, code, name, symbol, decimal_places, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![new_id(), code, name, symbol, places, active, stamp(30 - i as i64)],
            )?;
            inserted += 1;
        }
    }

    if collection_count(conn, "languages")? == 0 {
        let rows = [
            ("en", "English", "English", true),
            ("es", "Spanish", "Español", true),
            ("fr", "French", "Français", true),
            ("ja", "Japanese", "日本語", true),
            ("de", "German", "Deutsch", false),
        ];
        for (i, (code, name, native, active)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO languages (id, code, name, native_name, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![new_id(), code, name, native, active, stamp(30 - i as i64)],
            )?;
            inserted += 1;
        }
    }

    if collection_count(conn, "tenants")? == 0 {
        let rows: [(&str, Option<&str>, Option<&str>, Option<&str>, bool); 4] = [
            ("Acme Corp", Some("acme.example"), Some("ops@acme.example"), Some("Primary production tenant"), true),
            ("Globex", Some("globex.example"), None, None, true),
            ("Initech", None, Some("admin@initech.example"), Some("Legacy tenant"), false),
            ("Umbrella", Some("umbrella.example"), Some("it@umbrella.example"), None, true),
        ];
        for (i, (name, domain, email, description, active)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO tenants (id, name, domain, contact_email, description, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![new_id(), name, domain, email, description, active, stamp(90 - 20 * i as i64)],
            )?;
            inserted += 1;
        }
    }

    if collection_count(conn, "roles")? == 0 {
        let rows: [(&str, Option<&str>); 4] = [
            ("admin", Some("Full access to every tenant")),
            ("editor", Some("Can change content")),
            ("viewer", None),
            ("billing", Some("Manages invoices and plans")),
        ];
        for (i, (name, description)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO roles (role_id, role_name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new_id(), name, description, stamp(120 - i as i64), stamp(10 - i as i64)],
            )?;
            inserted += 1;
        }
    }

    if collection_count(conn, "users")? == 0 {
        let rows: [(&str, &str, Option<i64>, bool); 4] = [
            ("Ada Lovelace", "ada@acme.example", Some(1), true),
            ("Grace Hopper", "grace@globex.example", Some(3), true),
            ("Alan Turing", "alan@initech.example", None, false),
            ("Edsger Dijkstra", "edsger@umbrella.example", Some(12), true),
        ];
        for (i, (name, email, last_login_days, active)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO users (id, full_name, email, created_at, last_login_at, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![new_id(), name, email, stamp(200 - 10 * i as i64), last_login_days.map(stamp), active],
            )?;
            inserted += 1;
        }
    }

    if collection_count(conn, "ai_provider_configs")? == 0 {
        let rows: [(&str, &str, &str, &str, Option<&str>, &str, bool, Value); 3] = [
            ("OpenAI", "openai", "https://api.openai.com/v1", "OPENAI_API_KEY", Some("org-demo"), "gpt-4o", true, json!({"temperature": 0.2})),
            ("Anthropic", "anthropic", "https://api.anthropic.com", "ANTHROPIC_API_KEY", None, "claude-3-5-sonnet", true, json!({})),
            ("Local Ollama", "ollama", "http://localhost:11434", "OLLAMA_KEY", None, "llama3", false, json!({"num_ctx": 8192})),
        ];
        for (i, (name, kind, url, key, org, model, active, extra)) in rows.iter().enumerate() {
            conn.execute(
                "INSERT INTO ai_provider_configs (id, name, provider_type, base_url, api_key_name, organization_id,
                    model_name, is_active, created_at, updated_at, created_by, logo_url, additional_params)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, NULL, NULL, ?10)",
                params![new_id(), name, kind, url, key, org, model, active, stamp(60 - 15 * i as i64), extra.to_string()],
            )?;
            inserted += 1;
        }
    }

    if collection_count(conn, "players")? == 0 {
        let first = ["Alex", "Sam", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Jamie"];
        let last = ["Kim", "Singh", "Garcia", "Okafor"];
        for i in 0..25 {
            let first_name = first[i % first.len()];
            let last_name = last[i % last.len()];
            let email = format!("{}.{}{}@players.example", first_name.to_lowercase(), last_name.to_lowercase(), i);
            conn.execute(
                "INSERT INTO players (id, first_name, last_name, email, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new_id(), first_name, last_name, email, stamp(i as i64)],
            )?;
            inserted += 1;
        }
    }

    info!(inserted, force, "demo data seeded");
    Ok(inserted)
}
