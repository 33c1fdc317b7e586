// Admin Views - Web Server
// JSON API over the same list views as the CLI and dashboard

use admin_views::catalog;
use admin_views::config::AppConfig;
use admin_views::view::{format_row, DisplayState, FormattedRow, Layout, ListView, ViewControls, ViewDescriptor};
use admin_views::{DataClient, FilterOption, PageMeta};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "admin-views-server")]
#[command(about = "JSON API for the admin list views")]
struct Cli {
    /// Configuration file (defaults to ./admin-views.toml when present)
    #[arg(short, long, env = "ADMIN_VIEWS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    client: Arc<dyn DataClient>,
    connection_id: String,
    per_page: usize,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Serialize)]
struct FilterSummary {
    field: String,
    label: String,
    /// Record-derived selectors only list "all" until rows are loaded.
    options: Vec<FilterOption>,
}

#[derive(Serialize)]
struct ViewSummary {
    name: String,
    title: String,
    description: String,
    collection: String,
    layout: Layout,
    columns: Vec<String>,
    search_placeholder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<FilterSummary>,
}

impl From<&ViewDescriptor> for ViewSummary {
    fn from(view: &ViewDescriptor) -> Self {
        Self {
            name: view.name.clone(),
            title: view.title.clone(),
            description: view.description.clone(),
            collection: view.collection.clone(),
            layout: view.layout,
            columns: view.columns.iter().map(|c| c.header.clone()).collect(),
            search_placeholder: view.search_placeholder.clone(),
            filter: view.filter.as_ref().map(|f| FilterSummary {
                field: f.field.clone(),
                label: f.label.clone(),
                options: f.options(&[]),
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ViewParams {
    #[serde(default)]
    search: String,
    filter: Option<String>,
    page: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum ViewStatus {
    Rows,
    Empty,
}

/// One page of a view, already formatted
#[derive(Debug, Serialize)]
struct ViewPage {
    view: String,
    status: ViewStatus,
    columns: Vec<String>,
    rows: Vec<FormattedRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    filter_options: Vec<FilterOption>,
}

#[derive(Debug)]
enum ViewError {
    NotFound(String),
    Load(String),
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        match self {
            ViewError::NotFound(name) => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::err(format!("Unknown view: {}", name))),
            )
                .into_response(),
            ViewError::Load(message) => {
                (StatusCode::BAD_GATEWAY, Json(ApiResponse::<()>::err(message))).into_response()
            }
        }
    }
}

/// Load and derive one view page on the calling thread.
fn view_page(state: &AppState, name: &str, params: ViewParams) -> Result<ViewPage, ViewError> {
    let descriptor = catalog::find(name, state.per_page).ok_or_else(|| ViewError::NotFound(name.to_string()))?;
    let controls = ViewControls {
        search: params.search,
        selection: params.filter,
        page: params.page.unwrap_or(1),
    };

    let mut view = ListView::new(descriptor, Arc::clone(&state.client), &state.connection_id).with_controls(controls);
    if let Err(e) = view.load() {
        warn!(view = name, error = %e, "view load failed");
        return Err(ViewError::Load(e.to_string()));
    }

    let descriptor = view.descriptor();
    let columns = descriptor.columns.iter().map(|c| c.header.clone()).collect();
    let filter_options = view.filter_options();

    Ok(match view.display() {
        DisplayState::Rows(page) => ViewPage {
            view: descriptor.name.clone(),
            status: ViewStatus::Rows,
            columns,
            rows: page.items.iter().map(|r| format_row(descriptor, r)).collect(),
            meta: Some(page.meta),
            message: None,
            filter_options,
        },
        DisplayState::Empty { message } => ViewPage {
            view: descriptor.name.clone(),
            status: ViewStatus::Empty,
            columns,
            rows: Vec::new(),
            meta: None,
            message: Some(message),
            filter_options,
        },
        DisplayState::Error { message, .. } => return Err(ViewError::Load(message)),
        DisplayState::Loading => return Err(ViewError::Load("load did not finish".to_string())),
    })
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/views - View catalog
async fn list_views(State(state): State<AppState>) -> impl IntoResponse {
    let views: Vec<ViewSummary> = catalog::all(state.per_page).iter().map(ViewSummary::from).collect();
    Json(ApiResponse::ok(views))
}

/// GET /api/views/:name - One formatted page of a view
async fn get_view(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ViewParams>,
) -> Response {
    let handle = tokio::task::spawn_blocking(move || view_page(&state, &name, params));
    match handle.await {
        Ok(Ok(page)) => (StatusCode::OK, Json(ApiResponse::ok(page))).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!(error = %e, "view task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("internal error")),
            )
                .into_response()
        }
    }
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/views", get(list_views))
        .route("/views/:name", get(get_view))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let cli = Cli::parse();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let client = config.connect()?;
    info!(backend = client.backend(), "data client ready");

    let state = AppState {
        client,
        connection_id: config.views.connection_id.clone(),
        per_page: config.views.per_page,
    };

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(address = %addr, "server listening");
    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_views::{LoadError, MemoryClient, Record};

    fn state(client: Arc<MemoryClient>) -> AppState {
        AppState {
            client,
            connection_id: "conn".to_string(),
            per_page: 10,
        }
    }

    fn client() -> Arc<MemoryClient> {
        Arc::new(MemoryClient::new().with_collection(
            "currencies",
            vec![
                Record::new().with("id", "1").with("code", "USD").with("name", "US Dollar").with("symbol", "$").with("is_active", true),
                Record::new().with("id", "2").with("code", "EUR").with("name", "Euro").with("symbol", "€").with("is_active", false),
            ],
        ))
    }

    #[test]
    fn test_view_page_formats_rows() {
        let params = ViewParams {
            filter: Some("active".to_string()),
            ..ViewParams::default()
        };
        let page = view_page(&state(client()), "currencies", params).unwrap();

        assert_eq!(page.columns, vec!["Code", "Name", "Symbol", "Active"]);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].cells[0].text(), "USD");
        assert_eq!(page.filter_options.len(), 3);
    }

    #[test]
    fn test_view_page_errors() {
        assert!(matches!(
            view_page(&state(client()), "nope", ViewParams::default()),
            Err(ViewError::NotFound(_))
        ));

        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        match view_page(&state(client), "currencies", ViewParams::default()) {
            Err(ViewError::Load(message)) => assert_eq!(message, "connection refused"),
            other => panic!("expected load error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_page_is_clamped() {
        let players = (0..25)
            .map(|i| {
                Record::new()
                    .with("id", format!("p{:02}", i))
                    .with("email", format!("p{}@example.com", i))
                    .with("created_at", format!("2024-01-{:02}T00:00:00Z", i + 1))
            })
            .collect();
        let client = Arc::new(MemoryClient::new().with_collection("players", players));

        for page in [99, usize::MAX] {
            let params = ViewParams {
                page: Some(page),
                ..ViewParams::default()
            };
            let page = view_page(&state(client.clone()), "players", params).unwrap();
            assert!(matches!(page.status, ViewStatus::Rows));
            assert_eq!(page.rows.len(), 5);
            let meta = page.meta.unwrap();
            assert_eq!((meta.page, meta.total_pages), (3, 3));
        }
    }

    #[test]
    fn test_empty_search_reports_message() {
        let params = ViewParams {
            search: "zzz".to_string(),
            ..ViewParams::default()
        };
        let page = view_page(&state(client()), "currencies", params).unwrap();
        assert!(matches!(page.status, ViewStatus::Empty));
        assert_eq!(page.message.as_deref(), Some("No currencies found matching \"zzz\"."));
    }
}
