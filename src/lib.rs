// Admin Views - Core Library
// List views over admin collections, shared by the CLI, TUI and API server

pub mod actions;
pub mod catalog;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod format;
pub mod loader;
pub mod notify;
pub mod paginate;
pub mod query;
pub mod record;
pub mod render;
pub mod view;

#[cfg(feature = "remote")]
pub mod remote;

#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use actions::{ActionHooks, ActionKind, ActionOutcome};
pub use client::{DataClient, MemoryClient, NO_CONNECTION_MESSAGE};
pub use config::{AppConfig, BackendKind};
pub use db::{seed_demo_data, setup_database, SqliteClient, COLLECTIONS};
pub use error::{LoadError, LoadResult};
pub use filter::{filter_records, search, CategoricalFilter, FilterOption, ALL};
pub use format::{format_field, Cell, FieldFormat, PLACEHOLDER};
pub use loader::{LoadState, Loader};
pub use notify::{Notification, Severity};
pub use paginate::{paginate, Page, PageMeta, PageWindow};
pub use query::{QueryRequest, QueryResponse, TableQuery};
pub use record::Record;
pub use view::{Dashboard, DashboardDescriptor, DisplayState, ListView, ViewDescriptor};

#[cfg(feature = "remote")]
pub use remote::HttpClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
