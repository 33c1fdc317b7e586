use admin_views::config::AppConfig;
use admin_views::db::{collection_count, seed_demo_data, SqliteClient, COLLECTIONS};
use admin_views::render::render_display;
use admin_views::view::{Dashboard, DisplayState, ListView, ViewControls};
use admin_views::{catalog, BackendKind};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "admin-views")]
#[command(about = "Admin dashboard list views over tenants, users, roles and more")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./admin-views.toml when present)
    #[arg(short, long, env = "ADMIN_VIEWS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal dashboard (default)
    Tui,
    /// List the available views
    Views,
    /// Print one view as text
    List {
        /// View name, see `views`
        view: String,
        /// Search term
        #[arg(short, long, default_value = "")]
        search: String,
        /// Filter option key ("all", "active", "inactive", a record id...)
        #[arg(short, long)]
        filter: Option<String>,
        /// 1-based page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Create the SQLite collections and fill them with demo rows
    Seed {
        /// Replace existing rows
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => {
            init_logging(&cli.log_level, Some(&config.tui.log_file))?;
            run_tui(&config)
        }
        Command::Views => {
            init_logging(&cli.log_level, None)?;
            print_views(&config);
            Ok(())
        }
        Command::List {
            view,
            search,
            filter,
            page,
        } => {
            init_logging(&cli.log_level, None)?;
            let controls = ViewControls {
                search,
                selection: filter,
                page,
            };
            if !run_list(&config, &view, controls)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Seed { force } => {
            init_logging(&cli.log_level, None)?;
            run_seed(&config, force)
        }
    }
}

/// Console logging on stderr, or a log file while the dashboard owns the terminal.
fn init_logging(level: &str, file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::sync::Mutex::new(log_file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn print_views(config: &AppConfig) {
    println!("{:<22} {:<28} {:<22} {}", "NAME", "TITLE", "COLLECTION", "FILTER");
    for view in catalog::all(config.views.per_page) {
        let filter = view
            .filter
            .as_ref()
            .map(|f| f.label.clone())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:<28} {:<22} {}",
            view.name, view.title, view.collection, filter
        );
    }
    for dashboard in catalog::dashboards() {
        let collections: Vec<&str> = dashboard.panels.iter().map(|p| p.collection.as_str()).collect();
        println!(
            "{:<22} {:<28} {:<22} {}",
            dashboard.name,
            dashboard.title,
            collections.join("+"),
            "-"
        );
    }
}

/// Prints the view; returns false when it ended in an error state.
fn run_list(config: &AppConfig, name: &str, controls: ViewControls) -> Result<bool> {
    let client = config.connect()?;
    let connection_id = &config.views.connection_id;

    if let Some(descriptor) = catalog::find(name, config.views.per_page) {
        let mut view = ListView::new(descriptor, client, connection_id).with_controls(controls);
        // The error is kept in the view and rendered below.
        let _ = view.load();
        let display = view.display();
        print!("{}", render_display(view.descriptor(), &display));
        return Ok(!matches!(display, DisplayState::Error { .. }));
    }

    if let Some(descriptor) = catalog::find_dashboard(name) {
        let mut dashboard = Dashboard::new(descriptor, client, connection_id);
        let _ = dashboard.load();
        let mut ok = true;
        for panel in 0..dashboard.panels() {
            dashboard.set_search(panel, &controls.search);
            dashboard.set_filter(panel, controls.selection.as_deref());
            if let Some((descriptor, display)) = dashboard.panel_display(panel) {
                println!("# {}", descriptor.title);
                print!("{}", render_display(descriptor, &display));
                println!();
                ok &= !matches!(display, DisplayState::Error { .. });
            }
        }
        return Ok(ok);
    }

    bail!("Unknown view: {} (run `admin-views views` for the list)", name)
}

fn run_seed(config: &AppConfig, force: bool) -> Result<()> {
    if config.backend.kind != BackendKind::Sqlite {
        bail!("seeding is only supported for the sqlite backend");
    }
    let path = &config.backend.sqlite_path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let client = SqliteClient::open(path, &config.views.connection_id)?;
    let inserted = client.with_connection(|conn| seed_demo_data(conn, force))?;
    info!(inserted, path = %path.display(), "seed finished");

    client.with_connection(|conn| {
        for collection in COLLECTIONS {
            println!("{:<22} {}", collection, collection_count(conn, collection)?);
        }
        Ok(())
    })
}

#[cfg(feature = "tui")]
fn run_tui(config: &AppConfig) -> Result<()> {
    use admin_views::ui;

    let client = config.connect()?;
    let connection_id = &config.views.connection_id;
    // The localization overview opens first, followed by every single view.
    let mut screens: Vec<_> = catalog::dashboards()
        .into_iter()
        .map(|descriptor| ui::Screen::from(Dashboard::new(descriptor, client.clone(), connection_id)))
        .collect();
    screens.extend(
        catalog::all(config.views.per_page)
            .into_iter()
            .map(|descriptor| ui::Screen::from(ListView::new(descriptor, client.clone(), connection_id))),
    );

    info!(backend = client.backend(), screens = screens.len(), "starting dashboard");
    let mut app = ui::App::new(screens);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_tui(_config: &AppConfig) -> Result<()> {
    bail!("the dashboard needs the `tui` feature; try `admin-views list <view>` instead")
}
