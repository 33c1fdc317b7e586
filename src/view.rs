// Generic list view: descriptor + loader + search/filter/page controls
//
// Every collection screen is one ViewDescriptor driving the same ListView.
// The derived display is recomputed from the loaded rows each time it is
// asked for, so changing the search term, filter or page never touches the
// backend unless the view pages on the server.

use crate::actions::{ActionHooks, ActionKind, ActionOutcome};
use crate::client::DataClient;
use crate::error::LoadResult;
use crate::filter::{filter_records, CategoricalFilter, FilterOption, ALL};
use crate::format::{format_field, Cell, FieldFormat};
use crate::loader::{LoadCompletion, LoadState, Loader, PendingLoad};
use crate::notify::Notification;
use crate::paginate::{paginate, total_pages, Page, PageMeta, PageWindow};
use crate::query::{QueryRequest, TableQuery};
use crate::record::Record;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Table,
    Cards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// Everything on one page.
    None,
    /// Slice the filtered list locally.
    Client { per_page: usize },
    /// Ask the backend for one window per page.
    Server { per_page: usize },
}

/// Where a view's rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Select(TableQuery),
    /// Literal query run through the `db-query` function.
    Sql(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    pub field: String,
    pub format: FieldFormat,
    /// Optional columns show a placeholder in tables and are skipped on cards.
    pub optional: bool,
}

impl Column {
    pub fn new(header: &str, field: &str, format: FieldFormat) -> Self {
        Column {
            header: header.to_string(),
            field: field.to_string(),
            format,
            optional: false,
        }
    }

    pub fn text(header: &str, field: &str) -> Self {
        Self::new(header, field, FieldFormat::Text)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Card layout: title, subtitle and badge up top, labelled lines below.
#[derive(Debug, Clone, PartialEq)]
pub struct CardSpec {
    pub title_field: String,
    pub subtitle_field: Option<String>,
    pub badge: Option<Column>,
}

/// Declarative description of one collection screen.
#[derive(Debug, Clone)]
pub struct ViewDescriptor {
    pub name: String,
    pub title: String,
    pub description: String,
    pub collection: String,
    pub source: QuerySource,
    pub key_field: String,
    /// Field naming a row in notifications.
    pub subject_field: String,
    pub search_fields: Vec<String>,
    pub search_placeholder: String,
    pub filter: Option<CategoricalFilter>,
    pub columns: Vec<Column>,
    pub layout: Layout,
    pub card: Option<CardSpec>,
    pub paging: Paging,
    pub empty_message: String,
    pub actions: Vec<ActionKind>,
}

impl ViewDescriptor {
    pub fn new(name: &str, title: &str, collection: &str) -> Self {
        ViewDescriptor {
            name: name.to_string(),
            title: title.to_string(),
            description: String::new(),
            collection: collection.to_string(),
            source: QuerySource::Select(TableQuery::from(collection)),
            key_field: "id".to_string(),
            subject_field: "name".to_string(),
            search_fields: Vec::new(),
            search_placeholder: String::new(),
            filter: None,
            columns: Vec::new(),
            layout: Layout::Table,
            card: None,
            paging: Paging::None,
            empty_message: format!("No {} found.", collection.replace('_', " ")),
            actions: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn select(mut self, query: TableQuery) -> Self {
        self.source = QuerySource::Select(query);
        self
    }

    pub fn sql(mut self, query: &str) -> Self {
        self.source = QuerySource::Sql(query.to_string());
        self
    }

    pub fn keyed_by(mut self, key_field: &str, subject_field: &str) -> Self {
        self.key_field = key_field.to_string();
        self.subject_field = subject_field.to_string();
        self
    }

    pub fn search(mut self, fields: &[&str], placeholder: &str) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self.search_placeholder = placeholder.to_string();
        self
    }

    pub fn filter(mut self, filter: CategoricalFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn cards(mut self, card: CardSpec) -> Self {
        self.layout = Layout::Cards;
        self.card = Some(card);
        self
    }

    pub fn paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn empty(mut self, message: &str) -> Self {
        self.empty_message = message.to_string();
        self
    }

    pub fn actions(mut self, actions: &[ActionKind]) -> Self {
        self.actions = actions.to_vec();
        self
    }

    /// Request sent for this view, bound to a connection for `db-query`.
    pub fn request(&self, connection_id: &str) -> QueryRequest {
        match &self.source {
            QuerySource::Select(query) => QueryRequest::Select(query.clone()),
            QuerySource::Sql(sql) => QueryRequest::sql(connection_id, sql),
        }
    }

    /// Message when nothing matches an active search.
    pub fn no_match_message(&self, term: &str) -> String {
        format!(
            "No {} found matching \"{}\".",
            self.collection.replace('_', " "),
            term.trim()
        )
    }
}

/// User-controlled inputs of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewControls {
    pub search: String,
    /// Filter option key; `None` or "all" disables the filter.
    pub selection: Option<String>,
    /// 1-based.
    pub page: usize,
}

impl Default for ViewControls {
    fn default() -> Self {
        ViewControls {
            search: String::new(),
            selection: None,
            page: 1,
        }
    }
}

impl ViewControls {
    pub fn is_narrowed(&self) -> bool {
        !self.search.trim().is_empty()
            || self
                .selection
                .as_deref()
                .map(|s| !s.is_empty() && s != ALL)
                .unwrap_or(false)
    }
}

/// What a surface should show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState<'a> {
    Loading,
    Error { message: String, retryable: bool },
    Empty { message: String },
    Rows(Page<&'a Record>),
}

/// Pure derivation of the display from load state and controls.
pub fn derive_display<'a>(
    descriptor: &ViewDescriptor,
    controls: &ViewControls,
    state: &LoadState,
    records: &'a [Record],
    reported_total: Option<u64>,
) -> DisplayState<'a> {
    match state {
        LoadState::Idle | LoadState::Loading => return DisplayState::Loading,
        LoadState::Failed(e) => {
            return DisplayState::Error {
                message: e.to_string(),
                retryable: true,
            }
        }
        LoadState::Loaded => {}
    }

    let filtered = filter_records(
        records,
        &descriptor.search_fields,
        &controls.search,
        descriptor.filter.as_ref(),
        controls.selection.as_deref(),
    );

    let page = match descriptor.paging {
        Paging::None => Page::single(filtered),
        Paging::Client { per_page } => paginate(&filtered, controls.page, per_page),
        Paging::Server { per_page } => {
            let meta = PageWindow::new(controls.page, per_page).meta(records.len(), reported_total);
            Page { items: filtered, meta }
        }
    };

    if page.is_empty() {
        let message = if !controls.is_narrowed() {
            descriptor.empty_message.clone()
        } else if !controls.search.trim().is_empty() {
            descriptor.no_match_message(&controls.search)
        } else {
            format!(
                "No {} match the selected filter.",
                descriptor.collection.replace('_', " ")
            )
        };
        return DisplayState::Empty { message };
    }
    DisplayState::Rows(page)
}

/// One formatted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedRow {
    pub key: String,
    pub cells: Vec<Cell>,
}

pub fn format_row(descriptor: &ViewDescriptor, record: &Record) -> FormattedRow {
    FormattedRow {
        key: record.key(&descriptor.key_field).unwrap_or_default(),
        cells: descriptor
            .columns
            .iter()
            .map(|c| format_field(record, &c.field, &c.format))
            .collect(),
    }
}

/// Card content: (label, cell) lines, optional empty ones left out.
pub fn card_lines(descriptor: &ViewDescriptor, record: &Record) -> Vec<(String, Cell)> {
    descriptor
        .columns
        .iter()
        .filter(|c| !(c.optional && !record.is_present(&c.field)))
        .map(|c| (c.header.clone(), format_field(record, &c.field, &c.format)))
        .collect()
}

// ============================================================================
// LIST VIEW
// ============================================================================

pub struct ListView {
    descriptor: ViewDescriptor,
    loader: Loader,
    controls: ViewControls,
    hooks: ActionHooks,
}

impl ListView {
    pub fn new(descriptor: ViewDescriptor, client: Arc<dyn DataClient>, connection_id: &str) -> Self {
        let request = descriptor.request(connection_id);
        let mut loader = Loader::new(&descriptor.name, client, vec![request]);
        if let Paging::Server { per_page } = descriptor.paging {
            loader.set_window(Some(PageWindow::new(1, per_page)));
        }
        let hooks = ActionHooks::offering(&descriptor.actions);
        ListView {
            descriptor,
            loader,
            controls: ViewControls::default(),
            hooks,
        }
    }

    /// Preset search, filter and page before the first load.
    pub fn with_controls(mut self, controls: ViewControls) -> Self {
        let page = controls.page.max(1);
        self.controls = ViewControls { page, ..controls };
        if let Paging::Server { per_page } = self.descriptor.paging {
            self.loader.set_window(Some(PageWindow::new(page, per_page)));
        }
        self
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        &self.descriptor
    }

    pub fn controls(&self) -> &ViewControls {
        &self.controls
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn hooks_mut(&mut self) -> &mut ActionHooks {
        &mut self.hooks
    }

    /// Synchronous load (initial open, page change, refresh). A server page
    /// beyond the reported total is clamped and fetched again.
    pub fn load(&mut self) -> LoadResult<()> {
        self.loader.load()?;
        if self.clamp_server_page() {
            self.loader.load()?;
        }
        Ok(())
    }

    pub fn retry(&mut self) -> LoadResult<()> {
        self.loader.retry()?;
        if self.clamp_server_page() {
            self.loader.load()?;
        }
        Ok(())
    }

    /// Pull a server page back into `[1, total_pages]` once the backend has
    /// reported its total. Returns true when the window moved and the view
    /// must load again.
    pub fn clamp_server_page(&mut self) -> bool {
        let Paging::Server { per_page } = self.descriptor.paging else {
            return false;
        };
        if !matches!(self.loader.state(), LoadState::Loaded) {
            return false;
        }
        let Some(total) = self.loader.reported_total(0) else {
            return false;
        };
        let last = total_pages(total as usize, per_page);
        if self.controls.page <= last {
            return false;
        }
        debug!(view = %self.descriptor.name, requested = self.controls.page, last, "clamping server page");
        self.controls.page = last;
        self.loader.set_window(Some(PageWindow::new(last, per_page)));
        true
    }

    pub fn begin_load(&mut self) -> PendingLoad {
        self.loader.begin()
    }

    pub fn complete_load(&mut self, completion: LoadCompletion) -> bool {
        self.loader.complete(completion)
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn records(&self) -> &[Record] {
        self.loader.records(0)
    }

    pub fn display(&self) -> DisplayState<'_> {
        derive_display(
            &self.descriptor,
            &self.controls,
            self.loader.state(),
            self.loader.records(0),
            self.loader.reported_total(0),
        )
    }

    /// Meta of the current page, when rows are showing.
    pub fn page_meta(&self) -> Option<PageMeta> {
        match self.display() {
            DisplayState::Rows(page) => Some(page.meta),
            _ => None,
        }
    }

    /// Update the search term; the page resets to 1. Returns true when the
    /// backend must be asked again (server paging away from page 1).
    pub fn set_search(&mut self, term: &str) -> bool {
        self.controls.search = term.to_string();
        self.go_to(1)
    }

    /// Select a filter option by key ("all" clears). Resets the page.
    pub fn set_filter(&mut self, key: Option<&str>) -> bool {
        self.controls.selection = key.map(str::to_string);
        self.go_to(1)
    }

    /// Step through "all" and every option.
    pub fn cycle_filter(&mut self) -> bool {
        let options = self.filter_options();
        if options.is_empty() {
            return false;
        }
        let current = self.controls.selection.as_deref().unwrap_or(ALL);
        let position = options.iter().position(|o| o.key == current).unwrap_or(0);
        let next = options[(position + 1) % options.len()].key.clone();
        self.set_filter(Some(&next))
    }

    pub fn filter_options(&self) -> Vec<FilterOption> {
        self.descriptor
            .filter
            .as_ref()
            .map(|f| f.options(self.loader.records(0)))
            .unwrap_or_default()
    }

    pub fn active_filter(&self) -> Option<FilterOption> {
        self.descriptor
            .filter
            .as_ref()
            .and_then(|f| f.resolve(self.loader.records(0), self.controls.selection.as_deref()))
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to(self.controls.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.go_to(self.controls.page.saturating_sub(1))
    }

    /// Move to a page. Client pages are clamped against the filtered total;
    /// server pages may only advance while the backend reports more.
    pub fn go_to(&mut self, page: usize) -> bool {
        let page = page.max(1);
        match self.descriptor.paging {
            Paging::None => {
                self.controls.page = 1;
                false
            }
            Paging::Client { .. } => {
                self.controls.page = page;
                if let Some(meta) = self.page_meta() {
                    self.controls.page = meta.page;
                }
                false
            }
            Paging::Server { per_page } => {
                if page > self.controls.page {
                    let more = self
                        .page_meta()
                        .map(|m| m.has_next)
                        .unwrap_or(false);
                    if !more {
                        return false;
                    }
                }
                if page == self.controls.page {
                    return false;
                }
                self.controls.page = page;
                self.loader.set_window(Some(PageWindow::new(page, per_page)));
                true
            }
        }
    }

    /// Trigger an action on the nth row of the current page.
    pub fn dispatch(&mut self, kind: ActionKind, row: usize) -> ActionOutcome {
        let record = match self.display() {
            DisplayState::Rows(page) => page.items.get(row).map(|r| (*r).clone()),
            _ => None,
        };
        let Some(record) = record else {
            return ActionOutcome::Unavailable;
        };
        let subject = record
            .key(&self.descriptor.subject_field)
            .unwrap_or_else(|| record.key(&self.descriptor.key_field).unwrap_or_default());
        let outcome = self.hooks.dispatch(kind, &record, &subject);
        if let Some(n) = outcome.notification() {
            self.loader.notifications_mut().push(n.clone());
        }
        outcome
    }

    pub fn latest_notification(&self) -> Option<&Notification> {
        self.loader.notifications().latest()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.loader.notifications_mut().drain()
    }
}

// ============================================================================
// DASHBOARD (several panels, one load)
// ============================================================================

/// Declarative multi-panel screen whose panels load together.
#[derive(Debug, Clone)]
pub struct DashboardDescriptor {
    pub name: String,
    pub title: String,
    pub panels: Vec<ViewDescriptor>,
}

/// Panels share one loader: any failing request fails the whole screen.
pub struct Dashboard {
    descriptor: DashboardDescriptor,
    loader: Loader,
    controls: Vec<ViewControls>,
}

impl Dashboard {
    pub fn new(descriptor: DashboardDescriptor, client: Arc<dyn DataClient>, connection_id: &str) -> Self {
        let requests = descriptor
            .panels
            .iter()
            .map(|p| p.request(connection_id))
            .collect();
        let loader = Loader::new(&descriptor.name, client, requests);
        let controls = vec![ViewControls::default(); descriptor.panels.len()];
        Dashboard {
            descriptor,
            loader,
            controls,
        }
    }

    pub fn descriptor(&self) -> &DashboardDescriptor {
        &self.descriptor
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn load(&mut self) -> LoadResult<()> {
        self.loader.load()
    }

    pub fn retry(&mut self) -> LoadResult<()> {
        self.loader.retry()
    }

    pub fn begin_load(&mut self) -> PendingLoad {
        self.loader.begin()
    }

    pub fn complete_load(&mut self, completion: LoadCompletion) -> bool {
        self.loader.complete(completion)
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.loader.notifications_mut().drain()
    }

    pub fn panels(&self) -> usize {
        self.descriptor.panels.len()
    }

    /// The shared search box: one term applied to every panel.
    pub fn search(&self) -> &str {
        self.controls.first().map(|c| c.search.as_str()).unwrap_or("")
    }

    pub fn set_search_all(&mut self, term: &str) {
        for panel in 0..self.panels() {
            self.set_search(panel, term);
        }
    }

    pub fn set_search(&mut self, panel: usize, term: &str) {
        if let Some(controls) = self.controls.get_mut(panel) {
            controls.search = term.to_string();
            controls.page = 1;
        }
    }

    pub fn set_filter(&mut self, panel: usize, key: Option<&str>) {
        if let Some(controls) = self.controls.get_mut(panel) {
            controls.selection = key.map(str::to_string);
            controls.page = 1;
        }
    }

    pub fn panel_display(&self, panel: usize) -> Option<(&ViewDescriptor, DisplayState<'_>)> {
        let descriptor = self.descriptor.panels.get(panel)?;
        let controls = self.controls.get(panel)?;
        Some((
            descriptor,
            derive_display(
                descriptor,
                controls,
                self.loader.state(),
                self.loader.records(panel),
                self.loader.reported_total(panel),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::error::LoadError;
    use serde_json::Value;

    fn currencies() -> Vec<Record> {
        vec![
            Record::new().with("id", "1").with("code", "USD").with("name", "US Dollar").with("is_active", true),
            Record::new().with("id", "2").with("code", "EUR").with("name", "Euro").with("is_active", false),
        ]
    }

    fn players(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new()
                    .with("id", format!("p{:02}", i))
                    .with("first_name", format!("Player{:02}", i))
                    .with("email", format!("p{}@example.com", i))
            })
            .collect()
    }

    fn currency_view() -> ViewDescriptor {
        ViewDescriptor::new("currencies", "Currencies", "currencies")
            .select(TableQuery::from("currencies").order("name", true))
            .search(&["code", "name"], "Search currencies...")
            .filter(CategoricalFilter::status("is_active"))
            .columns(vec![
                Column::text("Code", "code"),
                Column::text("Name", "name"),
                Column::new("Active", "is_active", FieldFormat::status()),
            ])
            .actions(&[ActionKind::Edit])
    }

    fn client() -> Arc<MemoryClient> {
        Arc::new(
            MemoryClient::new()
                .with_collection("currencies", currencies())
                .with_collection("players", players(23))
                .with_connection("conn"),
        )
    }

    #[test]
    fn test_states_before_and_after_load() {
        let mut view = ListView::new(currency_view(), client(), "conn");
        assert_eq!(view.display(), DisplayState::Loading);

        view.load().unwrap();
        let DisplayState::Rows(page) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].text("code"), Some("EUR"));
    }

    #[test]
    fn test_currency_filter_and_search_scenario() {
        let mut view = ListView::new(currency_view(), client(), "conn");
        view.load().unwrap();

        view.set_filter(Some("active"));
        let DisplayState::Rows(page) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text("code"), Some("USD"));

        view.set_filter(Some(ALL));
        view.set_search("eur");
        let DisplayState::Rows(page) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].text("code"), Some("EUR"));
    }

    #[test]
    fn test_empty_messages_are_distinct() {
        let mut view = ListView::new(currency_view(), client(), "conn");
        view.load().unwrap();

        view.set_search("zzz");
        assert_eq!(
            view.display(),
            DisplayState::Empty {
                message: "No currencies found matching \"zzz\".".to_string()
            }
        );

        view.set_search("");
        view.set_filter(Some("inactive"));
        view.set_search("dollar");
        assert!(matches!(view.display(), DisplayState::Empty { .. }));
        view.set_search("");
        view.set_filter(Some("active"));
        assert!(matches!(view.display(), DisplayState::Rows(_)));

        let client = Arc::new(MemoryClient::new().with_collection("currencies", Vec::new()));
        let mut empty = ListView::new(currency_view().empty("No currencies yet."), client, "conn");
        empty.load().unwrap();
        assert_eq!(
            empty.display(),
            DisplayState::Empty {
                message: "No currencies yet.".to_string()
            }
        );
    }

    #[test]
    fn test_transport_error_scenario() {
        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        let mut view = ListView::new(currency_view(), client.clone(), "conn");

        assert!(view.load().is_err());
        assert_eq!(
            view.display(),
            DisplayState::Error {
                message: "connection refused".to_string(),
                retryable: true
            }
        );
        assert!(view.records().is_empty());
        assert_eq!(client.calls(), 1);

        client.clear_failure();
        view.retry().unwrap();
        assert_eq!(client.calls(), 2);
        assert!(matches!(view.display(), DisplayState::Rows(_)));
    }

    #[test]
    fn test_client_paging_and_search_reset() {
        let descriptor = ViewDescriptor::new("players", "Players", "players")
            .search(&["first_name", "email"], "Search players...")
            .paging(Paging::Client { per_page: 10 });
        let mut view = ListView::new(descriptor, client(), "conn");
        view.load().unwrap();

        assert!(!view.next_page());
        assert!(!view.next_page());
        assert!(!view.next_page());
        let meta = view.page_meta().unwrap();
        assert_eq!((meta.page, meta.total_pages), (3, 3));

        view.set_search("player0");
        assert_eq!(view.controls().page, 1);
        let meta = view.page_meta().unwrap();
        assert_eq!(meta.total, 10);
    }

    #[test]
    fn test_server_paging_requests_new_window() {
        let descriptor = ViewDescriptor::new("players", "Players", "players")
            .select(TableQuery::from("players").order("id", true))
            .paging(Paging::Server { per_page: 10 });
        let client = client();
        let mut view = ListView::new(descriptor, client.clone(), "conn");
        view.load().unwrap();
        assert_eq!(view.records().len(), 10);

        assert!(view.next_page());
        view.load().unwrap();
        assert!(view.next_page());
        view.load().unwrap();
        assert_eq!(view.records().len(), 3);
        assert_eq!(view.records()[0].text("id"), Some("p20"));

        // no page beyond the reported total
        assert!(!view.next_page());
        assert!(view.prev_page());
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn test_preset_controls_start_on_requested_page() {
        let descriptor = ViewDescriptor::new("players", "Players", "players")
            .select(TableQuery::from("players").order("id", true))
            .paging(Paging::Server { per_page: 10 });
        let controls = ViewControls {
            page: 3,
            ..ViewControls::default()
        };
        let mut view = ListView::new(descriptor, client(), "conn").with_controls(controls);
        view.load().unwrap();

        assert_eq!(view.records().len(), 3);
        let meta = view.page_meta().unwrap();
        assert_eq!((meta.page, meta.total_pages, meta.has_prev), (3, 3, true));
    }

    fn server_paged_players(page: usize) -> ListView {
        let descriptor = ViewDescriptor::new("players", "Players", "players")
            .select(TableQuery::from("players").order("id", true))
            .paging(Paging::Server { per_page: 10 });
        let controls = ViewControls {
            page,
            ..ViewControls::default()
        };
        ListView::new(descriptor, client(), "conn").with_controls(controls)
    }

    #[test]
    fn test_server_page_past_the_end_is_clamped() {
        let mut view = server_paged_players(99);
        view.load().unwrap();

        assert_eq!(view.controls().page, 3);
        let DisplayState::Rows(page) = view.display() else {
            panic!("expected the last page");
        };
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].text("id"), Some("p20"));
        assert_eq!((page.meta.page, page.meta.total_pages), (3, 3));
        assert_eq!(view.loader().window(), Some(PageWindow::new(3, 10)));
    }

    #[test]
    fn test_server_page_at_usize_max_does_not_overflow() {
        let mut view = server_paged_players(usize::MAX);
        view.load().unwrap();

        assert_eq!(view.controls().page, 3);
        assert_eq!(view.records().len(), 3);
        assert!(!view.next_page());
        assert!(view.prev_page());
        view.load().unwrap();
        assert_eq!(view.records().len(), 10);
    }

    #[test]
    fn test_retry_clamps_server_page_too() {
        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        let descriptor = ViewDescriptor::new("players", "Players", "players")
            .select(TableQuery::from("players").order("id", true))
            .paging(Paging::Server { per_page: 10 });
        let controls = ViewControls {
            page: 7,
            ..ViewControls::default()
        };
        let mut view = ListView::new(descriptor, client.clone(), "conn").with_controls(controls);
        assert!(view.load().is_err());
        assert_eq!(view.controls().page, 7);

        client.clear_failure();
        view.retry().unwrap();
        assert_eq!(view.controls().page, 3);
        assert_eq!(view.records().len(), 3);
        assert_eq!(client.calls(), 3);
    }

    #[test]
    fn test_unwired_action_notifies() {
        let mut view = ListView::new(currency_view(), client(), "conn");
        view.load().unwrap();

        let outcome = view.dispatch(ActionKind::Edit, 0);
        assert!(matches!(outcome, ActionOutcome::NotWired(_)));
        let toast = view.latest_notification().unwrap();
        assert_eq!(toast.title, "Edit is not available yet");
        assert_eq!(toast.description, "Euro");

        assert_eq!(view.dispatch(ActionKind::Delete, 0), ActionOutcome::Unavailable);
        assert_eq!(view.dispatch(ActionKind::Edit, 99), ActionOutcome::Unavailable);
    }

    #[test]
    fn test_cycle_filter_wraps() {
        let mut view = ListView::new(currency_view(), client(), "conn");
        view.load().unwrap();

        view.cycle_filter();
        assert_eq!(view.active_filter().map(|o| o.key), Some("active".to_string()));
        view.cycle_filter();
        assert_eq!(view.active_filter().map(|o| o.key), Some("inactive".to_string()));
        view.cycle_filter();
        assert_eq!(view.active_filter(), None);
    }

    #[test]
    fn test_card_lines_skip_missing_optional_fields() {
        let descriptor = ViewDescriptor::new("ai", "AI", "ai_provider_configs").columns(vec![
            Column::text("Model", "model_name"),
            Column::text("Org ID", "organization_id").optional(),
        ]);
        let record = Record::new().with("model_name", Value::Null).with("organization_id", Value::Null);

        let lines = card_lines(&descriptor, &record);
        assert_eq!(lines, vec![("Model".to_string(), Cell::Placeholder)]);
        assert_eq!(format_row(&descriptor, &record).cells.len(), 2);
    }

    #[test]
    fn test_dashboard_loads_panels_together() {
        let client = Arc::new(
            MemoryClient::new()
                .with_collection("currencies", currencies())
                .with_collection("languages", vec![Record::new().with("code", "en").with("name", "English")])
                .with_connection("conn"),
        );
        let descriptor = DashboardDescriptor {
            name: "localization".to_string(),
            title: "Localization".to_string(),
            panels: vec![
                currency_view().sql("SELECT * FROM currencies ORDER BY name ASC"),
                ViewDescriptor::new("languages", "Languages", "languages")
                    .sql("SELECT * FROM languages ORDER BY name ASC")
                    .search(&["name", "code"], ""),
            ],
        };
        let mut dashboard = Dashboard::new(descriptor, client.clone(), "conn");
        dashboard.load().unwrap();

        dashboard.set_search(0, "dollar");
        let (_, display) = dashboard.panel_display(0).unwrap();
        let DisplayState::Rows(page) = display else {
            panic!("expected rows");
        };
        assert_eq!(page.items.len(), 1);

        let (_, display) = dashboard.panel_display(1).unwrap();
        assert!(matches!(display, DisplayState::Rows(p) if p.items.len() == 1));

        dashboard.set_search_all("en");
        assert_eq!(dashboard.search(), "en");
        let (_, display) = dashboard.panel_display(0).unwrap();
        assert!(matches!(display, DisplayState::Empty { .. }));
        let (_, display) = dashboard.panel_display(1).unwrap();
        assert!(matches!(display, DisplayState::Rows(p) if p.items.len() == 1));

        client.fail_with(LoadError::query("boom"));
        assert!(dashboard.retry().is_err());
        assert_eq!(dashboard.take_notifications().len(), 1);
        for panel in 0..dashboard.panels() {
            let (_, display) = dashboard.panel_display(panel).unwrap();
            assert!(matches!(display, DisplayState::Error { .. }));
        }
    }
}
