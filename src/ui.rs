use crate::actions::ActionKind;
use crate::format::{format_field, truncate, Cell as FieldCell, PLACEHOLDER};
use crate::loader::{LoadCompletion, LoadState, PendingLoad};
use crate::notify::{Notification, Severity};
use crate::record::Record;
use crate::view::{card_lines, format_row, Dashboard, DisplayState, Layout as ViewLayout, ListView, ViewDescriptor};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

/// One dashboard tab: a single list, or several panels under one search box.
pub enum Screen {
    List(ListView),
    Dashboard(Dashboard),
}

impl From<ListView> for Screen {
    fn from(view: ListView) -> Self {
        Screen::List(view)
    }
}

impl From<Dashboard> for Screen {
    fn from(dashboard: Dashboard) -> Self {
        Screen::Dashboard(dashboard)
    }
}

impl Screen {
    pub fn title(&self) -> &str {
        match self {
            Screen::List(view) => &view.descriptor().title,
            Screen::Dashboard(dashboard) => &dashboard.descriptor().title,
        }
    }

    pub fn as_list(&self) -> Option<&ListView> {
        match self {
            Screen::List(view) => Some(view),
            Screen::Dashboard(_) => None,
        }
    }

    fn as_list_mut(&mut self) -> Option<&mut ListView> {
        match self {
            Screen::List(view) => Some(view),
            Screen::Dashboard(_) => None,
        }
    }

    fn load_state(&self) -> &LoadState {
        match self {
            Screen::List(view) => view.loader().state(),
            Screen::Dashboard(dashboard) => dashboard.loader().state(),
        }
    }

    pub fn is_loading(&self) -> bool {
        match self {
            Screen::List(view) => view.is_loading(),
            Screen::Dashboard(dashboard) => dashboard.is_loading(),
        }
    }

    fn begin_load(&mut self) -> PendingLoad {
        match self {
            Screen::List(view) => view.begin_load(),
            Screen::Dashboard(dashboard) => dashboard.begin_load(),
        }
    }

    fn complete_load(&mut self, completion: LoadCompletion) -> bool {
        match self {
            Screen::List(view) => view.complete_load(completion),
            Screen::Dashboard(dashboard) => dashboard.complete_load(completion),
        }
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        match self {
            Screen::List(view) => view.take_notifications(),
            Screen::Dashboard(dashboard) => dashboard.take_notifications(),
        }
    }

    fn search(&self) -> &str {
        match self {
            Screen::List(view) => &view.controls().search,
            Screen::Dashboard(dashboard) => dashboard.search(),
        }
    }

    /// Returns true when the backend must be asked again.
    fn set_search(&mut self, term: &str) -> bool {
        match self {
            Screen::List(view) => view.set_search(term),
            Screen::Dashboard(dashboard) => {
                dashboard.set_search_all(term);
                false
            }
        }
    }

    fn search_placeholder(&self) -> String {
        match self {
            Screen::List(view) => view.descriptor().search_placeholder.clone(),
            Screen::Dashboard(dashboard) => {
                let names: Vec<String> = dashboard
                    .descriptor()
                    .panels
                    .iter()
                    .map(|p| p.title.to_lowercase())
                    .collect();
                format!("Search {}...", names.join(" and "))
            }
        }
    }

    fn description(&self) -> &str {
        match self {
            Screen::List(view) => &view.descriptor().description,
            Screen::Dashboard(dashboard) => &dashboard.descriptor().title,
        }
    }
}

pub struct App {
    pub screens: Vec<Screen>,
    pub current: usize,
    pub state: TableState,
    pub show_detail: bool,
    pub input_mode: InputMode,
    pub toast: Option<Notification>,
    completions: Sender<(usize, LoadCompletion)>,
    inbox: Receiver<(usize, LoadCompletion)>,
}

impl App {
    pub fn new(screens: Vec<Screen>) -> Self {
        let (completions, inbox) = mpsc::channel();
        Self {
            screens,
            current: 0,
            state: TableState::default(),
            show_detail: false,
            input_mode: InputMode::Normal,
            toast: None,
            completions,
            inbox,
        }
    }

    /// The current tab when it is a single list view.
    pub fn view(&self) -> Option<&ListView> {
        self.screens.get(self.current).and_then(Screen::as_list)
    }

    /// Start loading a tab on a worker thread.
    pub fn request_load(&mut self, index: usize) {
        let Some(screen) = self.screens.get_mut(index) else {
            return;
        };
        let pending = screen.begin_load();
        let tx = self.completions.clone();
        thread::spawn(move || {
            let completion = pending.run();
            // The receiver is gone only when the app has quit.
            let _ = tx.send((index, completion));
        });
    }

    /// Load the current tab the first time it is shown.
    pub fn ensure_loaded(&mut self) {
        let needs_load = self
            .screens
            .get(self.current)
            .map(|s| matches!(s.load_state(), LoadState::Idle))
            .unwrap_or(false);
        if needs_load {
            self.request_load(self.current);
        }
    }

    /// Apply finished loads without blocking.
    pub fn poll_loads(&mut self) {
        while let Ok((index, completion)) = self.inbox.try_recv() {
            self.apply_completion(index, completion);
        }
    }

    fn apply_completion(&mut self, index: usize, completion: LoadCompletion) {
        let Some(screen) = self.screens.get_mut(index) else {
            return;
        };
        let mut reload = false;
        if screen.complete_load(completion) {
            debug!(screen = %screen.title(), "load applied");
            reload = screen
                .as_list_mut()
                .map(ListView::clamp_server_page)
                .unwrap_or(false);
            if index == self.current {
                self.reset_selection();
            }
        }
        self.collect_toasts(index);
        if reload {
            self.request_load(index);
        }
    }

    fn collect_toasts(&mut self, index: usize) {
        if let Some(screen) = self.screens.get_mut(index) {
            if let Some(latest) = screen.take_notifications().pop() {
                self.toast = Some(latest);
            }
        }
    }

    fn visible_rows(&self) -> usize {
        match self.view().map(|v| v.display()) {
            Some(DisplayState::Rows(page)) => page.items.len(),
            _ => 0,
        }
    }

    fn selected_record(&self) -> Option<Record> {
        let view = self.view()?;
        match view.display() {
            DisplayState::Rows(page) => self
                .state
                .selected()
                .and_then(|i| page.items.get(i).map(|r| (*r).clone())),
            _ => None,
        }
    }

    fn reset_selection(&mut self) {
        if self.visible_rows() > 0 {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn next_view(&mut self) {
        if self.screens.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.screens.len();
        self.on_view_change();
    }

    pub fn previous_view(&mut self) {
        if self.screens.is_empty() {
            return;
        }
        self.current = (self.current + self.screens.len() - 1) % self.screens.len();
        self.on_view_change();
    }

    fn on_view_change(&mut self) {
        self.show_detail = false;
        self.input_mode = InputMode::Normal;
        self.ensure_loaded();
        self.reset_selection();
    }

    pub fn next(&mut self) {
        let len = self.visible_rows();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_rows();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Run a list-view control; reload when the view asks for it.
    fn control(&mut self, f: impl FnOnce(&mut ListView) -> bool) {
        let current = self.current;
        let Some(view) = self.screens.get_mut(current).and_then(Screen::as_list_mut) else {
            return;
        };
        if f(view) {
            self.request_load(current);
        }
        self.reset_selection();
    }

    /// Edit the search term of the current tab, list or dashboard alike.
    fn edit_search(&mut self, edit: impl FnOnce(&mut String)) {
        let current = self.current;
        let Some(screen) = self.screens.get_mut(current) else {
            return;
        };
        let mut term = screen.search().to_string();
        edit(&mut term);
        if screen.set_search(&term) {
            self.request_load(current);
        }
        self.reset_selection();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.edit_search(|term| term.push(c));
    }

    pub fn pop_search_char(&mut self) {
        self.edit_search(|term| {
            term.pop();
        });
    }

    pub fn clear_search(&mut self) {
        self.edit_search(String::clear);
    }

    pub fn cycle_filter(&mut self) {
        self.control(|v| v.cycle_filter());
    }

    pub fn next_page(&mut self) {
        self.control(|v| v.next_page());
    }

    pub fn previous_page(&mut self) {
        self.control(|v| v.prev_page());
    }

    pub fn retry(&mut self) {
        let current = self.current;
        if self.screens.get(current).map(Screen::is_loading).unwrap_or(true) {
            return;
        }
        self.request_load(current);
    }

    pub fn trigger(&mut self, kind: ActionKind) {
        let current = self.current;
        let Some(row) = self.state.selected() else {
            return;
        };
        if let Some(view) = self.screens.get_mut(current).and_then(Screen::as_list_mut) {
            view.dispatch(kind, row);
        }
        self.collect_toasts(current);
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.input_mode == InputMode::Search {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.input_mode = InputMode::Normal,
                KeyCode::Backspace => self.pop_search_char(),
                KeyCode::Char(c) => self.push_search_char(c),
                _ => {}
            }
            return false;
        }

        self.toast = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab => self.next_view(),
            KeyCode::BackTab => self.previous_view(),
            KeyCode::Char('/') => self.input_mode = InputMode::Search,
            KeyCode::Char('x') => self.clear_search(),
            KeyCode::Char('f') => self.cycle_filter(),
            KeyCode::Char('n') | KeyCode::Right => self.next_page(),
            KeyCode::Char('p') | KeyCode::Left => self.previous_page(),
            KeyCode::Char('r') => self.retry(),
            KeyCode::Char('v') => self.trigger(ActionKind::View),
            KeyCode::Char('e') => self.trigger(ActionKind::Edit),
            KeyCode::Char('d') => self.trigger(ActionKind::Delete),
            KeyCode::Enter => self.toggle_detail(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Home => {
                if self.visible_rows() > 0 {
                    self.state.select(Some(0));
                }
            }
            KeyCode::End => {
                let len = self.visible_rows();
                if len > 0 {
                    self.state.select(Some(len - 1));
                }
            }
            _ => {}
        }
        false
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = %err, "dashboard exited with an error");
    }
    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    app.ensure_loaded();
    loop {
        app.poll_loads();
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with view tabs
            Constraint::Length(3), // Search and filter
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_controls(f, chunks[1], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);
        render_content(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_content(f, chunks[2], app);
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, screen) in app.screens.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if i == app.current {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(screen.title().to_string(), style));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn render_controls(f: &mut Frame, area: Rect, app: &App) {
    let Some(screen) = app.screens.get(app.current) else {
        return;
    };
    let searching = app.input_mode == InputMode::Search;

    let mut spans = vec![Span::styled(" Search: ", Style::default().fg(Color::Cyan))];
    if screen.search().is_empty() && !searching {
        spans.push(Span::styled(
            screen.search_placeholder(),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ));
    } else {
        spans.push(Span::raw(screen.search().to_string()));
    }
    if searching {
        spans.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
    }

    // Filters belong to single lists; dashboards share only the search box.
    if let Some(view) = screen.as_list() {
        if let Some(filter) = &view.descriptor().filter {
            let label = view
                .active_filter()
                .map(|o| o.label)
                .unwrap_or_else(|| filter.all_label.clone());
            spans.push(Span::raw("  |  "));
            spans.push(Span::styled(format!("{}: ", filter.label), Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(label, Style::default().fg(Color::Green)));
        }
    }

    let border = if searching { Color::Yellow } else { Color::White };
    let controls = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(format!(" {} ", screen.description())),
    );
    f.render_widget(controls, area);
}

fn cell_style(cell: &FieldCell) -> Style {
    match cell {
        FieldCell::Badge { positive: true, .. } => Style::default().fg(Color::Green),
        FieldCell::Badge { positive: false, .. } => Style::default().fg(Color::DarkGray),
        FieldCell::Placeholder => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        FieldCell::Text { .. } => Style::default(),
    }
}

fn render_content(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(screen) = app.screens.get(app.current) else {
        return;
    };
    match screen {
        Screen::List(view) => render_panel(f, area, view.descriptor(), view.display(), Some(&mut app.state)),
        Screen::Dashboard(dashboard) => {
            let n = dashboard.panels().max(1) as u32;
            let areas = Layout::default()
                .direction(Direction::Vertical)
                .constraints((0..n).map(|_| Constraint::Ratio(1, n)).collect::<Vec<_>>())
                .split(area);
            for (panel, panel_area) in areas.iter().enumerate() {
                if let Some((descriptor, display)) = dashboard.panel_display(panel) {
                    render_panel(f, *panel_area, descriptor, display, None);
                }
            }
        }
    }
}

/// One descriptor's display state. Only the focused list gets a selection.
fn render_panel(
    f: &mut Frame,
    area: Rect,
    descriptor: &ViewDescriptor,
    display: DisplayState<'_>,
    selection: Option<&mut TableState>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(format!(" {} ", descriptor.title));

    let page = match display {
        DisplayState::Loading => {
            let loading = Paragraph::new(format!("Loading {}...", descriptor.title.to_lowercase()))
                .style(Style::default().fg(Color::Cyan))
                .block(block);
            f.render_widget(loading, area);
            return;
        }
        DisplayState::Error { message, retryable } => {
            let mut lines = vec![
                Line::from(""),
                Line::from(Span::styled(
                    format!("  {}", message),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
            ];
            if retryable {
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::raw("  Press "),
                    Span::styled("r", Style::default().fg(Color::Yellow)),
                    Span::raw(" to retry"),
                ]));
            }
            f.render_widget(Paragraph::new(lines).block(block), area);
            return;
        }
        DisplayState::Empty { message } => {
            let empty = Paragraph::new(format!("\n  {}", message))
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(empty, area);
            return;
        }
        DisplayState::Rows(page) => page,
    };

    match descriptor.layout {
        ViewLayout::Table => {
            let header_cells = descriptor.columns.iter().map(|c| {
                Cell::from(c.header.clone()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            });
            let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

            let rows = page.items.iter().map(|record| {
                let cells = format_row(descriptor, record)
                    .cells
                    .into_iter()
                    .map(|cell| Cell::from(truncate(cell.text(), 40)).style(cell_style(&cell)));
                Row::new(cells.collect::<Vec<_>>()).height(1)
            });

            let n = descriptor.columns.len().max(1) as u32;
            let widths: Vec<Constraint> = descriptor.columns.iter().map(|_| Constraint::Ratio(1, n)).collect();

            let table = Table::new(rows, widths)
                .header(header)
                .block(block)
                .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                .highlight_symbol("→ ");

            match selection {
                Some(state) => f.render_stateful_widget(table, area, state),
                None => f.render_widget(table, area),
            }
        }
        ViewLayout::Cards => {
            let selected = selection.and_then(|state| state.selected());
            let mut lines = Vec::new();
            for (i, record) in page.items.iter().enumerate() {
                let marker = if selected == Some(i) { "→ " } else { "  " };
                let mut heading = vec![Span::raw(marker)];
                if let Some(card) = &descriptor.card {
                    heading.push(Span::styled(
                        record.key(&card.title_field).unwrap_or_default(),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ));
                    if let Some(subtitle) = card.subtitle_field.as_deref().and_then(|s| record.key(s)) {
                        heading.push(Span::styled(format!("  {}", subtitle), Style::default().fg(Color::DarkGray)));
                    }
                    if let Some(badge) = &card.badge {
                        let cell = format_field(record, &badge.field, &badge.format);
                        heading.push(Span::raw("  "));
                        heading.push(Span::styled(format!("[{}]", cell.text()), cell_style(&cell)));
                    }
                }
                lines.push(Line::from(heading));
                for (label, cell) in card_lines(descriptor, record) {
                    lines.push(Line::from(vec![
                        Span::styled(format!("    {}: ", label), Style::default().fg(Color::Cyan)),
                        Span::styled(truncate(cell.text(), 60), cell_style(&cell)),
                    ]));
                }
                lines.push(Line::from(""));
            }
            let cards = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
            f.render_widget(cards, area);
        }
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Some(toast) = &app.toast {
        let color = match toast.severity {
            Severity::Error => Color::Red,
            Severity::Info => Color::Green,
        };
        status_spans.push(Span::styled(format!(" {}: ", toast.title), Style::default().fg(color).add_modifier(Modifier::BOLD)));
        status_spans.push(Span::raw(toast.description.clone()));
    } else {
        let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
        status_spans.push(Span::styled(
            format!(" Row: {}/{} ", selected, app.visible_rows()),
            Style::default().fg(Color::Cyan),
        ));
        if let Some(meta) = app.view().and_then(|v| v.page_meta()) {
            status_spans.push(Span::raw(" | "));
            status_spans.push(Span::styled(
                format!("Page {}/{} ({} total)", meta.page, meta.total_pages, meta.total),
                Style::default().fg(Color::Cyan),
            ));
        }
    }

    let hints: [(&str, &str); 7] = [
        ("/", " Search"),
        ("f", " Filter"),
        ("n/p", " Page"),
        ("Enter", " Details"),
        ("e/d/v", " Actions"),
        ("Tab", " View"),
        ("r", " Retry"),
    ];
    for (key, label) in hints {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));
    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Details ");

    let Some(record) = app.selected_record() else {
        f.render_widget(Paragraph::new("No row selected").block(block), area);
        return;
    };

    let mut content = vec![Line::from("")];
    for (field, value) in record.fields() {
        let text = match value {
            serde_json::Value::Null => PLACEHOLDER.to_string(),
            serde_json::Value::String(s) if s.trim().is_empty() => PLACEHOLDER.to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        content.push(Line::from(vec![
            Span::styled(format!("  {}: ", field), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(text),
        ]));
    }
    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let detail_panel = Paragraph::new(content).block(block).wrap(Wrap { trim: false });
    f.render_widget(detail_panel, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::client::MemoryClient;
    use crate::error::LoadError;
    use crate::view::ViewControls;
    use std::sync::Arc;
    use std::time::Instant;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// Block until every in-flight load has been applied.
    fn settle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.screens.iter().any(Screen::is_loading) && Instant::now() < deadline {
            if let Ok((index, completion)) = app.inbox.recv_timeout(Duration::from_millis(50)) {
                app.apply_completion(index, completion);
            }
        }
    }

    fn client() -> Arc<MemoryClient> {
        let currencies = vec![
            Record::new().with("id", "1").with("code", "USD").with("name", "US Dollar").with("is_active", true),
            Record::new().with("id", "2").with("code", "EUR").with("name", "Euro").with("is_active", false),
        ];
        let players = (0..12)
            .map(|i| {
                Record::new()
                    .with("id", format!("p{}", i))
                    .with("first_name", "Sam")
                    .with("last_name", "Kim")
                    .with("email", format!("sam{}@example.com", i))
                    .with("created_at", format!("2024-01-{:02}T00:00:00Z", i + 1))
            })
            .collect();
        let languages = vec![
            Record::new().with("id", "l1").with("code", "en").with("name", "English").with("is_active", true),
            Record::new().with("id", "l2").with("code", "de").with("name", "German").with("is_active", false),
        ];
        Arc::new(
            MemoryClient::new()
                .with_collection("currencies", currencies)
                .with_collection("languages", languages)
                .with_collection("players", players)
                .with_connection("conn"),
        )
    }

    fn app(client: Arc<MemoryClient>) -> App {
        App::new(vec![
            ListView::new(catalog::currencies(), client.clone(), "conn").into(),
            ListView::new(catalog::players(5), client, "conn").into(),
        ])
    }

    #[test]
    fn test_background_load_and_search() {
        let mut app = app(client());
        app.ensure_loaded();
        assert!(app.screens[0].is_loading());
        settle(&mut app);

        assert_eq!(app.visible_rows(), 2);
        assert_eq!(app.state.selected(), Some(0));

        app.handle_key(key(KeyCode::Char('/')));
        for c in "eur".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.visible_rows(), 1);
        assert_eq!(app.selected_record().and_then(|r| r.key("code")), Some("EUR".to_string()));
    }

    #[test]
    fn test_failure_shows_toast_and_retry_reloads() {
        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        let mut app = app(client.clone());
        app.ensure_loaded();
        settle(&mut app);

        let toast = app.toast.clone().unwrap();
        assert_eq!(toast.severity, Severity::Error);
        assert_eq!(toast.description, "connection refused");

        client.clear_failure();
        app.handle_key(key(KeyCode::Char('r')));
        settle(&mut app);
        assert_eq!(client.calls(), 2);
        assert_eq!(app.visible_rows(), 2);
    }

    #[test]
    fn test_server_paged_view_reloads_on_next_page() {
        let client = client();
        let mut app = app(client.clone());
        app.handle_key(key(KeyCode::Tab));
        settle(&mut app);
        assert_eq!(app.visible_rows(), 5);

        app.handle_key(key(KeyCode::Char('n')));
        settle(&mut app);
        assert_eq!(app.screens[1].as_list().map(|v| v.controls().page), Some(2));
        assert_eq!(client.calls(), 2);
    }

    #[test]
    fn test_unwired_action_toast() {
        let mut app = app(client());
        app.handle_key(key(KeyCode::Tab));
        settle(&mut app);

        app.handle_key(key(KeyCode::Char('d')));
        let toast = app.toast.clone().unwrap();
        assert_eq!(toast.title, "Delete is not available yet");

        assert!(app.handle_key(key(KeyCode::Char('q'))));
    }

    #[test]
    fn test_server_page_past_the_end_reloads_last_page() {
        let client = client();
        let controls = ViewControls {
            page: 9,
            ..ViewControls::default()
        };
        let players = ListView::new(catalog::players(5), client.clone(), "conn").with_controls(controls);
        let mut app = App::new(vec![players.into()]);
        app.ensure_loaded();
        settle(&mut app);

        assert_eq!(client.calls(), 2);
        assert_eq!(app.view().map(|v| v.controls().page), Some(3));
        assert_eq!(app.visible_rows(), 2);
    }

    #[test]
    fn test_localization_tab_shares_one_search_box() {
        let client = client();
        let mut app = App::new(vec![
            Dashboard::new(catalog::localization(), client.clone(), "conn").into(),
            ListView::new(catalog::currencies(), client, "conn").into(),
        ]);
        app.ensure_loaded();
        settle(&mut app);
        assert_eq!(app.screens[0].title(), "Localization");
        assert!(app.view().is_none());

        app.handle_key(key(KeyCode::Char('/')));
        for c in "eng".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));

        let Screen::Dashboard(dashboard) = &app.screens[0] else {
            panic!("expected the dashboard tab");
        };
        assert_eq!(dashboard.search(), "eng");
        let (_, currencies) = dashboard.panel_display(0).unwrap();
        assert!(matches!(currencies, DisplayState::Empty { .. }));
        let (_, languages) = dashboard.panel_display(1).unwrap();
        assert!(matches!(languages, DisplayState::Rows(p) if p.items.len() == 1));

        // no rows to act on, no filter to cycle
        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('f')));
        assert!(app.toast.is_none());
    }

    #[test]
    fn test_dashboard_tab_renders_both_panels() {
        use ratatui::backend::TestBackend;

        let client = client();
        let mut app = App::new(vec![Dashboard::new(catalog::localization(), client, "conn").into()]);
        app.ensure_loaded();
        settle(&mut app);

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Localization"));
        assert!(screen.contains("US Dollar"));
        assert!(screen.contains("English"));
    }
}
