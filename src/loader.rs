// Data loader - idle -> loading -> (loaded | failed), re-enterable
//
// A load is split into begin / run / complete so the I/O can happen on
// another thread while the owner keeps rendering. Each begin hands out a
// fresh ticket; only the newest ticket may complete, so a slow earlier
// request can never overwrite a later one.

use crate::client::DataClient;
use crate::error::{LoadError, LoadResult};
use crate::notify::{Notification, Notifications};
use crate::paginate::PageWindow;
use crate::query::{Fetched, QueryRequest};
use crate::record::Record;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(LoadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// A load that has begun but not run yet. `Send`, so it can be moved to a
/// worker thread.
pub struct PendingLoad {
    ticket: LoadTicket,
    label: String,
    client: Arc<dyn DataClient>,
    requests: Vec<QueryRequest>,
}

/// Result of running a pending load, to be handed back to its loader.
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: LoadResult<Vec<Fetched>>,
}

impl PendingLoad {
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Execute every request in order; the first failure aborts the load.
    pub fn run(self) -> LoadCompletion {
        let started = Instant::now();
        let mut fetched = Vec::with_capacity(self.requests.len());
        let mut failure = None;

        for request in &self.requests {
            debug!(
                view = %self.label,
                target = request.target(),
                backend = self.client.backend(),
                "executing query"
            );
            match self.client.execute(request).into_result() {
                Ok(result) => fetched.push(result),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = match failure {
            Some(e) => {
                warn!(view = %self.label, kind = e.kind(), error = %e, elapsed_ms, "load failed");
                Err(e)
            }
            None => {
                let rows: usize = fetched.iter().map(|f| f.records.len()).sum();
                info!(view = %self.label, rows, elapsed_ms, "load finished");
                Ok(fetched)
            }
        };

        LoadCompletion {
            ticket: self.ticket,
            result,
        }
    }
}

/// Owns one view's requests, its loaded rows and its loading/error state.
pub struct Loader {
    label: String,
    client: Arc<dyn DataClient>,
    requests: Vec<QueryRequest>,
    window: Option<PageWindow>,
    state: LoadState,
    results: Vec<Fetched>,
    next_ticket: u64,
    in_flight: Option<LoadTicket>,
    attempts: usize,
    notifications: Notifications,
}

impl Loader {
    pub fn new(label: &str, client: Arc<dyn DataClient>, requests: Vec<QueryRequest>) -> Self {
        Loader {
            label: label.to_string(),
            client,
            requests,
            window: None,
            state: LoadState::Idle,
            results: Vec::new(),
            next_ticket: 0,
            in_flight: None,
            attempts: 0,
            notifications: Notifications::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Restrict select requests to a page window on the next load.
    pub fn set_window(&mut self, window: Option<PageWindow>) {
        self.window = window;
    }

    pub fn window(&self) -> Option<PageWindow> {
        self.window
    }

    /// Requests as they will be sent, window applied.
    pub fn effective_requests(&self) -> Vec<QueryRequest> {
        match self.window {
            Some(window) => self
                .requests
                .iter()
                .map(|r| r.windowed(window.range()))
                .collect(),
            None => self.requests.clone(),
        }
    }

    /// Enter the loading state and hand out the work. Any earlier pending
    /// load becomes stale.
    pub fn begin(&mut self) -> PendingLoad {
        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        self.in_flight = Some(ticket);
        self.state = LoadState::Loading;
        self.attempts += 1;

        info!(view = %self.label, ticket = ticket.0, "load started");

        PendingLoad {
            ticket,
            label: self.label.clone(),
            client: Arc::clone(&self.client),
            requests: self.effective_requests(),
        }
    }

    /// Apply a finished load. Returns false (and changes nothing) when the
    /// completion belongs to a superseded load.
    pub fn complete(&mut self, completion: LoadCompletion) -> bool {
        if self.in_flight != Some(completion.ticket) {
            debug!(view = %self.label, ticket = completion.ticket.0, "dropping stale load result");
            return false;
        }
        self.in_flight = None;

        match completion.result {
            Ok(results) => {
                self.results = results;
                self.state = LoadState::Loaded;
            }
            Err(e) => {
                self.results.clear();
                self.notifications.push(Notification::error(
                    format!("Error loading {}", self.label),
                    e.to_string(),
                ));
                self.state = LoadState::Failed(e);
            }
        }
        true
    }

    /// Run a full load on the calling thread.
    pub fn load(&mut self) -> LoadResult<()> {
        let pending = self.begin();
        let completion = pending.run();
        self.complete(completion);
        match &self.state {
            LoadState::Failed(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    /// Re-run the last load unchanged. Never invoked automatically.
    pub fn retry(&mut self) -> LoadResult<()> {
        info!(view = %self.label, "manual retry");
        self.load()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Rows of one request slot; empty before the first successful load.
    pub fn records(&self, slot: usize) -> &[Record] {
        self.results
            .get(slot)
            .map(|f| f.records.as_slice())
            .unwrap_or(&[])
    }

    /// Server-reported total of one slot, if any.
    pub fn reported_total(&self, slot: usize) -> Option<u64> {
        self.results.get(slot).and_then(|f| f.count)
    }

    pub fn slots(&self) -> usize {
        self.requests.len()
    }

    /// Number of loads begun so far (initial load included).
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::query::TableQuery;

    fn client() -> Arc<MemoryClient> {
        Arc::new(
            MemoryClient::new()
                .with_collection(
                    "currencies",
                    vec![
                        Record::new().with("code", "USD").with("name", "US Dollar").with("is_active", true),
                        Record::new().with("code", "EUR").with("name", "Euro").with("is_active", false),
                    ],
                )
                .with_collection("languages", vec![Record::new().with("code", "en")]),
        )
    }

    fn loader(client: Arc<MemoryClient>) -> Loader {
        Loader::new(
            "currencies",
            client,
            vec![TableQuery::from("currencies").order("name", true).into()],
        )
    }

    #[test]
    fn test_loading_flag_only_while_in_flight() {
        let mut loader = loader(client());
        assert_eq!(loader.state(), &LoadState::Idle);
        assert!(!loader.is_loading());

        let pending = loader.begin();
        assert!(loader.is_loading());

        let completion = pending.run();
        assert!(loader.is_loading());
        assert!(loader.complete(completion));
        assert!(!loader.is_loading());
        assert_eq!(loader.state(), &LoadState::Loaded);
        assert_eq!(loader.records(0).len(), 2);
        assert_eq!(loader.records(0)[0].text("code"), Some("EUR"));
    }

    #[test]
    fn test_loading_flag_cleared_after_failure() {
        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        let mut loader = loader(client);

        let pending = loader.begin();
        assert!(loader.is_loading());
        loader.complete(pending.run());
        assert!(!loader.is_loading());
        assert_eq!(loader.error().map(|e| e.to_string()), Some("connection refused".to_string()));
    }

    #[test]
    fn test_failure_resets_records_and_notifies() {
        let client = client();
        let mut loader = loader(Arc::clone(&client));
        loader.load().unwrap();
        assert_eq!(loader.records(0).len(), 2);

        client.fail_with(LoadError::query("connection refused"));
        let err = loader.load().unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
        assert!(loader.records(0).is_empty());

        let toast = loader.notifications().latest().unwrap();
        assert_eq!(toast.title, "Error loading currencies");
        assert_eq!(toast.description, "connection refused");
    }

    #[test]
    fn test_retry_reinvokes_the_same_load_once() {
        let client = client();
        client.fail_with(LoadError::query("connection refused"));
        let mut loader = loader(Arc::clone(&client));

        assert!(loader.load().is_err());
        assert_eq!(client.calls(), 1);

        client.clear_failure();
        loader.retry().unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(loader.attempts(), 2);
        assert_eq!(loader.records(0).len(), 2);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut loader = loader(client());
        let first = loader.begin();
        let second = loader.begin();
        assert!(first.ticket() < second.ticket());

        assert!(!loader.complete(first.run()));
        assert!(loader.is_loading());
        assert!(loader.complete(second.run()));
        assert_eq!(loader.state(), &LoadState::Loaded);
    }

    #[test]
    fn test_multi_request_load_aborts_on_first_failure() {
        let client = client();
        let mut loader = Loader::new(
            "localization",
            client.clone(),
            vec![
                TableQuery::from("currencies").into(),
                TableQuery::from("missing").into(),
                TableQuery::from("languages").into(),
            ],
        );

        let err = loader.load().unwrap_err();
        assert_eq!(err, LoadError::UnknownCollection("missing".to_string()));
        assert_eq!(client.calls(), 2);
        assert!(loader.records(0).is_empty());
    }

    #[test]
    fn test_window_is_applied_to_selects() {
        let client = client();
        let mut loader = loader(client);
        loader.set_window(Some(PageWindow::new(2, 1)));
        loader.load().unwrap();

        assert_eq!(loader.records(0).len(), 1);
        assert_eq!(loader.records(0)[0].text("code"), Some("USD"));
        assert_eq!(loader.reported_total(0), Some(2));
    }
}
