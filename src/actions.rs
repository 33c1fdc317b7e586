// Row actions (view / edit / delete) as callback slots
//
// Nothing in this crate mutates backend data. A view declares which actions
// it offers; a surface may plug a handler into a slot, and an empty slot
// answers NotWired instead of pretending to do something.

use crate::notify::Notification;
use crate::record::Record;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    View,
    Edit,
    Delete,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::View => "View details",
            ActionKind::Edit => "Edit",
            ActionKind::Delete => "Delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub type ActionHandler = Arc<dyn Fn(&Record) -> Notification + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Handled(Notification),
    NotWired(Notification),
    /// The view does not offer this action at all.
    Unavailable,
}

impl ActionOutcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            ActionOutcome::Handled(n) | ActionOutcome::NotWired(n) => Some(n),
            ActionOutcome::Unavailable => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct ActionHooks {
    offered: Vec<ActionKind>,
    handlers: HashMap<ActionKind, ActionHandler>,
}

impl ActionHooks {
    pub fn offering(kinds: &[ActionKind]) -> Self {
        ActionHooks {
            offered: kinds.to_vec(),
            handlers: HashMap::new(),
        }
    }

    pub fn offered(&self) -> &[ActionKind] {
        &self.offered
    }

    pub fn is_wired(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Plug a handler into an offered slot.
    pub fn wire<F>(&mut self, kind: ActionKind, handler: F)
    where
        F: Fn(&Record) -> Notification + Send + Sync + 'static,
    {
        if !self.offered.contains(&kind) {
            self.offered.push(kind);
        }
        self.handlers.insert(kind, Arc::new(handler));
    }

    /// `subject` names the row in the fallback notification.
    pub fn dispatch(&self, kind: ActionKind, record: &Record, subject: &str) -> ActionOutcome {
        if !self.offered.contains(&kind) {
            return ActionOutcome::Unavailable;
        }
        match self.handlers.get(&kind) {
            Some(handler) => ActionOutcome::Handled(handler(record)),
            None => ActionOutcome::NotWired(Notification::info(
                format!("{} is not available yet", kind.label()),
                subject.to_string(),
            )),
        }
    }
}

impl fmt::Debug for ActionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wired: Vec<&ActionKind> = self.handlers.keys().collect();
        wired.sort_by_key(|k| k.label());
        f.debug_struct("ActionHooks")
            .field("offered", &self.offered)
            .field("wired", &wired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwired_slot_reports_not_wired() {
        let hooks = ActionHooks::offering(&[ActionKind::Edit, ActionKind::Delete]);
        let record = Record::new().with("name", "OpenAI");

        let outcome = hooks.dispatch(ActionKind::Edit, &record, "OpenAI");
        let ActionOutcome::NotWired(n) = &outcome else {
            panic!("expected NotWired, got {:?}", outcome);
        };
        assert_eq!(n.title, "Edit is not available yet");
        assert_eq!(n.description, "OpenAI");

        assert_eq!(hooks.dispatch(ActionKind::View, &record, "OpenAI"), ActionOutcome::Unavailable);
    }

    #[test]
    fn test_wired_slot_runs_handler() {
        let mut hooks = ActionHooks::offering(&[ActionKind::View]);
        hooks.wire(ActionKind::View, |record| {
            Notification::info("View", record.text("name").unwrap_or_default())
        });

        assert!(hooks.is_wired(ActionKind::View));
        let outcome = hooks.dispatch(ActionKind::View, &Record::new().with("name", "Acme"), "Acme");
        assert_eq!(outcome, ActionOutcome::Handled(Notification::info("View", "Acme")));
    }
}
