use std::collections::HashMap;

use serde_json::Value;
use shared::{
    domain::CatalogKind,
    error::ProtocolError,
    protocol::{CatalogRecord, PushEventKind, PushMessage, TaskNotice},
};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{catalog::Catalog, tasks::TaskRegistry};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Default)]
pub struct SyncState {
    pub tasks: TaskRegistry,
    pub catalog: Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    RenderTasks,
    RenderCatalog(CatalogKind),
    Notify(String),
    Ignored,
}

pub type PushHandler = fn(&mut SyncState, &PushMessage) -> Result<Signal, RouterError>;

pub struct ServerEventRouter {
    handlers: HashMap<String, PushHandler>,
}

impl Default for ServerEventRouter {
    fn default() -> Self {
        Self::standard()
    }
}

impl ServerEventRouter {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut router = Self::empty();
        router.register(PushEventKind::Update.name(), handle_update);
        router.register(PushEventKind::TaskQueued.name(), handle_task_queued);
        router.register(PushEventKind::TaskStart.name(), handle_task_start);
        router.register(PushEventKind::TaskComplete.name(), handle_task_complete);
        router.register(PushEventKind::NewSample.name(), handle_new_sample);
        router.register(PushEventKind::NewHypothesis.name(), handle_new_hypothesis);
        router.register(
            PushEventKind::NewHypothesisSampleMatch.name(),
            handle_new_hypothesis_sample_match,
        );
        router
    }

    pub fn register(&mut self, event: impl Into<String>, handler: PushHandler) {
        self.handlers.insert(event.into(), handler);
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn dispatch(
        &self,
        state: &mut SyncState,
        message: &PushMessage,
    ) -> Result<Signal, RouterError> {
        let Some(handler) = self.handlers.get(&message.event) else {
            trace!(event = %message.event, "no handler for push event");
            return Ok(Signal::Ignored);
        };
        debug!(event = %message.event, id = ?message.id, "dispatching push event");
        handler(state, message)
    }
}

pub fn handle_update(_state: &mut SyncState, message: &PushMessage) -> Result<Signal, RouterError> {
    let text = match message.decode::<Value>()? {
        Value::String(text) => text,
        other => other.to_string(),
    };
    Ok(Signal::Notify(text.replace('"', "")))
}

pub fn handle_task_queued(
    state: &mut SyncState,
    message: &PushMessage,
) -> Result<Signal, RouterError> {
    let notice: TaskNotice = message.decode()?;
    state.tasks.queued(notice.id, notice.name);
    Ok(Signal::RenderTasks)
}

pub fn handle_task_start(
    state: &mut SyncState,
    message: &PushMessage,
) -> Result<Signal, RouterError> {
    let notice: TaskNotice = message.decode()?;
    state.tasks.started(notice.id, notice.name);
    Ok(Signal::RenderTasks)
}

pub fn handle_task_complete(
    state: &mut SyncState,
    message: &PushMessage,
) -> Result<Signal, RouterError> {
    let notice: TaskNotice = message.decode()?;
    state.tasks.completed(notice.id, notice.name);
    Ok(Signal::RenderTasks)
}

fn upsert_catalog(
    state: &mut SyncState,
    message: &PushMessage,
    kind: CatalogKind,
) -> Result<Signal, RouterError> {
    let record: CatalogRecord = message.decode()?;
    if state.catalog.upsert(kind, record) {
        debug!(%kind, "catalog entry added");
    }
    Ok(Signal::RenderCatalog(kind))
}

pub fn handle_new_sample(
    state: &mut SyncState,
    message: &PushMessage,
) -> Result<Signal, RouterError> {
    upsert_catalog(state, message, CatalogKind::Samples)
}

pub fn handle_new_hypothesis(
    state: &mut SyncState,
    message: &PushMessage,
) -> Result<Signal, RouterError> {
    upsert_catalog(state, message, CatalogKind::Hypotheses)
}

pub fn handle_new_hypothesis_sample_match(
    state: &mut SyncState,
    message: &PushMessage,
) -> Result<Signal, RouterError> {
    upsert_catalog(state, message, CatalogKind::HypothesisSampleMatches)
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
