use std::{collections::HashMap, future::Future, sync::Arc};

use shared::{
    domain::{CatalogKind, LayerId, Task, TaskId},
    protocol::{CatalogRecord, PushMessage},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog,
    event_bus::EventBus,
    layer::{LayerError, LayerOptions, LayerParams},
    layer_manager::{ContentOutcome, LayerManager},
    router::{ServerEventRouter, Signal, SyncState},
    tasks::{TaskError, TaskRegistry},
    transport::{CatalogSource, ContentFetcher, MissingServer, SettingsMap, SettingsSync},
};

pub const RENDER_TASKS: &str = "render-tasks";
pub const NOTIFY: &str = "notify";

#[derive(Debug)]
pub enum AppMessage {
    Push(PushMessage),
    ContentLoaded {
        layer_id: LayerId,
        serial: u64,
        result: Result<String, String>,
    },
    CatalogLoaded {
        kind: CatalogKind,
        result: Result<Vec<CatalogRecord>, String>,
    },
    SettingsSynced(Result<SettingsMap, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    TasksChanged(Vec<Task>),
    CatalogChanged {
        kind: CatalogKind,
        records: Vec<CatalogRecord>,
    },
    Notification(String),
}

pub struct Application {
    layers: LayerManager,
    router: ServerEventRouter,
    state: SyncState,
    events: EventBus<AppEvent>,
    context: HashMap<String, String>,
    settings: SettingsMap,
    fetcher: Arc<dyn ContentFetcher>,
    catalog_source: Arc<dyn CatalogSource>,
    settings_sync: Arc<dyn SettingsSync>,
    inbox_tx: mpsc::UnboundedSender<AppMessage>,
    inbox_rx: mpsc::UnboundedReceiver<AppMessage>,
}

impl Application {
    pub fn new(layers: LayerManager, router: ServerEventRouter) -> Self {
        let missing = Arc::new(MissingServer);
        Self::new_with_dependencies(layers, router, missing.clone(), missing.clone(), missing)
    }

    pub fn new_with_dependencies(
        layers: LayerManager,
        router: ServerEventRouter,
        fetcher: Arc<dyn ContentFetcher>,
        catalog_source: Arc<dyn CatalogSource>,
        settings_sync: Arc<dyn SettingsSync>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            layers,
            router,
            state: SyncState::default(),
            events: EventBus::new(),
            context: HashMap::new(),
            settings: SettingsMap::new(),
            fetcher,
            catalog_source,
            settings_sync,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn inbox(&self) -> mpsc::UnboundedSender<AppMessage> {
        self.inbox_tx.clone()
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerManager {
        &mut self.layers
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.state.tasks
    }

    pub fn catalog(&self) -> &Catalog {
        &self.state.catalog
    }

    pub fn settings(&self) -> &SettingsMap {
        &self.settings
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn on<F>(&mut self, event: impl Into<String>, handler: F)
    where
        F: FnMut(&AppEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.events.on(event, handler);
    }

    pub fn open_layer(
        &mut self,
        options: &LayerOptions,
        params: Option<LayerParams>,
    ) -> Result<LayerId, LayerError> {
        let id = self.layers.add_layer(options, params)?;
        if let Some(request) = self.layers.take_content_request(&id) {
            let fetcher = Arc::clone(&self.fetcher);
            let inbox = self.inbox_tx.clone();
            tokio::spawn(async move {
                let result = fetcher
                    .fetch_fragment(&request.path)
                    .await
                    .map_err(|err| format!("{err:#}"));
                let _ = inbox.send(AppMessage::ContentLoaded {
                    layer_id: request.layer_id,
                    serial: request.serial,
                    result,
                });
            });
        }
        Ok(id)
    }

    pub fn show_layer(&mut self, id: &LayerId) -> Result<LayerId, LayerError> {
        self.layers.set_showing_layer(id)
    }

    pub fn open_and_show(
        &mut self,
        options: &LayerOptions,
        params: Option<LayerParams>,
    ) -> Result<LayerId, LayerError> {
        let id = self.open_layer(options, params)?;
        self.show_layer(&id)
    }

    pub fn close_current_layer(
        &mut self,
        fallback: Option<&LayerId>,
    ) -> Result<Option<LayerId>, LayerError> {
        self.layers.remove_current_layer(fallback)
    }

    pub fn dismiss_task(&mut self, id: &TaskId) -> Result<Task, TaskError> {
        let task = self.state.tasks.dismiss(id)?;
        info!(task = %id, "task dismissed");
        self.apply_signal(Signal::RenderTasks);
        Ok(task)
    }

    pub fn bootstrap_catalog(&self) {
        for kind in CatalogKind::ALL {
            let source = Arc::clone(&self.catalog_source);
            let inbox = self.inbox_tx.clone();
            tokio::spawn(async move {
                let result = source
                    .fetch_snapshot(kind)
                    .await
                    .map_err(|err| format!("{err:#}"));
                let _ = inbox.send(AppMessage::CatalogLoaded { kind, result });
            });
        }
    }

    pub fn sync_settings(&self) {
        let sync = Arc::clone(&self.settings_sync);
        let settings = self.settings.clone();
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            let result = sync
                .update_settings(&settings)
                .await
                .map_err(|err| format!("{err:#}"));
            let _ = inbox.send(AppMessage::SettingsSynced(result));
        });
    }

    pub fn handle(&mut self, message: AppMessage) {
        match message {
            AppMessage::Push(message) => match self.router.dispatch(&mut self.state, &message) {
                Ok(signal) => self.apply_signal(signal),
                Err(err) => warn!(event = %message.event, error = %err, "dropping push event"),
            },
            AppMessage::ContentLoaded {
                layer_id,
                serial,
                result,
            } => {
                let outcome = self.layers.apply_content(&layer_id, serial, result);
                debug!(layer = %layer_id, ?outcome, "layer content settled");
                if outcome == ContentOutcome::Applied {
                    info!(layer = %layer_id, "layer content loaded");
                }
            }
            AppMessage::CatalogLoaded { kind, result } => match result {
                Ok(records) => {
                    info!(%kind, count = records.len(), "catalog snapshot loaded");
                    self.state.catalog.merge_snapshot(kind, records);
                    self.apply_signal(Signal::RenderCatalog(kind));
                }
                Err(err) => warn!(%kind, error = %err, "catalog snapshot failed"),
            },
            AppMessage::SettingsSynced(result) => match result {
                Ok(settings) => {
                    debug!(count = settings.len(), "settings synced");
                    self.settings = settings;
                }
                Err(err) => warn!(error = %err, "settings sync failed"),
            },
        }
    }

    fn apply_signal(&mut self, signal: Signal) {
        let (event, payload) = match signal {
            Signal::RenderTasks => (
                RENDER_TASKS,
                AppEvent::TasksChanged(self.state.tasks.snapshot()),
            ),
            Signal::RenderCatalog(kind) => (
                kind.render_event(),
                AppEvent::CatalogChanged {
                    kind,
                    records: self.state.catalog.sorted_by_name(kind),
                },
            ),
            Signal::Notify(text) => (NOTIFY, AppEvent::Notification(text)),
            Signal::Ignored => return,
        };
        if let Err(err) = self.events.emit(event, &payload) {
            warn!(event = event, error = %err, "application event handler failed");
        }
    }

    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    pub async fn step(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(message) => {
                self.handle(message);
                true
            }
            None => false,
        }
    }

    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let message = tokio::select! {
                _ = &mut shutdown => {
                    info!("application loop shutting down");
                    return;
                }
                message = self.inbox_rx.recv() => message,
            };
            match message {
                Some(message) => self.handle(message),
                None => return,
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/application_tests.rs"]
mod tests;
