use std::collections::HashMap;

use shared::domain::LayerId;
use tracing::{debug, info, warn};

use crate::{
    event_bus::EventBus,
    layer::{ContentRequest, Layer, LayerError, LayerOptions, LayerParams},
    surface::Surface,
};

pub const HOME_LAYER: &str = "home-layer";

pub const LAYER_CHANGE: &str = "layer-change";
pub const LAYER_ADDED: &str = "layer-added";
pub const LAYER_REMOVED: &str = "layer-removed";
pub const LAYER_CONTENT: &str = "layer-content";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerEvent {
    Changed {
        layer: LayerId,
        fell_back: bool,
    },
    Added(LayerId),
    Removed(LayerId),
    ContentLoaded {
        layer: LayerId,
        ok: bool,
    },
}

impl LayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LayerEvent::Changed { .. } => LAYER_CHANGE,
            LayerEvent::Added(_) => LAYER_ADDED,
            LayerEvent::Removed(_) => LAYER_REMOVED,
            LayerEvent::ContentLoaded { .. } => LAYER_CONTENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    Applied,
    Failed,
    Stale,
}

pub struct LayerManager {
    surface: Box<dyn Surface>,
    layers: HashMap<LayerId, Layer>,
    order: Vec<LayerId>,
    counter: u64,
    serial: u64,
    home: LayerId,
    events: EventBus<LayerEvent>,
}

impl LayerManager {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self::with_home(surface, LayerId::from(HOME_LAYER))
    }

    pub fn with_home(surface: Box<dyn Surface>, home: LayerId) -> Self {
        Self {
            surface,
            layers: HashMap::new(),
            order: Vec::new(),
            counter: 0,
            serial: 0,
            home,
            events: EventBus::new(),
        }
    }

    pub fn home(&self) -> &LayerId {
        &self.home
    }

    pub fn on<F>(&mut self, event: impl Into<String>, handler: F)
    where
        F: FnMut(&LayerEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.events.on(event, handler);
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.layers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer_ids(&self) -> &[LayerId] {
        &self.order
    }

    pub fn get_showing_layer(&self) -> Option<&Layer> {
        self.order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .find(|layer| layer.is_showing())
    }

    fn showing_id(&self) -> Option<LayerId> {
        self.get_showing_layer().map(|layer| layer.id().clone())
    }

    fn next_counter(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn allocate_id(&mut self, options: &LayerOptions, has_params: bool) -> LayerId {
        if let Some(container) = &options.container {
            return container.clone();
        }
        match &options.name {
            Some(name) if !has_params && !self.contains(&LayerId::from(name.as_str())) => {
                LayerId::from(name.as_str())
            }
            Some(name) => LayerId::new(format!("{name}-{}", self.next_counter())),
            None => LayerId::new(format!("action-layer-{}", self.next_counter())),
        }
    }

    pub fn create_layer(
        &mut self,
        options: &LayerOptions,
        params: Option<LayerParams>,
    ) -> Result<Layer, LayerError> {
        let id = self.allocate_id(options, params.is_some());
        self.serial += 1;
        Layer::new(id, self.serial, options, params)
    }

    pub fn add(&mut self, mut layer: Layer) -> Result<LayerId, LayerError> {
        let id = layer.id().clone();
        layer.attach(self.surface.as_mut())?;
        if let Err(err) = layer.hide(self.surface.as_mut()) {
            debug!(layer = %id, error = %err, "initial hide failed");
        }

        match self.layers.insert(id.clone(), layer) {
            Some(previous) => {
                // The surface already swapped the container under this id.
                warn!(layer = %id, serial = previous.serial(), "layer id collision; replaced registered layer");
                self.emit(LayerEvent::Removed(id.clone()));
            }
            None => self.order.push(id.clone()),
        }
        debug!(layer = %id, "layer added");
        self.emit(LayerEvent::Added(id.clone()));

        if self.get_showing_layer().is_none() {
            match self.show(&id) {
                Ok(()) => self.emit(LayerEvent::Changed {
                    layer: id.clone(),
                    fell_back: false,
                }),
                Err(err) => warn!(layer = %id, error = %err, "could not show first layer"),
            }
        }
        Ok(id)
    }

    pub fn add_layer(
        &mut self,
        options: &LayerOptions,
        params: Option<LayerParams>,
    ) -> Result<LayerId, LayerError> {
        let layer = self.create_layer(options, params)?;
        self.add(layer)
    }

    fn show(&mut self, id: &LayerId) -> Result<(), LayerError> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| LayerError::UnknownLayer(id.clone()))?;
        layer.show(self.surface.as_mut())
    }

    pub fn set_showing_layer(&mut self, id: &LayerId) -> Result<LayerId, LayerError> {
        if let Some(current) = self.showing_id() {
            if let Some(layer) = self.layers.get_mut(&current) {
                if let Err(err) = layer.hide(self.surface.as_mut()) {
                    debug!(layer = %current, error = %err, "ignoring hide failure");
                }
            }
        }

        let (shown, fell_back) = match self.show(id) {
            Ok(()) => (id.clone(), false),
            Err(err) => {
                warn!(layer = %id, error = %err, home = %self.home, "falling back to home layer");
                let home = self.home.clone();
                self.show(&home)
                    .map_err(|home_err| LayerError::HomeUnavailable {
                        home: home.clone(),
                        requested: id.clone(),
                        source: Box::new(home_err),
                    })?;
                (home, true)
            }
        };

        info!(layer = %shown, fell_back, "layer change");
        self.emit(LayerEvent::Changed {
            layer: shown.clone(),
            fell_back,
        });
        Ok(shown)
    }

    pub fn remove_layer(&mut self, id: &LayerId) -> bool {
        let Some(layer) = self.layers.remove(id) else {
            return false;
        };
        self.order.retain(|existing| existing != id);
        if layer.is_showing() {
            warn!(layer = %id, "removed the showing layer; nothing visible until the next switch");
        }
        layer.dispose(self.surface.as_mut());
        self.emit(LayerEvent::Removed(id.clone()));
        true
    }

    /// Shows `fallback` (home when `None`) and only then disposes the layer
    /// that was showing before. Returns the disposed layer's id.
    pub fn remove_current_layer(
        &mut self,
        fallback: Option<&LayerId>,
    ) -> Result<Option<LayerId>, LayerError> {
        let fallback = fallback.cloned().unwrap_or_else(|| self.home.clone());
        let previous = self.showing_id();
        let shown = self.set_showing_layer(&fallback)?;

        match previous {
            Some(previous) if previous != shown => {
                self.remove_layer(&previous);
                Ok(Some(previous))
            }
            Some(previous) => {
                warn!(layer = %previous, "showing layer is also the fallback; keeping it");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn take_content_request(&mut self, id: &LayerId) -> Option<ContentRequest> {
        self.layers.get_mut(id)?.begin_fetch()
    }

    /// Applies a finished fetch. Completions for a layer instance that is no
    /// longer registered are dropped.
    pub fn apply_content(
        &mut self,
        id: &LayerId,
        serial: u64,
        result: Result<String, String>,
    ) -> ContentOutcome {
        let Some(layer) = self
            .layers
            .get_mut(id)
            .filter(|layer| layer.serial() == serial)
        else {
            debug!(layer = %id, serial, "dropping content for disposed layer");
            return ContentOutcome::Stale;
        };

        let outcome = match result {
            Ok(html) => match layer.fill(self.surface.as_mut(), &html) {
                Ok(()) => ContentOutcome::Applied,
                Err(err) => {
                    warn!(layer = %id, error = %err, "failed to apply layer content");
                    layer.mark_failed(err.to_string());
                    ContentOutcome::Failed
                }
            },
            Err(reason) => {
                warn!(layer = %id, error = %reason, "layer content fetch failed; leaving it blank");
                layer.mark_failed(reason);
                ContentOutcome::Failed
            }
        };

        self.emit(LayerEvent::ContentLoaded {
            layer: id.clone(),
            ok: outcome == ContentOutcome::Applied,
        });
        outcome
    }

    fn emit(&mut self, event: LayerEvent) {
        if let Err(err) = self.events.emit(event.name(), &event) {
            warn!(event = event.name(), error = %err, "layer event handler failed");
        }
    }
}

#[cfg(test)]
#[path = "tests/layer_manager_tests.rs"]
mod tests;
