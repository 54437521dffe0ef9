use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::LayerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("container `{0}` is not attached")]
    NotAttached(LayerId),
    #[error("no pre-rendered container `{0}` to adopt")]
    UnknownContainer(LayerId),
    #[error("surface rejected operation on `{layer}`: {reason}")]
    Rejected { layer: LayerId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: LayerId,
    pub name: String,
    pub adopted: bool,
}

pub trait Surface: Send {
    /// Attaching an id that is already mounted replaces that container.
    fn attach(&mut self, container: &Container) -> Result<(), SurfaceError>;
    fn set_visible(&mut self, layer: &LayerId, visible: bool) -> Result<(), SurfaceError>;
    fn set_content(&mut self, layer: &LayerId, html: &str) -> Result<(), SurfaceError>;
    fn detach(&mut self, layer: &LayerId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Attach(LayerId),
    Show(LayerId),
    Hide(LayerId),
    Content(LayerId),
    Detach(LayerId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountedContainer {
    pub name: String,
    pub html: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Default)]
struct HeadlessState {
    prerendered: HashMap<LayerId, String>,
    mounted: Vec<(LayerId, MountedContainer)>,
    journal: Vec<SurfaceOp>,
}

impl HeadlessState {
    fn mounted_mut(&mut self, layer: &LayerId) -> Result<&mut MountedContainer, SurfaceError> {
        self.mounted
            .iter_mut()
            .find(|(id, _)| id == layer)
            .map(|(_, container)| container)
            .ok_or_else(|| SurfaceError::NotAttached(layer.clone()))
    }
}

/// In-memory surface. Clones share state, so a caller can keep a handle
/// after boxing one into a manager.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prerendered(self, id: impl Into<LayerId>, html: impl Into<String>) -> Self {
        self.lock().prerendered.insert(id.into(), html.into());
        self
    }

    pub fn mounted(&self, layer: &LayerId) -> Option<MountedContainer> {
        self.lock()
            .mounted
            .iter()
            .find(|(id, _)| id == layer)
            .map(|(_, container)| container.clone())
    }

    pub fn mounted_ids(&self) -> Vec<LayerId> {
        self.lock().mounted.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn visible_ids(&self) -> Vec<LayerId> {
        self.lock()
            .mounted
            .iter()
            .filter(|(_, container)| container.visible)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn journal(&self) -> Vec<SurfaceOp> {
        self.lock().journal.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for HeadlessSurface {
    fn attach(&mut self, container: &Container) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        let html = if container.adopted {
            let html = state
                .prerendered
                .get(&container.id)
                .cloned()
                .ok_or_else(|| SurfaceError::UnknownContainer(container.id.clone()))?;
            Some(html)
        } else {
            None
        };
        state.mounted.retain(|(id, _)| id != &container.id);
        state.mounted.push((
            container.id.clone(),
            MountedContainer {
                name: container.name.clone(),
                html,
                visible: false,
            },
        ));
        state.journal.push(SurfaceOp::Attach(container.id.clone()));
        Ok(())
    }

    fn set_visible(&mut self, layer: &LayerId, visible: bool) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        state.mounted_mut(layer)?.visible = visible;
        let op = if visible {
            SurfaceOp::Show(layer.clone())
        } else {
            SurfaceOp::Hide(layer.clone())
        };
        state.journal.push(op);
        Ok(())
    }

    fn set_content(&mut self, layer: &LayerId, html: &str) -> Result<(), SurfaceError> {
        let mut state = self.lock();
        state.mounted_mut(layer)?.html = Some(html.to_string());
        state.journal.push(SurfaceOp::Content(layer.clone()));
        Ok(())
    }

    fn detach(&mut self, layer: &LayerId) {
        let mut state = self.lock();
        state.mounted.retain(|(id, _)| id != layer);
        state.journal.push(SurfaceOp::Detach(layer.clone()));
    }
}
