use std::collections::BTreeMap;

use shared::domain::LayerId;
use thiserror::Error;
use tracing::debug;

use crate::surface::{Container, Surface, SurfaceError};

pub type LayerParams = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("no layer registered with id `{0}`")]
    UnknownLayer(LayerId),
    #[error("content template `{template}` references missing parameter `{key}`")]
    MissingTemplateParam { template: String, key: String },
    #[error("content template `{0}` has an unterminated placeholder")]
    MalformedTemplate(String),
    #[error("home layer `{home}` could not be shown after `{requested}` failed: {source}")]
    HomeUnavailable {
        home: LayerId,
        requested: LayerId,
        #[source]
        source: Box<LayerError>,
    },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Path(String),
    Template(String),
}

impl ContentSource {
    pub fn resolve(&self, params: Option<&LayerParams>) -> Result<String, LayerError> {
        match self {
            ContentSource::Path(path) => Ok(path.clone()),
            ContentSource::Template(template) => interpolate(template, params),
        }
    }
}

fn interpolate(template: &str, params: Option<&LayerParams>) -> Result<String, LayerError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| LayerError::MalformedTemplate(template.to_string()))?;
        let key = &after[..end];
        let value = params.and_then(|params| params.get(key)).ok_or_else(|| {
            LayerError::MissingTemplateParam {
                template: template.to_string(),
                key: key.to_string(),
            }
        })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerOptions {
    pub name: Option<String>,
    pub content: Option<ContentSource>,
    pub container: Option<LayerId>,
}

impl LayerOptions {
    pub fn adopt(container: impl Into<LayerId>) -> Self {
        let container = container.into();
        Self {
            name: Some(container.to_string()),
            content: None,
            container: Some(container),
        }
    }

    pub fn remote(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: Some(ContentSource::Path(path.into())),
            container: None,
        }
    }

    pub fn templated(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: Some(ContentSource::Template(template.into())),
            container: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPhase {
    Pending,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Created,
    Loading,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub layer_id: LayerId,
    pub serial: u64,
    pub path: String,
}

#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    name: String,
    serial: u64,
    source: Option<String>,
    params: Option<LayerParams>,
    container: Container,
    phase: ContentPhase,
    attached: bool,
    showing: bool,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        serial: u64,
        options: &LayerOptions,
        params: Option<LayerParams>,
    ) -> Result<Self, LayerError> {
        let adopted = options.container.is_some();
        let source = if adopted {
            None
        } else {
            options
                .content
                .as_ref()
                .map(|content| content.resolve(params.as_ref()))
                .transpose()?
        };
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| format!("layer-{id}"));
        let phase = if source.is_some() {
            ContentPhase::Pending
        } else {
            ContentPhase::Ready
        };

        Ok(Self {
            container: Container {
                id: id.clone(),
                name: name.clone(),
                adopted,
            },
            id,
            name,
            serial,
            source,
            params,
            phase,
            attached: false,
            showing: false,
        })
    }

    pub fn id(&self) -> &LayerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn content_source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn params(&self) -> Option<&LayerParams> {
        self.params.as_ref()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn phase(&self) -> &ContentPhase {
        &self.phase
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn state(&self) -> LayerState {
        if !self.attached {
            LayerState::Created
        } else if self.showing {
            LayerState::Visible
        } else if matches!(self.phase, ContentPhase::Pending | ContentPhase::Loading) {
            LayerState::Loading
        } else {
            LayerState::Hidden
        }
    }

    pub fn show(&mut self, surface: &mut dyn Surface) -> Result<(), LayerError> {
        surface.set_visible(&self.id, true)?;
        self.showing = true;
        Ok(())
    }

    /// The layer stops counting as showing even when the surface refuses.
    pub fn hide(&mut self, surface: &mut dyn Surface) -> Result<(), LayerError> {
        self.showing = false;
        surface.set_visible(&self.id, false)?;
        Ok(())
    }

    pub(crate) fn attach(&mut self, surface: &mut dyn Surface) -> Result<(), LayerError> {
        surface.attach(&self.container)?;
        self.attached = true;
        Ok(())
    }

    pub(crate) fn begin_fetch(&mut self) -> Option<ContentRequest> {
        if self.phase != ContentPhase::Pending {
            return None;
        }
        let path = self.source.clone()?;
        self.phase = ContentPhase::Loading;
        Some(ContentRequest {
            layer_id: self.id.clone(),
            serial: self.serial,
            path,
        })
    }

    pub(crate) fn fill(&mut self, surface: &mut dyn Surface, html: &str) -> Result<(), LayerError> {
        surface.set_content(&self.id, html)?;
        self.phase = ContentPhase::Ready;
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        self.phase = ContentPhase::Failed(reason.into());
    }

    pub(crate) fn dispose(self, surface: &mut dyn Surface) {
        debug!(layer = %self.id, serial = self.serial, "disposing layer");
        surface.detach(&self.id);
    }
}
