pub mod application;
pub mod catalog;
pub mod event_bus;
pub mod layer;
pub mod layer_manager;
pub mod push_channel;
pub mod router;
pub mod sse;
pub mod surface;
pub mod tasks;
pub mod transport;

pub use application::{AppEvent, AppMessage, Application, NOTIFY, RENDER_TASKS};
pub use catalog::Catalog;
pub use event_bus::{EmitError, EventBus};
pub use layer::{ContentSource, Layer, LayerError, LayerOptions, LayerParams, LayerState};
pub use layer_manager::{LayerEvent, LayerManager, HOME_LAYER, LAYER_CHANGE};
pub use push_channel::PushChannel;
pub use router::{RouterError, ServerEventRouter, Signal, SyncState};
pub use surface::{HeadlessSurface, Surface, SurfaceError};
pub use tasks::{TaskError, TaskRegistry};
pub use transport::{
    CatalogSource, ContentFetcher, HttpServerApi, MissingServer, SettingsMap, SettingsSync,
};
