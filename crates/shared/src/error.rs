use thiserror::Error;

use crate::domain::CatalogKind;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed `{event}` payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} snapshot must be a JSON object or array, got {found}")]
    UnexpectedSnapshotShape { kind: CatalogKind, found: &'static str },
    #[error("{kind} snapshot entry `{key}` is not a JSON object")]
    InvalidSnapshotEntry { kind: CatalogKind, key: String },
}

impl ProtocolError {
    pub fn invalid_payload(event: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            source,
        }
    }
}
