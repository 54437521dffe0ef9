use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{CatalogKind, EntityId, TaskId},
    error::ProtocolError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub id: Option<String>,
    pub event: String,
    pub data: String,
}

impl PushMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: event.into(),
            data: data.into(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.data)
            .map_err(|source| ProtocolError::invalid_payload(&self.event, source))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushEventKind {
    Update,
    TaskQueued,
    TaskStart,
    TaskComplete,
    NewSample,
    NewHypothesis,
    NewHypothesisSampleMatch,
}

impl PushEventKind {
    pub const ALL: [PushEventKind; 7] = [
        PushEventKind::Update,
        PushEventKind::TaskQueued,
        PushEventKind::TaskStart,
        PushEventKind::TaskComplete,
        PushEventKind::NewSample,
        PushEventKind::NewHypothesis,
        PushEventKind::NewHypothesisSampleMatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PushEventKind::Update => "update",
            PushEventKind::TaskQueued => "task-queued",
            PushEventKind::TaskStart => "task-start",
            PushEventKind::TaskComplete => "task-complete",
            PushEventKind::NewSample => "new-sample",
            PushEventKind::NewHypothesis => "new-hypothesis",
            PushEventKind::NewHypothesisSampleMatch => "new-hypothesis-sample-match",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNotice {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CatalogRecord {
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

pub fn parse_catalog_snapshot(
    kind: CatalogKind,
    snapshot: Value,
) -> Result<Vec<CatalogRecord>, ProtocolError> {
    let entries: Vec<(String, Value)> = match snapshot {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        other => {
            return Err(ProtocolError::UnexpectedSnapshotShape {
                kind,
                found: json_type_name(&other),
            })
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::InvalidSnapshotEntry { kind, key });
        };
        if !fields.contains_key("id") {
            fields.insert("id".to_string(), Value::String(key.clone()));
        }
        let record: CatalogRecord = serde_json::from_value(Value::Object(fields))
            .map_err(|source| ProtocolError::invalid_payload(kind.to_string(), source))?;
        records.push(record);
    }
    Ok(records)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
