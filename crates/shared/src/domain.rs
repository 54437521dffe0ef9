use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(value) => value,
            RawId::Signed(value) => value.to_string(),
            RawId::Unsigned(value) => value.to_string(),
        }
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

id_newtype!(LayerId);
id_newtype!(TaskId);
id_newtype!(EntityId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Hypotheses,
    Samples,
    HypothesisSampleMatches,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 3] = [
        CatalogKind::Hypotheses,
        CatalogKind::Samples,
        CatalogKind::HypothesisSampleMatches,
    ];

    pub fn render_event(self) -> &'static str {
        match self {
            CatalogKind::Hypotheses => "render-hypotheses",
            CatalogKind::Samples => "render-samples",
            CatalogKind::HypothesisSampleMatches => "render-hypothesis-sample-matches",
        }
    }

    pub fn snapshot_path(self) -> &'static str {
        match self {
            CatalogKind::Hypotheses => "/api/hypotheses",
            CatalogKind::Samples => "/api/samples",
            CatalogKind::HypothesisSampleMatches => "/api/hypothesis_sample_matches",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CatalogKind::Hypotheses => "hypotheses",
            CatalogKind::Samples => "samples",
            CatalogKind::HypothesisSampleMatches => "hypothesis_sample_matches",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_normalize_to_strings() {
        let id: EntityId = serde_json::from_str("42").expect("numeric id");
        assert_eq!(id, EntityId::from("42"));
        let id: TaskId = serde_json::from_str("\"job-7\"").expect("text id");
        assert_eq!(id.as_str(), "job-7");
    }

    #[test]
    fn task_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Finished).expect("status"),
            "\"finished\""
        );
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }
}
