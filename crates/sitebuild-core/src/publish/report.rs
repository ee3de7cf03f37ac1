//! Per-file outcome of a publish and its console reporter

use serde::Serialize;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    Create,
    Update,
    Skip,
    Delete,
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PublishAction::Create => "create",
            PublishAction::Update => "update",
            PublishAction::Skip => "skip",
            PublishAction::Delete => "delete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRecord {
    pub key: String,
    pub action: PublishAction,
    /// Headers the object carries; empty for deletions.
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub records: Vec<PublishRecord>,
}

impl PublishReport {
    /// Append a record and print it.
    pub fn push(&mut self, record: PublishRecord) {
        info!("[{}] {}", record.action, record.key);
        self.records.push(record);
    }

    pub fn count(&self, action: PublishAction) -> usize {
        self.records.iter().filter(|r| r.action == action).count()
    }

    #[cfg(test)]
    pub(crate) fn record(&self, key: &str) -> Option<&PublishRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} created, {} updated, {} unchanged, {} deleted",
            self.count(PublishAction::Create),
            self.count(PublishAction::Update),
            self.count(PublishAction::Skip),
            self.count(PublishAction::Delete)
        )
    }
}
