use crate::{
    entities::source::SourceId,
    item::WorkItem,
    time::{Delta, Time},
};

/// A completed work item, as handed to persistence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Record {
    pub name: String,
    pub enter_time: Time,
    /// How long the server worked on the item.
    pub wait_time: Delta,
    pub leave_time: Time,
    pub profile: String,
}

impl Record {
    /// Time between entering and leaving the server, including queueing.
    pub fn sojourn(&self) -> Delta {
        // Rounding can put leave marginally before enter
        (self.leave_time - self.enter_time).max(Delta::ZERO)
    }
}

impl From<&WorkItem> for Record {
    fn from(item: &WorkItem) -> Self {
        Self {
            name: item.name.clone(),
            enter_time: item.enter_time,
            wait_time: item.wait_time,
            leave_time: item.leave_time,
            profile: item.profile.clone(),
        }
    }
}

/// Records of one source, submitted together.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Batch {
    pub source: SourceId,
    pub records: Vec<Record>,
}
