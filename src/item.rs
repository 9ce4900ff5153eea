use slotmap::SlotMap;
use typed_builder::TypedBuilder;

use crate::{
    entities::source::SourceId,
    time::{Delta, Time},
};

slotmap::new_key_type! {
    /// Handle to a [`WorkItem`] stored in an [`Items`] arena.
    pub struct ItemKey;
}

/// Arena holding every live work item of a run.
///
/// Models never hold items directly. Their queues hold [`ItemKey`]s, and an item lives exactly as
/// long as some queue (or an in-flight event) refers to its key. Only a server's garbage-collection
/// hook removes items from the arena.
pub type Items = SlotMap<ItemKey, WorkItem>;

/// A unit of work flowing from a source through a server, e.g. a vehicle or a product.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct WorkItem {
    #[builder(setter(into))]
    pub(crate) name: String,
    /// Key into the server's duration profile.
    #[builder(setter(into))]
    pub(crate) profile: String,
    #[builder(default)]
    pub(crate) source: SourceId,

    #[builder(default)]
    pub(crate) enter_time: Time,
    #[builder(default)]
    pub(crate) wait_time: Delta,
    #[builder(default)]
    pub(crate) leave_time: Time,
}

impl WorkItem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// When the item entered its current holder. For items still pending at a source this is the
    /// inter-arrival delay before the item is released.
    pub fn enter_time(&self) -> Time {
        self.enter_time
    }

    /// How long the item occupies the server that holds it.
    pub fn wait_time(&self) -> Delta {
        self.wait_time
    }

    pub fn leave_time(&self) -> Time {
        self.leave_time
    }
}
