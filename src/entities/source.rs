use tracing::{debug, trace};

use crate::{
    arrivals::{Arrivals, Schedule},
    driver::Error,
    item::{ItemKey, Items, WorkItem},
    queue::FifoQ,
    time::{Delta, Time},
};

use super::{Atomic, Bag, Output};

identifier!(SourceId);

/// Releases pre-built work items at their scheduled inter-arrival delays.
///
/// Pending items are kept in production order. A pending item's enter time holds its delay
/// relative to the release of the item before it.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Source {
    pub(crate) id: SourceId,
    #[builder(setter(into))]
    name: String,
    #[builder(setter(into))]
    profile: String,

    #[builder(default, setter(skip))]
    pending: FifoQ,
    #[builder(default, setter(skip))]
    clock: Time,
    #[builder(default, setter(skip))]
    nr_created: usize,
}

impl Source {
    pub fn from_desc(desc: SourceDesc, items: &mut Items) -> Result<Self, Error> {
        let mut source = Source::builder()
            .id(desc.id)
            .name(desc.name)
            .profile(desc.profile)
            .build();
        for delay in desc.arrivals.delays()? {
            source.push(delay, items);
        }
        debug!(source = %source.name, pending = source.pending.len(), "source built");
        Ok(source)
    }

    pub fn load_schedule(&mut self, schedule: &Schedule, items: &mut Items) {
        for &delay in schedule.delays() {
            self.push(delay, items);
        }
    }

    /// Appends an item released `delay` after the currently last pending item.
    pub fn push(&mut self, delay: Delta, items: &mut Items) -> ItemKey {
        let item = WorkItem::builder()
            .name(format!("{}-{}", self.name, self.nr_created))
            .profile(self.profile.as_str())
            .source(self.id)
            .enter_time(delay.max(Delta::ZERO).into_time())
            .build();
        self.nr_created += 1;
        let key = items.insert(item);
        self.pending.enqueue(key);
        key
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> Time {
        self.clock
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_keys(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.pending.iter()
    }
}

impl Atomic for Source {
    fn time_advance(&self, items: &Items) -> Delta {
        match self.pending.peek() {
            Some(key) => items
                .get(key)
                .map_or(Delta::ZERO, |item| item.enter_time.into_delta()),
            None => Delta::INFINITY,
        }
    }

    fn internal(&mut self, items: &mut Items) {
        let ta = self.time_advance(items);
        match self.pending.dequeue() {
            Some(key) => {
                self.clock += ta;
                trace!(source = %self.name, ?key, clock = %self.clock, "item released");
            }
            None => debug!(source = %self.name, "internal transition with nothing pending"),
        }
    }

    fn external(&mut self, _elapsed: Delta, inputs: &[ItemKey], _items: &mut Items) {
        // Sources have no input port
        if !inputs.is_empty() {
            debug!(source = %self.name, n = inputs.len(), "ignoring inputs sent to a source");
        }
    }

    fn output(&mut self, _items: &mut Items) -> Bag {
        let mut bag = Bag::new();
        match self.pending.peek() {
            Some(key) => bag.push(Output::new_created(key)),
            None => debug!(source = %self.name, "output requested with nothing pending"),
        }
        bag
    }

    fn collect(&mut self, acknowledged: &[ItemKey], _items: &mut Items) {
        // Released items now belong to whoever received them
        trace!(source = %self.name, n = acknowledged.len(), "released items handed over");
    }
}

#[derive(Debug, Clone, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct SourceDesc {
    pub id: SourceId,
    /// Name of the source, also the prefix of its item names.
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub profile: String,
    pub arrivals: Arrivals,
}
