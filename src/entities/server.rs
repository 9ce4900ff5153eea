use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::{
    data::{Batch, Record},
    item::{ItemKey, Items},
    metrics::{MetricsChannel, SharedObserver},
    persist::ArchiveHandle,
    profile::DurationProfile,
    queue::FifoQ,
    time::{Delta, Time},
};

use super::{source::SourceId, Atomic, Bag, Output};

/// A single-server FIFO resource.
///
/// Arriving items queue up in the input queue and are worked on one at a time, head first, for
/// the duration their profile prescribes. Every change of the timing state is published on the
/// server's [`MetricsChannel`].
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Server {
    #[builder(setter(into))]
    name: String,
    #[builder(default)]
    profile: DurationProfile,
    #[builder(default)]
    channel: MetricsChannel,
    #[builder(default)]
    archive: Option<ArchiveHandle>,
    /// Whether destroyed items are also kept in memory as [`Record`]s. Runs that archive their
    /// records can turn this off.
    #[builder(default = true)]
    keep_records: bool,

    #[builder(default, setter(skip))]
    input: FifoQ,
    #[builder(default, setter(skip))]
    output: FifoQ,
    #[builder(default, setter(skip))]
    clock: Time,
    // Time worked on the current head. Never exceeds its wait time.
    #[builder(default, setter(skip))]
    spent: Delta,

    #[builder(default, setter(skip))]
    records: Vec<Record>,
    #[builder(default, setter(skip))]
    nr_departed: usize,
}

impl Server {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> Time {
        self.clock
    }

    pub fn spent(&self) -> Delta {
        self.spent
    }

    pub fn profile(&self) -> &DurationProfile {
        &self.profile
    }

    /// Replaces the profile. Queued items keep the wait times they were given on arrival.
    pub fn set_profile(&mut self, profile: DurationProfile) {
        self.profile = profile;
    }

    pub fn subscribe(&mut self, observer: SharedObserver) {
        self.channel.subscribe(observer);
    }

    pub fn channel(&self) -> &MetricsChannel {
        &self.channel
    }

    /// Asks every observer to report its counters.
    pub fn report(&self) {
        self.channel.request_report();
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Keys waiting in the input queue, head first.
    pub fn queued(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.input.iter()
    }

    /// Records of every item destroyed so far, in departure order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of items destroyed so far, kept or not.
    pub fn departed(&self) -> usize {
        self.nr_departed
    }

    fn head_wait(&self, items: &Items) -> Option<Delta> {
        self.input.peek().map(|key| match items.get(key) {
            Some(item) => item.wait_time,
            None => {
                warn!(server = %self.name, ?key, "queued item is not live");
                Delta::ZERO
            }
        })
    }
}

impl Atomic for Server {
    fn time_advance(&self, items: &Items) -> Delta {
        match self.head_wait(items) {
            // A late external event may have pushed `spent` up to the wait time
            Some(wait) => wait.saturating_sub(self.spent),
            None => Delta::INFINITY,
        }
    }

    fn internal(&mut self, items: &mut Items) {
        if self.input.is_empty() {
            debug!(server = %self.name, "internal transition on an idle server");
            return;
        }
        let ta = self.time_advance(items);
        self.clock += ta;
        self.channel.add_all_time(ta);
        self.channel.add_worked_time(ta);
        self.channel.add_current_progress(ta);
        self.spent = Delta::ZERO;
        // The head is departing: it left the input queue and reaches the output queue once the
        // coordinator acknowledges it in `collect`.
        let head = self.input.dequeue();
        self.channel.reset_current_progress();
        trace!(
            server = %self.name,
            clock = %self.clock,
            ?head,
            queued = self.input.len(),
            "head completed"
        );
    }

    fn external(&mut self, elapsed: Delta, inputs: &[ItemKey], items: &mut Items) {
        let elapsed = elapsed.max(Delta::ZERO);
        self.clock += elapsed;
        self.channel.add_all_time(elapsed);
        match self.head_wait(items) {
            Some(wait) => {
                self.spent = (self.spent + elapsed).min(wait);
                self.channel.add_worked_time(elapsed);
                self.channel.add_current_progress(elapsed);
            }
            None => self.channel.add_idle_time(elapsed),
        }
        for &key in inputs {
            let Some(item) = items.get_mut(key) else {
                warn!(server = %self.name, ?key, "arriving item is not live, ignoring it");
                continue;
            };
            item.enter_time = self.clock;
            item.wait_time = match self.profile.get(&item.profile) {
                Some(wait) => wait,
                None => {
                    warn!(
                        server = %self.name,
                        item = %item.name,
                        profile = %item.profile,
                        "unknown duration profile, using zero"
                    );
                    Delta::ZERO
                }
            };
            trace!(server = %self.name, item = %item.name, clock = %self.clock, "item queued");
            self.input.enqueue(key);
        }
    }

    fn output(&mut self, items: &mut Items) -> Bag {
        let mut bag = Bag::new();
        let Some(key) = self.input.peek() else {
            debug!(server = %self.name, "output requested on an idle server");
            return bag;
        };
        let leave = self.clock + self.time_advance(items);
        if let Some(item) = items.get_mut(key) {
            item.leave_time = leave;
            debug!(server = %self.name, item = %item.name, %leave, "item departs");
        }
        bag.push(Output::new_departed(key));
        bag
    }

    fn collect(&mut self, acknowledged: &[ItemKey], items: &mut Items) {
        for &key in acknowledged {
            if self.input.iter().any(|k| k == key) {
                warn!(server = %self.name, ?key, "acknowledged item is still queued, keeping it");
                continue;
            }
            self.output.enqueue(key);
        }
        let mut batches: BTreeMap<SourceId, Vec<Record>> = BTreeMap::new();
        while let Some(key) = self.output.dequeue() {
            let Some(item) = items.remove(key) else {
                warn!(server = %self.name, ?key, "acknowledged item is already gone");
                continue;
            };
            trace!(server = %self.name, item = %item.name, "item destroyed");
            self.nr_departed += 1;
            let record = Record::from(&item);
            if self.keep_records {
                self.records.push(record.clone());
            }
            if self.archive.is_some() {
                batches.entry(item.source).or_default().push(record);
            }
        }
        if let Some(archive) = &self.archive {
            for (source, records) in batches {
                archive.submit(Batch { source, records });
            }
        }
    }
}
