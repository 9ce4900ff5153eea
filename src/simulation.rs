use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use smallvec::SmallVec;
use tracing::{debug, info, trace};

use crate::{
    entities::{Atomic, Bag, Output},
    item::{ItemKey, Items},
    time::Time,
};

type Keys = SmallVec<[ItemKey; 2]>;

/// Cooperative cancellation for a running simulation.
///
/// Checked between dispatched events; the event in progress always completes.
#[derive(Debug, Default, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Sequential coordinator for one source feeding one server.
///
/// At each instant the imminent models emit their outputs, then every model with an internal event
/// or an input runs exactly one transition, and finally emitted items are acknowledged back to the
/// models that emitted them.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Simulation<S: Atomic, R: Atomic> {
    source: S,
    server: R,
    #[builder(default)]
    items: Items,
    /// No event after this time is dispatched.
    #[builder(default)]
    until: Option<Time>,
    #[builder(default)]
    stop: StopSignal,

    // Run-time
    #[builder(default, setter(skip))]
    cur_time: Time,
    #[builder(default, setter(skip))]
    source_last: Time,
    #[builder(default, setter(skip))]
    server_last: Time,
    #[builder(default, setter(skip))]
    nr_events: u64,
}

#[derive(Debug)]
pub struct Outcome<S, R> {
    pub source: S,
    pub server: R,
    /// Items still alive: pending at the source or queued at the server.
    pub items: Items,
    pub end_time: Time,
    pub nr_events: u64,
}

impl<S: Atomic, R: Atomic> Simulation<S, R> {
    pub fn run(mut self) -> Outcome<S, R> {
        info!(until = ?self.until, "simulation started");
        while let Some((next, source_due, server_due)) = self.next_event() {
            self.step(next, source_due, server_due);
        }
        info!(end_time = %self.cur_time, events = self.nr_events, "simulation finished");
        self.finish()
    }

    fn next_event(&self) -> Option<(Time, bool, bool)> {
        if self.stop.is_stopped() {
            info!(time = %self.cur_time, "stop requested");
            return None;
        }
        let t_source = self.source_last + self.source.time_advance(&self.items);
        let t_server = self.server_last + self.server.time_advance(&self.items);
        let next = t_source.min(t_server);
        if !next.is_finite() || self.until.is_some_and(|end| next > end) {
            return None;
        }
        Some((next, t_source == next, t_server == next))
    }

    fn step(&mut self, now: Time, source_due: bool, server_due: bool) {
        debug_assert!(self.cur_time <= now);
        self.cur_time = now;
        trace!(time = %now, source_due, server_due, "dispatching");

        // Outputs first, while every imminent model still holds its state
        let created = if source_due {
            self.source.output(&mut self.items)
        } else {
            Bag::new()
        };
        let departed = if server_due {
            self.server.output(&mut self.items)
        } else {
            Bag::new()
        };

        if source_due {
            self.source.internal(&mut self.items);
            self.source_last = now;
        }
        let arrivals = keys(&created);
        match (server_due, arrivals.is_empty()) {
            (true, true) => self.server.internal(&mut self.items),
            (true, false) => self.server.confluent(&arrivals, &mut self.items),
            (false, false) => {
                let elapsed = now - self.server_last;
                self.server.external(elapsed, &arrivals, &mut self.items)
            }
            (false, true) => {}
        }
        if server_due || !arrivals.is_empty() {
            self.server_last = now;
        }

        self.source.collect(&arrivals, &mut self.items);
        self.server.collect(&keys(&departed), &mut self.items);
        self.nr_events += 1;
    }

    fn finish(self) -> Outcome<S, R> {
        debug!(live_items = self.items.len(), "collecting outcome");
        Outcome {
            source: self.source,
            server: self.server,
            items: self.items,
            end_time: self.cur_time,
            nr_events: self.nr_events,
        }
    }
}

fn keys(bag: &Bag) -> Keys {
    bag.iter().map(Output::key).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::{
        arrivals::{BatchLines, Schedule},
        entities::{server::Server, source::Source, source::SourceId},
        metrics::{ResourceObserver, UtilizationCounter},
        profile::DurationProfile,
        time::Delta,
    };

    use super::*;

    fn mk_pair(lines: &str, secs: f64) -> (Source, Server, Items, Arc<Mutex<UtilizationCounter>>) {
        let mut items = Items::with_key();
        let mut source = Source::builder()
            .id(SourceId::ONE)
            .name("gate")
            .profile("p1")
            .build();
        source.load_schedule(&Schedule::parse(lines, BatchLines::Reject), &mut items);
        let counter = UtilizationCounter::shared("press");
        let mut server = Server::builder()
            .name("press")
            .profile(DurationProfile::new().with("p1", secs).unwrap())
            .build();
        server.subscribe(counter.clone());
        (source, server, items, counter)
    }

    #[test]
    fn arrivals_depart_in_order() {
        let (source, server, items, counter) = mk_pair("1.0\n2.0\n10.0", 3.0);
        let outcome = Simulation::builder()
            .source(source)
            .server(server)
            .items(items)
            .build()
            .run();

        let records = outcome.server.records();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["gate-0", "gate-1", "gate-2"]);
        let leaves: Vec<_> = records.iter().map(|r| r.leave_time.into_f64()).collect();
        // The second item queues behind the first
        assert_eq!(leaves, vec![4.0, 7.0, 13.0]);
        assert_eq!(outcome.end_time, Time::new(13.0));
        assert!(outcome.items.is_empty());

        let c = counter.lock();
        assert_eq!(c.all_time(), Delta::new(13.0));
        assert_eq!(c.worked_time(), Delta::new(9.0));
        assert_eq!(c.idle_time(), Delta::new(4.0));
    }

    #[test]
    fn coinciding_events_use_confluent() {
        // The second arrival lands exactly when the first item completes
        let (source, server, items, counter) = mk_pair("0.0\n2.0", 2.0);
        let outcome = Simulation::builder()
            .source(source)
            .server(server)
            .items(items)
            .build()
            .run();
        let records = outcome.server.records();
        assert_eq!(records[0].leave_time, Time::new(2.0));
        assert_eq!(records[1].enter_time, Time::new(2.0));
        assert_eq!(records[1].leave_time, Time::new(4.0));
        assert_eq!(counter.lock().idle_time(), Delta::ZERO);
    }

    #[test]
    fn until_bounds_the_run() {
        let (source, server, items, _) = mk_pair("1.0\n2.0\n3.0", 5.0);
        let outcome = Simulation::builder()
            .source(source)
            .server(server)
            .items(items)
            .until(Some(Time::new(7.0)))
            .build()
            .run();
        assert_eq!(outcome.server.records().len(), 1);
        assert_eq!(outcome.server.input_len(), 2);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.end_time, Time::new(6.0));
    }

    struct StopAfterFirst(StopSignal);

    impl ResourceObserver for StopAfterFirst {
        fn add_all_time(&mut self, _: Delta) {}
        fn add_idle_time(&mut self, _: Delta) {}
        fn add_worked_time(&mut self, _: Delta) {}
        fn add_current_progress(&mut self, _: Delta) {}
        fn reset_current_progress(&mut self) {
            self.0.stop();
        }
        fn report(&mut self) {}
    }

    #[test]
    fn stop_is_honoured_between_events() {
        let (source, mut server, items, _) = mk_pair("1.0\n1.0\n1.0", 1.0);
        let stop = StopSignal::new();
        server.subscribe(Arc::new(Mutex::new(StopAfterFirst(stop.clone()))));
        let outcome = Simulation::builder()
            .source(source)
            .server(server)
            .items(items)
            .stop(stop)
            .build()
            .run();
        // The completing event still ran to its end, including garbage collection
        assert_eq!(outcome.server.records().len(), 1);
        assert_eq!(outcome.end_time, Time::new(2.0));
    }

    #[test]
    fn stopped_before_start_dispatches_nothing() {
        let (source, server, items, _) = mk_pair("1.0", 1.0);
        let stop = StopSignal::new();
        stop.stop();
        let outcome = Simulation::builder()
            .source(source)
            .server(server)
            .items(items)
            .stop(stop)
            .build()
            .run();
        assert_eq!(outcome.nr_events, 0);
        assert_eq!(outcome.source.pending(), 1);
    }

    #[test]
    fn models_behind_trait_objects() {
        let (source, server, items, _) = mk_pair("1.0\n2.0", 1.0);
        let source: Box<dyn Atomic> = Box::new(source);
        let server: Box<dyn Atomic> = Box::new(server);
        let outcome = Simulation::builder()
            .source(source)
            .server(server)
            .items(items)
            .build()
            .run();
        assert_eq!(outcome.end_time, Time::new(3.0));
        assert!(outcome.items.is_empty());
    }
}
