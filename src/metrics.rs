use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::info;

use crate::time::Delta;

/// Receiver of timing notifications published by a server.
///
/// Every callback is invoked synchronously from inside a transition, so implementations must not
/// block.
pub trait ResourceObserver: Send {
    fn add_all_time(&mut self, t: Delta);
    fn add_idle_time(&mut self, t: Delta);
    fn add_worked_time(&mut self, t: Delta);
    fn add_current_progress(&mut self, t: Delta);
    fn reset_current_progress(&mut self);
    fn report(&mut self);
}

/// An observer shared between the server that feeds it and whoever reads it.
pub type SharedObserver = Arc<Mutex<dyn ResourceObserver>>;

/// Accumulates the busy/idle split of one server.
#[derive(Debug, Default, Clone)]
pub struct UtilizationCounter {
    resource: String,
    all_time: Delta,
    idle_time: Delta,
    worked_time: Delta,
    current_progress: Delta,
}

impl UtilizationCounter {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// A counter wrapped for subscription to a [`MetricsChannel`].
    pub fn shared(resource: impl Into<String>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(resource)))
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn all_time(&self) -> Delta {
        self.all_time
    }

    pub fn idle_time(&self) -> Delta {
        self.idle_time
    }

    pub fn worked_time(&self) -> Delta {
        self.worked_time
    }

    /// Time spent so far on the item currently at the head of the server.
    pub fn current_progress(&self) -> Delta {
        self.current_progress
    }

    /// Fraction of the observed time the server was working, or `None` before any time passed.
    pub fn throughput(&self) -> Option<f64> {
        let all = self.all_time.into_f64();
        (all > 0.0).then(|| self.worked_time.into_f64() / all)
    }

    pub fn snapshot(&self) -> Utilization {
        Utilization {
            resource: self.resource.clone(),
            all_time: self.all_time,
            idle_time: self.idle_time,
            worked_time: self.worked_time,
            current_progress: self.current_progress,
            throughput: self.throughput(),
        }
    }
}

impl ResourceObserver for UtilizationCounter {
    fn add_all_time(&mut self, t: Delta) {
        self.all_time += t;
    }

    fn add_idle_time(&mut self, t: Delta) {
        self.idle_time += t;
    }

    fn add_worked_time(&mut self, t: Delta) {
        self.worked_time += t;
    }

    fn add_current_progress(&mut self, t: Delta) {
        self.current_progress += t;
    }

    fn reset_current_progress(&mut self) {
        self.current_progress = Delta::ZERO;
    }

    fn report(&mut self) {
        info!(resource = %self.resource, "{}", self.snapshot());
    }
}

/// A point-in-time copy of a [`UtilizationCounter`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Utilization {
    pub resource: String,
    pub all_time: Delta,
    pub idle_time: Delta,
    pub worked_time: Delta,
    pub current_progress: Delta,
    /// Worked time over all time; absent while no time has been observed.
    pub throughput: Option<f64>,
}

impl fmt::Display for Utilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "resource: {}", self.resource)?;
        writeln!(f, "all time: {}", self.all_time)?;
        writeln!(f, "idle time: {}", self.idle_time)?;
        writeln!(f, "worked time: {}", self.worked_time)?;
        match self.throughput {
            Some(load) => write!(f, "workload: {load:.4}"),
            None => write!(f, "workload: no data"),
        }
    }
}

/// Fans a server's timing notifications out to every subscribed observer, in subscription order.
#[derive(Default, Clone, derivative::Derivative)]
#[derivative(Debug)]
pub struct MetricsChannel {
    #[derivative(Debug = "ignore")]
    observers: Vec<SharedObserver>,
}

impl MetricsChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: SharedObserver) {
        self.observers.push(observer);
    }

    /// Removes `observer` by identity. Returns whether it was subscribed.
    pub fn unsubscribe(&mut self, observer: &SharedObserver) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    fn each(&self, mut f: impl FnMut(&mut dyn ResourceObserver)) {
        for observer in &self.observers {
            f(&mut *observer.lock());
        }
    }

    pub fn add_all_time(&self, t: Delta) {
        self.each(|o| o.add_all_time(t));
    }

    pub fn add_idle_time(&self, t: Delta) {
        self.each(|o| o.add_idle_time(t));
    }

    pub fn add_worked_time(&self, t: Delta) {
        self.each(|o| o.add_worked_time(t));
    }

    pub fn add_current_progress(&self, t: Delta) {
        self.each(|o| o.add_current_progress(t));
    }

    pub fn reset_current_progress(&self) {
        self.each(|o| o.reset_current_progress());
    }

    pub fn request_report(&self) {
        self.each(|o| o.report());
    }
}
