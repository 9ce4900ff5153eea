use smallvec::SmallVec;

use crate::{
    item::{ItemKey, Items},
    time::Delta,
};

pub(crate) mod server;
pub(crate) mod source;

/// An atomic discrete-event model driven by a coordinator.
///
/// Per event instant the coordinator calls, in order: [`output`](Atomic::output) on every imminent
/// model, exactly one of [`internal`](Atomic::internal), [`external`](Atomic::external) or
/// [`confluent`](Atomic::confluent), and finally [`collect`](Atomic::collect) with the events the
/// model emitted. Transitions never fail; contradictory calls are no-ops.
pub trait Atomic {
    /// Time until the next internal event, or [`Delta::INFINITY`] when none is pending.
    fn time_advance(&self, items: &Items) -> Delta;

    fn internal(&mut self, items: &mut Items);

    fn external(&mut self, elapsed: Delta, inputs: &[ItemKey], items: &mut Items);

    /// An internal event and external inputs at the same instant. The internal event is resolved
    /// first.
    fn confluent(&mut self, inputs: &[ItemKey], items: &mut Items) {
        self.internal(items);
        self.external(Delta::ZERO, inputs, items);
    }

    #[must_use]
    fn output(&mut self, items: &mut Items) -> Bag;

    fn collect(&mut self, acknowledged: &[ItemKey], items: &mut Items);
}

impl<T: Atomic + ?Sized> Atomic for Box<T> {
    fn time_advance(&self, items: &Items) -> Delta {
        (**self).time_advance(items)
    }

    fn internal(&mut self, items: &mut Items) {
        (**self).internal(items)
    }

    fn external(&mut self, elapsed: Delta, inputs: &[ItemKey], items: &mut Items) {
        (**self).external(elapsed, inputs, items)
    }

    fn confluent(&mut self, inputs: &[ItemKey], items: &mut Items) {
        (**self).confluent(inputs, items)
    }

    fn output(&mut self, items: &mut Items) -> Bag {
        (**self).output(items)
    }

    fn collect(&mut self, acknowledged: &[ItemKey], items: &mut Items) {
        (**self).collect(acknowledged, items)
    }
}

// A model emits at most one item per instant
pub type Bag = SmallVec<[Output; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new)]
pub enum Output {
    Created(ItemKey),
    Departed(ItemKey),
}

impl Output {
    pub fn key(&self) -> ItemKey {
        match *self {
            Output::Created(key) | Output::Departed(key) => key,
        }
    }
}
