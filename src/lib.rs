#[macro_use]
mod ident;

pub mod arrivals;
pub mod driver;
pub mod logging;
pub mod metrics;
pub mod persist;
pub mod registry;
pub mod simulation;
pub mod time;

pub(crate) mod data;
pub(crate) mod entities;
pub(crate) mod item;
pub(crate) mod profile;
pub(crate) mod queue;

pub use data::{Batch, Record};
pub use driver::{run, Config, Error, RunDesc, Summary};
pub use entities::{
    server::Server,
    source::{Source, SourceDesc, SourceId},
    Atomic, Bag, Output,
};
pub use item::{ItemKey, Items, WorkItem};
pub use profile::DurationProfile;
