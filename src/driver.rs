use std::{path::Path, sync::Arc};

use tracing::info;

use crate::{
    data::Record,
    entities::{
        server::Server,
        source::{Source, SourceDesc, SourceId},
    },
    item::Items,
    metrics::{MetricsChannel, SharedObserver, Utilization, UtilizationCounter},
    persist::ArchiveHandle,
    profile::DurationProfile,
    registry::SourceRegistry,
    simulation::{Simulation, StopSignal},
    time::Time,
};

#[derive(typed_builder::TypedBuilder, derivative::Derivative)]
#[derivative(Debug)]
pub struct Config {
    #[builder(setter(into))]
    server: String,
    profile: DurationProfile,
    source: SourceDesc,

    #[builder(default, setter(into, strip_option))]
    until: Option<Time>,
    /// Observers subscribed to the server in addition to its own utilization counter.
    #[builder(default)]
    #[derivative(Debug = "ignore")]
    observers: Vec<SharedObserver>,
    #[builder(default, setter(strip_option))]
    archive: Option<ArchiveHandle>,
    /// Keep completed records in the [`Summary`]. Turn off for long runs that archive them.
    #[builder(default = true)]
    keep_records: bool,
    #[builder(default, setter(strip_option))]
    registry: Option<Arc<SourceRegistry>>,
    #[builder(default)]
    stop: StopSignal,
}

impl From<RunDesc> for Config {
    fn from(desc: RunDesc) -> Self {
        Config {
            server: desc.server,
            profile: desc.profile,
            source: desc.source,
            until: desc.until,
            observers: Vec::new(),
            archive: None,
            keep_records: true,
            registry: None,
            stop: StopSignal::default(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Summary {
    pub source: SourceId,
    pub end_time: Time,
    pub nr_events: u64,
    pub departed: usize,
    /// Completed items in departure order, unless the run did not keep them.
    pub records: Vec<Record>,
    /// Items never released by the source.
    pub pending: usize,
    /// Items still queued at the server.
    pub queued: usize,
    pub utilization: Utilization,
}

pub fn run(cfg: Config) -> Result<Summary, Error> {
    let mut items = Items::with_key();
    let source = Source::from_desc(cfg.source, &mut items)?;
    if let Some(registry) = &cfg.registry {
        registry.register(&source)?;
    }

    let counter = UtilizationCounter::shared(cfg.server.as_str());
    let mut channel = MetricsChannel::new();
    channel.subscribe(counter.clone());
    for observer in cfg.observers {
        channel.subscribe(observer);
    }
    let server = Server::builder()
        .name(cfg.server)
        .profile(cfg.profile)
        .channel(channel)
        .archive(cfg.archive)
        .keep_records(cfg.keep_records)
        .build();
    info!(
        source = %source.name(),
        server = %server.name(),
        arrivals = source.pending(),
        "run configured"
    );

    let outcome = Simulation::builder()
        .source(source)
        .server(server)
        .items(items)
        .until(cfg.until)
        .stop(cfg.stop)
        .build()
        .run();

    if let Some(registry) = &cfg.registry {
        registry.unregister(&outcome.source);
    }
    outcome.server.report();
    let utilization = counter.lock().snapshot();
    Ok(Summary {
        source: outcome.source.id(),
        end_time: outcome.end_time,
        nr_events: outcome.nr_events,
        pending: outcome.source.pending(),
        queued: outcome.server.input_len(),
        departed: outcome.server.departed(),
        records: outcome.server.into_records(),
        utilization,
    })
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunDesc {
    pub server: String,
    pub profile: DurationProfile,
    pub source: SourceDesc,
    #[serde(default)]
    pub until: Option<Time>,
}

pub fn read_config(path: impl AsRef<Path>) -> Result<RunDesc, Error> {
    let s = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serde error")]
    Serde(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("invalid duration {value} for profile `{profile}`")]
    InvalidDuration { profile: String, value: f64 },

    #[error("invalid arrival process: {0}")]
    InvalidArrivals(String),

    #[error("source {0} is already registered")]
    AlreadyRegistered(SourceId),
}
