//! Off-path persistence of completed work items.
//!
//! Servers hand finished records to an [`ArchiveHandle`], which forwards them over a channel to a
//! worker thread running a [`RecordWriter`]. Submission never blocks and never fails from the
//! simulation's point of view: a writer error is logged and counted, nothing more.

use std::{
    io::Write,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, warn};

use crate::{data::Batch, driver::Error};

/// Sink for batches of completed records, e.g. a database table or a log file.
pub trait RecordWriter: Send + 'static {
    fn write_batch(&mut self, batch: &Batch) -> Result<(), Error>;

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes each batch as one line of JSON.
#[derive(Debug, derive_new::new)]
pub struct JsonLinesWriter<W> {
    inner: W,
}

impl<W> JsonLinesWriter<W> {
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send + 'static> RecordWriter for JsonLinesWriter<W> {
    fn write_batch(&mut self, batch: &Batch) -> Result<(), Error> {
        serde_json::to_writer(&mut self.inner, batch)?;
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(self.inner.flush()?)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStats {
    pub batches: usize,
    pub records: usize,
    pub failed_batches: usize,
}

/// Cloneable submission side of an [`Archive`].
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    tx: Sender<Batch>,
}

impl ArchiveHandle {
    /// Queues `batch` for writing. Fire-and-forget.
    pub fn submit(&self, batch: Batch) {
        if batch.records.is_empty() {
            return;
        }
        let source = batch.source;
        if self.tx.send(batch).is_err() {
            warn!(%source, "archive worker is gone, dropping batch");
        }
    }
}

#[derive(Debug)]
pub struct Archive {
    handle: ArchiveHandle,
    worker: JoinHandle<ArchiveStats>,
}

impl Archive {
    pub fn spawn(writer: impl RecordWriter) -> Result<Self, Error> {
        let (tx, rx) = channel::unbounded();
        let worker = thread::Builder::new()
            .name("qsim-archive".into())
            .spawn(move || drain(writer, rx))?;
        Ok(Self {
            handle: ArchiveHandle { tx },
            worker,
        })
    }

    pub fn handle(&self) -> ArchiveHandle {
        self.handle.clone()
    }

    /// Waits for every batch submitted so far to be written.
    ///
    /// Blocks until every [`ArchiveHandle`] has been dropped.
    pub fn finish(self) -> ArchiveStats {
        drop(self.handle);
        match self.worker.join() {
            Ok(stats) => stats,
            Err(_) => {
                error!("archive worker panicked");
                ArchiveStats::default()
            }
        }
    }
}

fn drain(mut writer: impl RecordWriter, rx: Receiver<Batch>) -> ArchiveStats {
    let mut stats = ArchiveStats::default();
    for batch in rx {
        match writer.write_batch(&batch) {
            Ok(()) => {
                stats.batches += 1;
                stats.records += batch.records.len();
                debug!(source = %batch.source, records = batch.records.len(), "batch archived");
            }
            Err(e) => {
                stats.failed_batches += 1;
                error!(source = %batch.source, error = %e, "failed to archive batch");
            }
        }
    }
    if let Err(e) = writer.flush() {
        error!(error = %e, "failed to flush archive");
    }
    stats
}
