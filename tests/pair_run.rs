use std::{io::Write, sync::Arc};

use parking_lot::Mutex;
use qsim::{
    arrivals::{Arrivals, BatchLines},
    driver::read_config,
    metrics::{SharedObserver, UtilizationCounter},
    persist::{Archive, JsonLinesWriter},
    registry::SourceRegistry,
    Batch, Config, DurationProfile, SourceDesc, SourceId,
};

fn schedule_file(lines: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(lines.as_bytes())?;
    Ok(file)
}

fn file_source(file: &tempfile::NamedTempFile) -> SourceDesc {
    SourceDesc::builder()
        .id(SourceId::new(1))
        .name("gate")
        .profile("car")
        .arrivals(Arrivals::File {
            path: file.path().to_path_buf(),
            batch_lines: BatchLines::Reject,
        })
        .build()
}

// Three cars through a 4-unit crossing: the second queues behind the first.
#[test]
fn schedule_through_server() -> anyhow::Result<()> {
    qsim::logging::init_logging();
    let file = schedule_file("0.0\n1.0\n\nnot-a-time\n10.0\n")?;
    let cfg = Config::builder()
        .server("crossing")
        .profile(DurationProfile::new().with("car", 4.0)?)
        .source(file_source(&file))
        .build();
    let summary = qsim::run(cfg)?;

    let leaves: Vec<_> = summary
        .records
        .iter()
        .map(|r| r.leave_time.into_f64())
        .collect();
    assert_eq!(leaves, vec![4.0, 8.0, 14.0]);
    let sojourns: Vec<_> = summary
        .records
        .iter()
        .map(|r| r.sojourn().into_f64())
        .collect();
    assert_eq!(sojourns, vec![4.0, 7.0, 4.0]);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.queued, 0);

    let u = &summary.utilization;
    assert_eq!(u.resource, "crossing");
    assert_eq!(u.all_time.into_f64(), 14.0);
    assert_eq!(u.worked_time.into_f64(), 12.0);
    assert_eq!(u.idle_time.into_f64(), 2.0);
    let load = u.throughput.expect("time has passed");
    assert!((load - 12.0 / 14.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn extra_observers_and_registry() -> anyhow::Result<()> {
    let file = schedule_file("1.0\n2.0\n")?;
    let registry = Arc::new(SourceRegistry::new());
    let gui = UtilizationCounter::shared("gui");
    let observer: SharedObserver = gui.clone();
    let cfg = Config::builder()
        .server("crossing")
        .profile(DurationProfile::new().with("car", 0.5)?)
        .source(file_source(&file))
        .observers(vec![observer])
        .registry(registry.clone())
        .build();
    let summary = qsim::run(cfg)?;

    assert_eq!(summary.records.len(), 2);
    assert_eq!(gui.lock().worked_time().into_f64(), 1.0);
    assert_eq!(gui.lock().snapshot().all_time, summary.utilization.all_time);
    // The run unregisters its source when done
    assert!(registry.is_empty());
    Ok(())
}

#[test]
fn records_are_archived_by_source() -> anyhow::Result<()> {
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let out = Shared::default();
    let archive = Archive::spawn(JsonLinesWriter::new(out.clone()))?;
    let cfg = Config::builder()
        .server("dock")
        .profile(DurationProfile::new().with("pallet", 1.0)?)
        .source(
            SourceDesc::builder()
                .id(SourceId::new(9))
                .name("truck")
                .profile("pallet")
                .arrivals(Arrivals::Uniform {
                    low: 2.0,
                    high: 3.0,
                    count: 5,
                    seed: 42,
                })
                .build(),
        )
        .archive(archive.handle())
        .build();
    let summary = qsim::run(cfg)?;
    let stats = archive.finish();

    assert_eq!(summary.records.len(), 5);
    assert_eq!(summary.departed, 5);
    assert_eq!(stats.records, 5);
    let text = String::from_utf8(out.0.lock().clone())?;
    let mut archived = Vec::new();
    for line in text.lines() {
        let batch: Batch = serde_json::from_str(line)?;
        assert_eq!(batch.source, SourceId::new(9));
        archived.extend(batch.records);
    }
    let names = |records: &[qsim::Record]| -> Vec<String> {
        records.iter().map(|r| r.name.clone()).collect()
    };
    assert_eq!(names(&archived), names(&summary.records));
    Ok(())
}

#[test]
fn simultaneous_lines_arrive_at_their_time() -> anyhow::Result<()> {
    let file = schedule_file("1.0\n2.0,2.0\n4.0\n")?;
    let mut source = file_source(&file);
    source.arrivals = Arrivals::File {
        path: file.path().to_path_buf(),
        batch_lines: BatchLines::Simultaneous,
    };
    let cfg = Config::builder()
        .server("crossing")
        .profile(DurationProfile::new().with("car", 0.5)?)
        .source(source)
        .build();
    let summary = qsim::run(cfg)?;
    let times: Vec<_> = summary
        .records
        .iter()
        .map(|r| (r.enter_time.into_f64(), r.leave_time.into_f64()))
        .collect();
    assert_eq!(times, vec![(1.0, 1.5), (2.0, 2.5), (2.0, 3.0), (4.0, 4.5)]);
    Ok(())
}

#[test]
fn archived_runs_can_skip_records() -> anyhow::Result<()> {
    #[derive(Clone, Default)]
    struct Count(Arc<Mutex<usize>>);

    impl qsim::persist::RecordWriter for Count {
        fn write_batch(&mut self, batch: &Batch) -> Result<(), qsim::Error> {
            *self.0.lock() += batch.records.len();
            Ok(())
        }
    }

    let file = schedule_file("1.0\n2.0\n3.0\n")?;
    let sink = Count::default();
    let archive = Archive::spawn(sink.clone())?;
    let cfg = Config::builder()
        .server("crossing")
        .profile(DurationProfile::new().with("car", 0.5)?)
        .source(file_source(&file))
        .archive(archive.handle())
        .keep_records(false)
        .build();
    let summary = qsim::run(cfg)?;
    archive.finish();

    assert!(summary.records.is_empty());
    assert_eq!(summary.departed, 3);
    assert_eq!(*sink.0.lock(), 3);
    Ok(())
}

#[test]
fn until_leaves_work_behind() -> anyhow::Result<()> {
    let file = schedule_file("1.0\n2.0\n3.0\n20.0\n")?;
    let cfg = Config::builder()
        .server("crossing")
        .profile(DurationProfile::new().with("car", 5.0)?)
        .source(file_source(&file))
        .until(8.0)
        .build();
    let summary = qsim::run(cfg)?;
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.queued, 2);
    assert_eq!(summary.pending, 1);
    Ok(())
}

#[test]
fn run_from_json_config() -> anyhow::Result<()> {
    let file = schedule_file("2.0\n5.0\n9.0\n")?;
    let json = serde_json::json!({
        "server": "press",
        "profile": { "widget": 1.0 },
        "source": {
            "id": 3,
            "name": "belt",
            "profile": "widget",
            "arrivals": { "kind": "file", "path": file.path() }
        }
    });
    let config = schedule_file(&json.to_string())?;
    let desc = read_config(config.path())?;
    assert_eq!(desc.profile.lookup("widget").into_f64(), 1.0);

    let summary = qsim::run(Config::from(desc))?;
    let enters: Vec<_> = summary
        .records
        .iter()
        .map(|r| r.enter_time.into_f64())
        .collect();
    assert_eq!(enters, vec![2.0, 5.0, 9.0]);
    assert_eq!(summary.source, SourceId::new(3));
    Ok(())
}

#[test]
fn seeded_poisson_runs_repeat() -> anyhow::Result<()> {
    let mk = || {
        Config::builder()
            .server("till")
            .profile(DurationProfile::new().with("customer", 0.8).unwrap())
            .source(
                SourceDesc::builder()
                    .id(SourceId::new(2))
                    .name("door")
                    .profile("customer")
                    .arrivals(Arrivals::Poisson {
                        rate: 1.0,
                        count: 50,
                        seed: 7,
                    })
                    .build(),
            )
            .build()
    };
    let a = qsim::run(mk())?;
    let b = qsim::run(mk())?;
    assert_eq!(a.records, b.records);
    assert_eq!(a.records.len(), 50);

    let u = &a.utilization;
    let parts = u.worked_time.into_f64() + u.idle_time.into_f64();
    assert!((u.all_time.into_f64() - parts).abs() < 1e-9);
    assert!((u.worked_time.into_f64() - 50.0 * 0.8).abs() < 1e-9);
    Ok(())
}

#[test]
fn missing_schedule_file_fails_the_run() {
    let cfg = Config::builder()
        .server("crossing")
        .profile(DurationProfile::new())
        .source(
            SourceDesc::builder()
                .id(SourceId::new(1))
                .name("gate")
                .profile("car")
                .arrivals(Arrivals::File {
                    path: "/no/such/schedule".into(),
                    batch_lines: BatchLines::Reject,
                })
                .build(),
        )
        .build();
    assert!(matches!(qsim::run(cfg), Err(qsim::Error::Io(_))));
}
