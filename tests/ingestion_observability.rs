use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use data_harvest_reader::ingestion::{
    FailureContext, FileHandle, FormatOptions, ReadEvent, ReadObserver, Severity, Stage,
};
use data_harvest_reader::processing::{FilterRule, FilterSubsets};
use data_harvest_reader::reader::{DataReader, ReadOptions, ReaderOptions};
use data_harvest_reader::types::{DataType, Field, Schema, Table};
use data_harvest_reader::{IngestionError, IngestionResult};

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<ReadEvent>>,
    failures: Mutex<Vec<(Stage, String, Severity)>>,
    alerts: Mutex<Vec<Severity>>,
}

impl ReadObserver for RecordingObserver {
    fn on_event(&self, event: &ReadEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_failure(&self, ctx: &FailureContext, severity: Severity, _error: &IngestionError) {
        self.failures
            .lock()
            .unwrap()
            .push((ctx.stage, ctx.subject.clone(), severity));
    }

    fn on_alert(&self, _ctx: &FailureContext, severity: Severity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("data-harvest-reader-{name}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn observed_reader(obs: &Arc<RecordingObserver>) -> DataReader {
    DataReader::new(ReaderOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: Severity::Critical,
        ..ReaderOptions::default()
    })
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let dir = tmp_dir("io-failure");
    fs::write(dir.join("broken.disk"), "").unwrap();

    let obs = Arc::new(RecordingObserver::default());
    let mut reader = observed_reader(&obs);
    reader
        .registry_mut()
        .register(".disk", |_: &FileHandle, _: &FormatOptions| -> IngestionResult<Table> {
            Err(IngestionError::Io(io::Error::other("device went away")))
        });

    let _ = reader.read(&dir, &ReadOptions::default()).unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::Load);
    assert!(failures[0].1.ends_with("broken.disk"));
    assert_eq!(failures[0].2, Severity::Critical);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![Severity::Critical]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn observer_receives_failure_without_alert_for_non_critical_error() {
    let dir = tmp_dir("schema-failure");
    fs::copy("tests/fixtures/people.csv", dir.join("people.csv")).unwrap();

    let obs = Arc::new(RecordingObserver::default());
    let options = ReadOptions {
        format: FormatOptions {
            schema: Some(Schema::new(vec![Field::new("definitely_missing", DataType::Utf8)])),
            ..FormatOptions::default()
        },
        ..ReadOptions::default()
    };

    let err = observed_reader(&obs).read(&dir, &options).unwrap_err();
    assert!(matches!(err, IngestionError::SchemaMismatch { .. }));

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.ends_with("people.csv"));
    assert_eq!(failures[0].2, Severity::Error);
    assert!(obs.alerts.lock().unwrap().is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn lifecycle_events_bracket_a_successful_read() {
    let dir = tmp_dir("lifecycle");
    fs::write(dir.join("t_1.csv"), "id\n1\n").unwrap();
    fs::write(dir.join("t_2.csv"), "id\n2\n").unwrap();

    let obs = Arc::new(RecordingObserver::default());
    let options = ReadOptions {
        join_similar: true,
        filter_subset: Some(FilterSubsets::from([
            ("t".to_string(), vec![FilterRule::new("id", ">", 1)]),
            ("gone".to_string(), vec![FilterRule::new("id", ">", 1)]),
        ])),
        ..ReadOptions::default()
    };
    observed_reader(&obs).read(&dir, &options).unwrap();

    let events = obs.events.lock().unwrap().clone();
    assert!(matches!(events.first(), Some(ReadEvent::Started { .. })));
    assert_eq!(events.last(), Some(&ReadEvent::Completed { tables: 1 }));
    assert!(events.contains(&ReadEvent::SourceEnumerated { files: 2 }));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ReadEvent::FileLoaded { .. }))
            .count(),
        2
    );
    assert!(events.iter().any(|e| matches!(e, ReadEvent::TablesMerged { key, .. } if key == "df_t")));
    assert!(events.contains(&ReadEvent::UnmatchedKey {
        stage: Stage::Filter,
        key: "df_gone".to_string(),
    }));
    assert!(events.contains(&ReadEvent::FiltersApplied {
        key: "df_t".to_string(),
        rows_before: 2,
        rows_after: 1,
    }));
    assert!(obs.failures.lock().unwrap().is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn collisions_without_join_are_warned() {
    let dir = tmp_dir("collision");
    fs::write(dir.join("t.csv"), "id\n1\n").unwrap();
    fs::write(dir.join("t.json"), r#"[{"id": 2}, {"id": 3}]"#).unwrap();

    let obs = Arc::new(RecordingObserver::default());
    let tables = observed_reader(&obs).read(&dir, &ReadOptions::default()).unwrap();

    // `t.json` sorts after `t.csv` and wins.
    assert_eq!(tables["df_t"].row_count(), 2);
    let events = obs.events.lock().unwrap().clone();
    let collision = events
        .iter()
        .find(|e| matches!(e, ReadEvent::KeyCollision { .. }))
        .unwrap();
    assert_eq!(collision.severity(), Severity::Warning);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn filter_failures_are_reported_with_the_table_key() {
    let dir = tmp_dir("filter-failure");
    fs::write(dir.join("t.csv"), "id\n1\n").unwrap();

    let obs = Arc::new(RecordingObserver::default());
    let options = ReadOptions {
        filter_subset: Some(FilterSubsets::from([(
            "t".to_string(),
            vec![FilterRule::new("missing", "==", 1)],
        )])),
        ..ReadOptions::default()
    };
    let _ = observed_reader(&obs).read(&dir, &options).unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures, vec![(Stage::Filter, "df_t".to_string(), Severity::Error)]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_source_is_reported_before_returning() {
    let obs = Arc::new(RecordingObserver::default());
    let missing = std::env::temp_dir().join("data-harvest-reader-missing-source-0");
    let _ = observed_reader(&obs)
        .read(missing, &ReadOptions::default())
        .unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::Source);
    assert!(obs.events.lock().unwrap().is_empty());
}
