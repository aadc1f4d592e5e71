use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use data_harvest_reader::ingestion::{FileHandle, FormatOptions, FormatRegistry};
use data_harvest_reader::reader::{DataReader, ReadOptions, ReaderOptions};
use data_harvest_reader::types::{DataType, Field, Schema, Table, Value};
use data_harvest_reader::{IngestionError, IngestionResult};

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("data-harvest-reader-{name}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn lines_decoder(handle: &FileHandle, _options: &FormatOptions) -> IngestionResult<Table> {
    let text = handle.read_to_string()?;
    let rows = text.lines().map(|l| vec![Value::Utf8(l.to_string())]).collect();
    Ok(Table::new(Schema::new(vec![Field::new("line", DataType::Utf8)]), rows))
}

#[test]
fn defaults_cover_builtin_formats() {
    let registry = FormatRegistry::with_defaults();
    for ext in [".csv", ".json", ".parquet"] {
        assert!(registry.resolve(ext).is_ok(), "{ext} should resolve");
    }
    #[cfg(feature = "excel")]
    assert!(registry.resolve(".xlsx").is_ok());
}

#[test]
fn unregistered_and_differently_cased_extensions_fail() {
    let registry = FormatRegistry::with_defaults();
    for ext in [".txt", ".CSV", "csv", ""] {
        match registry.resolve(ext) {
            Err(IngestionError::UnsupportedFormat { extension }) => assert_eq!(extension, ext),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("{ext} should not resolve"),
        }
    }
}

#[test]
fn custom_decoder_is_used_by_the_reader() {
    let dir = tmp_dir("custom-decoder");
    fs::write(dir.join("notes.txt"), "one\ntwo\n").unwrap();
    fs::write(dir.join("ids.csv"), "id\n1\n").unwrap();

    let mut reader = DataReader::new(ReaderOptions {
        observer: None,
        ..ReaderOptions::default()
    });
    reader.registry_mut().register(".txt", lines_decoder);

    let tables = reader.read(&dir, &ReadOptions::default()).unwrap();
    assert_eq!(tables["df_notes"].rows[1], vec![Value::Utf8("two".to_string())]);
    assert_eq!(tables["df_ids"].row_count(), 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn replacing_a_registry_drops_builtins() {
    let dir = tmp_dir("replaced-registry");
    fs::write(dir.join("ids.csv"), "id\n1\n").unwrap();

    let mut registry = FormatRegistry::new();
    registry.register(".txt", lines_decoder);
    let reader = DataReader::new(ReaderOptions {
        observer: None,
        ..ReaderOptions::default()
    })
    .with_registry(registry);

    let err = reader.read(&dir, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, IngestionError::UnsupportedFormat { .. }));

    let _ = fs::remove_dir_all(&dir);
}
