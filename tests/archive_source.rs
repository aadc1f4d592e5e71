use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use data_harvest_reader::reader::{DataReader, ReadOptions, ReaderOptions};
use data_harvest_reader::IngestionError;

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("data-harvest-reader-{name}-{nanos}.zip"))
}

fn quiet_reader() -> DataReader {
    DataReader::new(ReaderOptions {
        observer: None,
        ..ReaderOptions::default()
    })
}

fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .add_directory("nested/", SimpleFileOptions::default())
        .unwrap();
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn two_formats() -> Vec<u8> {
    zip_of(&[
        ("b.json", r#"[{"id": 1, "ok": true}, {"id": 2, "ok": false}]"#),
        ("a.csv", "id,name\n1,Ada\n2,Grace\n3,Linus\n"),
    ])
}

#[test]
fn archive_bytes_with_csv_and_json_give_two_tables() {
    let tables = quiet_reader()
        .read(two_formats(), &ReadOptions::default())
        .unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables["df_a"].row_count(), 3);
    assert_eq!(tables["df_b"].row_count(), 2);
}

#[test]
fn archive_path_and_bytes_are_equivalent() {
    let bytes = two_formats();
    let path = tmp_file("equivalent");
    fs::write(&path, &bytes).unwrap();

    let reader = quiet_reader();
    let from_bytes = reader.read(bytes, &ReadOptions::default()).unwrap();
    let from_path = reader.read(&path, &ReadOptions::default()).unwrap();
    assert_eq!(from_bytes, from_path);

    let _ = fs::remove_file(&path);
}

#[test]
fn entries_in_archive_folders_are_loaded_by_base_name() {
    let bytes = zip_of(&[("nested/part_1.csv", "v\n1\n"), ("nested/part_2.csv", "v\n2\n")]);
    let options = ReadOptions {
        join_similar: true,
        ..ReadOptions::default()
    };
    let tables = quiet_reader().read(bytes, &options).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables["df_part"].row_count(), 2);
}

#[test]
fn invalid_archive_bytes_are_a_zip_error() {
    let err = quiet_reader()
        .read(b"definitely not a zip".as_slice(), &ReadOptions::default())
        .unwrap_err();
    assert!(matches!(err, IngestionError::Zip(_)));
}

#[test]
fn invalid_archive_file_is_a_zip_error() {
    let path = tmp_file("invalid");
    fs::write(&path, "plain text").unwrap();
    let err = quiet_reader().read(&path, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, IngestionError::Zip(_)));
    let _ = fs::remove_file(&path);
}
