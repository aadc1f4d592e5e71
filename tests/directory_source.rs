use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use data_harvest_reader::reader::{DataReader, ReadOptions, ReaderOptions};
use data_harvest_reader::types::Value;
use data_harvest_reader::IngestionError;

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("data-harvest-reader-{name}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn quiet_reader() -> DataReader {
    DataReader::new(ReaderOptions {
        observer: None,
        ..ReaderOptions::default()
    })
}

fn write_sales(dir: &PathBuf) {
    fs::write(
        dir.join("sales_2023-01-01 00:00:00.csv"),
        "id,amount\n1,10.5\n2,20\n",
    )
    .unwrap();
    fs::write(dir.join("sales_2023-02-01 00:00:00.csv"), "id,amount\n3,7.25\n").unwrap();
}

#[test]
fn join_similar_merges_timestamped_files() {
    let dir = tmp_dir("join");
    write_sales(&dir);

    let options = ReadOptions {
        join_similar: true,
        ..ReadOptions::default()
    };
    let tables = quiet_reader().read(&dir, &options).unwrap();

    assert_eq!(tables.len(), 1);
    let sales = &tables["df_sales"];
    assert_eq!(sales.row_count(), 3);
    // January rows come first: files are loaded in name order.
    assert_eq!(sales.rows[0][0], Value::Int64(1));
    assert_eq!(sales.rows[2][0], Value::Int64(3));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn without_join_every_file_gets_its_own_key() {
    let dir = tmp_dir("no-join");
    write_sales(&dir);

    let tables = quiet_reader().read(&dir, &ReadOptions::default()).unwrap();

    let mut keys: Vec<&String> = tables.keys().collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["df_sales_2023-01-01 00:00:00", "df_sales_2023-02-01 00:00:00"]
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn mixed_formats_and_subdirectories() {
    let dir = tmp_dir("mixed");
    fs::write(dir.join("a.csv"), "x\n1\n").unwrap();
    fs::write(dir.join("b.json"), r#"[{"y": "hi"}, {"y": "there"}]"#).unwrap();
    // Not recursed into.
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("nested").join("c.csv"), "z\n1\n").unwrap();

    let tables = quiet_reader().read(&dir, &ReadOptions::default()).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables["df_a"].row_count(), 1);
    assert_eq!(tables["df_b"].row_count(), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unknown_extension_fails_the_whole_read() {
    let dir = tmp_dir("unknown-ext");
    fs::write(dir.join("a.csv"), "x\n1\n").unwrap();
    fs::write(dir.join("notes.txt"), "hello").unwrap();

    let err = quiet_reader().read(&dir, &ReadOptions::default()).unwrap_err();
    match err {
        IngestionError::UnsupportedFormat { extension } => assert_eq!(extension, ".txt"),
        other => panic!("unexpected {other:?}"),
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn empty_directory_yields_empty_collection() {
    let dir = tmp_dir("empty");
    let tables = quiet_reader().read(&dir, &ReadOptions::default()).unwrap();
    assert!(tables.is_empty());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn nonexistent_path_is_unsupported_source() {
    let missing = std::env::temp_dir().join("data-harvest-reader-does-not-exist-0");
    let err = quiet_reader().read(missing, &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, IngestionError::UnsupportedSource { .. }));
}

#[cfg(unix)]
#[test]
fn dangling_symlinks_are_skipped() {
    let dir = tmp_dir("dangling-link");
    fs::write(dir.join("a.csv"), "x\n1\n").unwrap();
    std::os::unix::fs::symlink(dir.join("gone.csv"), dir.join("dangling.csv")).unwrap();
    std::os::unix::fs::symlink(dir.join("a.csv"), dir.join("linked.csv")).unwrap();

    let tables = quiet_reader().read(&dir, &ReadOptions::default()).unwrap();
    let mut keys: Vec<&String> = tables.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["df_a", "df_linked"]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn join_similar_merges_csv_and_json_with_same_column_order() {
    let dir = tmp_dir("join-mixed");
    fs::write(dir.join("people_1.csv"), "name,id\nAda,1\n").unwrap();
    fs::write(dir.join("people_2.json"), r#"[{"name": "Grace", "id": 2}]"#).unwrap();

    let options = ReadOptions {
        join_similar: true,
        ..ReadOptions::default()
    };
    let tables = quiet_reader().read(&dir, &options).unwrap();

    let people = &tables["df_people"];
    assert_eq!(
        people.schema.field_names().collect::<Vec<_>>(),
        vec!["name", "id"]
    );
    assert_eq!(
        people.rows[1],
        vec![Value::Utf8("Grace".to_string()), Value::Int64(2)]
    );

    let _ = fs::remove_dir_all(&dir);
}
