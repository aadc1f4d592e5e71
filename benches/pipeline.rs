//! Throughput of the read pipeline over an in-memory archive, and of the filter engine alone.

use std::io::{Cursor, Write};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use data_harvest_reader::execution::LoaderOptions;
use data_harvest_reader::processing::{apply_filters, FilterRule};
use data_harvest_reader::reader::{DataReader, ReadOptions, ReaderOptions};
use data_harvest_reader::types::{DataType, Field, Schema, Table, Value};

fn archive_of_parts(parts: usize, rows_per_part: usize) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for p in 0..parts {
        writer
            .start_file(format!("events_{p}.csv"), SimpleFileOptions::default())
            .unwrap();
        writeln!(writer, "id,user,amount,active").unwrap();
        for r in 0..rows_per_part {
            let id = p * rows_per_part + r;
            writeln!(writer, "{id},user{},{}.5,{}", id % 97, id % 1000, id % 2 == 0).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

fn wide_table(rows: usize) -> Table {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("amount", DataType::Float64),
        Field::new("user", DataType::Utf8),
    ]);
    let rows = (0..rows as i64)
        .map(|i| {
            vec![
                Value::Int64(i),
                Value::Float64((i % 1000) as f64),
                Value::Utf8(format!("user{}", i % 97)),
            ]
        })
        .collect();
    Table::new(schema, rows)
}

fn bench_read_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_archive");
    group.sample_size(20);

    let archive = archive_of_parts(16, 5_000);
    let options = ReadOptions {
        join_similar: true,
        ..ReadOptions::default()
    };

    for threads in [1usize, 4] {
        let reader = DataReader::new(ReaderOptions {
            loader: LoaderOptions {
                num_threads: Some(threads),
                max_in_flight_files: threads,
            },
            observer: None,
            ..ReaderOptions::default()
        });
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, _| {
            b.iter(|| {
                let tables = reader.read(archive.clone(), &options).unwrap();
                black_box(tables["df_events"].row_count())
            })
        });
    }
    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let table = wide_table(100_000);
    let rules = vec![
        FilterRule::new("amount", ">=", 100),
        FilterRule::new("amount", "<", 900),
        FilterRule::new("user", "notin", "user1"),
    ];

    c.bench_function("apply_filters_100k", |b| {
        b.iter(|| black_box(apply_filters(&table, &rules, "df_bench").unwrap().row_count()))
    });
}

criterion_group!(benches, bench_read_archive, bench_filters);
criterion_main!(benches);
