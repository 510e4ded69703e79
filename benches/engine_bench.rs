use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use kvnode::resp::{cmd_line, encode_command, RespReader};
use kvnode::{Config, Connection, Database, StandaloneEngine};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::io::Cursor;
use tempfile::TempDir;

fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn set_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_bench");
    group.bench_function("in_memory", |b| {
        let engine = StandaloneEngine::open(&Config::default()).unwrap();
        let mut conn = Connection::fake();
        let lines: Vec<_> = (0..1000)
            .map(|i| cmd_line(&["SET", &format!("key{}", i), &random_string(64)]))
            .collect();
        b.iter(|| {
            for line in &lines {
                engine.exec(&mut conn, line);
            }
        })
    });
    group.bench_function("append_only", |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                let config = Config {
                    append_only: true,
                    append_filename: temp_dir.path().join("appendonly.aof"),
                    ..Config::default()
                };
                (StandaloneEngine::open(&config).unwrap(), temp_dir)
            },
            |(engine, _temp_dir)| {
                let mut conn = Connection::fake();
                for i in 0..1000 {
                    engine.exec(&mut conn, &cmd_line(&["SET", &format!("key{}", i), "value"]));
                }
                engine.close();
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn get_bench(c: &mut Criterion) {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    let mut conn = Connection::fake();
    for i in 0..1000 {
        engine.exec(&mut conn, &cmd_line(&["SET", &format!("key{}", i), "value"]));
    }
    let lines: Vec<_> = (0..1000)
        .map(|_| cmd_line(&["GET", &format!("key{}", thread_rng().gen_range(0..1000))]))
        .collect();
    c.bench_function("get_bench", |b| {
        b.iter(|| {
            for line in &lines {
                engine.exec(&mut conn, line);
            }
        })
    });
}

fn decode_bench(c: &mut Criterion) {
    let mut bytes = Vec::new();
    for i in 0..1000 {
        bytes.extend_from_slice(&encode_command(&cmd_line(&["SET", &format!("key{}", i), "value"])));
    }
    c.bench_function("decode_bench", |b| {
        b.iter(|| RespReader::new(Cursor::new(&bytes)).count())
    });
}

criterion_group!(benches, set_bench, get_bench, decode_bench);
criterion_main!(benches);
