use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;

use kvnode::resp::{cmd_line, encode_command, RespReader};
use kvnode::{Config, Connection, Database, Reply, StandaloneEngine};
use tempfile::TempDir;

fn config(dir: &Path) -> Config {
    Config {
        append_only: true,
        append_filename: dir.join("appendonly.aof"),
        ..Config::default()
    }
}

fn run(engine: &StandaloneEngine, conn: &mut Connection, args: &[&str]) -> Reply {
    engine.exec(conn, &cmd_line(args))
}

// every frame in the file, as command lines of strings
fn frames(path: &Path) -> Vec<Vec<String>> {
    let file = File::open(path).expect("unable to open the append-only file");
    RespReader::new(BufReader::new(file))
        .map(|frame| match frame.expect("malformed frame") {
            Reply::MultiBulk(items) => items
                .into_iter()
                .map(|i| String::from_utf8(i.unwrap()).unwrap())
                .collect(),
            other => panic!("unexpected frame {:?}", other),
        })
        .collect()
}

fn line(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn state_survives_a_restart() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    run(&engine, &mut conn, &["SET", "a", "1"]);
    run(&engine, &mut conn, &["LPUSH", "list", "x", "y", "z"]);
    run(&engine, &mut conn, &["RPOP", "list"]);
    run(&engine, &mut conn, &["SELECT", "3"]);
    run(&engine, &mut conn, &["SADD", "set", "m1", "m2", "m3"]);
    run(&engine, &mut conn, &["SPOP", "set"]);
    run(&engine, &mut conn, &["INCRBY", "n", "42"]);
    engine.close();

    let reopened = StandaloneEngine::open(&config).unwrap();
    for index in [0, 3] {
        assert_eq!(
            reopened.db(index).unwrap().store().snapshot(),
            engine.db(index).unwrap().store().snapshot(),
            "database {} differs after replay",
            index
        );
    }
    assert_eq!(reopened.db(3).unwrap().store().len(), 2);
    reopened.close();
}

#[test]
fn close_writes_every_queued_entry() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    for i in 0..1000 {
        let key = format!("key{}", i);
        run(&engine, &mut conn, &["SET", key.as_str(), "value"]);
    }
    engine.close();

    let frames = frames(&config.append_filename);
    assert_eq!(frames.len(), 1001);
    assert_eq!(frames[0], line(&["SELECT", "0"]));
    assert_eq!(frames[1000], line(&["set", "key999", "value"]));
}

#[test]
fn only_changes_are_recorded() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    run(&engine, &mut conn, &["SET", "a", "1"]);
    run(&engine, &mut conn, &["GET", "a"]);
    run(&engine, &mut conn, &["EXISTS", "a"]);
    run(&engine, &mut conn, &["SETNX", "a", "2"]);
    run(&engine, &mut conn, &["DEL", "missing"]);
    run(&engine, &mut conn, &["LPOP", "missing"]);
    run(&engine, &mut conn, &["INCR", "a"]);
    run(&engine, &mut conn, &["NOPE"]);
    engine.close();

    assert_eq!(
        frames(&config.append_filename),
        vec![
            line(&["SELECT", "0"]),
            line(&["set", "a", "1"]),
            line(&["incr", "a"]),
        ]
    );
}

#[test]
fn select_is_written_when_the_database_changes() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    run(&engine, &mut conn, &["SET", "a", "1"]);
    run(&engine, &mut conn, &["SET", "b", "2"]);
    run(&engine, &mut conn, &["SELECT", "1"]);
    run(&engine, &mut conn, &["SET", "c", "3"]);
    run(&engine, &mut conn, &["SELECT", "0"]);
    run(&engine, &mut conn, &["SET", "d", "4"]);
    engine.close();

    assert_eq!(
        frames(&config.append_filename),
        vec![
            line(&["SELECT", "0"]),
            line(&["set", "a", "1"]),
            line(&["set", "b", "2"]),
            line(&["SELECT", "1"]),
            line(&["set", "c", "3"]),
            line(&["SELECT", "0"]),
            line(&["set", "d", "4"]),
        ]
    );
}

#[test]
fn each_run_starts_with_a_select() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    // the first run leaves the file in database 2
    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    run(&engine, &mut conn, &["SELECT", "2"]);
    run(&engine, &mut conn, &["SET", "a", "1"]);
    engine.close();

    // the second run writes to database 0
    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    run(&engine, &mut conn, &["SET", "b", "2"]);
    engine.close();

    let engine = StandaloneEngine::open(&config).unwrap();
    assert!(engine.db(2).unwrap().store().contains(b"a"));
    assert!(engine.db(0).unwrap().store().contains(b"b"));
    assert!(!engine.db(2).unwrap().store().contains(b"b"));
    engine.close();
}

#[test]
fn replay_skips_malformed_frames() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    let mut content = encode_command(&cmd_line(&["SET", "a", "1"]));
    content.extend_from_slice(b"?garbage\r\n");
    content.extend_from_slice(b"+OK\r\n");
    content.extend_from_slice(&encode_command(&cmd_line(&["SET", "b", "2"])));
    content.extend_from_slice(&encode_command(&cmd_line(&["GET"])));
    // a frame cut short by a crash
    let truncated = encode_command(&cmd_line(&["SET", "c", "3"]));
    content.extend_from_slice(&truncated[..truncated.len() - 3]);
    fs::write(&config.append_filename, content).unwrap();

    let engine = StandaloneEngine::open(&config).unwrap();
    let store = engine.db(0).unwrap().store();
    assert!(store.contains(b"a"));
    assert!(store.contains(b"b"));
    assert!(!store.contains(b"c"));

    // the engine keeps serving
    let mut conn = Connection::fake();
    assert_eq!(run(&engine, &mut conn, &["SET", "d", "4"]), Reply::ok());
    engine.close();
}

#[test]
fn a_missing_file_is_an_empty_history() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());
    assert!(!config.append_filename.exists());

    let engine = StandaloneEngine::open(&config).unwrap();
    assert_eq!(engine.db(0).unwrap().store().len(), 0);
    assert!(engine.aof().unwrap().path().exists());
    engine.close();
    // closing twice is harmless
    engine.close();
}

#[test]
fn pausing_holds_back_the_writer() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let config = config(temp_dir.path());

    let engine = StandaloneEngine::open(&config).unwrap();
    let mut conn = Connection::fake();
    let guard = engine.aof().unwrap().pause();
    assert_eq!(run(&engine, &mut conn, &["SET", "a", "1"]), Reply::ok());
    thread::sleep(Duration::from_millis(100));
    assert_eq!(fs::metadata(&config.append_filename).unwrap().len(), 0);
    drop(guard);

    engine.close();
    assert_eq!(frames(&config.append_filename).len(), 2);
}

#[test]
fn persistence_is_off_by_default() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    assert!(engine.aof().is_none());
    engine.close();
}
