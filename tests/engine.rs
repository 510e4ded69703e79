use crossbeam_utils::thread;
use kvnode::resp::cmd_line;
use kvnode::{commands, Arity, Config, Connection, Database, Db, KvError, Reply, Result, StandaloneEngine};

fn err(msg: &str) -> Reply {
    Reply::Error(msg.to_string())
}

fn exec_boom(_db: &Db, _args: &[Vec<u8>]) -> Result<Reply> {
    panic!("boom");
}

fn exec_count(_db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::Int(args.len() as i64))
}

fn exec_fail(_db: &Db, _args: &[Vec<u8>]) -> Result<Reply> {
    Err(KvError::SyntaxError)
}

fn custom_engine() -> StandaloneEngine {
    let mut table = commands::table();
    table.register("boom", exec_boom, Arity::Exact(0));
    table.register("count3", exec_count, -3_i32);
    table.register("fail", exec_fail, Arity::Exact(0));
    StandaloneEngine::with_table(&Config::default(), table).unwrap()
}

#[test]
fn unknown_commands_are_reported() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    let mut conn = Connection::fake();
    assert_eq!(
        engine.exec(&mut conn, &cmd_line(&["NOPE", "x"])),
        err("ERR unknown command 'nope'")
    );
}

#[test]
fn argument_counts_are_checked() {
    let engine = custom_engine();
    let mut conn = Connection::fake();
    assert_eq!(
        engine.exec(&mut conn, &cmd_line(&["GET"])),
        err("ERR wrong number of arguments for 'get' command")
    );
    assert_eq!(
        engine.exec(&mut conn, &cmd_line(&["GET", "a", "b"])),
        err("ERR wrong number of arguments for 'get' command")
    );
    assert_eq!(
        engine.exec(&mut conn, &cmd_line(&["COUNT3", "a", "b"])),
        err("ERR wrong number of arguments for 'count3' command")
    );
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["count3", "a", "b", "c"])), Reply::Int(3));
    assert_eq!(
        engine.exec(&mut conn, &cmd_line(&["count3", "a", "b", "c", "d"])),
        Reply::Int(4)
    );
}

#[test]
fn command_names_are_case_insensitive() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    let mut conn = Connection::fake();
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["sEt", "k", "v"])), Reply::ok());
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["get", "k"])), Reply::bulk("v"));
}

#[test]
fn databases_are_isolated() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    let mut conn = Connection::fake();
    engine.exec(&mut conn, &cmd_line(&["SET", "k", "zero"]));
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["SELECT", "1"])), Reply::ok());
    assert_eq!(conn.db_index(), 1);
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["GET", "k"])), Reply::null());
    engine.exec(&mut conn, &cmd_line(&["SET", "k", "one"]));

    // another client still sees database 0
    let mut other = Connection::fake();
    assert_eq!(engine.exec(&mut other, &cmd_line(&["GET", "k"])), Reply::bulk("zero"));
    assert_eq!(engine.db(1).unwrap().store().len(), 1);
}

#[test]
fn select_checks_the_index() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    let mut conn = Connection::fake();
    let out_of_range = err("ERR DB index is out of range");
    assert_eq!(engine.db_count(), 16);
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["SELECT", "16"])), out_of_range);
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["SELECT", "-1"])), out_of_range);
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["SELECT", "one"])), out_of_range);
    assert_eq!(
        engine.exec(&mut conn, &cmd_line(&["SELECT"])),
        err("ERR wrong number of arguments for 'select' command")
    );
    assert_eq!(conn.db_index(), 0);
}

#[test]
fn a_panicking_command_does_not_take_the_engine_down() {
    let engine = custom_engine();
    let mut conn = Connection::fake();
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["BOOM"])), err("ERR internal error"));
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["SET", "k", "v"])), Reply::ok());
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["GET", "k"])), Reply::bulk("v"));
}

#[test]
fn executor_errors_become_error_replies() {
    let engine = custom_engine();
    let mut conn = Connection::fake();
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["FAIL"])), err("ERR syntax error"));
}

#[test]
fn empty_command_lines_are_protocol_errors() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    let mut conn = Connection::fake();
    match engine.exec(&mut conn, &[]) {
        Reply::Error(msg) => assert!(msg.starts_with("ERR Protocol error"), "{}", msg),
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn zero_databases_is_a_configuration_error() {
    let config = Config {
        databases: 0,
        ..Config::default()
    };
    assert!(matches!(StandaloneEngine::open(&config), Err(KvError::Config(_))));
}

#[test]
fn concurrent_increments_are_not_lost() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    thread::scope(|s| {
        for _ in 0..8 {
            let engine = engine.clone();
            s.spawn(move |_| {
                let mut conn = Connection::fake();
                for _ in 0..1000 {
                    engine.exec(&mut conn, &cmd_line(&["INCR", "counter"]));
                }
            });
        }
    })
    .unwrap();
    let mut conn = Connection::fake();
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["GET", "counter"])), Reply::bulk("8000"));
}

#[test]
fn concurrent_pushes_all_land() {
    let engine = StandaloneEngine::open(&Config::default()).unwrap();
    thread::scope(|s| {
        for t in 0..4 {
            let engine = engine.clone();
            s.spawn(move |_| {
                let mut conn = Connection::fake();
                for i in 0..250 {
                    let value = format!("{}-{}", t, i);
                    engine.exec(&mut conn, &cmd_line(&["RPUSH", "list", value.as_str()]));
                }
            });
        }
    })
    .unwrap();
    let mut conn = Connection::fake();
    assert_eq!(engine.exec(&mut conn, &cmd_line(&["LLEN", "list"])), Reply::Int(1000));
}
