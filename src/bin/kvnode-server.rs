//! this binary starts a kvnode server
//! to see the list of options, type: `kvnode-server --help`
//!
//! Settings are read from the JSON file given with `--config`, if any, and then overridden
//! by the other command line options. The node joins a cluster when both `--self` and
//! `--peers` are set.

use std::path::Path;
use std::process::exit;

use clap::{crate_version, value_t, App, Arg, ArgMatches};
use kvnode::{
    ClusterEngine, Config, Database, KvError, KvServer, NaiveThreadPool, Result,
    SharedQueueThreadPool, StandaloneEngine, ThreadPool, DEFAULT_ADDRESS,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    let addr_help = format!(
        "sets the IP_ADDR:PORT that the server listens on [default: {}]",
        DEFAULT_ADDRESS
    );
    let matches = App::new("kvnode-server")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("an in-memory, RESP compatible key-value node")
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("FILE")
                .help("reads settings from a JSON configuration file"),
        )
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP_ADDR:PORT")
                .help(addr_help.as_str()),
        )
        .arg(
            Arg::with_name("databases")
                .long("databases")
                .value_name("COUNT")
                .help("sets the number of databases"),
        )
        .arg(
            Arg::with_name("appendonly")
                .long("appendonly")
                .help("records every write in the append-only file and replays it at start-up"),
        )
        .arg(
            Arg::with_name("appendfilename")
                .long("appendfilename")
                .value_name("FILE")
                .help("sets the path of the append-only file"),
        )
        .arg(
            Arg::with_name("self")
                .long("self")
                .value_name("IP_ADDR:PORT")
                .help("sets the address other cluster nodes reach this node on"),
        )
        .arg(
            Arg::with_name("peers")
                .long("peers")
                .value_name("IP_ADDR:PORT,...")
                .use_delimiter(true)
                .help("sets the addresses of the other cluster nodes"),
        )
        .arg(
            Arg::with_name("max-clients")
                .long("max-clients")
                .value_name("COUNT")
                .help("serves at most COUNT clients at a time, 0 serves each on its own thread"),
        )
        .get_matches();

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(config) {
        eprintln!("{}", e);
        exit(1);
    }
}

/// merges the command line options into the configuration file, if one was given
fn build_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.value_of("config") {
        Some(path) => Config::from_file(Path::new(path))?,
        None => Config::default(),
    };
    if let Some(addr) = matches.value_of("addr") {
        config.bind = addr.to_string();
    }
    if matches.is_present("databases") {
        config.databases = value_t!(matches, "databases", usize)
            .map_err(|e| KvError::Config(format!("invalid database count: {}", e)))?;
    }
    if matches.is_present("appendonly") {
        config.append_only = true;
    }
    if let Some(path) = matches.value_of("appendfilename") {
        config.append_filename = path.into();
    }
    if let Some(self_addr) = matches.value_of("self") {
        config.self_addr = Some(self_addr.to_string());
    }
    if let Some(peers) = matches.values_of("peers") {
        config.peers = peers.filter(|p| !p.is_empty()).map(String::from).collect();
    }
    if matches.is_present("max-clients") {
        config.max_clients = value_t!(matches, "max-clients", u32)
            .map_err(|e| KvError::Config(format!("invalid client count: {}", e)))?;
    }
    config.validate()?;
    Ok(config)
}

fn run(config: Config) -> Result<()> {
    info!("kvnode-server {}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.bind);

    if config.is_cluster() {
        info!("cluster mode, peers: {:?}", config.peers);
        run_with_engine(ClusterEngine::open(&config)?, &config)
    } else {
        run_with_engine(StandaloneEngine::open(&config)?, &config)
    }
}

fn run_with_engine<D: Database>(engine: D, config: &Config) -> Result<()> {
    let result = if config.max_clients == 0 {
        KvServer::new(engine.clone(), NaiveThreadPool::new(0)?).run(config.bind.as_str())
    } else {
        KvServer::new(engine.clone(), SharedQueueThreadPool::new(config.max_clients)?)
            .run(config.bind.as_str())
    };
    engine.close();
    result
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
