//! The kvnode-cli executable sends a single command to a node and prints its reply:
//!
//! `kvnode-cli [--addr IP-PORT] <COMMAND> [ARGS...]`
//!
//!     --addr accepts an IP address, either v4 or v6, and a port number, with the format
//!     IP:PORT. If --addr is not specified then connect on 127.0.0.1:6399.
//!     Print an error and return a non-zero exit code if the node replies with an error,
//!     or if it can not be reached.
//!
//! `kvnode-cli -V`
//!
//!     Print the version.

use std::net::SocketAddr;
use std::process::exit;

use clap::{crate_version, App, AppSettings, Arg};
use kvnode::{KvError, PeerClient, Reply, Result, DEFAULT_ADDRESS};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("kvnode-cli")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("sends one command to a kvnode server")
        .setting(AppSettings::TrailingVarArg)
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP_ADDR:PORT")
                .help("sets the IP_ADDR:PORT of the server to connect to")
                .default_value(DEFAULT_ADDRESS),
        )
        .arg(
            Arg::with_name("COMMAND")
                .required(true)
                .multiple(true)
                .help("the command name followed by its arguments"),
        )
        .get_matches();

    let addr = matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS);
    let line: Vec<&str> = matches.values_of("COMMAND").map(|v| v.collect()).unwrap_or_default();

    match run(addr, &line) {
        Ok(reply) => {
            let failed = reply.is_error();
            print_reply(&reply);
            if failed {
                exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    }
}

/// sends `line` to the node at `addr`
fn run(addr: &str, line: &[&str]) -> Result<Reply> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|_| KvError::Config(format!("could not parse {} into an IP address and port", addr)))?;
    let mut client = PeerClient::connect(addr)?;
    client.send(line)
}

/// prints a reply the way redis-cli does
fn print_reply(reply: &Reply) {
    match reply {
        Reply::Status(text) => println!("{}", text),
        Reply::Error(msg) => println!("(error) {}", msg),
        Reply::Int(n) => println!("(integer) {}", n),
        Reply::Bulk(Some(bytes)) => println!("\"{}\"", String::from_utf8_lossy(bytes)),
        Reply::Bulk(None) => println!("(nil)"),
        Reply::MultiBulk(items) if items.is_empty() => println!("(empty array)"),
        Reply::MultiBulk(items) => {
            for (i, item) in items.iter().enumerate() {
                match item {
                    Some(bytes) => println!("{}) \"{}\"", i + 1, String::from_utf8_lossy(bytes)),
                    None => println!("{}) (nil)", i + 1),
                }
            }
        }
    }
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
