//! # CLI - Succinct Map Interactive Shell
//!
//! A REPL over the succinct map engine. Reads commands from stdin, executes
//! them and prints results to stdout. Logs go to stderr, so piping commands
//! in and reading stdout works for scripted use.
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert a searchable key (value is a u64)
//! SETD key value     Insert a deferred key (searchable after BUILD)
//! GET key            Look up a key (prints value or "(nil)")
//! BUILD              Compact buffered and deferred writes into a generation
//! SAVE path          Write the map to a file
//! LOAD path          Replace the map with one saved earlier
//! SIZE               Working size in bits
//! KEYS               Number of keys held
//! STATS              Engine summary and per-block sizes
//! EXIT / QUIT        Leave the shell
//! ```
//!
//! ## Configuration
//!
//! ```text
//! SMAP_SEED           hash seed                 (default: 0x9e3779b97f4a7c15)
//! SMAP_FP_LEN         fingerprint bits per key  (default: 0)
//! SMAP_BUFFER         entries before a build    (default: 1000000)
//! SMAP_PARTITIONS     blocks per generation     (default: 16)
//! SMAP_ENCODING       plain | binary | gamma    (default: binary)
//! SMAP_LOAD_FACTOR    slots per key             (default: 1.3)
//! SMAP_BUILD_ATTEMPTS seeds tried per block     (default: 32)
//! SMAP_KEYLOG         deferred log file         (default: in memory)
//! RUST_LOG            log filter                (default: info)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ SMAP_FP_LEN=8 cargo run -p cli
//! > SET apple 3
//! OK
//! > BUILD
//! OK (generations=1)
//! > GET apple
//! 3
//! > GET pear
//! (nil)
//! > EXIT
//! bye
//! ```

use anyhow::{Context, Result};
use config::MapConfig;
use engine::Engine;
use keylog::{FileKeyLog, KeyLog, MemKeyLog};
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Whether the shell should keep reading after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_key_log() -> Result<Box<dyn KeyLog>> {
    match std::env::var("SMAP_KEYLOG") {
        Ok(path) if !path.is_empty() => {
            let log = FileKeyLog::open(&path, true)
                .with_context(|| format!("failed to open deferred log at {}", path))?;
            Ok(Box::new(log))
        }
        _ => Ok(Box::new(MemKeyLog::new())),
    }
}

fn parse_value(s: Option<&str>) -> Option<u64> {
    s.and_then(|v| v.parse().ok())
}

/// Runs one command line against `engine`, writing its reply to `out`.
fn execute<W: Write>(engine: &mut Engine, line: &str, out: &mut W) -> io::Result<Flow> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(Flow::Continue);
    };

    match cmd.to_uppercase().as_str() {
        "SET" | "SETD" => {
            let deferred = cmd.eq_ignore_ascii_case("SETD");
            let key = parts.next();
            let value = parse_value(parts.next());
            match (key, value) {
                (Some(k), Some(v)) => {
                    let result = if deferred {
                        engine.set_deferred(k, v)
                    } else {
                        engine.set_searchable(k, v)
                    };
                    match result {
                        Ok(()) => writeln!(out, "OK")?,
                        Err(e) => writeln!(out, "ERR set failed: {}", e)?,
                    }
                }
                _ => writeln!(out, "ERR usage: {} key value", cmd.to_uppercase())?,
            }
        }
        "GET" => match parts.next() {
            Some(k) => match engine.get(k) {
                Some(v) => writeln!(out, "{}", v)?,
                None => writeln!(out, "(nil)")?,
            },
            None => writeln!(out, "ERR usage: GET key")?,
        },
        "BUILD" => match engine.compact() {
            Ok(()) => writeln!(out, "OK (generations={})", engine.generation_count())?,
            Err(e) => writeln!(out, "ERR build failed: {}", e)?,
        },
        "SAVE" => match parts.next() {
            Some(path) => match engine.save(path) {
                Ok(()) => writeln!(out, "OK")?,
                Err(e) => writeln!(out, "ERR save failed: {}", e)?,
            },
            None => writeln!(out, "ERR usage: SAVE path")?,
        },
        "LOAD" => match parts.next() {
            Some(path) => match engine.load(path) {
                Ok(()) => writeln!(out, "OK (keys={})", engine.get_key_num())?,
                Err(e) => writeln!(out, "ERR load failed: {}", e)?,
            },
            None => writeln!(out, "ERR usage: LOAD path")?,
        },
        "SIZE" => writeln!(out, "{}", engine.get_working_size())?,
        "KEYS" => writeln!(out, "{}", engine.get_key_num())?,
        "STATS" => {
            writeln!(out, "{:?}", engine)?;
            for (g, sizes) in engine.generation_block_sizes().iter().enumerate() {
                let total: u64 = sizes.iter().sum();
                writeln!(
                    out,
                    "generation {}: {} blocks, {} bits {:?}",
                    g,
                    sizes.len(),
                    total,
                    sizes
                )?;
            }
        }
        "EXIT" | "QUIT" => {
            writeln!(out, "bye")?;
            return Ok(Flow::Exit);
        }
        other => writeln!(out, "unknown command: {}", other)?,
    }
    Ok(Flow::Continue)
}

fn main() -> Result<()> {
    init_logging();

    let config = MapConfig::from_env().context("invalid SMAP_* configuration")?;
    let mut engine = Engine::with_key_log(config, open_key_log()?)?;

    info!(
        "succinct map started (fp_len={}, encoding={}, partitions={}, buffer={})",
        engine.fp_len(),
        engine.encoding(),
        engine.config().partition_count,
        engine.config().buffer_threshold
    );
    println!("Commands: SET key value | SETD key value | GET key | BUILD");
    println!("          SAVE path | LOAD path | SIZE | KEYS | STATS | EXIT");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush().ok();

    for line in stdin.lock().lines() {
        let line = line?;
        if execute(&mut engine, &line, &mut stdout)? == Flow::Exit {
            break;
        }
        print!("> ");
        stdout.flush().ok();
    }

    Ok(())
}
