mod script;

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use relay_editor::protocol::ClientOperation;
use relay_editor::registry::NotifySink;
use relay_editor::settings::{self, AdapterSettings};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::LocalSet;

use crate::script::{parse_step, ScriptRunner};

const USAGE: &str = "Usage: relay [--settings PATH] [SCRIPT]\n\
    Replays a JSON-lines script (default: stdin) against a headless editor host\n\
    and prints every client notification as a JSON line.";

#[derive(Debug, Default, PartialEq)]
struct Args {
    settings: Option<PathBuf>,
    script: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Args>, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--settings" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--settings requires a path".to_string())?;
                parsed.settings = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option '{}'", other));
            }
            other => {
                if parsed.script.is_some() {
                    return Err(format!("Unexpected argument '{}'", other));
                }
                parsed.script = Some(PathBuf::from(other));
            }
        }
    }
    Ok(Some(parsed))
}

/// Writes client operations to stdout, one JSON document per line.
struct StdoutSink;

impl NotifySink for StdoutSink {
    fn send(&self, operation: ClientOperation) -> Result<(), String> {
        let json = serde_json::to_string(&operation)
            .map_err(|e| format!("Failed to serialize operation: {}", e))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", json).map_err(|e| format!("Failed to write to stdout: {}", e))?;
        out.flush().map_err(|e| format!("Failed to flush stdout: {}", e))
    }
}

/// Replay `input` line by line, then wait out any debounced edit so its
/// notification is written before returning.
async fn run<R>(input: R, sink: Rc<dyn NotifySink>, settings: AdapterSettings) -> i32
where
    R: AsyncBufRead + Unpin,
{
    let mut runner = ScriptRunner::new(sink, settings);
    let mut lines = input.lines();
    let mut line_no = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read script line {}: {}", line_no + 1, e);
                return 1;
            }
        };
        line_no += 1;
        let step = match parse_step(&line) {
            Ok(Some(step)) => step,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("Skipping line {}: {}", line_no, e);
                continue;
            }
        };
        if let Err(e) = runner.run_step(step).await {
            log::warn!("Line {}: {}", line_no, e);
        }
    }
    runner.finish().await;
    0
}

fn main() {
    env_logger::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let settings = match &args.settings {
        Some(path) => match settings::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        None => settings::load(),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let input: Box<dyn AsyncBufRead + Unpin> = match &args.script {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => Box::new(BufReader::new(tokio::fs::File::from_std(file))),
            Err(e) => {
                eprintln!("Failed to open script {:?}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let code = LocalSet::new().block_on(&runtime, run(input, Rc::new(StdoutSink), settings));
    std::process::exit(code);
}
