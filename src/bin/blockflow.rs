//! CLI tool for checking and running block-structured command programs
//!
//! Usage: blockflow [options] <program.json>
//!
//! Options:
//!   --check            Compile only and print the block table as JSON
//!   --max-depth <n>    Maximum function call depth (default: 200)
//!   --max-steps <n>    Abort after this many commands (default: unlimited)
//!   --start <n>        1-based row to start at (default: 1)
//!
//! The program file is a JSON array of `{"command", "target", "value"}` rows.
//! Data files for forJson/loadJsonVars are resolved relative to the program.
//! Set `RUST_LOG=blockflow=debug` to trace branches and bubbling.

use blockflow::{BlockDef, FileRecordSource, Program, Session, SessionOptions, StepResult};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// CLI configuration
struct Config {
    program_path: PathBuf,
    check_only: bool,
    max_depth: Option<usize>,
    max_steps: Option<u64>,
    start_line: Option<usize>,
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    args.get(i)
        .ok_or_else(|| format!("{} requires a value", flag))?
        .parse::<T>()
        .map_err(|_| format!("{} must be a positive integer", flag))
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program_name = args.first().map_or("blockflow", |s| s.as_str());

    let mut check_only = false;
    let mut max_depth: Option<usize> = None;
    let mut max_steps: Option<u64> = None;
    let mut start_line: Option<usize> = None;
    let mut program_arg: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        let Some(arg) = args.get(i) else {
            break;
        };
        if arg == "--check" {
            check_only = true;
        } else if arg == "--max-depth" {
            i += 1;
            max_depth = Some(parse_value(&args, i, "--max-depth")?);
        } else if arg == "--max-steps" {
            i += 1;
            max_steps = Some(parse_value(&args, i, "--max-steps")?);
        } else if arg == "--start" {
            i += 1;
            start_line = Some(parse_value(&args, i, "--start")?);
        } else if arg.starts_with('-') {
            return Err(format!("Unknown option: {}", arg));
        } else {
            program_arg = Some(arg.as_str());
        }
        i += 1;
    }

    let program_arg = program_arg.ok_or_else(|| {
        format!(
            "Usage: {} [--check] [--max-depth <n>] [--max-steps <n>] [--start <n>] <program.json>",
            program_name
        )
    })?;

    Ok(Config {
        program_path: PathBuf::from(program_arg),
        check_only,
        max_depth,
        max_steps,
        start_line,
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args()?;
    let source = fs::read_to_string(&config.program_path)
        .map_err(|e| format!("Cannot read {}: {}", config.program_path.display(), e))?;
    let program = Program::from_json(&source)?;
    let mut session = Session::new(program)?;

    if config.check_only {
        let table: Vec<serde_json::Value> = session
            .compiled()
            .blocks
            .sorted()
            .into_iter()
            .map(|(idx, def)| describe(idx, def))
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    let defaults = SessionOptions::default();
    session.set_options(SessionOptions {
        max_call_depth: config.max_depth.unwrap_or(defaults.max_call_depth),
        max_steps: config.max_steps,
        start_at: config.start_line.map_or(0, |line| line.saturating_sub(1)),
    });
    let data_dir = config
        .program_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    session.set_record_source(Box::new(FileRecordSource::new(data_dir)));

    match session.run()? {
        StepResult::Halted => println!("halted by exitTest at row {}", session.current_index() + 1),
        StepResult::Done | StepResult::Continue => println!("completed"),
    }
    for (name, value) in session.vars().iter() {
        println!("{} = {}", name, value);
    }
    Ok(())
}

fn describe(idx: usize, def: &BlockDef) -> Result<serde_json::Value, serde_json::Error> {
    let mut entry = serde_json::to_value(def)?;
    if let Some(fields) = entry.as_object_mut() {
        fields.insert("row".to_string(), serde_json::Value::from(idx + 1));
    }
    Ok(entry)
}
