//! Print a replay file as text.
//!
//! ```bash
//! replay-dump match.phlx
//! replay-dump match.phlx match.txt
//! ```

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use phalanx_replay::ReplayReader;

/// Dump the header and every recorded command of a Phalanx replay.
#[derive(Parser, Debug)]
#[command(name = "replay-dump")]
#[command(version, about, long_about = None)]
struct Args {
    /// Replay file to read
    path: PathBuf,

    /// Write the dump here instead of standard output
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(events) => {
            info!("dumped {events} events from {}", args.path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}: {e}", args.path.display());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<u64, Box<dyn Error>> {
    let input = BufReader::new(File::open(&args.path)?);
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    let mut reader = ReplayReader::open(input)?;
    let header = reader.header();
    writeln!(out, "seed: {}", header.seed)?;
    writeln!(out, "factions:")?;
    for (id, name) in header.factions.iter().enumerate() {
        writeln!(out, "  {id}: {name}")?;
    }
    writeln!(out, "{:>8}  command", "update")?;

    while let Some(event) = reader.next_event()? {
        writeln!(out, "{event}")?;
    }
    out.flush()?;
    Ok(reader.events_read())
}
