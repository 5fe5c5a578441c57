// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `hepio-convert`: turn a legacy JSON event dump into a container stream.

use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use hepio_cli::config::ToolPrefs;
use hepio_event::EventWriter;
use hepio_graph::{DumpReader, EventConverter};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert a legacy JSON event dump to a hepio stream")]
struct Args {
    /// Write to this file instead of standard output (gzip if it ends in `.gz`)
    #[arg(short = 'o', long = "output", value_name = "OUT")]
    output: Option<PathBuf>,
    /// Compress standard output with gzip
    #[arg(short = 'g', long)]
    gzip: bool,
    /// Legacy JSON dump to convert
    input: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let prefs = hepio_cli::init_tool();
    match run(&args, &prefs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, prefs: &ToolPrefs) -> Result<()> {
    let dump = DumpReader::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let written = match &args.output {
        Some(path) => {
            let writer = EventWriter::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            convert_all(dump, writer)?
        }
        None => {
            let stdout = BufWriter::new(io::stdout().lock());
            let writer = if args.gzip || prefs.gzip_output {
                EventWriter::gzip(stdout)
            } else {
                EventWriter::new(stdout)
            };
            convert_all(dump, writer)?
        }
    };
    info!(events = written, "conversion complete");
    Ok(())
}

fn convert_all<R: Read, W: Write>(dump: DumpReader<R>, mut writer: EventWriter<W>) -> Result<u64> {
    let converter = EventConverter::new();
    for (index, source) in dump.enumerate() {
        let source = source.with_context(|| format!("failed to parse dump event {index}"))?;
        let event = converter.convert(&source).with_context(|| {
            format!(
                "failed to convert dump event {index} (run {}, event {})",
                source.run_number, source.event_number
            )
        })?;
        writer
            .push(&event)
            .with_context(|| format!("failed to write event {index}"))?;
    }
    let written = writer.events_written();
    writer.finish().context("failed to finish output")?;
    Ok(written)
}
