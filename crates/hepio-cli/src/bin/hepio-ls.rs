// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `hepio-ls`: list the events of a container stream.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use hepio_cli::config::ToolPrefs;
use hepio_cli::inspect::write_event;
use hepio_event::stream::is_gzip_path;
use hepio_event::{EventReader, StreamError};
use tracing::{error, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "List the events of a hepio container stream")]
struct Args {
    /// Decompress the input with gzip (implied for `.gz` files)
    #[arg(short = 'g', long)]
    gzip: bool,
    /// List only this event, counting from 0
    #[arg(short = 'e', long = "event", value_name = "N")]
    event: Option<u64>,
    /// Input file, or `-` for standard input
    input: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let prefs = hepio_cli::init_tool();
    match run(&args, &prefs) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, prefs: &ToolPrefs) -> Result<ExitCode> {
    if args.input == "-" {
        let stdin = io::stdin().lock();
        let reader = if args.gzip {
            EventReader::gzip(stdin)
        } else {
            EventReader::new(stdin)
        };
        return list(reader.with_max_frame_len(prefs.max_frame_len), args.event);
    }
    let path = Path::new(&args.input);
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = if args.gzip || is_gzip_path(path) {
        EventReader::gzip(file)
    } else {
        EventReader::new(file)
    };
    list(reader.with_max_frame_len(prefs.max_frame_len), args.event)
}

fn list<R: Read>(mut reader: EventReader<R>, selected: Option<u64>) -> Result<ExitCode> {
    let mut out = BufWriter::new(io::stdout().lock());
    let mut index = 0;
    if let Some(n) = selected {
        let want = usize::try_from(n).context("event index out of range")?;
        let skipped = reader.skip_events(want).context("failed to skip events")?;
        if let Some(bytes) = reader.take_resync() {
            warn!(bytes, "resynchronized while skipping");
        }
        if let Some(frames) = reader.take_corrupt_frames() {
            warn!(frames, "passed over corrupt frames while skipping");
        }
        if skipped < want {
            warn!(requested = n, available = skipped, "event index beyond end of stream");
            return Ok(ExitCode::FAILURE);
        }
        index = n;
    }

    let mut listed = 0u64;
    let mut first_error = None;
    loop {
        match reader.next_event() {
            Ok(Some(event)) => {
                if let Some(bytes) = reader.take_resync() {
                    warn!(bytes, event = index, "resynchronized before event");
                }
                write_event(&mut out, index, &event)?;
                listed += 1;
            }
            Ok(None) => break,
            Err(StreamError::Io(err)) => {
                error!(%err, event = index, "stopped reading");
                first_error.get_or_insert((index, StreamError::Io(err)));
                break;
            }
            Err(err) => {
                error!(%err, event = index, "skipping unreadable event");
                first_error.get_or_insert((index, err));
            }
        }
        index += 1;
        if selected.is_some() {
            break;
        }
    }
    if let Some(bytes) = reader.take_resync() {
        warn!(bytes, "discarded trailing bytes");
    }
    out.flush()?;

    if listed == 0 {
        if let Some((at, err)) = first_error {
            return Err(err).with_context(|| format!("failed to read event {at}"));
        }
        if selected.is_some() {
            warn!(requested = index, "event index beyond end of stream");
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}
