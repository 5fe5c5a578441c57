// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Framed event streams (`.hepio`, optionally gzip-compressed).
//!
//! Frame layout (v1), repeated until end of stream:
//!
//! ```text
//! MAGIC       "HEPI"      4 bytes
//! VERSION     u16 LE = 1  2 bytes
//! FLAGS       u16 LE = 0  2 bytes
//! HEADER_LEN  u32 LE      4 bytes
//! PAYLOAD_LEN u32 LE      4 bytes
//! HEADER      [u8; HEADER_LEN]   (see `header` module)
//! PAYLOAD     [u8; PAYLOAD_LEN]
//! ```
//!
//! There is no file-level header, so concatenated streams are valid streams.
//! When a frame boundary does not start with the magic, the reader scans
//! forward to the next magic and reports the skipped byte count through
//! [`EventReader::take_resync`].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::{Event, EventError};
use crate::header::{EventHeader, HeaderError};

/// Magic bytes opening every frame: "HEPI".
pub const FRAME_MAGIC: [u8; 4] = *b"HEPI";
/// Current frame format version.
pub const FRAME_VERSION: u16 = 1;
/// Default limit on either frame section (256 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

const PREFIX_LEN: usize = 12;

/// Errors raised while reading or writing a framed stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying reader or writer failed.
    #[error("event stream I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The stream ended in the middle of a frame.
    #[error("event stream ended inside the frame {section}")]
    Truncated {
        /// Which part of the frame was cut short.
        section: &'static str,
    },
    /// The frame was written by an unsupported format version.
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u16),
    /// Reserved flag bits were set.
    #[error("frame flags must be zero, found {0:#06x}")]
    NonZeroFlags(u16),
    /// A frame section exceeds the configured limit.
    #[error("frame {section} length {len} exceeds limit {max}")]
    FrameTooLarge {
        /// `"header"` or `"payload"`.
        section: &'static str,
        /// Declared or actual length.
        len: u64,
        /// Limit in force.
        max: u64,
    },
    /// The frame header bytes did not decode.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// Header and payload did not form a valid event.
    #[error(transparent)]
    Event(#[from] EventError),
}

enum Sink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Writes events as frames.
///
/// Call [`EventWriter::finish`] when done; for gzip output this writes the
/// gzip trailer.
pub struct EventWriter<W: Write> {
    sink: Sink<W>,
    written: u64,
}

impl<W: Write> EventWriter<W> {
    /// Uncompressed writer.
    pub fn new(inner: W) -> Self {
        Self {
            sink: Sink::Plain(inner),
            written: 0,
        }
    }

    /// Gzip-compressed writer.
    pub fn gzip(inner: W) -> Self {
        Self {
            sink: Sink::Gzip(GzEncoder::new(inner, Compression::default())),
            written: 0,
        }
    }

    /// Writes one event frame.
    pub fn push(&mut self, event: &Event) -> Result<(), StreamError> {
        let header = event.header().encode()?;
        let header_len = section_len("header", header.len())?;
        let payload_len = section_len("payload", event.payload().len())?;

        let mut prefix = [0u8; PREFIX_LEN];
        prefix[0..2].copy_from_slice(&FRAME_VERSION.to_le_bytes());
        prefix[2..4].copy_from_slice(&0u16.to_le_bytes());
        prefix[4..8].copy_from_slice(&header_len.to_le_bytes());
        prefix[8..12].copy_from_slice(&payload_len.to_le_bytes());

        self.sink.write_all(&FRAME_MAGIC)?;
        self.sink.write_all(&prefix)?;
        self.sink.write_all(&header)?;
        self.sink.write_all(event.payload())?;
        self.written += 1;
        debug!(
            run = event.run_number(),
            event = event.event_number(),
            header_len,
            payload_len,
            "wrote event frame"
        );
        Ok(())
    }

    /// Flushes buffered output. Gzip output stays open.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.sink.flush()?;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn events_written(&self) -> u64 {
        self.written
    }

    /// Flushes, completes the gzip member if any, and returns the inner writer.
    pub fn finish(self) -> Result<W, StreamError> {
        match self.sink {
            Sink::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Sink::Gzip(enc) => {
                let mut w = enc.finish()?;
                w.flush()?;
                Ok(w)
            }
        }
    }
}

impl EventWriter<BufWriter<File>> {
    /// Creates `path`, compressing when the file name ends in `.gz`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);
        Ok(if is_gzip_path(path) {
            Self::gzip(file)
        } else {
            Self::new(file)
        })
    }
}

fn section_len(section: &'static str, len: usize) -> Result<u32, StreamError> {
    u32::try_from(len).map_err(|_| StreamError::FrameTooLarge {
        section,
        len: len as u64,
        max: u64::from(u32::MAX),
    })
}

/// Returns true when the path's file name ends in `.gz`.
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

enum Source<R: Read> {
    Plain(BufReader<R>),
    Gzip(BufReader<MultiGzDecoder<R>>),
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::Gzip(r) => r.read(buf),
        }
    }
}

/// Reads events from a framed stream.
pub struct EventReader<R: Read> {
    source: Source<R>,
    max_frame_len: u32,
    resync: Option<u64>,
    corrupt: Option<u64>,
    read: u64,
}

impl<R: Read> EventReader<R> {
    /// Reader over an uncompressed stream.
    pub fn new(inner: R) -> Self {
        Self::with_source(Source::Plain(BufReader::new(inner)))
    }

    /// Reader over a gzip-compressed stream. Concatenated gzip members are
    /// read as one stream.
    pub fn gzip(inner: R) -> Self {
        Self::with_source(Source::Gzip(BufReader::new(MultiGzDecoder::new(inner))))
    }

    fn with_source(source: Source<R>) -> Self {
        Self {
            source,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            resync: None,
            corrupt: None,
            read: 0,
        }
    }

    /// Sets the largest accepted header or payload section.
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Number of events decoded so far.
    pub fn events_read(&self) -> u64 {
        self.read
    }

    /// Returns and clears the number of bytes skipped while resynchronizing
    /// since the last call, if any were skipped.
    pub fn take_resync(&mut self) -> Option<u64> {
        self.resync.take()
    }

    /// Reads the next event. `Ok(None)` is a clean end of stream.
    ///
    /// After an error the reader stays usable: the next call resynchronizes
    /// on the following frame magic.
    pub fn next_event(&mut self) -> Result<Option<Event>, StreamError> {
        let Some((header_len, payload_len)) = self.next_prefix()? else {
            return Ok(None);
        };
        let header_bytes = self.read_section("header", header_len)?;
        let payload = self.read_section("payload", payload_len)?;
        let header = EventHeader::decode(&header_bytes)?;
        let event = Event::from_parts(header, payload)?;
        self.read += 1;
        debug!(
            run = event.run_number(),
            event = event.event_number(),
            collections = event.collection_count(),
            "read event frame"
        );
        Ok(Some(event))
    }

    /// Skips up to `n` frames without decoding them. Returns how many were
    /// skipped; fewer than `n` means the stream ended.
    ///
    /// A frame with a bad prefix or a cut-short body still occupies its
    /// position: it is counted, logged and reported through
    /// [`take_corrupt_frames`](Self::take_corrupt_frames). Only I/O errors
    /// abort the skip.
    pub fn skip_events(&mut self, n: usize) -> Result<usize, StreamError> {
        let mut skipped = 0;
        while skipped < n {
            match self.skip_frame() {
                Ok(true) => {}
                Ok(false) => break,
                Err(StreamError::Io(err)) => return Err(StreamError::Io(err)),
                Err(err) => {
                    warn!(%err, frame = skipped, "skipped corrupt frame");
                    *self.corrupt.get_or_insert(0) += 1;
                }
            }
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Returns and clears the number of corrupt frames passed over by
    /// [`skip_events`](Self::skip_events) since the last call.
    pub fn take_corrupt_frames(&mut self) -> Option<u64> {
        self.corrupt.take()
    }

    fn skip_frame(&mut self) -> Result<bool, StreamError> {
        let Some((header_len, payload_len)) = self.next_prefix()? else {
            return Ok(false);
        };
        let want = u64::from(header_len) + u64::from(payload_len);
        let got = io::copy(&mut (&mut self.source).take(want), &mut io::sink())?;
        if got < want {
            return Err(StreamError::Truncated { section: "body" });
        }
        Ok(true)
    }

    /// Finds the next magic and reads and validates the fixed prefix.
    fn next_prefix(&mut self) -> Result<Option<(u32, u32)>, StreamError> {
        if !self.sync()? {
            return Ok(None);
        }
        let mut prefix = [0u8; PREFIX_LEN];
        if read_full(&mut self.source, &mut prefix)? < PREFIX_LEN {
            return Err(StreamError::Truncated { section: "prefix" });
        }
        let version = u16::from_le_bytes([prefix[0], prefix[1]]);
        if version != FRAME_VERSION {
            return Err(StreamError::UnsupportedVersion(version));
        }
        let flags = u16::from_le_bytes([prefix[2], prefix[3]]);
        if flags != 0 {
            return Err(StreamError::NonZeroFlags(flags));
        }
        let header_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
        let payload_len = u32::from_le_bytes([prefix[8], prefix[9], prefix[10], prefix[11]]);
        self.check_len("header", header_len)?;
        self.check_len("payload", payload_len)?;
        Ok(Some((header_len, payload_len)))
    }

    /// Positions the reader just past the next magic. Returns false at end of
    /// stream.
    fn sync(&mut self) -> Result<bool, StreamError> {
        let mut window = [0u8; 4];
        let got = read_full(&mut self.source, &mut window)?;
        if got == 0 {
            return Ok(false);
        }
        if got < window.len() {
            self.note_resync(got as u64);
            return Ok(false);
        }
        let mut skipped = 0u64;
        while window != FRAME_MAGIC {
            let mut byte = [0u8; 1];
            if read_full(&mut self.source, &mut byte)? == 0 {
                self.note_resync(skipped + window.len() as u64);
                return Ok(false);
            }
            window.copy_within(1.., 0);
            window[3] = byte[0];
            skipped += 1;
        }
        if skipped > 0 {
            self.note_resync(skipped);
        }
        Ok(true)
    }

    fn note_resync(&mut self, skipped: u64) {
        warn!(skipped, "event stream out of sync, skipped bytes to next frame");
        *self.resync.get_or_insert(0) += skipped;
    }

    fn check_len(&self, section: &'static str, len: u32) -> Result<(), StreamError> {
        if len > self.max_frame_len {
            return Err(StreamError::FrameTooLarge {
                section,
                len: u64::from(len),
                max: u64::from(self.max_frame_len),
            });
        }
        Ok(())
    }

    fn read_section(&mut self, section: &'static str, len: u32) -> Result<Vec<u8>, StreamError> {
        // Grow with the bytes that arrive, not with the declared length.
        let mut buf = Vec::new();
        (&mut self.source).take(u64::from(len)).read_to_end(&mut buf)?;
        if buf.len() < len as usize {
            return Err(StreamError::Truncated { section });
        }
        Ok(buf)
    }
}

impl EventReader<File> {
    /// Opens `path`, decompressing when the file name ends in `.gz`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(if is_gzip_path(path) {
            Self::gzip(file)
        } else {
            Self::new(file)
        })
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = Result<Event, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Reads until `buf` is full or the reader reports end of input.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
