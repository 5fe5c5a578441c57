// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Human-readable rendering of a container event.

use std::io::{self, Write};

use comfy_table::Table;
use hepio_event::Event;

/// Writes event `index` of a stream: the run/event header, a manifest table
/// and every collection as pretty JSON.
///
/// A collection that fails to decode is reported inline and the rest of the
/// event is still written.
pub fn write_event<W: Write>(out: &mut W, index: u64, event: &Event) -> io::Result<()> {
    writeln!(
        out,
        "Event {index}: run {} event {}",
        event.run_number(),
        event.event_number()
    )?;
    writeln!(out, "{}", manifest(event))?;
    for (id, header) in (1u32..).zip(event.collections()) {
        writeln!(out, "{} collection ({})", header.name, header.kind)?;
        match event.get_collection_by_id(id) {
            Ok(Some(collection)) => {
                serde_json::to_writer_pretty(&mut *out, &collection).map_err(io::Error::from)?;
                writeln!(out)?;
            }
            Ok(None) => writeln!(out, "  <missing>")?,
            Err(err) => writeln!(out, "  <undecodable: {err}>")?,
        }
    }
    Ok(())
}

/// Manifest table: position, name, kind, payload bytes and derived offset.
pub fn manifest(event: &Event) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "name", "kind", "bytes", "offset"]);
    let mut offset = 0u64;
    for (id, header) in (1u32..).zip(event.collections()) {
        table.add_row(vec![
            id.to_string(),
            header.name.clone(),
            header.kind.to_string(),
            header.payload_size.to_string(),
            offset.to_string(),
        ]);
        offset += u64::from(header.payload_size);
    }
    table
}
