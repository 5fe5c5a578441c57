// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The hepio event container and its stream framing.
//!
//! An [`Event`] is a typed manifest of named collections plus one
//! concatenated payload buffer. Collections are appended with
//! [`Event::add_collection`] and decoded on demand with
//! [`Event::get_collection`]; nothing is cached. The byte range of a
//! collection is derived from the sizes of the collections before it.
//!
//! [`EventWriter`] and [`EventReader`] move whole events through any
//! `Write`/`Read`, one frame per event, with optional gzip compression.
#![forbid(unsafe_code)]

mod event;
pub mod header;
pub mod stream;

pub use event::{Event, EventError};
pub use header::{CollectionHeader, EventHeader, HeaderError};
pub use stream::{EventReader, EventWriter, StreamError};
