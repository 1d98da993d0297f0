#![forbid(missing_docs)]

//! Streaming toolkit for WebM containers.
//!
//! Three cores, usable separately or together:
//!
//! - a push-driven EBML [`Parser`] that turns incrementally fed bytes
//!   into element events without ever seeking the input,
//! - a streaming [`Writer`] that emits elements and patches master
//!   sizes in place when the sink is seekable,
//! - a [`Remuxer`] that rebuilds a WebM stream with keyframe-aligned
//!   clusters, a seek head and a cue table.
//!
//! The parser side layers an [`ElementParser`] on top of the low-level
//! parser to deliver typed payloads, with the [`Schema`] deciding how
//! each element is decoded. All registries are explicit values; there
//! is no global schema state.

mod block;
mod dump;
mod element;
mod error;
mod filter;
mod header;
mod ids;
mod info;
mod parser;
mod remux;
mod schema;
mod sink;
mod tracks;
pub mod varint;
mod writer;

pub use block::{parse_block_header, BlockHeader, KEYFRAME_FLAG};
pub use dump::{dump, DumpClient, Record, Value};
pub use element::{ElementClient, ElementParser};
pub use error::Error;
pub use filter::filter;
pub use header::{parse_doc_header, write_webm_doc_header, DocInfo};
pub use ids::{Id, Type};
pub use info::{parse_info, SegmentInfo};
pub use parser::{Parser, ParserClient};
pub use remux::{remux, remuxer_schema, Remuxer, SEEK_HEAD_RESERVE_SIZE};
pub use schema::{Schema, UnknownSizeInfo};
pub use sink::{BufferSink, PipeSink, Sink};
pub use tracks::{parse_tracks, Track, TrackKind};
pub use writer::Writer;

/// Result type helper
pub type Result<T> = std::result::Result<T, Error>;
type IResult<T, O> = Result<(T, O)>;

fn take<'a>(
    len: impl nom::ToUsize,
) -> impl Fn(&'a [u8]) -> std::result::Result<(&'a [u8], &'a [u8]), nom::Err<()>> {
    nom::bytes::streaming::take(len)
}
