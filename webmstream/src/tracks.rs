//! Tracks sub-parser.

use tracing::warn;

use crate::{ElementClient, ElementParser, Id, Parser, Schema, Type, UnknownSizeInfo};

/// Broad class of a track, from the Matroska TrackType value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// TrackType 1.
    Video,
    /// TrackType 2.
    Audio,
    /// Anything else (subtitles, buttons, ...).
    Other,
}

impl TrackKind {
    fn from_raw(raw: u64) -> Self {
        match raw {
            1 => Self::Video,
            2 => Self::Audio,
            _ => Self::Other,
        }
    }
}

/// One TrackEntry, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// TrackNumber, as used by block headers.
    pub number: u64,
    /// Video / audio / other.
    pub kind: TrackKind,
    /// CodecID, e.g. "V_VP8" or "A_VORBIS".
    pub codec_id: String,
}

#[derive(Default)]
struct TracksClient {
    tracks: Vec<Track>,
    number: u64,
    raw_kind: u64,
    codec_id: String,
}

impl ElementClient for TracksClient {
    fn on_master_start(&mut self, _offset: u64, id: Id) -> bool {
        if id != Id::TrackEntry {
            return false;
        }
        self.number = 0;
        self.raw_kind = 0;
        self.codec_id.clear();
        true
    }

    fn on_master_end(&mut self, _offset: u64, id: Id) -> bool {
        if id != Id::TrackEntry {
            return false;
        }
        self.tracks.push(Track {
            number: self.number,
            kind: TrackKind::from_raw(self.raw_kind),
            codec_id: self.codec_id.clone(),
        });
        true
    }

    fn on_binary(&mut self, _id: Id, _value: &[u8]) -> bool {
        true
    }

    fn on_int(&mut self, _id: Id, _value: i64) -> bool {
        false
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        match id {
            Id::TrackNumber => self.number = value,
            Id::TrackType => self.raw_kind = value,
            _ => return false,
        }
        true
    }

    fn on_float(&mut self, _id: Id, _value: f64) -> bool {
        false
    }

    fn on_string(&mut self, id: Id, value: &str) -> bool {
        if id != Id::CodecId {
            return false;
        }
        self.codec_id = value.to_string();
        true
    }
}

/// Parses the body of a Tracks element into its entries.
pub fn parse_tracks(buf: &[u8]) -> Option<Vec<Track>> {
    let schema = Schema::new(&[
        (Id::TrackEntry, Type::Master),
        (Id::TrackNumber, Type::Unsigned),
        (Id::TrackType, Type::Unsigned),
        (Id::CodecId, Type::String),
    ]);
    let mut parser = Parser::new(
        schema.clone(),
        UnknownSizeInfo::none(),
        ElementParser::new(TracksClient::default(), schema),
    );

    if !parser.append(buf) {
        warn!("failed to parse Tracks element");
        return None;
    }

    Some(parser.into_client().into_client().tracks)
}
