//! WebM remuxing.
//!
//! Consumes a parsed WebM stream and rewrites it with blocks
//! re-interleaved into keyframe-aligned clusters, a seek head at the
//! front of the segment, and (on seekable output) a cue table at the
//! back. Input clusters only provide timecodes; output cluster
//! boundaries are chosen here.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read};

use tracing::warn;

use crate::block::{parse_block_header, KEYFRAME_FLAG};
use crate::header::{parse_doc_header, write_webm_doc_header};
use crate::info::parse_info;
use crate::tracks::{parse_tracks, Track, TrackKind};
use crate::{
    filter, BufferSink, ElementClient, ElementParser, Id, Parser, Schema, Sink, Type,
    UnknownSizeInfo, Writer,
};

/// Bytes reserved at the segment body start for the final SeekHead plus
/// its Void padding.
pub const SEEK_HEAD_RESERVE_SIZE: usize = 124;

struct Block {
    track: u64,
    is_simple: bool,
    timecode: i64,
    flags: u8,
    data: Vec<u8>,
    extra: Vec<u8>,
}

impl Block {
    fn is_keyframe(&self) -> bool {
        self.flags & KEYFRAME_FLAG != 0
    }
}

struct Cue {
    timecode: i64,
    offset: u64,
    track: u64,
}

/// Element-parser client that performs the remux.
///
/// Expects the event stream produced by [`remuxer_schema`]: Info and
/// Tracks arrive as whole binary blobs, Segment and Cluster as master
/// events, blocks as binary payloads.
///
/// Per-track queues grow with the distance between keyframes, since a
/// cluster boundary can only be placed once enough lookahead has
/// arrived; the final drain on segment end empties them.
pub struct Remuxer<S> {
    writer: Writer<S>,
    min_cluster_duration_ms: u64,

    read_ebml_header: bool,
    timecode_scale: u64,
    min_cluster_duration: i64,
    cluster_timecode: Option<i64>,

    tracks: Vec<Track>,
    vorbis_tracks: HashSet<u64>,
    blocks: HashMap<u64, VecDeque<Block>>,
    cues: Vec<Cue>,

    output_segment_offset: Option<u64>,
    output_info_offset: Option<u64>,
    output_tracks_offset: Option<u64>,
    output_cluster_offset: Option<u64>,
    output_cues_offset: Option<u64>,
    output_cluster_timecode: Option<i64>,
}

/// The top-level type registry the remuxer parses with.
///
/// Info and Tracks are deliberately registered as binary so their whole
/// subtrees are captured for the sub-parsers; everything unregistered
/// (SeekHead, Cues, BlockGroup, ...) falls back to binary as well.
pub fn remuxer_schema() -> Schema {
    Schema::new(&[
        (Id::Ebml, Type::Binary),
        (Id::Segment, Type::Master),
        (Id::Info, Type::Binary),
        (Id::Tracks, Type::Binary),
        (Id::Cluster, Type::Master),
        (Id::Timecode, Type::Unsigned),
        (Id::SimpleBlock, Type::Binary),
    ])
}

impl<S: Sink> Remuxer<S> {
    /// Creates a remuxer writing into `writer`.
    ///
    /// `min_cluster_duration_ms` is the smallest spacing between output
    /// cluster starts; a keyframe closer than that to the open cluster's
    /// timecode does not begin a new cluster.
    pub fn new(writer: Writer<S>, min_cluster_duration_ms: u64) -> Self {
        Self {
            writer,
            min_cluster_duration_ms,
            read_ebml_header: false,
            timecode_scale: 0,
            min_cluster_duration: 0,
            cluster_timecode: None,
            tracks: Vec::new(),
            vorbis_tracks: HashSet::new(),
            blocks: HashMap::new(),
            cues: Vec::new(),
            output_segment_offset: None,
            output_info_offset: None,
            output_tracks_offset: None,
            output_cluster_offset: None,
            output_cues_offset: None,
            output_cluster_timecode: None,
        }
    }

    /// Consumes the remuxer, returning its writer.
    pub fn into_writer(self) -> Writer<S> {
        self.writer
    }

    fn handle_ebml_header(&mut self, value: &[u8]) -> bool {
        if self.read_ebml_header {
            warn!("second EBML header in stream");
            return false;
        }
        let Some(doc) = parse_doc_header(value) else {
            return false;
        };
        if doc.doc_type != "webm" {
            warn!(doc_type = %doc.doc_type, "unsupported DocType");
            return false;
        }
        if doc.doc_type_read_version > 2 {
            warn!(
                doc_type_read_version = doc.doc_type_read_version,
                "unsupported DocTypeReadVersion"
            );
            return false;
        }
        self.read_ebml_header = true;

        // The output header is built fresh, not byte-copied.
        write_webm_doc_header(&mut self.writer).is_ok()
    }

    fn handle_info(&mut self, value: &[u8]) -> bool {
        let Some(info) = parse_info(value) else {
            return false;
        };
        self.timecode_scale = info.timecode_scale;

        let ticks_per_second = (1_000_000_000 / self.timecode_scale) as f64;
        self.min_cluster_duration =
            (ticks_per_second * self.min_cluster_duration_ms as f64 / 1000.0) as i64;

        self.output_info_offset = Some(self.writer.offset());
        self.writer.write_binary(Id::Info, value).is_ok()
    }

    fn handle_tracks(&mut self, value: &[u8]) -> bool {
        let Some(tracks) = parse_tracks(value) else {
            return false;
        };
        for track in &tracks {
            self.blocks.insert(track.number, VecDeque::new());
            if track.codec_id == "A_VORBIS" {
                self.vorbis_tracks.insert(track.number);
            }
        }
        self.tracks = tracks;

        self.output_tracks_offset = Some(self.writer.offset());

        // Drop deprecated elements on the way through.
        let Some(filtered) = filter(
            value,
            &[Id::FrameRate],
            &Schema::webm(),
            &UnknownSizeInfo::webm(),
        ) else {
            return false;
        };
        self.writer.write_binary(Id::Tracks, &filtered).is_ok()
    }

    fn handle_simple_block(&mut self, value: &[u8]) -> bool {
        let Some(cluster_timecode) = self.cluster_timecode else {
            warn!("SimpleBlock before the cluster Timecode");
            return false;
        };

        let Some(header) = parse_block_header(value) else {
            warn!(len = value.len(), "invalid SimpleBlock");
            return false;
        };

        let timecode = cluster_timecode + i64::from(header.timecode);
        let mut flags = header.flags;

        // Some historical muxers emit Vorbis blocks without the keyframe
        // flag even though every Vorbis frame is independently decodable.
        if self.vorbis_tracks.contains(&header.track_number) {
            flags |= KEYFRAME_FLAG;
        }

        let Some(queue) = self.blocks.get_mut(&header.track_number) else {
            warn!(track = header.track_number, "block for unknown track");
            return false;
        };
        queue.push_back(Block {
            track: header.track_number,
            is_simple: true,
            timecode,
            flags,
            data: value[header.header_size..].to_vec(),
            extra: Vec::new(),
        });

        self.try_writing_next_block()
    }

    fn handle_block_group(&mut self, value: &[u8]) -> bool {
        let Some(cluster_timecode) = self.cluster_timecode else {
            warn!("BlockGroup before the cluster Timecode");
            return false;
        };

        let schema = Schema::new(&[
            (Id::Block, Type::Binary),
            (Id::BlockAdditions, Type::Binary),
            (Id::BlockDuration, Type::Unsigned),
            (Id::ReferenceBlock, Type::Signed),
            (Id::DiscardPadding, Type::Signed),
        ]);
        let client = BlockGroupClient {
            block: None,
            writer: Writer::new(BufferSink::with_capacity(value.len())),
        };
        let mut parser = Parser::new(
            schema.clone(),
            UnknownSizeInfo::webm(),
            ElementParser::new(client, schema),
        );
        if !parser.append(value) {
            warn!("failed to parse BlockGroup");
            return false;
        }
        parser.end_of_data();

        let client = parser.into_client().into_client();
        let Some(inner) = client.block else {
            warn!("BlockGroup without a Block");
            return false;
        };
        let extra = client.writer.into_sink().into_bytes();

        let timecode = cluster_timecode + i64::from(inner.timecode);
        let Some(queue) = self.blocks.get_mut(&inner.track) else {
            warn!(track = inner.track, "block for unknown track");
            return false;
        };
        queue.push_back(Block {
            track: inner.track,
            is_simple: false,
            timecode,
            flags: inner.flags,
            data: inner.data,
            extra,
        });

        self.try_writing_next_block()
    }

    fn try_writing_next_block(&mut self) -> bool {
        let video_track = self
            .tracks
            .iter()
            .filter(|track| track.kind == TrackKind::Video)
            .last()
            .map(|track| track.number);
        let audio_track = self
            .tracks
            .iter()
            .filter(|track| track.kind == TrackKind::Audio)
            .last()
            .map(|track| track.number);

        let (video_track, audio_track) = match (video_track, audio_track) {
            (Some(video), Some(audio)) => (video, audio),
            (None, Some(audio)) => return self.write_next_single_stream_block(audio),
            (Some(video), None) => return self.write_next_single_stream_block(video),
            (None, None) => return true,
        };

        // Need one video block and two audio blocks of lookahead to
        // place a cluster boundary.
        if self.blocks[&video_track].is_empty() || self.blocks[&audio_track].len() < 2 {
            return true;
        }

        let video = &self.blocks[&video_track][0];
        let audio0 = &self.blocks[&audio_track][0];
        let audio1 = &self.blocks[&audio_track][1];

        let open_timecode = self.output_cluster_timecode.unwrap_or(-1);
        if video.is_keyframe()
            && audio0.is_keyframe()
            && audio0.timecode <= video.timecode
            && audio1.timecode > video.timecode
            && audio0.timecode - open_timecode >= self.min_cluster_duration
        {
            // A new cluster can start at the audio block that leads the
            // video keyframe.
            let (track, timecode) = (audio0.track, audio0.timecode);
            if !self.start_new_cluster(track, timecode) {
                return false;
            }
        }

        let pick_audio =
            self.blocks[&audio_track][0].timecode <= self.blocks[&video_track][0].timecode;
        let from = if pick_audio { audio_track } else { video_track };
        let block = self
            .blocks
            .get_mut(&from)
            .and_then(VecDeque::pop_front)
            .unwrap();
        self.write_block(block)
    }

    fn write_next_single_stream_block(&mut self, track: u64) -> bool {
        let Some(queue) = self.blocks.get(&track) else {
            return true;
        };
        if queue.len() < 2 {
            return true;
        }

        let block = &queue[0];
        let cluster_duration = block.timecode - self.output_cluster_timecode.unwrap_or(-1);
        if block.is_keyframe() && cluster_duration >= self.min_cluster_duration {
            let (track_number, timecode) = (block.track, block.timecode);
            if !self.start_new_cluster(track_number, timecode) {
                return false;
            }
        }

        let block = self
            .blocks
            .get_mut(&track)
            .and_then(VecDeque::pop_front)
            .unwrap();
        self.write_block(block)
    }

    fn start_new_cluster(&mut self, track: u64, timecode: i64) -> bool {
        if self.output_cluster_timecode.is_some() {
            self.writer.write_master_end(Id::Cluster);
        }

        self.cues.push(Cue {
            timecode,
            offset: self.writer.offset(),
            track,
        });

        assert!(timecode >= 0, "negative cluster timecode {timecode}");
        self.output_cluster_timecode = Some(timecode);

        self.writer.write_master_start(Id::Cluster).is_ok()
            && self.writer.write_int(Id::Timecode, timecode).is_ok()
    }

    fn write_block(&mut self, block: Block) -> bool {
        assert!(
            block.track <= 0x7F,
            "track number {} does not fit a one-byte block header",
            block.track
        );

        if self.output_cluster_timecode.is_none() {
            assert!(
                block.is_keyframe(),
                "first block of a cluster is not a keyframe"
            );
            if !self.start_new_cluster(block.track, block.timecode) {
                return false;
            }
        }

        let relative = block.timecode - self.output_cluster_timecode.unwrap();
        assert!(
            relative <= 0x7FFF,
            "block timecode {} overflows its cluster at {}",
            block.timecode,
            self.output_cluster_timecode.unwrap()
        );

        let mut payload = Vec::with_capacity(4 + block.data.len());
        payload.push(0x80 | block.track as u8);
        payload.push((relative >> 8) as u8);
        payload.push((relative & 0xFF) as u8);
        payload.push(block.flags);
        payload.extend_from_slice(&block.data);

        if block.is_simple {
            self.writer.write_binary(Id::SimpleBlock, &payload).is_ok()
        } else {
            if self.writer.write_master_start(Id::BlockGroup).is_err()
                || self.writer.write_binary(Id::Block, &payload).is_err()
                || self.writer.write_raw(&block.extra).is_err()
            {
                return false;
            }
            self.writer.write_master_end(Id::BlockGroup);
            true
        }
    }

    fn write_remaining_blocks(&mut self) -> bool {
        loop {
            // Smallest timecode across the track queues; ties go to the
            // earlier track so the output is deterministic.
            let mut next: Option<(u64, i64)> = None;
            for track in &self.tracks {
                if let Some(block) = self.blocks.get(&track.number).and_then(VecDeque::front) {
                    if next.map_or(true, |(_, timecode)| block.timecode < timecode) {
                        next = Some((track.number, block.timecode));
                    }
                }
            }

            let Some((track, _)) = next else {
                return true;
            };
            let block = self
                .blocks
                .get_mut(&track)
                .and_then(VecDeque::pop_front)
                .unwrap();

            // The boundary rule still applies while draining; without it
            // a late keyframe would stretch the open cluster
            // arbitrarily.
            let cluster_duration = block.timecode - self.output_cluster_timecode.unwrap_or(-1);
            if block.is_keyframe()
                && cluster_duration >= self.min_cluster_duration
                && !self.start_new_cluster(block.track, block.timecode)
            {
                return false;
            }
            if !self.write_block(block) {
                return false;
            }
        }
    }

    fn write_cues(&mut self) -> bool {
        let Some(segment_offset) = self.output_segment_offset else {
            return false;
        };

        self.output_cues_offset = Some(self.writer.offset());
        if self.writer.write_master_start(Id::Cues).is_err() {
            return false;
        }
        for index in 0..self.cues.len() {
            let (timecode, offset, track) = {
                let cue = &self.cues[index];
                (cue.timecode, cue.offset, cue.track)
            };
            let ok = self.writer.write_master_start(Id::CuePoint).is_ok()
                && self.writer.write_int(Id::CueTime, timecode).is_ok()
                && self.writer.write_master_start(Id::CueTrackPositions).is_ok()
                && self.writer.write_uint(Id::CueTrack, track).is_ok()
                && self
                    .writer
                    .write_int(Id::CueClusterPosition, (offset - segment_offset) as i64)
                    .is_ok();
            if !ok {
                return false;
            }
            self.writer.write_master_end(Id::CueTrackPositions);
            self.writer.write_master_end(Id::CuePoint);
        }
        self.writer.write_master_end(Id::Cues);
        true
    }

    fn write_seek_head(&mut self) -> bool {
        if self.writer.write_master_start(Id::SeekHead).is_err() {
            return false;
        }
        let entries = [
            (Id::Info, self.output_info_offset),
            (Id::Tracks, self.output_tracks_offset),
            (Id::Cluster, self.output_cluster_offset),
            (Id::Cues, self.output_cues_offset),
        ];
        for (id, offset) in entries {
            if let Some(offset) = offset {
                if !self.write_seek(id, offset) {
                    return false;
                }
            }
        }
        self.writer.write_master_end(Id::SeekHead);
        true
    }

    fn write_seek(&mut self, id: Id, offset: u64) -> bool {
        let Some(segment_offset) = self.output_segment_offset else {
            return false;
        };
        let ok = self.writer.write_master_start(Id::Seek).is_ok()
            && self
                .writer
                .write_uint(Id::SeekId, u64::from(id.value()))
                .is_ok()
            && self
                .writer
                .write_uint(Id::SeekPosition, offset - segment_offset)
                .is_ok();
        if !ok {
            return false;
        }
        self.writer.write_master_end(Id::Seek);
        true
    }

    fn finish_segment(&mut self) -> bool {
        if self.output_cluster_timecode.is_some() {
            if !self.write_remaining_blocks() {
                return false;
            }
            self.writer.write_master_end(Id::Cluster);
        }

        if self.writer.can_seek() && !self.write_cues() {
            return false;
        }

        let Some(segment_offset) = self.output_segment_offset else {
            return false;
        };
        let resume_offset = self.writer.offset();
        if self.writer.set_offset(segment_offset) {
            if !self.write_seek_head() {
                return false;
            }

            if let Some(info_offset) = self.output_info_offset {
                let offset = self.writer.offset();
                assert!(
                    offset <= info_offset,
                    "seek head overflowed its {SEEK_HEAD_RESERVE_SIZE} byte reserve"
                );
                if offset < info_offset
                    && self.writer.write_void((info_offset - offset) as usize).is_err()
                {
                    return false;
                }
            }

            if !self.writer.set_offset(resume_offset) {
                return false;
            }
        }

        self.writer.write_master_end(Id::Segment);
        true
    }
}

impl<S: Sink> ElementClient for Remuxer<S> {
    fn on_master_start(&mut self, _offset: u64, id: Id) -> bool {
        if !self.read_ebml_header {
            warn!(element = id.name(), "element before the EBML header");
            return false;
        }

        match id {
            Id::Segment => {
                if self.writer.write_master_start(Id::Segment).is_err() {
                    return false;
                }
                self.output_segment_offset = Some(self.writer.offset());
                self.writer.write_void(SEEK_HEAD_RESERVE_SIZE).is_ok()
            }
            Id::Cluster => {
                self.cluster_timecode = None;
                if self.output_cluster_offset.is_none() {
                    self.output_cluster_offset = Some(self.writer.offset());
                }
                true
            }
            _ => {
                warn!(element = id.name(), "unexpected master element");
                false
            }
        }
    }

    fn on_master_end(&mut self, _offset: u64, id: Id) -> bool {
        match id {
            Id::Segment => self.finish_segment(),
            Id::Cluster => true,
            _ => {
                warn!(element = id.name(), "unexpected master element end");
                false
            }
        }
    }

    fn on_binary(&mut self, id: Id, value: &[u8]) -> bool {
        if id == Id::Ebml {
            return self.handle_ebml_header(value);
        }

        if !self.read_ebml_header {
            warn!(element = id.name(), "element before the EBML header");
            return false;
        }

        match id {
            Id::Void | Id::SeekHead | Id::Cues | Id::PrevSize | Id::Position => true,
            Id::Info => self.handle_info(value),
            Id::Tracks => self.handle_tracks(value),
            Id::SimpleBlock => self.handle_simple_block(value),
            Id::BlockGroup => self.handle_block_group(value),
            _ => {
                warn!(element = id.name(), size = value.len(), "unexpected element");
                false
            }
        }
    }

    fn on_int(&mut self, id: Id, _value: i64) -> bool {
        warn!(element = id.name(), "unexpected integer element");
        false
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        if !self.read_ebml_header {
            warn!(element = id.name(), "element before the EBML header");
            return false;
        }

        if id == Id::Timecode {
            self.cluster_timecode = Some(value as i64);
            return true;
        }

        warn!(element = id.name(), "unexpected unsigned element");
        false
    }

    fn on_float(&mut self, id: Id, _value: f64) -> bool {
        warn!(element = id.name(), "unexpected float element");
        false
    }

    fn on_string(&mut self, id: Id, _value: &str) -> bool {
        warn!(element = id.name(), "unexpected string element");
        false
    }
}

struct InnerBlock {
    track: u64,
    timecode: i16,
    flags: u8,
    data: Vec<u8>,
}

struct BlockGroupClient {
    block: Option<InnerBlock>,
    writer: Writer<BufferSink>,
}

impl ElementClient for BlockGroupClient {
    fn on_master_start(&mut self, _offset: u64, id: Id) -> bool {
        warn!(element = id.name(), "unexpected element in BlockGroup");
        false
    }

    fn on_master_end(&mut self, _offset: u64, id: Id) -> bool {
        warn!(element = id.name(), "unexpected element in BlockGroup");
        false
    }

    fn on_binary(&mut self, id: Id, value: &[u8]) -> bool {
        match id {
            Id::Block => {
                let Some(header) = parse_block_header(value) else {
                    warn!(len = value.len(), "invalid Block");
                    return false;
                };
                self.block = Some(InnerBlock {
                    track: header.track_number,
                    timecode: header.timecode,
                    // A Block has no keyframe or discardable bits; only
                    // the lacing nibble carries over.
                    flags: header.flags & 0x0F,
                    data: value[header.header_size..].to_vec(),
                });
                true
            }
            Id::BlockAdditions => self.writer.write_binary(id, value).is_ok(),
            _ => {
                warn!(element = id.name(), "unexpected element in BlockGroup");
                false
            }
        }
    }

    fn on_int(&mut self, id: Id, value: i64) -> bool {
        match id {
            Id::ReferenceBlock | Id::DiscardPadding => self.writer.write_int(id, value).is_ok(),
            _ => {
                warn!(element = id.name(), "unexpected element in BlockGroup");
                false
            }
        }
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        if id == Id::BlockDuration {
            return self.writer.write_uint(id, value).is_ok();
        }
        warn!(element = id.name(), "unexpected element in BlockGroup");
        false
    }

    fn on_float(&mut self, id: Id, _value: f64) -> bool {
        warn!(element = id.name(), "unexpected element in BlockGroup");
        false
    }

    fn on_string(&mut self, id: Id, _value: &str) -> bool {
        warn!(element = id.name(), "unexpected element in BlockGroup");
        false
    }
}

/// Remuxes a whole WebM stream.
///
/// Reads `input` to end of file, driving a [`Remuxer`] over
/// [`remuxer_schema`]. A stream that fails to parse (or violates the
/// WebM constraints above) surfaces as [`io::ErrorKind::InvalidData`];
/// the writer is returned on success so callers can recover the sink.
pub fn remux<R: Read, S: Sink>(
    mut input: R,
    writer: Writer<S>,
    min_cluster_duration_ms: u64,
) -> io::Result<Writer<S>> {
    let remuxer = Remuxer::new(writer, min_cluster_duration_ms);
    let mut parser = Parser::new(
        remuxer_schema(),
        UnknownSizeInfo::webm(),
        ElementParser::new(remuxer, remuxer_schema()),
    );

    let mut buf = [0u8; 1024];
    loop {
        let bytes_read = input.read(&mut buf)?;
        if bytes_read == 0 {
            parser.end_of_data();
            break;
        }
        if !parser.append(&buf[..bytes_read]) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "failed to parse input stream",
            ));
        }
    }

    Ok(parser.into_client().into_client().into_writer())
}
