use std::path::Path;

use assert_cmd::Command;
use webmstream::{write_webm_doc_header, BufferSink, Id, Writer, KEYFRAME_FLAG};

fn simple_block(track: u8, relative: i16, flags: u8) -> Vec<u8> {
    let mut payload = vec![0x80 | track, (relative >> 8) as u8, relative as u8, flags];
    payload.extend_from_slice(&[0xCA, 0xFE]);
    payload
}

/// A minimal valid stream: one Opus track, two keyframe blocks.
fn fixture() -> Vec<u8> {
    let mut info = Writer::new(BufferSink::new());
    info.write_uint(Id::TimecodeScale, 1_000_000).unwrap();
    let info_body = info.into_sink().into_bytes();

    let mut tracks = Writer::new(BufferSink::new());
    tracks.write_master_start(Id::TrackEntry).unwrap();
    tracks.write_uint(Id::TrackNumber, 1).unwrap();
    tracks.write_uint(Id::TrackType, 2).unwrap();
    tracks.write_string(Id::CodecId, "A_OPUS").unwrap();
    tracks.write_master_end(Id::TrackEntry);
    let tracks_body = tracks.into_sink().into_bytes();

    let mut writer = Writer::new(BufferSink::new());
    write_webm_doc_header(&mut writer).unwrap();
    writer.write_master_start(Id::Segment).unwrap();
    writer.write_binary(Id::Info, &info_body).unwrap();
    writer.write_binary(Id::Tracks, &tracks_body).unwrap();
    writer.write_master_start(Id::Cluster).unwrap();
    writer.write_uint(Id::Timecode, 0).unwrap();
    writer
        .write_binary(Id::SimpleBlock, &simple_block(1, 0, KEYFRAME_FLAG))
        .unwrap();
    writer
        .write_binary(Id::SimpleBlock, &simple_block(1, 20, KEYFRAME_FLAG))
        .unwrap();
    writer.write_master_end(Id::Cluster);
    writer.write_master_end(Id::Segment);
    writer.into_sink().into_bytes()
}

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input.webm");
    std::fs::write(&path, fixture()).unwrap();
    path
}

fn remux_command() -> Command {
    Command::cargo_bin("webmremux").unwrap()
}

fn dump_command() -> Command {
    Command::cargo_bin("webmdump").unwrap()
}

#[test]
fn remux_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("output.webm");

    remux_command()
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let bytes = std::fs::read(&output).unwrap();
    // Starts with a fresh EBML header.
    assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
}

#[test]
fn remux_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());

    let assert = remux_command().arg(&input).arg("-").assert().success();
    assert!(!assert.get_output().stdout.is_empty());
}

#[test]
fn remux_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.webm");

    remux_command()
        .arg("-")
        .arg(&output)
        .write_stdin(fixture())
        .assert()
        .success();
}

#[test]
fn rejects_same_input_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());

    remux_command()
        .arg(&input)
        .arg(&input)
        .assert()
        .failure();
}

#[test]
fn rejects_out_of_range_cluster_duration() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let output = dir.path().join("output.webm");

    remux_command()
        .arg(&input)
        .arg(&output)
        .arg("--cm")
        .arg("30001")
        .assert()
        .failure();
}

#[test]
fn rejects_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    remux_command()
        .arg(dir.path().join("nope.webm"))
        .arg(dir.path().join("out.webm"))
        .assert()
        .failure();
}

#[test]
fn rejects_garbage_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("garbage.webm");
    std::fs::write(&input, [0u8; 32]).unwrap();

    remux_command()
        .arg(&input)
        .arg(dir.path().join("out.webm"))
        .assert()
        .failure();
}

#[test]
fn rejects_websocket_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());

    remux_command()
        .arg(&input)
        .arg("ws://localhost:9000/stream")
        .assert()
        .failure();
}

#[test]
fn dump_formats() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());

    let assert = dump_command().arg(&input).assert().success();
    let yaml = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(yaml.contains("Segment"));
    assert!(yaml.contains("SimpleBlock"));

    dump_command()
        .arg("-f")
        .arg("json")
        .arg(&input)
        .assert()
        .success();
}
