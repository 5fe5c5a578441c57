// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
//! End-to-end runs of `hepio-convert` and `hepio-ls`.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DUMP: &str = r#"
{ "run_number": 1, "event_number": 10,
  "collections": [
    { "name": "MCParticle", "kind": "MCParticle",
      "records": [ { "pdg": 13, "children": [{"collection": "MCParticle", "index": 1}] },
                   { "pdg": 11, "parents": [{"collection": "MCParticle", "index": 0}] } ] },
    { "name": "EcalHits", "kind": "CalorimeterHit",
      "records": [ { "cell_id0": 4242, "energy": 1.5 } ] } ] }
{ "run_number": 1, "event_number": 11,
  "collections": [
    { "name": "EcalHits", "kind": "CalorimeterHit",
      "records": [ { "cell_id0": 77 } ] } ] }
"#;

fn tool(name: &str, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin(name).unwrap();
    cmd.env("HEPIO_CONFIG_DIR", config).env_remove("RUST_LOG");
    cmd
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("events.json");
    fs::write(&dump, DUMP).unwrap();
    (dir, dump)
}

#[test]
fn convert_to_file_then_list() {
    let (dir, dump) = setup();
    let out = dir.path().join("events.hepio");
    tool("hepio-convert", dir.path())
        .arg("-o")
        .arg(&out)
        .arg(&dump)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    tool("hepio-ls", dir.path())
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Event 0: run 1 event 10"))
        .stdout(predicate::str::contains("Event 1: run 1 event 11"))
        .stdout(predicate::str::contains("MCParticle collection"))
        .stdout(predicate::str::contains("\"pdg\": 13"))
        .stdout(predicate::str::contains("\"cell_id0\": 4242"));
}

#[test]
fn gz_output_suffix_is_compressed_and_detected() {
    let (dir, dump) = setup();
    let out = dir.path().join("events.hepio.gz");
    tool("hepio-convert", dir.path())
        .arg("-o")
        .arg(&out)
        .arg(&dump)
        .assert()
        .success();
    assert_eq!(&fs::read(&out).unwrap()[..2], &[0x1f, 0x8b]);

    tool("hepio-ls", dir.path())
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cell_id0\": 77"));
}

#[test]
fn gzip_stdout_pipes_into_stdin() {
    let (dir, dump) = setup();
    let output = tool("hepio-convert", dir.path())
        .arg("-g")
        .arg(&dump)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(&output.stdout[..2], &[0x1f, 0x8b]);

    tool("hepio-ls", dir.path())
        .args(["-g", "-"])
        .write_stdin(output.stdout)
        .assert()
        .success()
        .stdout(predicate::str::contains("Event 1: run 1 event 11"));
}

#[test]
fn select_single_event() {
    let (dir, dump) = setup();
    let out = dir.path().join("events.hepio");
    tool("hepio-convert", dir.path())
        .arg("-o")
        .arg(&out)
        .arg(&dump)
        .assert()
        .success();

    tool("hepio-ls", dir.path())
        .args(["-e", "1"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Event 1: run 1 event 11"))
        .stdout(predicate::str::contains("event 10").not());
}

#[test]
fn selecting_past_the_end_fails() {
    let (dir, dump) = setup();
    let out = dir.path().join("events.hepio");
    tool("hepio-convert", dir.path())
        .arg("-o")
        .arg(&out)
        .arg(&dump)
        .assert()
        .success();

    tool("hepio-ls", dir.path())
        .args(["-e", "5"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("beyond end of stream"));
}

#[test]
fn corrupt_frame_before_the_selection_is_passed_over() {
    let (dir, dump) = setup();
    let out = dir.path().join("events.hepio");
    tool("hepio-convert", dir.path())
        .arg("-o")
        .arg(&out)
        .arg(&dump)
        .assert()
        .success();
    let mut bytes = fs::read(&out).unwrap();
    // Version field of the first frame.
    bytes[4] = 9;
    fs::write(&out, bytes).unwrap();

    tool("hepio-ls", dir.path())
        .args(["-e", "1"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Event 1: run 1 event 11"))
        .stderr(predicate::str::contains("corrupt"));

    tool("hepio-ls", dir.path())
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Event 0:").not())
        .stdout(predicate::str::contains("Event 1: run 1 event 11"))
        .stderr(predicate::str::contains("skipping unreadable event"));

    tool("hepio-ls", dir.path())
        .args(["-e", "0"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read event 0"));
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    tool("hepio-convert", dir.path())
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));
    tool("hepio-ls", dir.path())
        .arg(&missing)
        .assert()
        .failure();
}

#[test]
fn malformed_dump_fails() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("bad.json");
    fs::write(&dump, "{ \"run_number\": ").unwrap();
    tool("hepio-convert", dir.path())
        .arg(&dump)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse dump event 0"));
}

#[test]
fn garbage_input_with_no_events_fails() {
    let dir = tempfile::tempdir().unwrap();
    tool("hepio-ls", dir.path())
        .arg("-")
        .write_stdin(b"HEPI\x00\x09\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read event 0"));
}

#[test]
fn empty_stream_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    tool("hepio-ls", dir.path())
        .arg("-")
        .write_stdin(Vec::new())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn stored_prefs_gzip_stdout() {
    let (dir, dump) = setup();
    fs::write(dir.path().join("tools.json"), r#"{"gzip_output": true}"#).unwrap();
    let output = tool("hepio-convert", dir.path()).arg(&dump).output().unwrap();
    assert!(output.status.success());
    assert_eq!(&output.stdout[..2], &[0x1f, 0x8b]);
}
