//! CLI end-to-end tests
//!
//! Tests for the adbridge command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

use adbridge_media::emsg::build_emsg_v0;
use adbridge_media::id3::build_tag;

/// Get a command for the adbridge binary
#[allow(deprecated)]
fn adbridge() -> Command {
    Command::cargo_bin("adbridge").unwrap()
}

fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

#[test]
fn test_version() {
    adbridge()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("adbridge "));
}

#[test]
fn test_map_time() {
    adbridge()
        .args(["map-time", "--break", "10:5", "--break", "30:10", "45", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> content 30.000"))
        .stdout(predicate::str::contains("-> content 10.000 (in ad break)"))
        .stdout(predicate::str::contains("scheduled at content 25.000"));
}

#[test]
fn test_map_time_reverse() {
    adbridge()
        .args(["map-time", "--break", "10:5", "--reverse", "10", "11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("content    10.000 -> absolute 10.000"))
        .stdout(predicate::str::contains("content    11.000 -> absolute 16.000"));
}

#[test]
fn test_map_time_rejects_bad_break() {
    adbridge()
        .args(["map-time", "--break", "10", "45"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("start:duration"));
}

#[test]
fn test_synthesize() {
    adbridge()
        .args(["synthesize", "--id", "dr", "--start", "20", "--duration", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("YMID=dr"))
        .stdout(predicate::str::contains("YTYP=S"))
        .stdout(predicate::str::contains("20.100  S"))
        .stdout(predicate::str::contains("23.900  E"));
}

#[test]
fn test_synthesize_needs_end() {
    adbridge()
        .args(["synthesize", "--id", "dr", "--start", "20"])
        .assert()
        .failure();
}

#[test]
fn test_parse_tag() {
    let tag = build_tag(0x0300, 0, &[("TXXX", "YMID=abc,YSEQ=1:1,YTYP=S,YDUR=0.1")]);
    let file = write_temp(&tag);

    adbridge()
        .arg("parse-tag")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Kind: id3"))
        .stdout(predicate::str::contains("Media ID: abc"));
}

#[test]
fn test_parse_tag_emsg() {
    let data = build_emsg_v0(
        "urn:example:ads",
        "",
        1000,
        2500,
        b"YMID=m1,YSEQ=2:3,YTYP=M,YDUR=15",
    );
    let file = write_temp(&data);

    adbridge()
        .arg("parse-tag")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Kind: emsg"))
        .stdout(predicate::str::contains("Presentation: 2.500s"))
        .stdout(predicate::str::contains("Media ID: m1"));
}

#[test]
fn test_parse_tag_json() {
    let tag = build_tag(0x0300, 0, &[("TXXX", "YMID=abc,YSEQ=1:1,YTYP=S,YDUR=0.1")]);
    let file = write_temp(&tag);

    let output = adbridge()
        .arg("parse-tag")
        .arg(file.path())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["kind"], "id3");
    assert_eq!(parsed["record"]["media_id"], "abc");
    assert_eq!(parsed["record"]["kind"], "start");
}

#[test]
fn test_parse_tag_unsupported_version() {
    let tag = build_tag(0x0500, 0, &[("TXXX", "YMID=abc,YSEQ=1:1,YTYP=S,YDUR=0.1")]);
    let file = write_temp(&tag);

    adbridge()
        .arg("parse-tag")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid ID3 tag"));
}

#[test]
fn test_validate() {
    let file = write_temp(b"[immunity]\nduration = 0.0\ndisable_passed_ad_breaks = true\n");

    adbridge()
        .arg("validate")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("disable_passed_ad_breaks is set"));

    let bad = write_temp(b"rewind_tolerance = -1.0\n");
    adbridge().arg("validate").arg(bad.path()).assert().failure();
}
