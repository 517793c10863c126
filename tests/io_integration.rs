// Integration tests for format dispatch and the file layer.

mod common;

use std::error::Error as _;

use common::{create_ips, create_ups, gen_data, mutate};
use oxipatch::io::{self, ApplyOptions, IoError};
use oxipatch::{ErrorKind, PatchFormat};
use tempfile::tempdir;

#[test]
fn top_level_apply_dispatches() {
    let source = gen_data(1024, 1);
    let target = mutate(&source, 50);

    let ips_patch = create_ips(&source, &target);
    let ups_patch = create_ups(&source, &target);
    assert_eq!(oxipatch::apply(PatchFormat::Ips, &ips_patch, &source).unwrap(), target);
    assert_eq!(oxipatch::apply(PatchFormat::Ups, &ups_patch, &source).unwrap(), target);
    assert_eq!(oxipatch::apply_detected(&ips_patch, &source).unwrap(), target);
    assert_eq!(oxipatch::apply_detected(&ups_patch, &source).unwrap(), target);
}

#[test]
fn wrong_format_is_a_header_error() {
    let source = gen_data(64, 2);
    let ups_patch = create_ups(&source, &mutate(&source, 3));
    let err = oxipatch::apply(PatchFormat::Ips, &ups_patch, &source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPatchHeader);

    let err = oxipatch::apply_detected(b"not a patch at all", &source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPatchHeader);
}

#[test]
fn apply_file_ups_with_digest() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("game.gba");
    let patch_path = dir.path().join("fix.UPS");
    let output_path = dir.path().join("fixed.gba");

    let source = gen_data(8192, 4);
    let mut target = mutate(&source, 333);
    target.truncate(8000);
    std::fs::write(&source_path, &source).unwrap();
    std::fs::write(&patch_path, create_ups(&source, &target)).unwrap();

    let stats =
        io::apply_file(&patch_path, &source_path, &output_path, &ApplyOptions::default()).unwrap();
    assert_eq!(stats.format, PatchFormat::Ups);
    assert_eq!(stats.source_size, 8192);
    assert_eq!(stats.output_size, 8000);
    assert_eq!(std::fs::read(&output_path).unwrap(), target);
    #[cfg(feature = "file-io")]
    assert!(stats.output_sha256.is_some());
}

#[test]
fn patch_error_is_chained() {
    let dir = tempdir().unwrap();
    let source_path = dir.path().join("game.sfc");
    let patch_path = dir.path().join("fix.ips");
    let output_path = dir.path().join("out.sfc");
    std::fs::write(&source_path, b"abc").unwrap();
    std::fs::write(&patch_path, b"PATCHXXX").unwrap();

    let err = io::apply_file(&patch_path, &source_path, &output_path, &ApplyOptions::default())
        .unwrap_err();
    assert!(matches!(err, IoError::Patch(_)));
    assert!(err.source().is_some());
    assert!(!output_path.exists());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = io::read_limited(&dir.path().join("nope.ips"), "patch", 1024).unwrap_err();
    assert!(matches!(err, IoError::Io(_)));
}

#[test]
fn oversized_declared_ups_output_is_refused_before_apply() {
    // Header declares a 1 GiB target for an empty source.
    let mut patch = b"UPS1\x80".to_vec();
    oxipatch::ups::varint::encode(1 << 30, &mut patch);
    let patch = common::ups_seal(patch, &[], &[]);

    let err = io::apply_bytes(PatchFormat::Ups, &patch, &[], &ApplyOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        IoError::TooLarge {
            what: "output",
            size: 1073741824,
            ..
        }
    ));
}

#[test]
fn soft_patch_with_ups_sibling() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gba");
    let rom = gen_data(2048, 5);
    let patched = mutate(&rom, 99);
    std::fs::write(&rom_path, &rom).unwrap();
    std::fs::write(dir.path().join("game.ups"), create_ups(&rom, &patched)).unwrap();

    let (format, out) = io::soft_patch(&rom_path, &rom, &ApplyOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(format, PatchFormat::Ups);
    assert_eq!(out, patched);
    assert_eq!(std::fs::read(&rom_path).unwrap(), rom);
}

#[test]
fn soft_patch_failure_is_reported() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.sfc");
    std::fs::write(&rom_path, b"rom").unwrap();
    std::fs::write(dir.path().join("game.ips"), b"PATCH\x00\x00").unwrap();

    let err = io::soft_patch(&rom_path, b"rom", &ApplyOptions::default()).unwrap_err();
    match err {
        IoError::Patch(e) => assert_eq!(e.kind(), ErrorKind::PatchTooSmall),
        other => panic!("unexpected error: {other}"),
    }
}
