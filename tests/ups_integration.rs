// Integration tests for UPS application.
//
// These tests verify:
//   - Forward and reverse application of generated patches
//   - Growing and shrinking targets
//   - Checksum verification of patch, source and target
//   - Varint boundaries in skip lengths and header lengths

mod common;

use common::{create_ups, gen_data, mutate, ups_reseal, ups_seal};
use oxipatch::ups::{self, Direction, Header, varint};
use oxipatch::{ErrorKind, PatchDefect, PatchError, PatchFormat, SourceMismatch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ===========================================================================
// Round trips
// ===========================================================================

#[test]
fn forward_and_reverse() {
    let source = gen_data(32 * 1024, 1);
    let target = mutate(&source, 101);
    let patch = create_ups(&source, &target);
    assert_eq!(ups::apply(&patch, &source).unwrap(), target);
    assert_eq!(ups::apply(&patch, &target).unwrap(), source);
}

#[test]
fn target_longer_than_source() {
    let source = gen_data(1000, 2);
    let mut target = source.clone();
    target.extend_from_slice(&gen_data(500, 3));
    let patch = create_ups(&source, &target);

    let header = Header::parse(&patch).unwrap();
    assert_eq!(header.direction(source.len()).unwrap(), Direction::Forward);
    assert_eq!(header.direction(target.len()).unwrap(), Direction::Reverse);

    assert_eq!(ups::apply(&patch, &source).unwrap(), target);
    assert_eq!(ups::apply(&patch, &target).unwrap(), source);
}

#[test]
fn target_shorter_than_source() {
    let source = gen_data(2000, 4);
    let target = mutate(&source[..700], 17);
    let patch = create_ups(&source, &target);
    assert_eq!(ups::apply(&patch, &source).unwrap(), target);
    assert_eq!(ups::apply(&patch, &target).unwrap(), source);
}

#[test]
fn target_with_trailing_zeros() {
    let source = b"header".to_vec();
    let mut target = source.clone();
    target.resize(64, 0);
    let patch = create_ups(&source, &target);
    assert_eq!(ups::apply(&patch, &source).unwrap(), target);
    assert_eq!(ups::apply(&patch, &target).unwrap(), source);
}

#[test]
fn empty_source() {
    let target = gen_data(300, 5);
    let patch = create_ups(&[], &target);
    assert_eq!(ups::apply(&patch, &[]).unwrap(), target);
    assert_eq!(ups::apply(&patch, &target).unwrap(), Vec::<u8>::new());
}

#[test]
fn roundtrip_random_shapes() {
    let mut rng = StdRng::seed_from_u64(0x0b5);
    for _ in 0..40 {
        let source = gen_data(rng.random_range(0..4096), rng.random());
        let target_len = rng.random_range(0..4096);
        let mut target = source.clone();
        target.resize(target_len, 0);
        for _ in 0..rng.random_range(0..20) {
            if target.is_empty() {
                break;
            }
            let at = rng.random_range(0..target.len());
            target[at] = rng.random();
        }

        let patch = create_ups(&source, &target);
        assert_eq!(ups::apply(&patch, &source).unwrap(), target);
        assert_eq!(ups::apply(&patch, &target).unwrap(), source);
    }
}

#[test]
fn same_length_reverse_selected_by_checksum() {
    let source = gen_data(512, 6);
    let target = mutate(&source, 7);
    let patch = create_ups(&source, &target);
    // Length says forward for both inputs; the checksum picks the direction.
    assert_eq!(ups::apply(&patch, &target).unwrap(), source);
}

// ===========================================================================
// Varint boundaries
// ===========================================================================

#[test]
fn skip_lengths_at_varint_boundaries() {
    for skip in [127usize, 128, 129, 16383, 16384, 16511, 16512, 16513] {
        let source = vec![0x11; skip + 4];
        let mut target = source.clone();
        target[skip] = 0x22;
        let patch = create_ups(&source, &target);
        assert_eq!(ups::apply(&patch, &source).unwrap(), target, "skip {skip}");
        assert_eq!(ups::apply(&patch, &target).unwrap(), source, "skip {skip}");
    }
}

#[test]
fn header_lengths_at_varint_boundaries() {
    for len in [127usize, 128, 16384] {
        let source = gen_data(len, len as u64);
        let patch = create_ups(&source, &source);
        let header = Header::parse(&patch).unwrap();
        assert_eq!(header.source_len, len as u64);
        assert_eq!(header.body_offset, 4 + 2 * varint::encoded_len(len as u64));
        assert_eq!(ups::apply(&patch, &source).unwrap(), source);
    }
}

// ===========================================================================
// Verification
// ===========================================================================

#[test]
fn corrupted_target_checksum_rejected() {
    let source = gen_data(256, 8);
    let target = mutate(&source, 9);
    let mut patch = create_ups(&source, &target);
    let at = patch.len() - 8;
    patch[at] ^= 0x80;
    ups_reseal(&mut patch);

    let err = ups::apply(&patch, &source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTarget);
    assert!(matches!(err, PatchError::InvalidTarget { .. }));
}

#[test]
fn wrong_source_rejected() {
    let source = gen_data(256, 10);
    let target = mutate(&source, 11);
    let patch = create_ups(&source, &target);

    let other = gen_data(256, 12);
    assert!(matches!(
        ups::apply(&patch, &other).unwrap_err(),
        PatchError::InvalidSource {
            mismatch: SourceMismatch::Checksum { .. }
        }
    ));

    assert!(matches!(
        ups::apply(&patch, &other[..100]).unwrap_err(),
        PatchError::InvalidSource {
            mismatch: SourceMismatch::Length { actual: 100, .. }
        }
    ));
}

#[test]
fn every_flipped_byte_is_rejected() {
    let source = gen_data(64, 13);
    let target = mutate(&source, 5);
    let patch = create_ups(&source, &target);
    for i in 0..patch.len() {
        let mut bad = patch.clone();
        bad[i] ^= 0x01;
        assert!(ups::apply(&bad, &source).is_err(), "flip at {i}");
    }
}

#[test]
fn truncation_is_rejected() {
    let source = gen_data(64, 14);
    let target = mutate(&source, 3);
    let patch = create_ups(&source, &target);
    for cut in 0..patch.len() {
        assert!(ups::apply(&patch[..cut], &source).is_err(), "cut at {cut}");
    }
}

#[test]
fn bad_magic_and_short_patch() {
    assert_eq!(
        ups::apply(b"UPS1\x80\x80", &[]).unwrap_err(),
        PatchError::PatchTooSmall {
            format: PatchFormat::Ups,
            minimum: 18,
            actual: 6
        }
    );

    let patch = ups_seal(b"UPS0\x80\x80".to_vec(), &[], &[]);
    assert_eq!(
        ups::apply(&patch, &[]).unwrap_err(),
        PatchError::InvalidPatchHeader {
            format: PatchFormat::Ups
        }
    );
}

#[test]
fn unterminated_run_reports_patch_end() {
    // A run with no 0x00 before the end of the patch.
    let mut patch = b"UPS1\x82\x82\x80".to_vec();
    patch.extend_from_slice(&[0xAA; 12]);
    let err = ups::apply(&patch, b"ab").unwrap_err();
    assert_eq!(
        err,
        PatchError::InvalidPatch {
            offset: patch.len(),
            defect: PatchDefect::UnexpectedEnd
        }
    );
}
