#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::io::{self, ApplyOptions};
use oxipatch::ups::varint;
use oxipatch::PatchFormat;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = (split as usize).min(rest.len());
    let (source, body) = rest.split_at(split);

    // Raw bytes, bounded by the output limit.
    let opts = ApplyOptions {
        max_output_size: 1 << 20,
        ..Default::default()
    };
    let _ = io::apply_bytes(PatchFormat::Ups, rest, source, &opts);

    // Framed so the record decoder runs against a matching source length.
    let mut patch = b"UPS1".to_vec();
    varint::encode(source.len() as u64, &mut patch);
    varint::encode(source.len() as u64, &mut patch);
    patch.extend_from_slice(body);
    if let Ok(target) = oxipatch::ups::apply(&patch, source) {
        assert_eq!(target.len(), source.len());
    }
});
