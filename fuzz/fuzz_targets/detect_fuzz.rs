#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::io::{self, ApplyOptions};
use oxipatch::PatchFormat;

fuzz_target!(|data: &[u8]| {
    let detected = PatchFormat::detect(data);
    if let Some(format) = detected {
        assert!(data.starts_with(format.magic()));
    }

    let opts = ApplyOptions {
        max_output_size: 1 << 20,
        ..Default::default()
    };
    let format = detected.unwrap_or(PatchFormat::Ips);
    let _ = io::apply_bytes(format, data, &[], &opts);
});
