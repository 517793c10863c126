#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::ips;

fuzz_target!(|data: &[u8]| {
    // First byte picks how much of the input is source.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = (split as usize).min(rest.len());
    let (source, body) = rest.split_at(split);

    let mut patch = b"PATCH".to_vec();
    patch.extend_from_slice(body);

    let planned = ips::plan(&patch, source.len());
    let applied = ips::apply(&patch, source);
    match (planned, applied) {
        (Ok(plan), Ok(target)) => assert_eq!(plan.target_len, target.len()),
        (Err(a), Err(b)) => assert_eq!(a, b),
        (p, a) => panic!("plan {p:?} disagrees with apply {:?}", a.map(|t| t.len())),
    }
});
