//! `pprof`-compatible serialization of a computed [`Profile`] (spec
//! §6): one [`Sample`] per block, carrying `count` and `time` as its
//! two values, with a one-to-one block/location/function mapping since
//! this profile has no instruction-level address info to report.

use crate::graph::Profile;
use crate::ids::BlockTable;
use std::io::Write as _;

#[allow(clippy::all)]
pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/perftools.profiles.rs"));
}

use proto::{Function, Line, Location, Profile as PprofProfile, Sample, ValueType};

/// Builds the raw (un-gzipped) `perftools.profiles.Profile` message for
/// `profile`, exposed separately from [`write_gzipped`] so tests can
/// inspect the message without round-tripping through gzip.
pub fn build(profile: &Profile, blocks: &BlockTable) -> PprofProfile {
    let mut strings = vec![String::new()];
    let mut intern = |s: &str| -> i64 {
        if let Some(pos) = strings.iter().position(|existing| existing == s) {
            pos as i64
        } else {
            strings.push(s.to_string());
            (strings.len() - 1) as i64
        }
    };

    let count_idx = intern("count");
    let time_idx = intern("time");
    let units_idx = intern("units");

    let mut functions = Vec::new();
    let mut locations = Vec::new();
    let mut samples = Vec::new();

    for bp in &profile.blocks {
        let id = bp.id.index() as u64 + 1;
        let name_idx = intern(blocks.name(bp.id));
        functions.push(Function { id, name: name_idx, filename: 0 });
        locations.push(Location { id, line: vec![Line { function_id: id, line: 0 }] });
        samples.push(Sample { location_id: vec![id], value: vec![bp.block.count as i64, bp.block.time as i64] });
    }

    PprofProfile {
        sample_type: vec![
            ValueType { r#type: count_idx, unit: units_idx },
            ValueType { r#type: time_idx, unit: units_idx },
        ],
        sample: samples,
        location: locations,
        function: functions,
        string_table: strings,
        period: 1,
    }
}

/// Encodes `profile` as a gzip-wrapped protobuf, the on-disk form
/// `go tool pprof` expects (`original_source/fble/profile.c` emits the
/// raw protobuf bytes; gzip wrapping is purely an ecosystem convention
/// added on top).
pub fn write_gzipped(profile: &Profile, blocks: &BlockTable) -> std::io::Result<Vec<u8>> {
    let message = build(profile, blocks);
    let bytes = prost::Message::encode_to_vec(&message);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&bytes)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CallGraph;
    use crate::ids::ROOT_BLOCK;

    #[test]
    fn build_emits_one_sample_per_block() {
        let mut graph = CallGraph::new(2);
        let mut blocks = BlockTable::new();
        let f = blocks.register("f");
        graph.call_data_mut(ROOT_BLOCK, f).count = 3;
        graph.call_data_mut(ROOT_BLOCK, f).time = 42;

        let profile = graph.compute();
        let message = build(&profile, &blocks);
        assert_eq!(message.sample.len(), 2);
        assert_eq!(message.function.len(), 2);
        assert_eq!(message.sample_type.len(), 2);
    }

    #[test]
    fn gzipped_output_is_nonempty_and_starts_with_the_gzip_magic_bytes() {
        let graph = CallGraph::new(1);
        let blocks = BlockTable::new();
        let profile = graph.compute();
        let bytes = write_gzipped(&profile, &blocks).unwrap();
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b]);
    }
}
