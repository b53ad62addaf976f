//! Text report rendering for a computed [`Profile`] (spec §4.G,
//! §6: coverage, flat profile, and call-graph sections).

use crate::graph::{CallData, Profile};
use crate::ids::BlockTable;
use colored::Colorize;
use std::fmt::Write as _;

/// Renders the three sections `profile.c`'s `FbleDumpProfile` produces,
/// in the same order: coverage, flat profile, call graph. `colored`
/// highlights each block's own totals line within the call-graph
/// section, the same way `tsz-cli` colors diagnostic severities rather
/// than plain-texting everything.
pub fn render(profile: &Profile, blocks: &BlockTable) -> String {
    let mut out = String::new();

    let covered = profile.blocks.iter().filter(|bp| bp.block.count > 0).count();
    let coverage = 100.0 * covered as f64 / profile.blocks.len().max(1) as f64;
    writeln!(out, "Code Coverage").unwrap();
    writeln!(out, "-------------").unwrap();
    writeln!(out, "Blocks executed: {coverage:.2}% of {}", profile.blocks.len()).unwrap();
    writeln!(out).unwrap();

    writeln!(out, "Flat Profile").unwrap();
    writeln!(out, "------------").unwrap();
    writeln!(out, "   {:>8} {:>8} {}", "count", "time", "block").unwrap();
    for bp in &profile.blocks {
        writeln!(out, "{}", call_data_line(blocks, bp.id, &bp.block, true)).unwrap();
    }
    writeln!(out).unwrap();

    writeln!(out, "Call Graph").unwrap();
    writeln!(out, "----------").unwrap();
    writeln!(out, "   {:>8} {:>8} {}", "count", "time", "block").unwrap();
    for bp in &profile.blocks {
        if bp.block.count == 0 {
            continue;
        }
        for (caller, data) in &bp.callers {
            writeln!(out, "{}", call_data_line(blocks, *caller, data, false)).unwrap();
        }
        writeln!(out, "{}", call_data_line(blocks, bp.id, &bp.block, true)).unwrap();
        for (callee, data) in &bp.callees {
            writeln!(out, "{}", call_data_line(blocks, *callee, data, false)).unwrap();
        }
        writeln!(out, "-------------------------------").unwrap();
    }
    writeln!(out).unwrap();

    writeln!(out, "Block Locations").unwrap();
    writeln!(out, "---------------").unwrap();
    for bp in &profile.blocks {
        writeln!(out, "{}", block_name(blocks, bp.id)).unwrap();
    }

    out
}

fn block_name(blocks: &BlockTable, id: crate::ids::BlockId) -> String {
    format!("{}[{id}]", blocks.name(id))
}

fn call_data_line(blocks: &BlockTable, id: crate::ids::BlockId, call: &CallData, highlight: bool) -> String {
    let line = format!("   {:>8} {:>8} {}", call.count, call.time, block_name(blocks, id));
    if highlight {
        line.bold().to_string()
    } else {
        line
    }
}
