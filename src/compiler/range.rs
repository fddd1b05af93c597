//! Jump restriction: the minimal loop, function or try section enclosing a command

use crate::error::BlockError;

use super::block::{BlockDef, BlockTable, Nature};

/// An inclusive span of command indexes belonging to one construct
#[derive(Debug, Clone, Copy)]
pub struct CmdRange {
    pub top: usize,
    pub bottom: usize,
    pub desc: &'static str,
}

impl CmdRange {
    fn new(top: usize, bottom: usize, desc: &'static str) -> Self {
        Self { top, bottom, desc }
    }
}

impl PartialEq for CmdRange {
    fn eq(&self, other: &Self) -> bool {
        self.top == other.top && self.bottom == other.bottom
    }
}

impl std::fmt::Display for CmdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @[{}-{}]", self.desc, self.top + 1, self.bottom + 1)
    }
}

/// Find the innermost loop, function or try section containing `locus`.
///
/// Scans backward for the nearest opener whose terminator is at or beyond
/// `locus`. Conditionals do not restrict jumps. An opener row lies outside its
/// own range, and so does an `endTry` row.
pub fn find_block_range(table: &BlockTable, locus: usize) -> Option<CmdRange> {
    for idx in (0..locus).rev() {
        let Some(def) = table.get(idx) else {
            continue;
        };
        let (Some(nature), Some(end_idx)) = (def.nature(), def.end_idx()) else {
            continue;
        };
        match (nature, def) {
            (Nature::Loop, _) if locus <= end_idx => {
                return Some(CmdRange::new(idx, end_idx, "loop"));
            }
            (Nature::Function, _) if locus <= end_idx => {
                return Some(CmdRange::new(idx, end_idx, "function"));
            }
            (
                Nature::Try,
                BlockDef::Try {
                    catch_idx, finally_idx, ..
                },
            ) if locus < end_idx => {
                return Some(try_section(idx, *catch_idx, *finally_idx, end_idx, locus));
            }
            _ => {}
        }
    }
    None
}

fn try_section(
    try_idx: usize,
    catch_idx: Option<usize>,
    finally_idx: Option<usize>,
    end_idx: usize,
    locus: usize,
) -> CmdRange {
    match finally_idx {
        Some(finally) if locus >= finally => return CmdRange::new(finally, end_idx, "finally"),
        _ => {}
    }
    match catch_idx {
        Some(catch) if locus >= catch => {
            return CmdRange::new(catch, finally_idx.unwrap_or(end_idx), "catch");
        }
        _ => {}
    }
    CmdRange::new(try_idx, catch_idx.or(finally_idx).unwrap_or(end_idx), "try")
}

/// Reject a jump between two different restricted ranges
pub fn check_jump(table: &BlockTable, from: usize, to: usize) -> Result<(), BlockError> {
    let source = find_block_range(table, from);
    let dest = find_block_range(table, to);
    if source == dest {
        return Ok(());
    }
    Err(BlockError::assertion(format!(
        "Attempt to jump out of {} into {}. You cannot jump into, or out of: loops, functions, or try blocks.",
        describe(source),
        describe(dest)
    )))
}

fn describe(range: Option<CmdRange>) -> String {
    match range {
        Some(range) => range.to_string(),
        None => "the top level".to_string(),
    }
}
