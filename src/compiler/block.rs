//! Block definitions: the static links between control-flow commands

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::program::{FunctionStyle, LoopKind};

/// The four kinds of structured block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nature {
    Conditional,
    Loop,
    Try,
    Function,
}

/// Static link information for one control-flow command, keyed by its index.
///
/// Openers carry forward links to their continuations and terminator;
/// continuations and terminators carry a back-link to their opener.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BlockDef {
    If {
        else_if_idxs: Vec<usize>,
        else_idx: Option<usize>,
        end_idx: usize,
    },
    ElseIf {
        if_idx: usize,
    },
    Else {
        if_idx: usize,
    },
    EndIf {
        if_idx: usize,
    },

    Try {
        name: Option<String>,
        catch_idx: Option<usize>,
        finally_idx: Option<usize>,
        end_idx: usize,
    },
    Catch {
        try_idx: usize,
    },
    Finally {
        try_idx: usize,
    },
    EndTry {
        try_idx: usize,
    },

    Loop {
        loop_kind: LoopKind,
        end_idx: usize,
    },
    EndLoop {
        begin_idx: usize,
    },
    /// `continue` or `break`, linked to the nearest enclosing loop
    LoopJump {
        loop_idx: usize,
    },

    Function {
        style: FunctionStyle,
        name: String,
        end_idx: usize,
    },
    /// `return`, linked to the enclosing function
    Return {
        func_idx: usize,
    },
    EndFunction {
        func_idx: usize,
    },
}

impl BlockDef {
    /// The nature of an opener; `None` for continuations and terminators
    pub fn nature(&self) -> Option<Nature> {
        match self {
            BlockDef::If { .. } => Some(Nature::Conditional),
            BlockDef::Try { .. } => Some(Nature::Try),
            BlockDef::Loop { .. } => Some(Nature::Loop),
            BlockDef::Function { .. } => Some(Nature::Function),
            _ => None,
        }
    }

    /// Terminator index of an opener
    pub fn end_idx(&self) -> Option<usize> {
        match self {
            BlockDef::If { end_idx, .. }
            | BlockDef::Try { end_idx, .. }
            | BlockDef::Loop { end_idx, .. }
            | BlockDef::Function { end_idx, .. } => Some(*end_idx),
            _ => None,
        }
    }

    fn set_end_idx(&mut self, idx: usize) {
        match self {
            BlockDef::If { end_idx, .. }
            | BlockDef::Try { end_idx, .. }
            | BlockDef::Loop { end_idx, .. }
            | BlockDef::Function { end_idx, .. } => *end_idx = idx,
            _ => {}
        }
    }
}

/// Block definitions of a compiled program, keyed by command index
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    defs: FxHashMap<usize, BlockDef>,
}

impl BlockTable {
    pub fn get(&self, idx: usize) -> Option<&BlockDef> {
        self.defs.get(&idx)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut BlockDef> {
        self.defs.get_mut(&idx)
    }

    pub(crate) fn insert(&mut self, idx: usize, def: BlockDef) {
        self.defs.insert(idx, def);
    }

    pub(crate) fn link_end(&mut self, opener_idx: usize, end_idx: usize) {
        if let Some(def) = self.defs.get_mut(&opener_idx) {
            def.set_end_idx(end_idx);
        }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in program order
    pub fn sorted(&self) -> Vec<(usize, &BlockDef)> {
        let mut entries: Vec<(usize, &BlockDef)> = self.defs.iter().map(|(idx, def)| (*idx, def)).collect();
        entries.sort_by_key(|(idx, _)| *idx);
        entries
    }
}
