//! Runtime stacks: block activations and function activation frames

use std::collections::VecDeque;

use crate::value::Value;

use super::loops::LoopDriver;
use super::scope::VarSnapshot;

// ═══════════════════════════════════════════════════════════════════════════════
// Step Results
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A command ran; more may follow
    Continue,
    /// The program ran off its end
    Done,
    /// `exitTest` stopped the run
    Halted,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Block Activations
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ConditionalState {
    /// `elseIf` rows not yet offered
    pub pending_else_ifs: VecDeque<usize>,
    pub matched: bool,
}

pub struct LoopState {
    pub driver: Box<dyn LoopDriver>,
    pub complete: bool,
    pub saved: VarSnapshot,
}

impl std::fmt::Debug for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopState")
            .field("complete", &self.complete)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPhase {
    Trying,
    Catching,
    Finallying,
}

#[derive(Debug)]
pub struct TryState {
    /// Counted in the try nesting depth. A try with neither catch nor
    /// finally at the top level is a plain wrapper and is not.
    pub managed: bool,
    pub has_finally: bool,
    pub phase: TryPhase,
    pub has_caught: bool,
    pub has_finaled: bool,
}

#[derive(Debug)]
pub enum Activation {
    Conditional(ConditionalState),
    Loop(LoopState),
    Try(TryState),
}

/// An open conditional, loop or try, keyed by its opener's index
#[derive(Debug)]
pub struct BlockActivation {
    pub def_idx: usize,
    pub state: Activation,
}

impl BlockActivation {
    pub fn is_loop(&self) -> bool {
        matches!(self.state, Activation::Loop(_))
    }
}

/// Open blocks of one function activation, innermost last
#[derive(Debug, Default)]
pub struct BlockStack {
    blocks: Vec<BlockActivation>,
}

impl BlockStack {
    pub fn push(&mut self, activation: BlockActivation) {
        self.blocks.push(activation);
    }

    pub fn pop(&mut self) -> Option<BlockActivation> {
        self.blocks.pop()
    }

    pub fn top(&self) -> Option<&BlockActivation> {
        self.blocks.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut BlockActivation> {
        self.blocks.last_mut()
    }

    /// Whether the innermost open block was opened at `idx`
    pub fn is_here(&self, idx: usize) -> bool {
        self.top().is_some_and(|activation| activation.def_idx == idx)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &BlockActivation> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Call Frames
// ═══════════════════════════════════════════════════════════════════════════════

/// One function activation. The top-level frame has no entry or return index.
#[derive(Debug, Default)]
pub struct ActivationFrame {
    pub func_idx: Option<usize>,
    pub name: String,
    pub args: Vec<(String, Value)>,
    pub return_idx: Option<usize>,
    pub saved: VarSnapshot,
    pub blocks: BlockStack,
    /// Set by `return`/`endFunction`; the frame is popped when its call
    /// site runs again.
    pub returning: bool,
}

/// Call stack. The top-level frame always exists and is never popped.
#[derive(Debug, Default)]
pub struct CallStack {
    root: ActivationFrame,
    calls: Vec<ActivationFrame>,
}

impl CallStack {
    pub fn active(&self) -> &ActivationFrame {
        match self.calls.last() {
            Some(frame) => frame,
            None => &self.root,
        }
    }

    pub fn active_mut(&mut self) -> &mut ActivationFrame {
        match self.calls.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }

    pub fn push(&mut self, frame: ActivationFrame) {
        self.calls.push(frame);
    }

    /// Pop the innermost call frame; the top-level frame stays
    pub fn pop(&mut self) -> Option<ActivationFrame> {
        self.calls.pop()
    }

    /// Number of function calls in progress
    pub fn depth(&self) -> usize {
        self.calls.len()
    }

    /// Frames from innermost to outermost, the top-level frame last
    pub fn frames(&self) -> impl Iterator<Item = &ActivationFrame> {
        self.calls.iter().rev().chain(std::iter::once(&self.root))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
