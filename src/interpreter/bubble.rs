//! Bubbling: carrying an error or an abnormal jump through finally blocks
//!
//! A bubble exists only while a finally block stands between an error or a
//! jump and its destination. The try's `endTry` resumes it: errors are offered
//! to the next enclosing try, jumps re-run the command that issued them.

use crate::compiler::BlockDef;
use crate::error::BlockError;
use crate::value::Value;
use tracing::{debug, info, warn};

use super::stack::{Activation, BlockActivation, TryPhase, TryState};
use super::{ERROR_VAR, Session};

/// What stops a jump's search for finally blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCeiling {
    /// `break` / `continue`: the innermost loop
    Loop,
    /// `return` / `endFunction`: the current function activation
    Function,
    /// `exitTest`: nothing, every frame is searched
    Test,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BubbleMode {
    Error(BlockError),
    Jump(JumpCeiling),
}

/// An error or jump in flight, with the command it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub mode: BubbleMode,
    pub source: usize,
}

impl Session {
    /// Offer an abnormal jump to the bubbling controller.
    ///
    /// Returns `true` when the jump has been taken over: either an active
    /// bubble now carries it, or a finally block must run first. The jump
    /// command then re-runs from `endTry`.
    pub(super) fn transition_bubbling(&mut self, idx: usize, ceiling: JumpCeiling) -> Result<bool, BlockError> {
        if self.bubble.is_some() && self.leaves_running_finally(ceiling) {
            if let Some(bubble) = &mut self.bubble {
                debug!(line = idx + 1, from = bubble.source + 1, "jump replaces active bubble");
                *bubble = Bubble {
                    mode: BubbleMode::Jump(ceiling),
                    source: idx,
                };
            }
            return Ok(true);
        }
        if self.try_nesting < 0 {
            return Ok(false);
        }

        let Some(frames_to_pop) = self.find_unspent_finally(ceiling) else {
            return Ok(false);
        };
        for _ in 0..frames_to_pop {
            if let Some(frame) = self.pop_frame() {
                info!(function = %frame.name, "function abandoned by exitTest");
            }
        }
        // Discard blocks above the try whose finally is about to run
        while let Some(top) = self.blocks().top() {
            if has_unspent_finally(top) {
                break;
            }
            if let Some(activation) = self.blocks_mut().pop() {
                self.discard_activation(activation);
            }
        }

        let Some(try_idx) = self.blocks().top().map(|activation| activation.def_idx) else {
            return Err(BlockError::internal("lost the try block of a jump bubble"));
        };
        let finally_idx = self.finally_of(try_idx)?;
        self.bubble = Some(Bubble {
            mode: BubbleMode::Jump(ceiling),
            source: idx,
        });
        if let Some(state) = self.top_try_state() {
            state.phase = TryPhase::Finallying;
            state.has_finaled = true;
        }
        debug!(line = idx + 1, finally = finally_idx + 1, "jump bubbles through finally");
        self.branch(finally_idx)?;
        Ok(true)
    }

    /// Whether a jump would leave a finally block that is currently running.
    /// Jumps that stay inside it (a loop or call nested in the finally) are
    /// ordinary jumps.
    fn leaves_running_finally(&self, ceiling: JumpCeiling) -> bool {
        if ceiling == JumpCeiling::Test {
            return true;
        }
        for activation in self.blocks().iter().rev() {
            if ceiling == JumpCeiling::Loop && activation.is_loop() {
                return false;
            }
            if matches!(&activation.state, Activation::Try(state) if state.phase == TryPhase::Finallying) {
                return true;
            }
        }
        false
    }

    /// Locate the nearest try with an unspent finally between the current
    /// command and the jump's destination. Returns the number of call frames
    /// to pop to reach it.
    fn find_unspent_finally(&self, ceiling: JumpCeiling) -> Option<usize> {
        for (frames_up, frame) in self.calls.frames().enumerate() {
            for activation in frame.blocks.iter().rev() {
                if ceiling == JumpCeiling::Loop && activation.is_loop() {
                    return None;
                }
                if has_unspent_finally(activation) {
                    return Some(frames_up);
                }
            }
            if ceiling != JumpCeiling::Test {
                return None;
            }
        }
        None
    }

    /// Route a failed command's error to the nearest accepting try.
    ///
    /// Returns `Ok(false)` when nothing handles it and the run must stop.
    pub(super) fn handle_command_error(&mut self, idx: usize, err: BlockError) -> Result<bool, BlockError> {
        debug!(line = idx + 1, %err, "command error");
        let found = self.unwind_to_try();

        if let Some(try_idx) = found {
            let catch_idx = self.catch_of(try_idx)?;
            // Only errors from the try body reach the catch
            let catch_unspent = self
                .top_try_state()
                .is_some_and(|state| !state.has_caught && state.phase == TryPhase::Trying);
            if let Some(catch_idx) = catch_idx {
                if catch_unspent && self.is_matching_catch(&err, catch_idx)? {
                    info!(line = catch_idx + 1, %err, "error caught");
                    self.vars.set(ERROR_VAR, Value::from_error(&err));
                    if let Some(state) = self.top_try_state() {
                        state.has_caught = true;
                        state.phase = TryPhase::Catching;
                    }
                    self.bubble = None;
                    self.branch(catch_idx)?;
                    return Ok(true);
                }
            }
        }

        self.bubble = Some(Bubble {
            mode: BubbleMode::Error(err),
            source: idx,
        });

        if let Some(try_idx) = found {
            let finally_unspent = self.blocks().top().is_some_and(has_unspent_finally);
            if finally_unspent {
                let finally_idx = self.finally_of(try_idx)?;
                if let Some(state) = self.top_try_state() {
                    state.phase = TryPhase::Finallying;
                    state.has_finaled = true;
                }
                debug!(line = finally_idx + 1, "error bubbles through finally");
                self.branch(finally_idx)?;
                return Ok(true);
            }
            if self.try_nesting > 0 {
                let end_idx = self.end_of(try_idx)?;
                debug!(line = end_idx + 1, "error bubbles past try");
                self.branch(end_idx)?;
                return Ok(true);
            }
        }

        self.bubble = None;
        Ok(false)
    }

    /// Resume a bubble once `endTry` has closed its try
    pub(super) fn rebubble(&mut self) -> Result<(), BlockError> {
        let Some(bubble) = self.bubble.take() else {
            return Ok(());
        };
        match bubble.mode {
            BubbleMode::Error(err) => {
                if self.try_nesting < 0 {
                    warn!(%err, "error not caught by any try");
                    return Err(err);
                }
                if self.handle_command_error(bubble.source, err.clone())? {
                    Ok(())
                } else {
                    Err(err)
                }
            }
            BubbleMode::Jump(_) => {
                debug!(line = bubble.source + 1, "resume suspended jump");
                self.branch(bubble.source)
            }
        }
    }

    /// Discard open blocks, then whole call frames, until a managed try is
    /// innermost. Returns its index.
    fn unwind_to_try(&mut self) -> Option<usize> {
        loop {
            while let Some(top) = self.blocks().top() {
                if is_managed_try(top) {
                    return Some(top.def_idx);
                }
                if let Some(activation) = self.blocks_mut().pop() {
                    self.discard_activation(activation);
                }
            }
            if self.try_nesting < 0 || self.calls.depth() == 0 {
                return None;
            }
            if let Some(frame) = self.pop_frame() {
                info!(function = %frame.name, "function abandoned by error");
            }
        }
    }

    /// A catch without a matcher takes every error. A pattern value is
    /// tested against the message; any other value must be contained in it.
    fn is_matching_catch(&mut self, err: &BlockError, catch_idx: usize) -> Result<bool, BlockError> {
        let matcher = self
            .program
            .get(catch_idx)
            .map(|command| command.target.trim().to_string())
            .unwrap_or_default();
        if matcher.is_empty() {
            return Ok(true);
        }
        match self.eval(&matcher)? {
            Value::Pattern(pattern) => pattern.is_match(err.message()),
            other => Ok(err.message().contains(&other.to_string())),
        }
    }

    fn catch_of(&self, try_idx: usize) -> Result<Option<usize>, BlockError> {
        match self.def(try_idx)? {
            BlockDef::Try { catch_idx, .. } => Ok(*catch_idx),
            _ => Err(BlockError::internal(format!("@{} is not a try", try_idx + 1))),
        }
    }

    fn finally_of(&self, try_idx: usize) -> Result<usize, BlockError> {
        match self.def(try_idx)? {
            BlockDef::Try {
                finally_idx: Some(finally_idx),
                ..
            } => Ok(*finally_idx),
            _ => Err(BlockError::internal(format!("@{} has no finally", try_idx + 1))),
        }
    }

    pub(super) fn top_try_state(&mut self) -> Option<&mut TryState> {
        match self.blocks_mut().top_mut() {
            Some(BlockActivation {
                state: Activation::Try(state),
                ..
            }) => Some(state),
            _ => None,
        }
    }
}

fn is_managed_try(activation: &BlockActivation) -> bool {
    matches!(&activation.state, Activation::Try(state) if state.managed)
}

fn has_unspent_finally(activation: &BlockActivation) -> bool {
    matches!(&activation.state, Activation::Try(state) if state.managed && state.has_finally && !state.has_finaled)
}
