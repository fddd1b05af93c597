//! if / elseIf / else / endIf

use std::collections::VecDeque;

use crate::compiler::BlockDef;
use crate::error::BlockError;

use super::Session;
use super::stack::{Activation, BlockActivation, ConditionalState};

impl Session {
    pub(super) fn exec_if(&mut self, idx: usize, condition: &str) -> Result<(), BlockError> {
        let BlockDef::If { else_if_idxs, .. } = self.def(idx)? else {
            return Err(BlockError::internal(format!("@{} is not an if", idx + 1)));
        };
        let pending_else_ifs: VecDeque<usize> = else_if_idxs.iter().copied().collect();
        self.blocks_mut().push(BlockActivation {
            def_idx: idx,
            state: Activation::Conditional(ConditionalState {
                pending_else_ifs,
                matched: false,
            }),
        });
        self.cascade(idx, condition)
    }

    pub(super) fn exec_else_if(&mut self, idx: usize, condition: &str) -> Result<(), BlockError> {
        let if_idx = self.if_of(idx)?;
        self.assert_active(if_idx)?;
        if self.conditional_state()?.matched {
            let end_idx = self.end_of(if_idx)?;
            return self.branch(end_idx);
        }
        self.cascade(if_idx, condition)
    }

    pub(super) fn exec_else(&mut self, idx: usize) -> Result<(), BlockError> {
        let if_idx = self.if_of(idx)?;
        self.assert_active(if_idx)?;
        if self.conditional_state()?.matched {
            let end_idx = self.end_of(if_idx)?;
            return self.branch(end_idx);
        }
        Ok(())
    }

    pub(super) fn exec_end_if(&mut self, idx: usize) -> Result<(), BlockError> {
        let if_idx = self.if_of(idx)?;
        self.assert_active(if_idx)?;
        self.blocks_mut().pop();
        Ok(())
    }

    /// Evaluate one branch condition. The first true branch wins; on false
    /// move to the next elseIf, else the else clause, else the terminator.
    fn cascade(&mut self, if_idx: usize, condition: &str) -> Result<(), BlockError> {
        let matched = self.eval_bool(condition)?;
        let state = self.conditional_state()?;
        if matched {
            state.matched = true;
            return Ok(());
        }
        let next_else_if = state.pending_else_ifs.pop_front();
        let target = match next_else_if {
            Some(else_if_idx) => else_if_idx,
            None => match self.def(if_idx)? {
                BlockDef::If {
                    else_idx, end_idx, ..
                } => else_idx.unwrap_or(*end_idx),
                _ => return Err(BlockError::internal(format!("@{} is not an if", if_idx + 1))),
            },
        };
        self.branch(target)
    }

    fn if_of(&self, idx: usize) -> Result<usize, BlockError> {
        match self.def(idx)? {
            BlockDef::ElseIf { if_idx } | BlockDef::Else { if_idx } | BlockDef::EndIf { if_idx } => Ok(*if_idx),
            _ => Err(BlockError::internal(format!("@{} is not part of an if block", idx + 1))),
        }
    }

    fn conditional_state(&mut self) -> Result<&mut ConditionalState, BlockError> {
        match self.blocks_mut().top_mut() {
            Some(BlockActivation {
                state: Activation::Conditional(state),
                ..
            }) => Ok(state),
            _ => Err(BlockError::internal("innermost block is not a conditional")),
        }
    }
}
