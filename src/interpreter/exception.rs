//! try / catch / finally / endTry / throw

use crate::compiler::BlockDef;
use crate::error::BlockError;
use crate::value::Value;
use tracing::{debug, warn};

use super::stack::{Activation, BlockActivation, TryPhase, TryState};
use super::{ERROR_VAR, Session};

impl Session {
    pub(super) fn exec_try(&mut self, idx: usize) -> Result<(), BlockError> {
        let BlockDef::Try {
            catch_idx,
            finally_idx,
            ..
        } = self.def(idx)?
        else {
            return Err(BlockError::internal(format!("@{} is not a try", idx + 1)));
        };
        let has_catch = catch_idx.is_some();
        let has_finally = finally_idx.is_some();

        let plain_wrapper = !has_catch && !has_finally;
        if plain_wrapper {
            warn!(line = idx + 1, "try without catch or finally");
        }
        let managed = !(plain_wrapper && self.try_nesting < 0);
        self.blocks_mut().push(BlockActivation {
            def_idx: idx,
            state: Activation::Try(TryState {
                managed,
                has_finally,
                phase: TryPhase::Trying,
                has_caught: false,
                has_finaled: false,
            }),
        });
        if managed {
            self.enter_try_nesting();
        }
        Ok(())
    }

    /// Entered only when an error was dispatched here; reached by falling
    /// out of the try body, skip to the finally or the terminator
    pub(super) fn exec_catch(&mut self, idx: usize) -> Result<(), BlockError> {
        let try_idx = self.try_of(idx)?;
        self.assert_active(try_idx)?;
        let catching = self
            .top_try_state()
            .is_some_and(|state| state.phase == TryPhase::Catching);
        if catching {
            return Ok(());
        }
        let target = match self.def(try_idx)? {
            BlockDef::Try {
                finally_idx, end_idx, ..
            } => finally_idx.unwrap_or(*end_idx),
            _ => return Err(BlockError::internal(format!("@{} is not a try", try_idx + 1))),
        };
        self.branch(target)
    }

    pub(super) fn exec_finally(&mut self, idx: usize) -> Result<(), BlockError> {
        let try_idx = self.try_of(idx)?;
        self.assert_active(try_idx)?;
        self.vars.remove(ERROR_VAR);
        if let Some(state) = self.top_try_state() {
            state.phase = TryPhase::Finallying;
            state.has_finaled = true;
        }
        Ok(())
    }

    pub(super) fn exec_end_try(&mut self, idx: usize) -> Result<(), BlockError> {
        let try_idx = self.try_of(idx)?;
        self.assert_active(try_idx)?;
        self.vars.remove(ERROR_VAR);
        let Some(activation) = self.blocks_mut().pop() else {
            return Err(BlockError::internal("try block vanished before endTry"));
        };
        let managed = matches!(&activation.state, Activation::Try(state) if state.managed);
        if managed {
            self.leave_try_nesting();
            if self.bubble.is_some() {
                debug!(line = idx + 1, "endTry resumes bubbling");
            }
            self.rebubble()?;
        }
        Ok(())
    }

    /// Raise a script error. Throwing a caught `_error` keeps its name.
    pub(super) fn exec_throw(&mut self, expr: &str) -> Result<(), BlockError> {
        let value = self.eval(expr)?;
        let err = match &value {
            Value::Map(fields) if fields.contains_key("message") => {
                let name = fields
                    .get("name")
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| "ScriptError".to_string());
                let message = fields.get("message").map(|m| m.to_string()).unwrap_or_default();
                BlockError::script(name, message)
            }
            other => BlockError::script("ScriptError", other.to_string()),
        };
        Err(err)
    }

    fn try_of(&self, idx: usize) -> Result<usize, BlockError> {
        match self.def(idx)? {
            BlockDef::Catch { try_idx } | BlockDef::Finally { try_idx } | BlockDef::EndTry { try_idx } => {
                Ok(*try_idx)
            }
            _ => Err(BlockError::internal(format!("@{} is not part of a try block", idx + 1))),
        }
    }
}
