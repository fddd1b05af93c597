//! goto / gotoIf / skipNext

use crate::compiler::check_jump;
use crate::error::BlockError;
use crate::value::Value;

use super::Session;

impl Session {
    pub(super) fn exec_goto(&mut self, idx: usize, label: &str) -> Result<(), BlockError> {
        let label = label.trim();
        let Some(&dest) = self.compiled.symbols.get(label) else {
            return Err(BlockError::assertion(format!("Target label '{}' is not found.", label)));
        };
        self.jump(idx, dest)
    }

    pub(super) fn exec_goto_if(&mut self, idx: usize, condition: &str, label: &str) -> Result<(), BlockError> {
        if self.eval_bool(condition)? {
            self.exec_goto(idx, label)
        } else {
            Ok(())
        }
    }

    /// Skip the next `n` rows (default 1), comment rows included
    pub(super) fn exec_skip_next(&mut self, idx: usize, amount: &str) -> Result<(), BlockError> {
        let n = if amount.trim().is_empty() {
            1.0
        } else {
            let value = self.eval(amount)?;
            match value.as_number() {
                Some(n) if n.is_finite() && n.fract() == 0.0 => n,
                _ => {
                    return Err(BlockError::assertion(format!(
                        "skipNext requires a whole number, got '{}'",
                        value
                    )));
                }
            }
        };
        if n < 0.0 {
            return Err(BlockError::assertion(format!(
                "skipNext amount cannot be negative: {}",
                Value::from(n)
            )));
        }
        if n == 0.0 {
            return Ok(());
        }
        let dest = idx.saturating_add(n as usize).saturating_add(1);
        self.jump(idx, dest)
    }

    /// Branch after checking that no loop, function or try boundary is crossed
    fn jump(&mut self, from: usize, to: usize) -> Result<(), BlockError> {
        if to < self.program.len() {
            check_jump(&self.compiled.blocks, from, to)?;
        }
        self.branch(to)
    }
}
