//! Program counter: which command runs next

use crate::error::BlockError;
use crate::program::Program;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct ProgramCounter {
    current: usize,
    started: bool,
    branch: Option<usize>,
}

impl ProgramCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next executable command.
    ///
    /// The first fetch starts at `start_at`; later fetches follow a pending
    /// branch or move one row down. Comment rows are skipped. Returns `None`
    /// once the end of the program is reached.
    pub fn fetch_next(&mut self, program: &Program, start_at: usize) -> Option<usize> {
        let mut idx = if !self.started {
            self.started = true;
            start_at
        } else if let Some(target) = self.branch.take() {
            target
        } else {
            self.current.saturating_add(1)
        };
        while program.get(idx).is_some_and(|command| !command.is_executable()) {
            idx += 1;
        }
        self.current = idx;
        if idx < program.len() { Some(idx) } else { None }
    }

    /// Record the index the next fetch moves to
    pub fn set_next(&mut self, idx: usize, program: &Program) -> Result<(), BlockError> {
        if idx >= program.len() {
            return Err(BlockError::assertion(format!(
                "Cannot branch to non-existent command @{}",
                idx + 1
            )));
        }
        trace!(target_line = idx + 1, "branch");
        self.branch = Some(idx);
        Ok(())
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
