//! while / for / foreach / forJson / forXml and continue / break
//!
//! Every loop kind implements [`LoopDriver`]. The opener runs `init` on first
//! entry and `advance` when re-entered from its terminator, then asks
//! `test_continue` whether to run the body or skip to the terminator.

use crate::compiler::BlockDef;
use crate::error::BlockError;
use crate::platform::{RecordReader, RecordSource};
use crate::program::{Command, LoopKind};
use crate::value::Value;
use tracing::debug;

use super::args::{parse_bindings, split_list, split_top_level, validate_name};
use super::bubble::JumpCeiling;
use super::scope::{Scope, VarSnapshot, init_locals};
use super::stack::{Activation, BlockActivation, LoopState};
use super::{INDEX_VAR, Session};

/// Iteration contract shared by all loop kinds
pub trait LoopDriver {
    /// Side effect run once when the loop is entered
    fn init(&mut self, scope: &mut Scope<'_>) -> Result<(), BlockError>;

    /// Whether the body should run (again)
    fn test_continue(&mut self, scope: &mut Scope<'_>) -> Result<bool, BlockError>;

    /// Step to the next iteration
    fn advance(&mut self, scope: &mut Scope<'_>) -> Result<(), BlockError>;
}

struct WhileLoop {
    condition: String,
}

impl LoopDriver for WhileLoop {
    fn init(&mut self, _scope: &mut Scope<'_>) -> Result<(), BlockError> {
        Ok(())
    }

    fn test_continue(&mut self, scope: &mut Scope<'_>) -> Result<bool, BlockError> {
        scope.eval_bool(&self.condition)
    }

    fn advance(&mut self, _scope: &mut Scope<'_>) -> Result<(), BlockError> {
        Ok(())
    }
}

struct ForLoop {
    init: Vec<String>,
    condition: String,
    iterate: Vec<String>,
}

impl LoopDriver for ForLoop {
    fn init(&mut self, scope: &mut Scope<'_>) -> Result<(), BlockError> {
        for expr in &self.init {
            scope.eval(expr)?;
        }
        Ok(())
    }

    fn test_continue(&mut self, scope: &mut Scope<'_>) -> Result<bool, BlockError> {
        if self.condition.is_empty() {
            return Ok(true);
        }
        scope.eval_bool(&self.condition)
    }

    fn advance(&mut self, scope: &mut Scope<'_>) -> Result<(), BlockError> {
        for expr in &self.iterate {
            scope.eval(expr)?;
        }
        Ok(())
    }
}

struct ForeachLoop {
    var_name: String,
    values: Vec<Value>,
    index: usize,
}

impl ForeachLoop {
    fn bind_current(&self, scope: &mut Scope<'_>) {
        if let Some(value) = self.values.get(self.index) {
            scope.vars.set(self.var_name.clone(), value.clone());
        }
    }
}

impl LoopDriver for ForeachLoop {
    fn init(&mut self, scope: &mut Scope<'_>) -> Result<(), BlockError> {
        self.index = 0;
        self.bind_current(scope);
        Ok(())
    }

    fn test_continue(&mut self, scope: &mut Scope<'_>) -> Result<bool, BlockError> {
        scope.vars.set(INDEX_VAR, Value::from(self.index));
        Ok(self.index < self.values.len())
    }

    fn advance(&mut self, scope: &mut Scope<'_>) -> Result<(), BlockError> {
        self.index += 1;
        self.bind_current(scope);
        Ok(())
    }
}

/// Walks the records of a data file, one record per pass
struct RecordLoop {
    reader: Box<dyn RecordReader>,
}

impl LoopDriver for RecordLoop {
    fn init(&mut self, _scope: &mut Scope<'_>) -> Result<(), BlockError> {
        Ok(())
    }

    fn test_continue(&mut self, scope: &mut Scope<'_>) -> Result<bool, BlockError> {
        let eof = self.reader.eof();
        if !eof {
            self.reader.next(scope.vars)?;
        }
        Ok(!eof)
    }

    fn advance(&mut self, _scope: &mut Scope<'_>) -> Result<(), BlockError> {
        Ok(())
    }
}

/// Validate a loop command and build its driver, returning the names the
/// loop declares as locals
fn declare(
    kind: LoopKind,
    command: &Command,
    scope: &mut Scope<'_>,
    records: &mut dyn RecordSource,
) -> Result<(Box<dyn LoopDriver>, Vec<String>), BlockError> {
    match kind {
        LoopKind::While => {
            let condition = command.target.trim();
            if condition.is_empty() {
                return Err(BlockError::assertion("'while' requires a condition"));
            }
            Ok((
                Box::new(WhileLoop {
                    condition: condition.to_string(),
                }),
                Vec::new(),
            ))
        }
        LoopKind::For => {
            let parts = split_top_level(&command.target, ';');
            let [init, condition, iterate] = parts.as_slice() else {
                return Err(BlockError::assertion(
                    "'for' requires <initial-val>; <condition>; <iter-stmt>",
                ));
            };
            let names = parse_bindings(init, "variable")?
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            Ok((
                Box::new(ForLoop {
                    init: split_list(init),
                    condition: condition.trim().to_string(),
                    iterate: split_list(iterate),
                }),
                names,
            ))
        }
        LoopKind::Foreach => {
            let var_name = command.target.trim();
            validate_name(var_name, "variable")?;
            if command.value.trim().is_empty() {
                return Err(BlockError::assertion("'foreach' requires comma-separated values"));
            }
            let mut values = scope.eval_list(&command.value)?;
            if let [Value::List(inner)] = values.as_mut_slice() {
                values = std::mem::take(inner);
            }
            Ok((
                Box::new(ForeachLoop {
                    var_name: var_name.to_string(),
                    values,
                    index: 0,
                }),
                vec![var_name.to_string(), INDEX_VAR.to_string()],
            ))
        }
        LoopKind::Records(format) => {
            let path = command.target.trim();
            if path.is_empty() {
                return Err(BlockError::assertion(format!("Requires a {} file path or URL", format)));
            }
            let mut reader = records.open(format)?;
            let names = reader.load(path)?;
            Ok((Box::new(RecordLoop { reader }), names))
        }
    }
}

impl Session {
    pub(super) fn exec_loop(&mut self, idx: usize, kind: LoopKind, command: &Command) -> Result<(), BlockError> {
        let end_idx = self.end_of(idx)?;
        let entering = !self.blocks().is_here(idx);

        if entering {
            let mut scope = Scope::new(&mut self.vars, self.evaluator.as_mut());
            let (driver, locals) = declare(kind, command, &mut scope, self.records.as_mut())?;
            let saved = VarSnapshot::capture(&self.vars, &locals);
            init_locals(&mut self.vars, &locals);
            self.blocks_mut().push(BlockActivation {
                def_idx: idx,
                state: Activation::Loop(LoopState {
                    driver,
                    complete: false,
                    saved,
                }),
            });
        }

        let Some(BlockActivation {
            state: Activation::Loop(state),
            ..
        }) = self.calls.active_mut().blocks.top_mut()
        else {
            return Err(BlockError::internal("innermost block is not a loop"));
        };
        let mut scope = Scope::new(&mut self.vars, self.evaluator.as_mut());
        if entering {
            state.driver.init(&mut scope)?;
        } else {
            state.driver.advance(&mut scope)?;
        }
        if !state.driver.test_continue(&mut scope)? {
            state.complete = true;
            debug!(line = idx + 1, "loop complete");
            self.branch(end_idx)?;
        }
        Ok(())
    }

    pub(super) fn exec_end_loop(&mut self, idx: usize) -> Result<(), BlockError> {
        let BlockDef::EndLoop { begin_idx } = *self.def(idx)? else {
            return Err(BlockError::internal(format!("@{} is not a loop terminator", idx + 1)));
        };
        self.assert_active(begin_idx)?;
        let complete = matches!(
            self.blocks().top(),
            Some(BlockActivation { state: Activation::Loop(LoopState { complete: true, .. }), .. })
        );
        if complete {
            if let Some(activation) = self.blocks_mut().pop() {
                self.discard_activation(activation);
            }
            Ok(())
        } else {
            self.branch(begin_idx)
        }
    }

    /// `continue` and `break`, with an optional guard condition
    pub(super) fn exec_loop_jump(&mut self, idx: usize, guard: &str, is_break: bool) -> Result<(), BlockError> {
        if !guard.trim().is_empty() && !self.eval_bool(guard)? {
            return Ok(());
        }
        if self.transition_bubbling(idx, JumpCeiling::Loop)? {
            return Ok(());
        }
        let loop_idx = self.unwind_to_loop()?;
        match self.def(idx)? {
            BlockDef::LoopJump { loop_idx: linked } if *linked == loop_idx => {}
            _ => {
                return Err(BlockError::internal(format!(
                    "@{} is not linked to the active loop @{}",
                    idx + 1,
                    loop_idx + 1
                )));
            }
        }
        if is_break {
            if let Some(BlockActivation {
                state: Activation::Loop(state),
                ..
            }) = self.blocks_mut().top_mut()
            {
                state.complete = true;
            }
            let end_idx = self.end_of(loop_idx)?;
            self.branch(end_idx)
        } else {
            self.branch(loop_idx)
        }
    }

    /// Discard open blocks until the innermost loop is on top
    fn unwind_to_loop(&mut self) -> Result<usize, BlockError> {
        loop {
            match self.blocks().top() {
                Some(activation) if activation.is_loop() => return Ok(activation.def_idx),
                Some(_) => {
                    if let Some(activation) = self.blocks_mut().pop() {
                        self.discard_activation(activation);
                    }
                }
                None => return Err(BlockError::assertion("No enclosing loop is active")),
            }
        }
    }
}
