//! call / function / return / endFunction / exitTest

use crate::compiler::BlockDef;
use crate::error::BlockError;
use tracing::{debug, info};

use super::args::parse_bindings;
use super::bubble::JumpCeiling;
use super::scope::VarSnapshot;
use super::stack::{ActivationFrame, BlockStack};
use super::policy::StepPolicy;
use super::{RESULT_VAR, Session};

impl Session {
    pub(super) fn exec_call(&mut self, idx: usize, name: &str, args: &str) -> Result<(), BlockError> {
        let name = name.trim();
        let Some(&func_idx) = self.compiled.symbols.get(name) else {
            return Err(BlockError::assertion(format!("Function does not exist: {}", name)));
        };
        if !matches!(self.def(func_idx)?, BlockDef::Function { .. }) {
            return Err(BlockError::assertion(format!("'{}' is a label, not a function", name)));
        }

        // Revisited after the callee returned: finish the call
        let active = self.calls.active();
        if active.returning && active.return_idx == Some(idx) {
            if let Some(frame) = self.pop_frame() {
                debug!(function = %frame.name, depth = self.calls.depth(), "call complete");
            }
            return Ok(());
        }

        if self.calls.depth() >= self.options.max_call_depth {
            return Err(BlockError::assertion(format!(
                "Maximum call depth of {} exceeded calling '{}'",
                self.options.max_call_depth, name
            )));
        }

        let mut bound = Vec::new();
        for (param, expr) in parse_bindings(args, "parameter")? {
            let value = self.eval(&expr)?;
            bound.push((param, value));
        }
        let names: Vec<String> = bound.iter().map(|(param, _)| param.clone()).collect();
        let saved = VarSnapshot::capture(&self.vars, &names);
        for (param, value) in &bound {
            self.vars.set(param.clone(), value.clone());
        }

        self.calls.push(ActivationFrame {
            func_idx: Some(func_idx),
            name: name.to_string(),
            args: bound,
            return_idx: Some(idx),
            saved,
            blocks: BlockStack::default(),
            returning: false,
        });
        debug!(function = %name, depth = self.calls.depth(), "call");
        self.branch(func_idx)
    }

    /// Entered through `call`, bind the arguments and run the body;
    /// reached by falling through, skip the body
    pub(super) fn exec_function(&mut self, idx: usize) -> Result<(), BlockError> {
        let active = self.calls.active();
        if active.func_idx == Some(idx) && !active.returning {
            let args = active.args.clone();
            for (param, value) in args {
                self.vars.set(param, value);
            }
            return Ok(());
        }
        let end_idx = self.end_of(idx)?;
        self.branch(end_idx)
    }

    /// `return` (with an optional result expression) and `endFunction`
    pub(super) fn exec_return(&mut self, idx: usize, result_expr: Option<&str>) -> Result<(), BlockError> {
        let func_idx = match self.def(idx)? {
            BlockDef::Return { func_idx } | BlockDef::EndFunction { func_idx } => *func_idx,
            _ => return Err(BlockError::internal(format!("@{} is not a return", idx + 1))),
        };
        let active = self.calls.active();
        if active.func_idx != Some(func_idx) || active.returning {
            return Ok(());
        }
        if self.transition_bubbling(idx, JumpCeiling::Function)? {
            return Ok(());
        }

        if let Some(expr) = result_expr.map(str::trim).filter(|expr| !expr.is_empty()) {
            let result = self.eval(expr)?;
            self.vars.set(RESULT_VAR, result);
        }
        let frame = self.calls.active_mut();
        frame.returning = true;
        let Some(return_idx) = frame.return_idx else {
            return Err(BlockError::internal("function frame without a return point"));
        };
        debug!(function = %frame.name, line = return_idx + 1, "return");
        self.branch(return_idx)
    }

    pub(super) fn exec_exit_test(&mut self, idx: usize) -> Result<(), BlockError> {
        if self.transition_bubbling(idx, JumpCeiling::Test)? {
            return Ok(());
        }
        info!(line = idx + 1, "exitTest");
        self.policies.push(StepPolicy::HaltOnce);
        Ok(())
    }
}
