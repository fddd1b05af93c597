//! Variable snapshots taken at loop and function boundaries

use crate::error::BlockError;
use crate::platform::Evaluator;
use crate::value::{Value, Variables};

/// Values of a set of names as they were before a block declared them.
///
/// `None` records a name that did not exist; restoring removes it again.
#[derive(Debug, Clone, Default)]
pub struct VarSnapshot {
    saved: Vec<(String, Option<Value>)>,
}

impl VarSnapshot {
    pub fn capture(vars: &Variables, names: &[String]) -> Self {
        Self {
            saved: names
                .iter()
                .map(|name| (name.clone(), vars.get(name).cloned()))
                .collect(),
        }
    }

    pub fn restore(self, vars: &mut Variables) {
        for (name, value) in self.saved {
            match value {
                Some(value) => vars.set(name, value),
                None => {
                    vars.remove(&name);
                }
            }
        }
    }
}

/// Make sure every declared local exists, so expressions can reference it
pub fn init_locals(vars: &mut Variables, names: &[String]) {
    for name in names {
        if !vars.contains(name) {
            vars.set(name.clone(), Value::Null);
        }
    }
}

/// Evaluation context handed to loop drivers
pub struct Scope<'a> {
    pub vars: &'a mut Variables,
    pub evaluator: &'a mut dyn Evaluator,
}

impl<'a> Scope<'a> {
    pub fn new(vars: &'a mut Variables, evaluator: &'a mut dyn Evaluator) -> Self {
        Self { vars, evaluator }
    }

    pub fn eval(&mut self, expr: &str) -> Result<Value, BlockError> {
        self.evaluator.evaluate(expr, self.vars)
    }

    pub fn eval_bool(&mut self, expr: &str) -> Result<bool, BlockError> {
        self.eval(expr).map(|value| value.is_truthy())
    }

    pub fn eval_list(&mut self, expr: &str) -> Result<Vec<Value>, BlockError> {
        self.evaluator.evaluate_list(expr, self.vars)
    }
}
