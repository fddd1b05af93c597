//! Capability traits the engine consumes from its host.
//!
//! The engine never parses expressions, performs actions or reads files
//! itself. Those concerns are injected through the traits below; default
//! implementations live in `std_impl`.

mod std_impl;

pub use std_impl::{FileRecordSource, JsonLiteralEvaluator, JsonRecordReader, MemoryRecordSource};

use crate::error::BlockError;
use crate::program::{Command, RecordFormat};
use crate::value::{Value, Variables};
use tracing::debug;

/// Trait for evaluating expression text against the variable store.
///
/// Expressions may assign variables (`i = 0`), so the store is mutable.
pub trait Evaluator {
    /// Evaluate `expr` and return its value.
    fn evaluate(&mut self, expr: &str, vars: &mut Variables) -> Result<Value, BlockError>;

    /// Evaluate a value-list expression such as the one given to `foreach`.
    ///
    /// A list result is returned as its items; any other result becomes a
    /// single-element list.
    fn evaluate_list(&mut self, expr: &str, vars: &mut Variables) -> Result<Vec<Value>, BlockError> {
        match self.evaluate(expr, vars)? {
            Value::List(items) => Ok(items),
            other => Ok(vec![other]),
        }
    }
}

/// Trait for executing every command that is not a control keyword.
pub trait CommandExecutor {
    fn execute(
        &mut self,
        command: &Command,
        vars: &mut Variables,
        evaluator: &mut dyn Evaluator,
    ) -> Result<(), BlockError>;
}

/// An executor that accepts every command and does nothing.
/// Used when the host only cares about control flow.
pub struct NoOpExecutor;

impl CommandExecutor for NoOpExecutor {
    fn execute(
        &mut self,
        command: &Command,
        _vars: &mut Variables,
        _evaluator: &mut dyn Evaluator,
    ) -> Result<(), BlockError> {
        debug!(command = %command, "no-op executor");
        Ok(())
    }
}

/// Sequential reader over the records of one data file.
pub trait RecordReader {
    /// Load the file at `path`, returning the field names of its records.
    fn load(&mut self, path: &str) -> Result<Vec<String>, BlockError>;

    /// Assign the fields of the next record as variables.
    fn next(&mut self, vars: &mut Variables) -> Result<(), BlockError>;

    /// True once every record has been read.
    fn eof(&self) -> bool;
}

/// Factory for record readers, one reader per loop or load command.
pub trait RecordSource {
    fn open(&mut self, format: RecordFormat) -> Result<Box<dyn RecordReader>, BlockError>;
}
