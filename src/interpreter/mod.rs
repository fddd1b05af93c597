//! Step-driven runtime for compiled programs
//!
//! A [`Session`] executes one command per [`Session::step`]. Control keywords
//! never block: they only decide which command runs next, using the links the
//! compiler recorded and the runtime stacks kept here.

mod args;
mod bubble;
mod conditional;
mod exception;
mod function;
mod jump;
mod loops;
mod pc;
mod policy;
mod records;
mod scope;
mod stack;

pub use bubble::{Bubble, BubbleMode, JumpCeiling};
pub use loops::LoopDriver;
pub use pc::ProgramCounter;
pub use policy::{PolicyStack, StepPolicy};
pub use scope::{Scope, VarSnapshot};
pub use stack::{
    Activation, ActivationFrame, BlockActivation, BlockStack, CallStack, StepResult, TryPhase,
};

use crate::compiler::{BlockDef, CompiledProgram, Compiler};
use crate::error::{BlockError, CommandRef};
use crate::platform::{
    CommandExecutor, Evaluator, FileRecordSource, JsonLiteralEvaluator, NoOpExecutor, RecordSource,
};
use crate::program::{Command, Keyword, Program, RecordFormat};
use crate::value::{Value, Variables};
use tracing::{debug, error, info, trace, warn};

/// Reserved variable holding the caught error inside a catch block
pub const ERROR_VAR: &str = "_error";
/// Reserved variable holding a function's return value
pub const RESULT_VAR: &str = "_result";
/// Reserved variable holding the 0-based `foreach` index
pub const INDEX_VAR: &str = "_i";

/// Limits and start point of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Maximum number of nested function calls
    pub max_call_depth: usize,
    /// Abort the run after this many commands
    pub max_steps: Option<u64>,
    /// Index of the first command to run
    pub start_at: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            max_steps: None,
            start_at: 0,
        }
    }
}

/// One compiled program together with its runtime state
pub struct Session {
    program: Program,
    compiled: CompiledProgram,
    options: SessionOptions,

    pc: ProgramCounter,
    calls: CallStack,
    /// Error or abnormal jump currently travelling through finally blocks
    bubble: Option<Bubble>,
    /// Depth of managed try blocks, -1 when none is open
    try_nesting: i32,
    policies: PolicyStack,

    vars: Variables,
    evaluator: Box<dyn Evaluator>,
    executor: Box<dyn CommandExecutor>,
    records: Box<dyn RecordSource>,

    steps: u64,
    finished: bool,
}

impl Session {
    /// Compile `program` and prepare a run with the default capabilities
    pub fn new(program: Program) -> Result<Self, BlockError> {
        let compiled = Compiler::compile_program(&program)?;
        Ok(Self {
            program,
            compiled,
            options: SessionOptions::default(),
            pc: ProgramCounter::new(),
            calls: CallStack::default(),
            bubble: None,
            try_nesting: -1,
            policies: PolicyStack::default(),
            vars: Variables::new(),
            evaluator: Box::new(JsonLiteralEvaluator),
            executor: Box::new(NoOpExecutor),
            records: Box::new(FileRecordSource::default()),
            steps: 0,
            finished: false,
        })
    }

    pub fn set_evaluator(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    pub fn set_executor(&mut self, executor: Box<dyn CommandExecutor>) {
        self.executor = executor;
    }

    pub fn set_record_source(&mut self, records: Box<dyn RecordSource>) {
        self.records = records;
    }

    pub fn set_options(&mut self, options: SessionOptions) {
        self.options = options;
    }

    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.options.max_call_depth = depth;
    }

    pub fn set_max_steps(&mut self, steps: Option<u64>) {
        self.options.max_steps = steps;
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn compiled(&self) -> &CompiledProgram {
        &self.compiled
    }

    pub fn vars(&self) -> &Variables {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut Variables {
        &mut self.vars
    }

    /// Index of the command most recently fetched
    pub fn current_index(&self) -> usize {
        self.pc.current()
    }

    /// Number of function calls in progress
    pub fn call_depth(&self) -> usize {
        self.calls.depth()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Clear all runtime state so the program can run again.
    /// Variables are kept; they belong to the host.
    pub fn reset(&mut self) {
        self.pc.reset();
        self.calls.reset();
        self.bubble = None;
        self.try_nesting = -1;
        self.policies.clear();
        self.steps = 0;
        self.finished = false;
    }

    /// Run until the program ends or halts
    pub fn run(&mut self) -> Result<StepResult, BlockError> {
        loop {
            match self.step()? {
                StepResult::Continue => continue,
                other => return Ok(other),
            }
        }
    }

    /// Execute exactly one command.
    ///
    /// Errors are offered to the enclosing try blocks when error routing is
    /// installed. Internal errors are always fatal. An error no handler
    /// accepts finishes the run and is returned with the location of the
    /// command that raised it.
    pub fn step(&mut self) -> Result<StepResult, BlockError> {
        if self.finished {
            return Ok(StepResult::Done);
        }
        if self.policies.take_halt() {
            info!(line = self.pc.current() + 1, "run halted by exitTest");
            self.finish();
            return Ok(StepResult::Halted);
        }
        if let Some(limit) = self.options.max_steps {
            if self.steps >= limit {
                self.finish();
                return Err(BlockError::assertion(format!("Step limit of {} exceeded", limit)));
            }
        }

        let Some(idx) = self.pc.fetch_next(&self.program, self.options.start_at) else {
            debug!(steps = self.steps, "run complete");
            self.finish();
            return Ok(StepResult::Done);
        };
        self.steps += 1;
        let command = self
            .program
            .get(idx)
            .cloned()
            .ok_or_else(|| BlockError::internal(format!("no command at @{}", idx + 1)))?;
        trace!(line = idx + 1, command = %command, "step");

        let Err(err) = self.execute(idx, &command) else {
            return Ok(StepResult::Continue);
        };
        let err = err.at(CommandRef::new(idx, &command));
        // A broken engine invariant is never handed to a catch
        let routable = !matches!(err, BlockError::Internal(_));
        if routable && self.policies.routes_errors() {
            match self.handle_command_error(idx, err.clone()) {
                Ok(true) => return Ok(StepResult::Continue),
                Ok(false) => {}
                Err(fatal) => {
                    error!(%fatal, "uncaught error");
                    self.finish();
                    return Err(fatal);
                }
            }
        }
        error!(%err, "uncaught error");
        self.finish();
        Err(err)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.bubble = None;
        self.policies.clear();
    }

    fn execute(&mut self, idx: usize, command: &Command) -> Result<(), BlockError> {
        match command.keyword() {
            Some(keyword) => self.execute_keyword(keyword, idx, command),
            None => self
                .executor
                .execute(command, &mut self.vars, self.evaluator.as_mut()),
        }
    }

    fn execute_keyword(&mut self, keyword: Keyword, idx: usize, command: &Command) -> Result<(), BlockError> {
        match keyword {
            Keyword::Label => Ok(()),
            Keyword::Goto => self.exec_goto(idx, &command.target),
            Keyword::GotoIf => self.exec_goto_if(idx, &command.target, &command.value),
            Keyword::SkipNext => self.exec_skip_next(idx, &command.target),

            Keyword::If => self.exec_if(idx, &command.target),
            Keyword::ElseIf => self.exec_else_if(idx, &command.target),
            Keyword::Else => self.exec_else(idx),
            Keyword::EndIf => self.exec_end_if(idx),

            Keyword::Try => self.exec_try(idx),
            Keyword::Catch => self.exec_catch(idx),
            Keyword::Finally => self.exec_finally(idx),
            Keyword::EndTry => self.exec_end_try(idx),
            Keyword::Throw => self.exec_throw(&command.target),

            Keyword::Loop(kind) => self.exec_loop(idx, kind, command),
            Keyword::EndLoop(_) => self.exec_end_loop(idx),
            Keyword::Continue => self.exec_loop_jump(idx, &command.target, false),
            Keyword::Break => self.exec_loop_jump(idx, &command.target, true),

            Keyword::Call => self.exec_call(idx, &command.target, &command.value),
            Keyword::Function(_) => self.exec_function(idx),
            Keyword::Return => self.exec_return(idx, Some(&command.target)),
            Keyword::EndFunction(_) => self.exec_return(idx, None),
            Keyword::ExitTest => self.exec_exit_test(idx),

            Keyword::LoadVars(format) => self.exec_load_vars(format, &command.target, &command.value),
            Keyword::LegacyLoadVars => {
                warn!(line = idx + 1, "loadVars is deprecated, use loadXmlVars");
                self.exec_load_vars(RecordFormat::Xml, &command.target, &command.value)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Shared helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn def(&self, idx: usize) -> Result<&BlockDef, BlockError> {
        self.compiled
            .blocks
            .get(idx)
            .ok_or_else(|| BlockError::internal(format!("no block definition at @{}", idx + 1)))
    }

    fn end_of(&self, opener_idx: usize) -> Result<usize, BlockError> {
        self.def(opener_idx)?
            .end_idx()
            .ok_or_else(|| BlockError::internal(format!("@{} is not a block opener", opener_idx + 1)))
    }

    fn branch(&mut self, idx: usize) -> Result<(), BlockError> {
        self.pc.set_next(idx, &self.program)
    }

    fn blocks(&self) -> &BlockStack {
        &self.calls.active().blocks
    }

    fn blocks_mut(&mut self) -> &mut BlockStack {
        &mut self.calls.active_mut().blocks
    }

    fn eval(&mut self, expr: &str) -> Result<Value, BlockError> {
        self.evaluator.evaluate(expr, &mut self.vars)
    }

    fn eval_bool(&mut self, expr: &str) -> Result<bool, BlockError> {
        self.eval(expr).map(|value| value.is_truthy())
    }

    /// Continuations and terminators must find their own opener innermost
    fn assert_active(&self, expected: usize) -> Result<(), BlockError> {
        match self.blocks().top() {
            Some(activation) if activation.def_idx == expected => Ok(()),
            Some(activation) => Err(BlockError::assertion(format!(
                "unexpected command, active command was @{}",
                activation.def_idx + 1
            ))),
            None => Err(BlockError::assertion(format!(
                "unexpected command, expected the block opened at @{} to be active",
                expected + 1
            ))),
        }
    }

    fn enter_try_nesting(&mut self) {
        self.try_nesting += 1;
        debug!(nesting = self.try_nesting, "enter try");
        if self.try_nesting == 0 {
            self.policies.push(StepPolicy::RouteErrors);
        }
    }

    fn leave_try_nesting(&mut self) {
        self.try_nesting -= 1;
        debug!(nesting = self.try_nesting, "leave try");
        if self.try_nesting < 0 {
            self.policies.remove(StepPolicy::RouteErrors);
        }
    }

    /// Drop an activation without running its terminator.
    ///
    /// Loops give back their variables; managed tries leave the nesting count.
    fn discard_activation(&mut self, activation: BlockActivation) {
        trace!(line = activation.def_idx + 1, "discard block");
        match activation.state {
            Activation::Loop(state) => state.saved.restore(&mut self.vars),
            Activation::Try(state) => {
                if state.managed {
                    self.leave_try_nesting();
                }
            }
            Activation::Conditional(_) => {}
        }
    }

    /// Pop the innermost call frame, discarding its open blocks and restoring
    /// the variables its arguments shadowed
    fn pop_frame(&mut self) -> Option<ActivationFrame> {
        let mut frame = self.calls.pop()?;
        while let Some(activation) = frame.blocks.pop() {
            self.discard_activation(activation);
        }
        std::mem::take(&mut frame.saved).restore(&mut self.vars);
        Some(frame)
    }
}
