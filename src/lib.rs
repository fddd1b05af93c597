//! Block-structured control flow for flat command scripts
//!
//! A [`Program`] is a linear list of commands such as `if`, `while`, `try`,
//! `call` and any number of host commands. [`Compiler`] links every
//! control-flow command to its partners; [`Session`] then runs the program one
//! command at a time, using nothing but "jump to row N" to provide nesting,
//! early exit, exceptions with finally, and function calls.
//!
//! # Example
//!
//! ```
//! use blockflow::{Command, Program, Session, StepResult, Value};
//!
//! let program = Program::new(vec![
//!     Command::new("foreach", "item", "1, 2, 3"),
//!     Command::new("endForeach", "", ""),
//! ]);
//! let mut session = Session::new(program).unwrap();
//! assert_eq!(session.run().unwrap(), StepResult::Done);
//! assert_eq!(session.vars().get("item"), None);
//! ```

pub mod compiler;
pub mod error;
pub mod interpreter;
pub mod platform;
pub mod program;
pub mod value;

pub use compiler::{BlockDef, BlockTable, CmdRange, CompiledProgram, Compiler, Nature};
pub use error::{BlockError, CommandRef};
pub use interpreter::{Session, SessionOptions, StepResult};
pub use platform::{
    CommandExecutor, Evaluator, FileRecordSource, JsonLiteralEvaluator, JsonRecordReader,
    MemoryRecordSource, NoOpExecutor, RecordReader, RecordSource,
};
pub use program::{Command, CommandKind, FunctionStyle, Keyword, LoopKind, Program, RecordFormat};
pub use value::{Pattern, Value, Variables};
