//! Error types for the block-flow engine

use crate::program::Command;
use thiserror::Error;

/// Reference to the command an error was raised at
///
/// Displays as `@n: [name|target|value]` with a 1-based row number.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRef {
    pub index: usize,
    pub text: String,
}

impl CommandRef {
    pub fn new(index: usize, command: &Command) -> Self {
        Self {
            index,
            text: command.to_string(),
        }
    }

    /// 1-based row number
    pub fn line(&self) -> usize {
        self.index + 1
    }
}

impl std::fmt::Display for CommandRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}: [{}]", self.line(), self.text)
    }
}

/// Main error type for compilation and execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    /// Malformed block structure. Always fatal, raised before execution.
    #[error("CompileError: {message}")]
    Compile { message: String },

    /// Invalid usage detected while running: missing branch target, bad
    /// argument, illegal jump, depth limit.
    #[error("RuntimeAssertionError: {message}{}", format_location(.location))]
    Assertion {
        message: String,
        location: Option<CommandRef>,
    },

    /// Failure raised by a script (`throw`) or by an underlying action.
    #[error("{name}: {message}{}", format_location(.location))]
    Script {
        name: String,
        message: String,
        location: Option<CommandRef>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_location(location: &Option<CommandRef>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl BlockError {
    pub fn compile(message: impl Into<String>) -> Self {
        BlockError::Compile {
            message: message.into(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        BlockError::Assertion {
            message: message.into(),
            location: None,
        }
    }

    pub fn script(name: impl Into<String>, message: impl Into<String>) -> Self {
        BlockError::Script {
            name: name.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        BlockError::Internal(message.into())
    }

    /// Attach the command location unless one is already recorded.
    ///
    /// Errors that bubble through several commands keep the location of the
    /// command that originally raised them.
    pub fn at(mut self, location: CommandRef) -> Self {
        match &mut self {
            BlockError::Assertion { location: loc, .. } | BlockError::Script { location: loc, .. } => {
                if loc.is_none() {
                    *loc = Some(location);
                }
            }
            BlockError::Compile { .. } | BlockError::Internal(_) => {}
        }
        self
    }

    /// The bare message, without kind prefix or location.
    ///
    /// This is the text catch matchers are tested against.
    pub fn message(&self) -> &str {
        match self {
            BlockError::Compile { message }
            | BlockError::Assertion { message, .. }
            | BlockError::Script { message, .. } => message,
            BlockError::Internal(message) => message,
        }
    }

    /// Name of the error kind as exposed to scripts via `_error.name`
    pub fn name(&self) -> &str {
        match self {
            BlockError::Compile { .. } => "CompileError",
            BlockError::Assertion { .. } => "RuntimeAssertionError",
            BlockError::Script { name, .. } => name,
            BlockError::Internal(_) => "InternalError",
        }
    }

    pub fn location(&self) -> Option<&CommandRef> {
        match self {
            BlockError::Assertion { location, .. } | BlockError::Script { location, .. } => {
                location.as_ref()
            }
            BlockError::Compile { .. } | BlockError::Internal(_) => None,
        }
    }
}
