//! Program representation: the flat command sequence and its control keywords

use serde::{Deserialize, Serialize};

use crate::error::BlockError;

/// Whether a row takes part in execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    #[default]
    #[serde(rename = "command")]
    Executable,
    /// Skipped by the program counter
    Comment,
}

/// A single row of the program
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "command")]
    pub name: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: CommandKind,
}

impl Command {
    pub fn new(name: impl Into<String>, target: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            value: value.into(),
            kind: CommandKind::Executable,
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            name: text.into(),
            target: String::new(),
            value: String::new(),
            kind: CommandKind::Comment,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.kind == CommandKind::Executable
    }

    /// The control keyword this command names, if any
    pub fn keyword(&self) -> Option<Keyword> {
        if self.is_executable() {
            Keyword::parse(&self.name)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.target.is_empty() {
            write!(f, "|{}", self.target)?;
        }
        if !self.value.is_empty() {
            write!(f, "|{}", self.value)?;
        }
        Ok(())
    }
}

/// Immutable ordered command sequence. A command's position is its address.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    commands: Vec<Command>,
}

impl Program {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    /// Parse a program from a JSON array of rows
    /// (`{"command": "if", "target": "x > 1"}`).
    pub fn from_json(source: &str) -> Result<Self, BlockError> {
        let commands: Vec<Command> = serde_json::from_str(source)
            .map_err(|e| BlockError::compile(format!("Invalid program JSON: {}", e)))?;
        Ok(Self { commands })
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Command)> {
        self.commands.iter().enumerate()
    }
}

impl FromIterator<Command> for Program {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

/// Loop flavours, shared by openers and their terminators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopKind {
    While,
    For,
    Foreach,
    Records(RecordFormat),
}

/// Format of an external record file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordFormat {
    Json,
    Xml,
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordFormat::Json => write!(f, "JSON"),
            RecordFormat::Xml => write!(f, "XML"),
        }
    }
}

/// `function`/`endFunction` and the `script`/`endScript` spelling pair up
/// only with their own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionStyle {
    Function,
    Script,
}

/// Control-flow commands handled by the engine itself.
///
/// Every other command name is passed to the host executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Label,
    Goto,
    GotoIf,
    SkipNext,
    If,
    ElseIf,
    Else,
    EndIf,
    Try,
    Catch,
    Finally,
    EndTry,
    Throw,
    Loop(LoopKind),
    EndLoop(LoopKind),
    Continue,
    Break,
    Call,
    Function(FunctionStyle),
    Return,
    EndFunction(FunctionStyle),
    ExitTest,
    LoadVars(RecordFormat),
    /// Deprecated spelling of `loadXmlVars`
    LegacyLoadVars,
}

impl Keyword {
    pub fn parse(name: &str) -> Option<Keyword> {
        let keyword = match name {
            "label" => Keyword::Label,
            "goto" => Keyword::Goto,
            "gotoIf" => Keyword::GotoIf,
            "skipNext" => Keyword::SkipNext,
            "if" => Keyword::If,
            "elseIf" => Keyword::ElseIf,
            "else" => Keyword::Else,
            "endIf" => Keyword::EndIf,
            "try" => Keyword::Try,
            "catch" => Keyword::Catch,
            "finally" => Keyword::Finally,
            "endTry" => Keyword::EndTry,
            "throw" => Keyword::Throw,
            "while" => Keyword::Loop(LoopKind::While),
            "endWhile" => Keyword::EndLoop(LoopKind::While),
            "for" => Keyword::Loop(LoopKind::For),
            "endFor" => Keyword::EndLoop(LoopKind::For),
            "foreach" => Keyword::Loop(LoopKind::Foreach),
            "endForeach" => Keyword::EndLoop(LoopKind::Foreach),
            "forJson" => Keyword::Loop(LoopKind::Records(RecordFormat::Json)),
            "endForJson" => Keyword::EndLoop(LoopKind::Records(RecordFormat::Json)),
            "forXml" => Keyword::Loop(LoopKind::Records(RecordFormat::Xml)),
            "endForXml" => Keyword::EndLoop(LoopKind::Records(RecordFormat::Xml)),
            "continue" => Keyword::Continue,
            "break" => Keyword::Break,
            "call" => Keyword::Call,
            "function" => Keyword::Function(FunctionStyle::Function),
            "endFunction" => Keyword::EndFunction(FunctionStyle::Function),
            "script" => Keyword::Function(FunctionStyle::Script),
            "endScript" => Keyword::EndFunction(FunctionStyle::Script),
            "return" => Keyword::Return,
            "exitTest" => Keyword::ExitTest,
            "loadJsonVars" => Keyword::LoadVars(RecordFormat::Json),
            "loadXmlVars" => Keyword::LoadVars(RecordFormat::Xml),
            "loadVars" => Keyword::LegacyLoadVars,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Label => "label",
            Keyword::Goto => "goto",
            Keyword::GotoIf => "gotoIf",
            Keyword::SkipNext => "skipNext",
            Keyword::If => "if",
            Keyword::ElseIf => "elseIf",
            Keyword::Else => "else",
            Keyword::EndIf => "endIf",
            Keyword::Try => "try",
            Keyword::Catch => "catch",
            Keyword::Finally => "finally",
            Keyword::EndTry => "endTry",
            Keyword::Throw => "throw",
            Keyword::Loop(kind) => match kind {
                LoopKind::While => "while",
                LoopKind::For => "for",
                LoopKind::Foreach => "foreach",
                LoopKind::Records(RecordFormat::Json) => "forJson",
                LoopKind::Records(RecordFormat::Xml) => "forXml",
            },
            Keyword::EndLoop(kind) => match kind {
                LoopKind::While => "endWhile",
                LoopKind::For => "endFor",
                LoopKind::Foreach => "endForeach",
                LoopKind::Records(RecordFormat::Json) => "endForJson",
                LoopKind::Records(RecordFormat::Xml) => "endForXml",
            },
            Keyword::Continue => "continue",
            Keyword::Break => "break",
            Keyword::Call => "call",
            Keyword::Function(FunctionStyle::Function) => "function",
            Keyword::Function(FunctionStyle::Script) => "script",
            Keyword::Return => "return",
            Keyword::EndFunction(FunctionStyle::Function) => "endFunction",
            Keyword::EndFunction(FunctionStyle::Script) => "endScript",
            Keyword::ExitTest => "exitTest",
            Keyword::LoadVars(RecordFormat::Json) => "loadJsonVars",
            Keyword::LoadVars(RecordFormat::Xml) => "loadXmlVars",
            Keyword::LegacyLoadVars => "loadVars",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// If `name` is a control keyword with the host's `AndWait` suffix appended,
/// return the keyword. Such commands are rejected at compile time.
pub fn keyword_with_and_wait(name: &str) -> Option<Keyword> {
    name.strip_suffix("AndWait").and_then(Keyword::parse)
}

/// Variable names: a letter followed by letters, digits or underscores
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
