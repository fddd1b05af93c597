//! Block compiler
//!
//! A single forward pass over the program links every control-flow command to
//! its structural partners. Openers are kept on an open-blocks stack; each
//! terminator pops its opener, checks that the two belong to the same family
//! and patches the opener's `end_idx`, much like jump placeholders are patched
//! once a jump target becomes known.

mod block;
mod range;

pub use block::{BlockDef, BlockTable, Nature};
pub use range::{CmdRange, check_jump, find_block_range};

use crate::error::{BlockError, CommandRef};
use crate::program::{Command, Keyword, Program, keyword_with_and_wait};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Output of compilation, read-only for the rest of the run
#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    pub blocks: BlockTable,
    /// Label and function names mapped to their command index
    pub symbols: FxHashMap<String, usize>,
}

/// Compiler state for linking one program
pub struct Compiler<'a> {
    program: &'a Program,
    blocks: BlockTable,
    symbols: FxHashMap<String, usize>,
    /// Openers still waiting for their terminator
    open: Vec<usize>,
}

impl<'a> Compiler<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            program,
            blocks: BlockTable::default(),
            symbols: FxHashMap::default(),
            open: Vec::new(),
        }
    }

    /// Compile a program into its block table and symbol table
    pub fn compile_program(program: &Program) -> Result<CompiledProgram, BlockError> {
        let mut compiler = Compiler::new(program);
        for (idx, command) in program.iter() {
            if !command.is_executable() {
                continue;
            }
            compiler.compile_command(idx, command)?;
        }
        compiler.check_unclosed()?;
        debug!(
            blocks = compiler.blocks.len(),
            symbols = compiler.symbols.len(),
            "compiled program"
        );
        Ok(CompiledProgram {
            blocks: compiler.blocks,
            symbols: compiler.symbols,
        })
    }

    fn compile_command(&mut self, idx: usize, command: &Command) -> Result<(), BlockError> {
        if let Some(keyword) = keyword_with_and_wait(&command.name) {
            return Err(self.error_at(
                idx,
                format!("The 'AndWait' suffix is not valid for the '{}' command", keyword),
            ));
        }
        let Some(keyword) = Keyword::parse(&command.name) else {
            return Ok(());
        };

        match keyword {
            Keyword::Label => self.define_symbol(idx, &command.target, "label")?,

            Keyword::Goto
            | Keyword::GotoIf
            | Keyword::SkipNext
            | Keyword::Throw
            | Keyword::Call
            | Keyword::ExitTest
            | Keyword::LoadVars(_)
            | Keyword::LegacyLoadVars => {}

            // ═══════════════════════════════════════════════════════════════
            // Conditionals
            // ═══════════════════════════════════════════════════════════════
            Keyword::If => {
                self.blocks.insert(
                    idx,
                    BlockDef::If {
                        else_if_idxs: Vec::new(),
                        else_idx: None,
                        end_idx: 0,
                    },
                );
                self.open.push(idx);
            }
            Keyword::ElseIf => {
                let if_idx = self.expect_open_conditional(idx, keyword)?;
                if let Some(BlockDef::If {
                    else_if_idxs, else_idx, ..
                }) = self.blocks.get_mut(if_idx)
                {
                    if else_idx.is_some() {
                        return Err(self.error_at(idx, "elseIf is not valid after an else"));
                    }
                    else_if_idxs.push(idx);
                }
                self.blocks.insert(idx, BlockDef::ElseIf { if_idx });
            }
            Keyword::Else => {
                let if_idx = self.expect_open_conditional(idx, keyword)?;
                if let Some(BlockDef::If { else_idx, .. }) = self.blocks.get_mut(if_idx) {
                    if else_idx.is_some() {
                        return Err(self.error_at(idx, "Only one else is allowed per if block"));
                    }
                    *else_idx = Some(idx);
                }
                self.blocks.insert(idx, BlockDef::Else { if_idx });
            }
            Keyword::EndIf => {
                let if_idx = self.close(idx, keyword, |def| matches!(def, BlockDef::If { .. }))?;
                self.blocks.insert(idx, BlockDef::EndIf { if_idx });
            }

            // ═══════════════════════════════════════════════════════════════
            // Exception handling
            // ═══════════════════════════════════════════════════════════════
            Keyword::Try => {
                self.blocks.insert(
                    idx,
                    BlockDef::Try {
                        name: non_empty(&command.target),
                        catch_idx: None,
                        finally_idx: None,
                        end_idx: 0,
                    },
                );
                self.open.push(idx);
            }
            Keyword::Catch => {
                let try_idx = self.expect_open_try(idx, keyword)?;
                if let Some(BlockDef::Try {
                    catch_idx, finally_idx, ..
                }) = self.blocks.get_mut(try_idx)
                {
                    if catch_idx.is_some() {
                        return Err(self.error_at(idx, "Only one catch is allowed per try block"));
                    }
                    if finally_idx.is_some() {
                        return Err(self.error_at(idx, "catch is not valid after finally"));
                    }
                    *catch_idx = Some(idx);
                }
                self.blocks.insert(idx, BlockDef::Catch { try_idx });
            }
            Keyword::Finally => {
                let try_idx = self.expect_open_try(idx, keyword)?;
                if let Some(BlockDef::Try { finally_idx, .. }) = self.blocks.get_mut(try_idx) {
                    if finally_idx.is_some() {
                        return Err(self.error_at(idx, "Only one finally is allowed per try block"));
                    }
                    *finally_idx = Some(idx);
                }
                self.blocks.insert(idx, BlockDef::Finally { try_idx });
            }
            Keyword::EndTry => {
                let try_idx = self.close(idx, keyword, |def| matches!(def, BlockDef::Try { .. }))?;
                if let Some(BlockDef::Try { name: Some(name), .. }) = self.blocks.get(try_idx) {
                    if !command.target.is_empty() && command.target != *name {
                        return Err(self.error_at(
                            idx,
                            format!("Try name '{}' does not match endTry name '{}'", name, command.target),
                        ));
                    }
                } else if !command.target.is_empty() {
                    return Err(self.error_at(
                        idx,
                        format!("endTry name '{}' does not match an unnamed try", command.target),
                    ));
                }
                self.blocks.insert(idx, BlockDef::EndTry { try_idx });
            }

            // ═══════════════════════════════════════════════════════════════
            // Loops
            // ═══════════════════════════════════════════════════════════════
            Keyword::Loop(loop_kind) => {
                self.blocks.insert(idx, BlockDef::Loop { loop_kind, end_idx: 0 });
                self.open.push(idx);
            }
            Keyword::EndLoop(kind) => {
                let begin_idx = self.close(idx, keyword, |def| {
                    matches!(def, BlockDef::Loop { loop_kind, .. } if *loop_kind == kind)
                })?;
                self.blocks.insert(idx, BlockDef::EndLoop { begin_idx });
            }
            Keyword::Continue | Keyword::Break => {
                let Some(loop_idx) = self.enclosing_loop() else {
                    return Err(self.error_at(idx, format!("{} is not valid outside of a loop", keyword)));
                };
                self.blocks.insert(idx, BlockDef::LoopJump { loop_idx });
            }

            // ═══════════════════════════════════════════════════════════════
            // Functions
            // ═══════════════════════════════════════════════════════════════
            Keyword::Function(style) => {
                self.define_symbol(idx, &command.target, keyword.as_str())?;
                self.blocks.insert(
                    idx,
                    BlockDef::Function {
                        style,
                        name: command.target.clone(),
                        end_idx: 0,
                    },
                );
                self.open.push(idx);
            }
            Keyword::Return => {
                let Some(func_idx) = self.enclosing_function() else {
                    return Err(self.error_at(idx, "return is not valid outside of a function"));
                };
                self.blocks.insert(idx, BlockDef::Return { func_idx });
            }
            Keyword::EndFunction(style) => {
                let func_idx = self.close(idx, keyword, |def| {
                    matches!(def, BlockDef::Function { style: s, .. } if *s == style)
                })?;
                if let Some(BlockDef::Function { name, .. }) = self.blocks.get(func_idx) {
                    if !command.target.is_empty() && command.target != *name {
                        return Err(self.error_at(
                            idx,
                            format!("Function name '{}' does not match {} name '{}'", name, keyword, command.target),
                        ));
                    }
                }
                self.blocks.insert(idx, BlockDef::EndFunction { func_idx });
            }
        }
        Ok(())
    }

    /// Record a label or function name
    fn define_symbol(&mut self, idx: usize, name: &str, what: &str) -> Result<(), BlockError> {
        if name.is_empty() {
            return Err(self.error_at(idx, format!("A {} name is required", what)));
        }
        if let Some(existing) = self.symbols.get(name) {
            return Err(self.error_at(
                idx,
                format!("Duplicate name '{}', already defined at @{}", name, existing + 1),
            ));
        }
        self.symbols.insert(name.to_string(), idx);
        Ok(())
    }

    fn expect_open_conditional(&self, idx: usize, keyword: Keyword) -> Result<usize, BlockError> {
        match self.top_open() {
            Some((open_idx, BlockDef::If { .. })) => Ok(open_idx),
            _ => Err(self.error_at(idx, format!("{} is not valid outside of an if/endIf block", keyword))),
        }
    }

    fn expect_open_try(&self, idx: usize, keyword: Keyword) -> Result<usize, BlockError> {
        match self.top_open() {
            Some((open_idx, BlockDef::Try { .. })) => Ok(open_idx),
            _ => Err(self.error_at(idx, format!("{} is not valid outside of a try/endTry block", keyword))),
        }
    }

    fn top_open(&self) -> Option<(usize, &BlockDef)> {
        let idx = *self.open.last()?;
        self.blocks.get(idx).map(|def| (idx, def))
    }

    /// Pop the innermost opener for a terminator and link the two
    fn close(
        &mut self,
        idx: usize,
        keyword: Keyword,
        is_partner: impl Fn(&BlockDef) -> bool,
    ) -> Result<usize, BlockError> {
        let Some(open_idx) = self.open.pop() else {
            return Err(self.error_at(idx, format!("{} without a beginning block", keyword)));
        };
        let matches = self.blocks.get(open_idx).is_some_and(&is_partner);
        if !matches {
            let opener = self.command_ref(open_idx);
            return Err(self.error_at(idx, format!("{} does not match command {}", keyword, opener)));
        }
        self.blocks.link_end(open_idx, idx);
        Ok(open_idx)
    }

    /// Nearest open loop, not looking past a function boundary
    fn enclosing_loop(&self) -> Option<usize> {
        for &open_idx in self.open.iter().rev() {
            match self.blocks.get(open_idx) {
                Some(BlockDef::Loop { .. }) => return Some(open_idx),
                Some(BlockDef::Function { .. }) => return None,
                _ => {}
            }
        }
        None
    }

    fn enclosing_function(&self) -> Option<usize> {
        self.open
            .iter()
            .rev()
            .copied()
            .find(|&open_idx| matches!(self.blocks.get(open_idx), Some(BlockDef::Function { .. })))
    }

    fn check_unclosed(&self) -> Result<(), BlockError> {
        if self.open.is_empty() {
            return Ok(());
        }
        let problems: Vec<String> = self
            .open
            .iter()
            .map(|&open_idx| {
                format!(
                    "{} without a terminating '{}'",
                    self.command_ref(open_idx),
                    self.terminator_name(open_idx)
                )
            })
            .collect();
        Err(BlockError::compile(problems.join("; ")))
    }

    fn terminator_name(&self, open_idx: usize) -> &'static str {
        let keyword = match self.blocks.get(open_idx) {
            Some(BlockDef::Loop { loop_kind, .. }) => Keyword::EndLoop(*loop_kind),
            Some(BlockDef::Function { style, .. }) => Keyword::EndFunction(*style),
            Some(BlockDef::Try { .. }) => Keyword::EndTry,
            _ => Keyword::EndIf,
        };
        keyword.as_str()
    }

    fn command_ref(&self, idx: usize) -> String {
        match self.program.get(idx) {
            Some(command) => CommandRef::new(idx, command).to_string(),
            None => format!("@{}", idx + 1),
        }
    }

    fn error_at(&self, idx: usize, message: impl std::fmt::Display) -> BlockError {
        BlockError::compile(format!("{} {}", self.command_ref(idx), message))
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
