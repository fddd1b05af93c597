//! Integration tests for the interpreter, organized by feature
//!
//! These tests exercise the interpreter through the public API. Programs are
//! written as `(command, target, value)` rows and run with a small test-side
//! expression evaluator and a recording executor:
//!
//! - `emit|text` appends `text` verbatim to the log
//! - `echo|expr` appends the value of `expr` to the log
//! - `store|name|expr` assigns a variable
//! - `fail|message` raises a script error
//! - `crash|message` raises an internal engine error
//!
//! A row whose command starts with `//` is a comment.

mod conditional;
mod jumps;
mod records;

use blockflow::{
    BlockError, Command, CommandExecutor, Evaluator, Pattern, Program, Session, StepResult, Value,
    Variables,
};
use std::cell::RefCell;
use std::rc::Rc;

pub type Row<'a> = (&'a str, &'a str, &'a str);

/// Build a program from rows
pub fn program(rows: &[Row<'_>]) -> Program {
    rows.iter()
        .map(|(name, target, value)| match name.strip_prefix("//") {
            Some(text) => Command::comment(text.trim()),
            None => Command::new(*name, *target, *value),
        })
        .collect()
}

/// A compiled session wired to the test evaluator and a fresh log
#[allow(clippy::expect_used)]
pub fn session(rows: &[Row<'_>]) -> (Session, Log) {
    let mut session = Session::new(program(rows)).expect("compile failed");
    let log = Log::default();
    session.set_evaluator(Box::new(ExprEvaluator));
    session.set_executor(Box::new(Recorder { log: log.clone() }));
    (session, log)
}

/// Outcome of running a program to its end
pub struct Run {
    pub result: Result<StepResult, BlockError>,
    pub log: Vec<String>,
    pub session: Session,
}

impl Run {
    pub fn var(&self, name: &str) -> Option<Value> {
        self.session.vars().get(name).cloned()
    }
}

pub fn run(rows: &[Row<'_>]) -> Run {
    let (mut session, log) = session(rows);
    let result = session.run();
    Run {
        result,
        log: log.entries(),
        session,
    }
}

/// Run a program that must complete and return its log
#[allow(clippy::expect_used)]
pub fn log_of(rows: &[Row<'_>]) -> Vec<String> {
    let outcome = run(rows);
    outcome.result.expect("run failed");
    outcome.log
}

/// Run a program that must fail and return the error
#[allow(clippy::expect_used)]
pub fn error_of(rows: &[Row<'_>]) -> BlockError {
    run(rows).result.expect_err("run should fail")
}

pub fn num(n: i64) -> Value {
    Value::from(n)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Recording executor
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

pub struct Recorder {
    pub log: Log,
}

impl CommandExecutor for Recorder {
    fn execute(
        &mut self,
        command: &Command,
        vars: &mut Variables,
        evaluator: &mut dyn Evaluator,
    ) -> Result<(), BlockError> {
        match command.name.as_str() {
            "emit" => {
                self.log.push(command.target.clone());
                Ok(())
            }
            "echo" => {
                let value = evaluator.evaluate(&command.target, vars)?;
                self.log.push(value.to_string());
                Ok(())
            }
            "store" => {
                let value = evaluator.evaluate(&command.value, vars)?;
                vars.set(command.target.clone(), value);
                Ok(())
            }
            "fail" => Err(BlockError::script("Error", command.target.clone())),
            "crash" => Err(BlockError::internal(command.target.clone())),
            other => Err(BlockError::assertion(format!("Unknown command: {}", other))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test expression evaluator
// ═══════════════════════════════════════════════════════════════════════════════

/// A small expression language: numbers, quoted strings, `/regex/`,
/// `true`/`false`/`null`, variables, `[a, b]` lists, arithmetic, comparison,
/// `&& || !`, assignment (`= += -=`), `++`/`--`, and top-level comma lists.
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&mut self, expr: &str, vars: &mut Variables) -> Result<Value, BlockError> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(Value::Null);
        }
        let mut parser = ExprParser {
            tokens,
            pos: 0,
            vars,
        };
        let value = parser.list()?;
        if parser.pos < parser.tokens.len() {
            return Err(syntax_error(expr));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Regex(String),
    Op(&'static str),
}

const TWO_CHAR_OPS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-="];
const ONE_CHAR_OPS: &[&str] = &["+", "-", "*", "/", "%", "<", ">", "!", "=", "(", ")", "[", "]", ","];

fn syntax_error(expr: &str) -> BlockError {
    BlockError::script("SyntaxError", format!("Cannot parse '{}'", expr))
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, BlockError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while let Some(&c) = chars.get(i) {
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit() || *c == '.') {
                i += 1;
            }
            let text: String = chars.get(start..i).unwrap_or_default().iter().collect();
            let n = text.parse::<f64>().map_err(|_| syntax_error(expr))?;
            tokens.push(Tok::Num(n));
        } else if c == '\'' || c == '"' {
            let start = i + 1;
            i = start;
            while chars.get(i).is_some_and(|ch| *ch != c) {
                i += 1;
            }
            if i >= chars.len() {
                return Err(syntax_error(expr));
            }
            tokens.push(Tok::Str(chars.get(start..i).unwrap_or_default().iter().collect()));
            i += 1;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
                i += 1;
            }
            tokens.push(Tok::Ident(chars.get(start..i).unwrap_or_default().iter().collect()));
        } else if c == '/' && regex_allowed(tokens.last()) {
            let start = i + 1;
            i = start;
            while chars.get(i).is_some_and(|ch| *ch != '/') {
                i += 1;
            }
            if i >= chars.len() {
                return Err(syntax_error(expr));
            }
            tokens.push(Tok::Regex(chars.get(start..i).unwrap_or_default().iter().collect()));
            i += 1;
        } else {
            let two: String = chars.get(i..i + 2).unwrap_or_default().iter().collect();
            if let Some(op) = TWO_CHAR_OPS.iter().find(|op| **op == two) {
                tokens.push(Tok::Op(*op));
                i += 2;
                continue;
            }
            let one = c.to_string();
            let Some(op) = ONE_CHAR_OPS.iter().find(|op| **op == one) else {
                return Err(syntax_error(expr));
            };
            tokens.push(Tok::Op(*op));
            i += 1;
        }
    }
    Ok(tokens)
}

/// A `/` starts a regex unless it follows an operand
fn regex_allowed(previous: Option<&Tok>) -> bool {
    match previous {
        None => true,
        Some(Tok::Op(op)) => *op != ")" && *op != "]",
        Some(_) => false,
    }
}

struct ExprParser<'a> {
    tokens: Vec<Tok>,
    pos: usize,
    vars: &'a mut Variables,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Tok::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn eat(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &str) -> Result<(), BlockError> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(BlockError::script("SyntaxError", format!("Expected '{}'", op)))
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, BlockError> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| BlockError::script("ReferenceError", format!("{} is not defined", name)))
    }

    fn list(&mut self) -> Result<Value, BlockError> {
        let first = self.assign()?;
        if self.peek_op() != Some(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(",") {
            items.push(self.assign()?);
        }
        Ok(Value::List(items))
    }

    fn assign(&mut self) -> Result<Value, BlockError> {
        if let Some(Tok::Ident(name)) = self.peek().cloned() {
            let op = match self.tokens.get(self.pos + 1) {
                Some(Tok::Op(op)) if ["=", "+=", "-="].contains(op) => Some(*op),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 2;
                let rhs = self.assign()?;
                let value = match op {
                    "=" => rhs,
                    "+=" => add(&self.lookup(&name)?, &rhs),
                    _ => arith(&self.lookup(&name)?, &rhs, "-")?,
                };
                self.vars.set(name, value.clone());
                return Ok(value);
            }
        }
        self.or()
    }

    fn or(&mut self) -> Result<Value, BlockError> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = Value::Bool(left.is_truthy() || right.is_truthy());
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value, BlockError> {
        let mut left = self.equality()?;
        while self.eat("&&") {
            let right = self.equality()?;
            left = Value::Bool(left.is_truthy() && right.is_truthy());
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Value, BlockError> {
        let mut left = self.comparison()?;
        loop {
            let negate = if self.eat("==") {
                false
            } else if self.eat("!=") {
                true
            } else {
                return Ok(left);
            };
            let right = self.comparison()?;
            left = Value::Bool(loose_eq(&left, &right) != negate);
        }
    }

    fn comparison(&mut self) -> Result<Value, BlockError> {
        let mut left = self.additive()?;
        while let Some(op) = self.peek_op().filter(|op| ["<", "<=", ">", ">="].contains(op)) {
            self.pos += 1;
            let right = self.additive()?;
            let ordering = match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(left.to_string().cmp(&right.to_string())),
            };
            let result = ordering.is_some_and(|ordering| match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            });
            left = Value::Bool(result);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Value, BlockError> {
        let mut left = self.multiplicative()?;
        loop {
            if self.eat("+") {
                let right = self.multiplicative()?;
                left = add(&left, &right);
            } else if self.eat("-") {
                let right = self.multiplicative()?;
                left = arith(&left, &right, "-")?;
            } else {
                return Ok(left);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<Value, BlockError> {
        let mut left = self.unary()?;
        while let Some(op) = self.peek_op().filter(|op| ["*", "/", "%"].contains(op)) {
            self.pos += 1;
            let right = self.unary()?;
            left = arith(&left, &right, op)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value, BlockError> {
        if self.eat("!") {
            let value = self.unary()?;
            return Ok(Value::Bool(!value.is_truthy()));
        }
        if self.eat("-") {
            let value = self.unary()?;
            return arith(&Value::from(0i64), &value, "-");
        }
        for op in ["++", "--"] {
            if self.eat(op) {
                let Some(Tok::Ident(name)) = self.peek().cloned() else {
                    return Err(BlockError::script("SyntaxError", format!("'{}' needs a variable", op)));
                };
                self.pos += 1;
                let updated = self.step_var(&name, op)?;
                return Ok(updated);
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Value, BlockError> {
        if let Some(Tok::Ident(name)) = self.peek().cloned() {
            for op in ["++", "--"] {
                if self.tokens.get(self.pos + 1) == Some(&Tok::Op(op)) {
                    self.pos += 2;
                    let before = self.lookup(&name)?;
                    self.step_var(&name, op)?;
                    return Ok(before);
                }
            }
        }
        self.primary()
    }

    fn step_var(&mut self, name: &str, op: &str) -> Result<Value, BlockError> {
        let current = self.lookup(name)?;
        let updated = arith(&current, &Value::from(1i64), if op == "++" { "+" } else { "-" })?;
        self.vars.set(name, updated.clone());
        Ok(updated)
    }

    fn primary(&mut self) -> Result<Value, BlockError> {
        let Some(token) = self.peek().cloned() else {
            return Err(BlockError::script("SyntaxError", "Unexpected end of expression"));
        };
        self.pos += 1;
        match token {
            Tok::Num(n) => Ok(Value::Number(n)),
            Tok::Str(s) => Ok(Value::String(s)),
            Tok::Regex(source) => Ok(Value::Pattern(Pattern::new(&source)?)),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                _ => self.lookup(&name),
            },
            Tok::Op("(") => {
                let value = self.list()?;
                self.expect(")")?;
                Ok(value)
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                if !self.eat("]") {
                    loop {
                        items.push(self.assign()?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Value::List(items))
            }
            Tok::Op(op) => Err(BlockError::script("SyntaxError", format!("Unexpected '{}'", op))),
        }
    }
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
        _ => Value::String(format!("{}{}", left, right)),
    }
}

fn arith(left: &Value, right: &Value, op: &str) -> Result<Value, BlockError> {
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(BlockError::script(
            "TypeError",
            format!("Cannot apply '{}' to {} and {}", op, left, right),
        ));
    };
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => a / b,
        _ => a % b,
    };
    Ok(Value::Number(result))
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => left.to_string() == right.to_string(),
        _ => left == right,
    }
}

#[test]
fn test_evaluator_arithmetic_and_assignment() {
    let mut vars = Variables::new();
    let mut evaluator = ExprEvaluator;
    assert_eq!(evaluator.evaluate("1 + 2 * 3", &mut vars), Ok(num(7)));
    assert_eq!(evaluator.evaluate("i = 4", &mut vars), Ok(num(4)));
    assert_eq!(evaluator.evaluate("i++", &mut vars), Ok(num(4)));
    assert_eq!(vars.get("i"), Some(&num(5)));
    assert_eq!(evaluator.evaluate("i < 6 && i != 4", &mut vars), Ok(Value::Bool(true)));
    assert_eq!(
        evaluator.evaluate("'a', 'b'", &mut vars),
        Ok(Value::List(vec![Value::from("a"), Value::from("b")]))
    );
    assert!(evaluator.evaluate("missing", &mut vars).is_err());
}
