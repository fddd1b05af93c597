//! Splitting of `name=expr` lists used by `call` and `for`

use crate::error::BlockError;
use crate::program::is_valid_name;

/// Split `text` on `delim`, ignoring delimiters nested in brackets or quotes.
pub fn split_top_level(text: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == delim && depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Split a comma list into trimmed, non-empty items
pub fn split_list(text: &str) -> Vec<String> {
    split_top_level(text, ',')
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Split `name = expr` at its assignment operator.
///
/// Comparison operators (`==`, `!=`, `<=`, `>=`) are not assignments.
pub fn split_assignment(text: &str) -> Option<(String, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '=' if depth == 0 => {
                let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
                let next = chars.get(i + 1).copied();
                if matches!(prev, Some('=' | '!' | '<' | '>')) || next == Some('=') {
                    continue;
                }
                let name: String = chars.iter().take(i).collect();
                let expr: String = chars.iter().skip(i + 1).collect();
                return Some((name.trim().to_string(), expr.trim().to_string()));
            }
            _ => {}
        }
    }
    None
}

/// Parse `a=1, b=x+1` into validated names and their unevaluated expressions
pub fn parse_bindings(text: &str, desc: &str) -> Result<Vec<(String, String)>, BlockError> {
    split_list(text)
        .into_iter()
        .map(|item| {
            let Some((name, expr)) = split_assignment(&item) else {
                return Err(BlockError::assertion(format!(
                    "Invalid {} '{}'; expected name=value",
                    desc, item
                )));
            };
            validate_name(&name, desc)?;
            Ok((name, expr))
        })
        .collect()
}

pub fn validate_name(name: &str, desc: &str) -> Result<(), BlockError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BlockError::assertion(format!("Invalid character(s) in {} name: '{}'", desc, name)))
    }
}
