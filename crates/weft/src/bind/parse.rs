//! The binding-expression mini-parser.
//!
//! A binding attribute holds a comma-separated list of `key: expression`
//! pairs. Naive comma-splitting would break on commas embedded in string
//! literals or nested `()[]{}` groups, so parsing runs in fixed stages:
//!
//! 1. string and regex literals are extracted and replaced with placeholder
//!    tokens, making any commas/colons inside them inert;
//! 2. balanced bracket/paren/brace groups are extracted the same way;
//! 3. the remaining text is split on top-level commas, and each pair on its
//!    first top-level colon;
//! 4. placeholders are restored into the expression texts.
//!
//! Keys may carry leading operators: `!` negates the binder's truth test,
//! `-` forces one-way (view never writes back), and a leading `.` is the
//! CSS-class shorthand (`.selected: isOn` toggles the `selected` class).

use crate::error::BindError;

// Placeholder delimiters; control characters never occur in markup
// attribute values.
const LIT_OPEN: char = '\u{1}';
const LIT_CLOSE: char = '\u{2}';
const GROUP_OPEN: char = '\u{3}';
const GROUP_CLOSE: char = '\u{4}';

/// One parsed `key: expression` pair, operators still attached to the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingPair {
    /// The key, including any leading operator characters.
    pub key: String,
    /// The expression with literals and groups restored.
    pub expression: String,
}

/// A key with its operators resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingKey {
    /// The binder keyword (for the class shorthand this is `css`).
    pub keyword: String,
    /// The class name for the `.class` shorthand.
    pub class: Option<String>,
    /// `!` operator: flip the truth test.
    pub negate: bool,
    /// `-` operator: model→view only.
    pub one_way: bool,
}

/// Parse a binding attribute into ordered pairs.
pub fn parse_binding_list(source: &str) -> Result<Vec<BindingPair>, BindError> {
    let mut literals = Vec::new();
    let masked = mask_literals(source, &mut literals)?;
    let mut groups = Vec::new();
    let masked = mask_groups(source, &masked, &mut groups)?;

    let mut pairs = Vec::new();
    for part in masked.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let Some((key, expression)) = part.split_once(':') else {
            return Err(BindError::malformed(source, "pair is missing ':'"));
        };
        let key = key.trim();
        let expression = restore(expression.trim(), &groups, &literals);
        if key.is_empty() {
            return Err(BindError::malformed(source, "pair has an empty key"));
        }
        if expression.is_empty() {
            return Err(BindError::malformed(source, "pair has an empty expression"));
        }
        pairs.push(BindingPair {
            key: key.to_string(),
            expression,
        });
    }
    Ok(pairs)
}

/// Resolve the operator prefix of a key.
pub fn parse_key(raw: &str) -> Result<BindingKey, BindError> {
    let mut negate = false;
    let mut one_way = false;
    let mut rest = raw;
    loop {
        if let Some(stripped) = rest.strip_prefix('!') {
            negate = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('-') {
            one_way = true;
            rest = stripped;
        } else {
            break;
        }
    }
    if let Some(class) = rest.strip_prefix('.') {
        if class.is_empty() {
            return Err(BindError::malformed(raw, "class shorthand without a name"));
        }
        return Ok(BindingKey {
            keyword: "css".to_string(),
            class: Some(class.to_string()),
            negate,
            one_way,
        });
    }
    if rest.is_empty() {
        return Err(BindError::malformed(raw, "key has no keyword"));
    }
    Ok(BindingKey {
        keyword: rest.to_string(),
        class: None,
        negate,
        one_way,
    })
}

/// Split the leading ancestor-scope markers off an expression: each `^.`
/// walks one enclosing structural-binder scope outward.
pub fn split_scope_path(expression: &str) -> Result<(usize, String), BindError> {
    let mut ups = 0;
    let mut rest = expression;
    while let Some(stripped) = rest.strip_prefix("^.") {
        ups += 1;
        rest = stripped;
    }
    if rest.is_empty() || rest.contains('^') {
        return Err(BindError::malformed(
            expression,
            "invalid ancestor-scope marker",
        ));
    }
    Ok((ups, rest.to_string()))
}

/// Stage 1: replace string (`'…'`, `"…"`) and regex (`/…/`) literals with
/// placeholder tokens.
fn mask_literals(source: &str, literals: &mut Vec<String>) -> Result<String, BindError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' || c == '/' {
            let start = i;
            i += 1;
            let mut closed = false;
            while i < chars.len() {
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == c {
                    closed = true;
                    break;
                }
                i += 1;
            }
            if !closed {
                return Err(BindError::malformed(source, format!("unterminated {c}…{c} literal")));
            }
            let literal: String = chars[start..=i].iter().collect();
            let token = format!("{LIT_OPEN}{}{LIT_CLOSE}", literals.len());
            literals.push(literal);
            out.push_str(&token);
            i += 1;
        } else {
            out.push(c);
            i += 1;
        }
    }
    Ok(out)
}

/// Stage 2: replace outermost balanced `()`/`[]`/`{}` groups with
/// placeholder tokens. The input already has literals masked, so brackets
/// inside them are inert.
fn mask_groups(
    source: &str,
    masked: &str,
    groups: &mut Vec<String>,
) -> Result<String, BindError> {
    let mut out = String::with_capacity(masked.len());
    let mut stack: Vec<char> = Vec::new();
    // Captured groups keep their outer brackets so restoration is verbatim.
    let mut group = String::new();
    for c in masked.chars() {
        match c {
            '(' | '[' | '{' => {
                stack.push(closing_for(c));
                group.push(c);
            }
            ')' | ']' | '}' => {
                match stack.pop() {
                    Some(expected) if expected == c => {}
                    _ => {
                        return Err(BindError::malformed(source, format!("unbalanced '{c}'")));
                    }
                }
                group.push(c);
                if stack.is_empty() {
                    let token = format!("{GROUP_OPEN}{}{GROUP_CLOSE}", groups.len());
                    groups.push(std::mem::take(&mut group));
                    out.push_str(&token);
                }
            }
            _ => {
                if stack.is_empty() {
                    out.push(c);
                } else {
                    group.push(c);
                }
            }
        }
    }
    if !stack.is_empty() {
        return Err(BindError::malformed(source, "unbalanced bracket group"));
    }
    Ok(out)
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Stage 4: restore group placeholders, then literal placeholders (groups
/// may contain literal tokens; only outermost groups were tokenized, so one
/// pass each suffices).
fn restore(text: &str, groups: &[String], literals: &[String]) -> String {
    let with_groups = restore_tokens(text, GROUP_OPEN, GROUP_CLOSE, &|index| groups[index].clone());
    restore_tokens(&with_groups, LIT_OPEN, LIT_CLOSE, &|index| {
        literals[index].clone()
    })
}

fn restore_tokens(text: &str, open: char, close: char, lookup: &dyn Fn(usize) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != open {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        for d in chars.by_ref() {
            if d == close {
                break;
            }
            digits.push(d);
        }
        match digits.parse::<usize>() {
            Ok(index) => out.push_str(&lookup(index)),
            Err(_) => out.push_str(&digits),
        }
    }
    out
}
