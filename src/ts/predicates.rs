//! Predicate expressions (`#eq?`, `#not-eq?`, `#match?`, `#not-match?`).
//!
//! Predicates are lifted out of the query text before it reaches tree-sitter
//! and evaluated here against each raw match. Lifting replaces every
//! predicate with blanks of the same byte length, so offsets (and therefore
//! error line numbers) in the remaining pattern text still line up with the
//! text the user wrote.

use crate::results::Capture;
use crate::ts::errors::CompileErrorKind;
use regex::Regex;

/// One argument of a predicate expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateArg {
    /// `@name`
    Capture(String),
    /// `"text"` or a bare word
    Literal(String),
}

/// A predicate as written in the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateExpr {
    /// Operator without the leading `#`, e.g. `eq?`
    pub operator: String,
    pub args: Vec<PredicateArg>,
    /// Byte offset of the opening parenthesis
    pub offset: usize,
}

impl PredicateExpr {
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            PredicateArg::Capture(name) => Some(name.as_str()),
            PredicateArg::Literal(_) => None,
        })
    }
}

/// Query text with predicates blanked out, plus the lifted predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuery {
    pub pattern_text: String,
    pub predicates: Vec<PredicateExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSyntaxError {
    pub offset: usize,
    pub message: String,
}

impl PredicateSyntaxError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Lift every `(#op? ...)` expression out of `text`.
pub fn extract_predicates(text: &str) -> Result<ExtractedQuery, PredicateSyntaxError> {
    let bytes = text.as_bytes();
    let mut blanked = bytes.to_vec();
    let mut predicates = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => pos = parse_string(text, pos)?.1,
            b';' => pos = skip_comment(bytes, pos),
            b'(' => {
                let after = skip_whitespace(bytes, pos + 1);
                if bytes.get(after) == Some(&b'#') {
                    let (expr, end) = parse_predicate(text, pos, after + 1)?;
                    for byte in &mut blanked[pos..end] {
                        if *byte != b'\n' {
                            *byte = b' ';
                        }
                    }
                    predicates.push(expr);
                    pos = end;
                } else {
                    pos += 1;
                }
            }
            _ => pos += 1,
        }
    }

    // Only whole ASCII-delimited ranges were blanked, so this cannot fail.
    let pattern_text = String::from_utf8(blanked)
        .map_err(|e| PredicateSyntaxError::new(e.utf8_error().valid_up_to(), "invalid UTF-8"))?;

    Ok(ExtractedQuery {
        pattern_text,
        predicates,
    })
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

fn skip_comment(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b'\n' {
        pos += 1;
    }
    pos
}

fn skip_trivia(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        pos = skip_whitespace(bytes, pos);
        if bytes.get(pos) == Some(&b';') {
            pos = skip_comment(bytes, pos);
        } else {
            return pos;
        }
    }
}

fn is_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'(' | b')' | b'"' | b';')
}

fn read_word(text: &str, start: usize) -> (&str, usize) {
    let bytes = text.as_bytes();
    let mut end = start;
    while end < bytes.len() && !is_delimiter(bytes[end]) {
        end += 1;
    }
    (text.get(start..end).unwrap_or_default(), end)
}

/// Parse a string literal starting at the opening quote.
///
/// Returns the unescaped contents and the offset just past the closing quote.
fn parse_string(text: &str, open: usize) -> Result<(String, usize), PredicateSyntaxError> {
    let body = text.get(open + 1..).unwrap_or_default();
    let mut value = String::new();
    let mut chars = body.char_indices();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => return Ok((value, open + 1 + idx + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '0')) => value.push('\0'),
                Some((_, other)) => value.push(other),
                None => break,
            },
            other => value.push(other),
        }
    }

    Err(PredicateSyntaxError::new(open, "unterminated string literal"))
}

fn parse_predicate(
    text: &str,
    open: usize,
    name_start: usize,
) -> Result<(PredicateExpr, usize), PredicateSyntaxError> {
    let bytes = text.as_bytes();
    let (operator, mut pos) = read_word(text, name_start);
    if operator.is_empty() {
        return Err(PredicateSyntaxError::new(open, "missing predicate name"));
    }

    let mut args = Vec::new();
    loop {
        pos = skip_trivia(bytes, pos);
        match bytes.get(pos) {
            None => {
                return Err(PredicateSyntaxError::new(
                    open,
                    format!("unterminated predicate #{operator}"),
                ))
            }
            Some(b')') => {
                let expr = PredicateExpr {
                    operator: operator.to_string(),
                    args,
                    offset: open,
                };
                return Ok((expr, pos + 1));
            }
            Some(b'(') => {
                return Err(PredicateSyntaxError::new(
                    pos,
                    format!("unexpected '(' inside predicate #{operator}"),
                ))
            }
            Some(b'"') => {
                let (value, end) = parse_string(text, pos)?;
                args.push(PredicateArg::Literal(value));
                pos = end;
            }
            Some(b'@') => {
                let (name, end) = read_word(text, pos + 1);
                if name.is_empty() {
                    return Err(PredicateSyntaxError::new(pos, "missing capture name after '@'"));
                }
                args.push(PredicateArg::Capture(name.to_string()));
                pos = end;
            }
            Some(_) => {
                let (word, end) = read_word(text, pos);
                args.push(PredicateArg::Literal(word.to_string()));
                pos = end;
            }
        }
    }
}

/// Right-hand side of an equality predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Capture(String),
    Literal(String),
}

/// A predicate ready for evaluation.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq {
        negated: bool,
        left: String,
        right: Operand,
    },
    Match {
        negated: bool,
        capture: String,
        regex: Regex,
    },
    /// Operators this engine does not evaluate; captures pass through.
    Unsupported { operator: String },
}

impl Predicate {
    /// Validate arguments and compile regular expressions.
    pub fn compile(expr: &PredicateExpr) -> Result<Self, (CompileErrorKind, String)> {
        let operator = expr.operator.as_str();
        match operator {
            "eq?" | "not-eq?" => {
                let [left, right] = two_args(expr)?;
                let PredicateArg::Capture(left) = left else {
                    return Err((
                        CompileErrorKind::Predicate,
                        format!("first argument to #{operator} must be a capture"),
                    ));
                };
                let right = match right {
                    PredicateArg::Capture(name) => Operand::Capture(name.clone()),
                    PredicateArg::Literal(value) => Operand::Literal(value.clone()),
                };
                Ok(Predicate::Eq {
                    negated: operator == "not-eq?",
                    left: left.clone(),
                    right,
                })
            }
            "match?" | "not-match?" => {
                let [capture, pattern] = two_args(expr)?;
                let (PredicateArg::Capture(capture), PredicateArg::Literal(pattern)) =
                    (capture, pattern)
                else {
                    return Err((
                        CompileErrorKind::Predicate,
                        format!("#{operator} expects a capture and a string literal"),
                    ));
                };
                let regex = Regex::new(pattern)
                    .map_err(|e| (CompileErrorKind::Regex, format!("invalid regex {pattern:?}: {e}")))?;
                Ok(Predicate::Match {
                    negated: operator == "not-match?",
                    capture: capture.clone(),
                    regex,
                })
            }
            _ => Ok(Predicate::Unsupported {
                operator: operator.to_string(),
            }),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Predicate::Unsupported { .. })
    }

    /// Filter one pattern occurrence's captures.
    ///
    /// An empty result means the occurrence is discarded.
    pub fn filter<'c>(&self, captures: Vec<&'c Capture>) -> Vec<&'c Capture> {
        match self {
            Predicate::Eq {
                negated,
                left,
                right: Operand::Capture(right),
            } => filter_eq_captures(captures, left, right, *negated),
            Predicate::Eq {
                negated,
                left,
                right: Operand::Literal(value),
            } => filter_eq_literal(captures, left, value, *negated),
            Predicate::Match {
                negated,
                capture,
                regex,
            } => filter_match(captures, capture, regex, *negated),
            Predicate::Unsupported { .. } => captures,
        }
    }
}

fn two_args(expr: &PredicateExpr) -> Result<[&PredicateArg; 2], (CompileErrorKind, String)> {
    match expr.args.as_slice() {
        [first, second] => Ok([first, second]),
        args => Err((
            CompileErrorKind::Predicate,
            format!(
                "#{} expects 2 arguments, got {}",
                expr.operator,
                args.len()
            ),
        )),
    }
}

/// Scan until the first capture of each name has been seen, then compare.
/// Captures after that point are dropped; captures up to it are kept or
/// discarded together.
fn filter_eq_captures<'c>(
    captures: Vec<&'c Capture>,
    left: &str,
    right: &str,
    negated: bool,
) -> Vec<&'c Capture> {
    let mut kept = Vec::with_capacity(captures.len());
    let mut left_node: Option<&Capture> = None;
    let mut right_node: Option<&Capture> = None;
    let mut holds = false;

    for capture in captures {
        kept.push(capture);
        if left_node.is_none() && capture.name == left {
            left_node = Some(capture);
        }
        if right_node.is_none() && capture.name == right {
            right_node = Some(capture);
        }
        if let (Some(l), Some(r)) = (left_node, right_node) {
            holds = (l.text == r.text) != negated;
            break;
        }
    }

    if holds {
        kept
    } else {
        Vec::new()
    }
}

/// Keep every capture if at least one capture named `left` satisfies the
/// comparison against `value`.
fn filter_eq_literal<'c>(
    captures: Vec<&'c Capture>,
    left: &str,
    value: &str,
    negated: bool,
) -> Vec<&'c Capture> {
    let holds = captures
        .iter()
        .filter(|capture| capture.name == left)
        .any(|capture| (capture.text == value) != negated);

    if holds {
        captures
    } else {
        Vec::new()
    }
}

/// Drop captures named `name` that fail the regex test. Other captures pass
/// through, unless no `name` capture survives.
fn filter_match<'c>(
    captures: Vec<&'c Capture>,
    name: &str,
    regex: &Regex,
    negated: bool,
) -> Vec<&'c Capture> {
    let mut survived = false;
    let kept: Vec<_> = captures
        .into_iter()
        .filter(|capture| {
            if capture.name != name {
                return true;
            }
            let passes = regex.is_match(&capture.text) != negated;
            survived |= passes;
            passes
        })
        .collect();

    if survived {
        kept
    } else {
        Vec::new()
    }
}

/// Apply a pattern's predicates in order to one raw match.
pub fn apply<'c>(predicates: &[Predicate], captures: &'c [Capture]) -> Vec<&'c Capture> {
    let mut current: Vec<&Capture> = captures.iter().collect();
    for predicate in predicates {
        if current.is_empty() {
            break;
        }
        current = predicate.filter(current);
    }
    current
}
