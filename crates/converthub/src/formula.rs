//! Conversion formula parsing and evaluation.
//!
//! Formulas are small arithmetic expressions over a single input
//! variable, written by catalog administrators:
//!
//! ```text
//! F = C × 9/5 + 32
//! ```
//!
//! The grammar is deliberately closed: `+ - × ÷` (the Unicode minus
//! `−` and ASCII `*` `/` are accepted too), parentheses, unary minus,
//! decimal literals and at most one free variable. The optional text
//! left of a top-level `=` names the output and is otherwise ignored.
//! There are no function calls and no environment lookups, so a
//! formula can never reach outside its input value.
//!
//! Evaluation runs on [`Decimal`] at full precision; only the final
//! result is rounded, to [`RESULT_SCALE`] fractional digits with
//! round-half-to-even.

use std::fmt;

use rust_decimal::Decimal;

/// Fractional digits carried by conversion results.
///
/// Matches the storage precision of conversion records (20 significant
/// digits, 10 fractional).
pub const RESULT_SCALE: u32 = 10;

/// Errors from parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    /// The formula text is not a valid expression.
    #[error("formula syntax error: {0}")]
    Syntax(String),

    /// A divisor evaluated to zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An intermediate value left the representable decimal range.
    #[error("arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(Decimal),
    Variable(String),
    Neg(Box<Node>),
    Binary(Box<Node>, BinOp, Box<Node>),
}

/// A parsed, validated conversion formula.
///
/// Parsing is the activation gate for catalog types: a formula that
/// does not parse never becomes an active [`crate::ConversionType`].
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    output: Option<String>,
    variable: Option<String>,
    root: Node,
}

impl Formula {
    /// Parse a formula, rejecting unbalanced parentheses, unknown
    /// tokens and more than one distinct free variable.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(FormulaError::Syntax("empty formula".into()));
        }
        check_balance(trimmed)?;

        let (output, expr) = match trimmed.split_once('=') {
            Some((lhs, rhs)) => {
                let lhs = lhs.trim();
                if lhs.is_empty() {
                    return Err(FormulaError::Syntax("missing output name before `=`".into()));
                }
                (Some(lhs.to_string()), rhs)
            }
            None => (None, trimmed),
        };

        let root = parse_additive(expr)?;

        let mut vars = Vec::new();
        collect_vars(&root, &mut vars);
        if vars.len() > 1 {
            return Err(FormulaError::Syntax(format!(
                "more than one free variable: {}",
                vars.join(", ")
            )));
        }

        Ok(Formula {
            source: trimmed.to_string(),
            output,
            variable: vars.into_iter().next(),
            root,
        })
    }

    /// The formula text as written (trimmed).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The output name left of `=`, if the assignment form was used.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// The free variable, or `None` for a constant formula.
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// Evaluate with `input` bound to the free variable.
    ///
    /// Same formula, same input, same `Decimal` out, every time.
    pub fn eval(&self, input: Decimal) -> Result<Decimal, FormulaError> {
        let raw = eval_node(&self.root, input)?;
        let mut rounded = raw.round_dp(RESULT_SCALE);
        rounded.rescale(RESULT_SCALE);
        Ok(rounded)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and evaluate in one step, checking that the formula's free
/// variable (if any) is exactly `variable`.
pub fn evaluate(formula: &str, variable: &str, input: Decimal) -> Result<Decimal, FormulaError> {
    let parsed = Formula::parse(formula)?;
    if let Some(found) = parsed.variable() {
        if found != variable {
            return Err(FormulaError::Syntax(format!(
                "unknown variable `{found}` (input variable is `{variable}`)"
            )));
        }
    }
    parsed.eval(input)
}

fn check_balance(src: &str) -> Result<(), FormulaError> {
    let mut depth = 0i32;
    for c in src.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(FormulaError::Syntax("unbalanced parentheses".into()));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FormulaError::Syntax("unbalanced parentheses".into()));
    }
    Ok(())
}

/// True when the character before `idx` ends an operand, which makes a
/// `+` or `-` at `idx` a binary operator rather than a sign.
fn follows_operand(chars: &[(usize, char)], idx: usize) -> bool {
    chars[..idx]
        .iter()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
        .is_some_and(|(_, c)| c.is_alphanumeric() || *c == ')' || *c == '.' || *c == '_')
}

// Operators are found by scanning right to left at parenthesis depth
// zero: the rightmost operator of a tier is the root of a
// left-associative parse. Byte positions come from char_indices, so
// the multi-byte × and ÷ slice cleanly.

fn parse_additive(input: &str) -> Result<Node, FormulaError> {
    let input = input.trim();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut depth = 0i32;
    for i in (0..chars.len()).rev() {
        let (pos, c) = chars[i];
        match c {
            ')' => depth += 1,
            '(' => depth -= 1,
            '+' | '-' | '−' if depth == 0 && follows_operand(&chars, i) => {
                let left = &input[..pos];
                let right = &input[pos + c.len_utf8()..];
                if left.trim().is_empty() || right.trim().is_empty() {
                    return Err(FormulaError::Syntax(format!("missing operand for `{c}`")));
                }
                let op = if c == '+' { BinOp::Add } else { BinOp::Sub };
                return Ok(Node::Binary(
                    Box::new(parse_additive(left)?),
                    op,
                    Box::new(parse_multiplicative(right)?),
                ));
            }
            _ => {}
        }
    }
    parse_multiplicative(input)
}

fn parse_multiplicative(input: &str) -> Result<Node, FormulaError> {
    let input = input.trim();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut depth = 0i32;
    for i in (0..chars.len()).rev() {
        let (pos, c) = chars[i];
        match c {
            ')' => depth += 1,
            '(' => depth -= 1,
            '*' | '/' | '×' | '÷' if depth == 0 => {
                let left = &input[..pos];
                let right = &input[pos + c.len_utf8()..];
                if left.trim().is_empty() || right.trim().is_empty() {
                    return Err(FormulaError::Syntax(format!("missing operand for `{c}`")));
                }
                let op = if c == '*' || c == '×' {
                    BinOp::Mul
                } else {
                    BinOp::Div
                };
                return Ok(Node::Binary(
                    Box::new(parse_multiplicative(left)?),
                    op,
                    Box::new(parse_primary(right)?),
                ));
            }
            _ => {}
        }
    }
    parse_primary(input)
}

fn parse_primary(input: &str) -> Result<Node, FormulaError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(FormulaError::Syntax("empty expression".into()));
    }

    if let Some(rest) = input.strip_prefix(['-', '−']) {
        return Ok(Node::Neg(Box::new(parse_primary(rest)?)));
    }

    if input.starts_with('(') && input.ends_with(')') {
        return parse_additive(&input[1..input.len() - 1]);
    }

    if input.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return input
            .parse::<Decimal>()
            .map(Node::Number)
            .map_err(|_| FormulaError::Syntax(format!("malformed number literal `{input}`")));
    }

    if input.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && input.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return Ok(Node::Variable(input.to_string()));
    }

    Err(FormulaError::Syntax(format!("unexpected token `{input}`")))
}

fn collect_vars(node: &Node, vars: &mut Vec<String>) {
    match node {
        Node::Number(_) => {}
        Node::Variable(name) => {
            if !vars.iter().any(|v| v == name) {
                vars.push(name.clone());
            }
        }
        Node::Neg(inner) => collect_vars(inner, vars),
        Node::Binary(lhs, _, rhs) => {
            collect_vars(lhs, vars);
            collect_vars(rhs, vars);
        }
    }
}

fn eval_node(node: &Node, input: Decimal) -> Result<Decimal, FormulaError> {
    match node {
        Node::Number(n) => Ok(*n),
        // At most one distinct variable survives parsing, so every
        // variable node binds to the input.
        Node::Variable(_) => Ok(input),
        Node::Neg(inner) => Ok(-eval_node(inner, input)?),
        Node::Binary(lhs, op, rhs) => {
            let left = eval_node(lhs, input)?;
            let right = eval_node(rhs, input)?;
            apply(left, *op, right)
        }
    }
}

fn apply(left: Decimal, op: BinOp, right: Decimal) -> Result<Decimal, FormulaError> {
    match op {
        BinOp::Add => left.checked_add(right).ok_or(FormulaError::Overflow),
        BinOp::Sub => left.checked_sub(right).ok_or(FormulaError::Overflow),
        BinOp::Mul => left.checked_mul(right).ok_or(FormulaError::Overflow),
        BinOp::Div => {
            if right.is_zero() {
                return Err(FormulaError::DivisionByZero);
            }
            left.checked_div(right).ok_or(FormulaError::Overflow)
        }
    }
}
