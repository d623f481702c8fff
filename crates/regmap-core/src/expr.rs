//! Restricted arithmetic expression resolution.
//!
//! Expressions combine decimal literals, radix-tagged literals
//! (`width'radix-digits`, radix one of `h`/`d`/`b`/`o`), and parameter
//! names with `+ - * / // % **` and parentheses. Resolution is two-phase:
//! an expression whose identifiers are not all known yet is *unresolved*
//! (callers retry on a later fixed-point pass), while an expression that
//! fails to evaluate after full substitution is a hard error.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::params::ParameterTable;

/// Errors from expression rewriting or evaluation.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("malformed radix literal '{literal}'")]
    BadLiteral { literal: String },

    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' in expression '{expr}'")]
    UnexpectedChar { ch: char, expr: String },

    #[error("expression '{expr}' ends unexpectedly")]
    UnexpectedEnd { expr: String },

    #[error("unexpected token in expression '{expr}'")]
    UnexpectedToken { expr: String },

    #[error("division by zero in expression '{expr}'")]
    DivisionByZero { expr: String },

    #[error("'{expr}' does not divide evenly (use // for floor division)")]
    InexactDivision { expr: String },

    #[error("negative exponent in expression '{expr}'")]
    NegativeExponent { expr: String },

    #[error("arithmetic overflow in expression '{expr}'")]
    Overflow { expr: String },
}

/// Result of attempting to resolve an expression against a parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The expression evaluated to an integer.
    Value(i64),
    /// Identifier-shaped tokens remain after substitution; retry later.
    Unresolved,
}

impl Resolution {
    pub fn value(&self) -> Option<i64> {
        match self {
            Resolution::Value(v) => Some(*v),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved)
    }
}

static RADIX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d*'[hdboHDBO][0-9a-fA-F_]+").expect("radix literal pattern"));

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_]\w*").expect("identifier pattern"));

/// Rewrite every radix-tagged literal in `expr` to plain decimal text.
/// The width prefix is accepted and ignored; `_` digit separators are
/// stripped.
pub fn rewrite_radix_literals(expr: &str) -> Result<String, ExprError> {
    let mut out = String::with_capacity(expr.len());
    let mut last = 0;
    for found in RADIX_LITERAL.find_iter(expr) {
        out.push_str(&expr[last..found.start()]);
        out.push_str(&radix_to_decimal(found.as_str())?);
        last = found.end();
    }
    out.push_str(&expr[last..]);
    Ok(out)
}

fn radix_to_decimal(literal: &str) -> Result<String, ExprError> {
    let bad = || ExprError::BadLiteral {
        literal: literal.to_string(),
    };
    let (_width, tagged) = literal.split_once('\'').ok_or_else(bad)?;
    let mut chars = tagged.chars();
    let radix = match chars.next().ok_or_else(bad)? {
        'h' | 'H' => 16,
        'd' | 'D' => 10,
        'b' | 'B' => 2,
        'o' | 'O' => 8,
        _ => return Err(bad()),
    };
    let digits: String = chars.filter(|c| *c != '_').collect();
    if digits.is_empty() {
        return Err(bad());
    }
    let value = i64::from_str_radix(&digits, radix).map_err(|_| bad())?;
    Ok(value.to_string())
}

/// Substitute every known parameter name in `expr` with its value, longest
/// names first so that no name is clobbered by a shorter prefix of itself.
/// Matches whole tokens only.
pub fn substitute_parameters(expr: &str, params: &ParameterTable) -> String {
    let mut result = expr.to_string();
    for name in params.names_longest_first() {
        let value = match params.get(&name) {
            Some(v) => v.to_string(),
            None => continue,
        };
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&name)))
            .expect("escaped parameter name pattern");
        result = pattern.replace_all(&result, value.as_str()).into_owned();
    }
    result
}

/// Resolve `expr` against `params`.
///
/// Radix literals are rewritten first, then known names are substituted.
/// If any identifier-shaped token remains the expression is
/// [`Resolution::Unresolved`]; otherwise the remaining arithmetic text is
/// evaluated and a failure to evaluate is a hard error.
pub fn resolve_expression(expr: &str, params: &ParameterTable) -> Result<Resolution, ExprError> {
    let rewritten = rewrite_radix_literals(expr.trim())?;
    let substituted = substitute_parameters(&rewritten, params);
    if IDENTIFIER.is_match(&substituted) {
        return Ok(Resolution::Unresolved);
    }
    evaluate(&substituted).map(Resolution::Value)
}

/// Evaluate arithmetic text containing no identifiers.
pub fn evaluate(expr: &str) -> Result<i64, ExprError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = ExprParser {
        expr,
        tokens,
        pos: 0,
    };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::UnexpectedToken {
            expr: expr.to_string(),
        });
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Num(i64),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits.parse::<i64>().map_err(|_| ExprError::Overflow {
                    expr: expr.to_string(),
                })?;
                tokens.push(Token::Num(value));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::DoubleStar);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Token::DoubleSlash);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ => {
                return Err(ExprError::UnexpectedChar {
                    ch: c,
                    expr: expr.to_string(),
                })
            }
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn overflow(&self) -> ExprError {
        ExprError::Overflow {
            expr: self.expr.to_string(),
        }
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<i64, ExprError> {
        let mut value = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    value = value.checked_add(rhs).ok_or_else(|| self.overflow())?;
                }
                Token::Minus => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    value = value.checked_sub(rhs).ok_or_else(|| self.overflow())?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<i64, ExprError> {
        let mut value = self.parse_unary()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    value = value.checked_mul(rhs).ok_or_else(|| self.overflow())?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    value = self.divide_exact(value, rhs)?;
                }
                Token::DoubleSlash => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    value = self.floor_div(value, rhs)?;
                }
                Token::Percent => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    let q = self.floor_div(value, rhs)?;
                    let prod = q.checked_mul(rhs).ok_or_else(|| self.overflow())?;
                    value = value.checked_sub(prod).ok_or_else(|| self.overflow())?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // unary := ('+' | '-')* power
    fn parse_unary(&mut self) -> Result<i64, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let value = self.parse_unary()?;
                value.checked_neg().ok_or_else(|| self.overflow())
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power := atom ('**' unary)?   (right-associative, binds tighter than
    // unary minus on its left: -2**2 is -(2**2))
    fn parse_power(&mut self) -> Result<i64, ExprError> {
        let base = self.parse_atom()?;
        if self.peek() == Some(Token::DoubleStar) {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            if exponent < 0 {
                return Err(ExprError::NegativeExponent {
                    expr: self.expr.to_string(),
                });
            }
            let exponent = u32::try_from(exponent).map_err(|_| self.overflow())?;
            return base.checked_pow(exponent).ok_or_else(|| self.overflow());
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<i64, ExprError> {
        match self.bump() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.parse_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(ExprError::UnexpectedToken {
                        expr: self.expr.to_string(),
                    }),
                    None => Err(ExprError::UnexpectedEnd {
                        expr: self.expr.to_string(),
                    }),
                }
            }
            Some(_) => Err(ExprError::UnexpectedToken {
                expr: self.expr.to_string(),
            }),
            None => Err(ExprError::UnexpectedEnd {
                expr: self.expr.to_string(),
            }),
        }
    }

    fn divide_exact(&self, lhs: i64, rhs: i64) -> Result<i64, ExprError> {
        if rhs == 0 {
            return Err(ExprError::DivisionByZero {
                expr: self.expr.to_string(),
            });
        }
        let rem = lhs.checked_rem(rhs).ok_or_else(|| self.overflow())?;
        if rem != 0 {
            return Err(ExprError::InexactDivision {
                expr: self.expr.to_string(),
            });
        }
        lhs.checked_div(rhs).ok_or_else(|| self.overflow())
    }

    fn floor_div(&self, lhs: i64, rhs: i64) -> Result<i64, ExprError> {
        if rhs == 0 {
            return Err(ExprError::DivisionByZero {
                expr: self.expr.to_string(),
            });
        }
        let q = lhs.checked_div(rhs).ok_or_else(|| self.overflow())?;
        let rem = lhs.checked_rem(rhs).ok_or_else(|| self.overflow())?;
        if rem != 0 && (lhs < 0) != (rhs < 0) {
            Ok(q - 1)
        } else {
            Ok(q)
        }
    }
}
