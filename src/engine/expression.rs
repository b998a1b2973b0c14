//! Condition language.
//!
//! Conditions are written as infix boolean expressions over the bound event,
//! for example:
//!
//! ```text
//! data.provider == "social" && contains(data.text, "launch")
//! ```
//!
//! A condition is parsed into a small syntax tree and lowered into a
//! DataLogic program. Field access `data.text` becomes
//! `{"val": ["data", "text"]}`, operators map onto their DataLogic
//! equivalents, `a =~ b` becomes a call to the `matches` function and a
//! function call `f(x)` becomes `{"fn_f": [x]}`.
//!
//! `==` and `!=` are strict: values of different types are never equal.
//! `!`, `&&` and `||` lower to the `bool_not`, `bool_and` and `bool_or`
//! operators, which reject non-boolean operands instead of falling back to
//! truthiness.
//!
//! Precedence, lowest first:
//!
//! | Level | Operators |
//! |---|---|
//! | 1 | `\|\|` |
//! | 2 | `&&` |
//! | 3 | `==` `!=` `<` `<=` `>` `>=` `=~` `in` |
//! | 4 | `+` `-` |
//! | 5 | `*` `/` `%` |
//! | 6 | prefix `!` `-` |
//!
//! A condition whose text starts with `{` is taken as a DataLogic program
//! as-is.

use serde_json::{Number, Value, json};

use super::functions::{ExpressionRegistry, operator_name};
use crate::constants::{
    CONDITION_BINDING, STRICT_AND_OPERATOR, STRICT_NOT_OPERATOR, STRICT_OR_OPERATOR,
    is_event_field,
};
use crate::errors::EvaluationError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Op(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn datalogic_operator(&self) -> &'static str {
        match self {
            BinaryOp::Or => STRICT_OR_OPERATOR,
            BinaryOp::And => STRICT_AND_OPERATOR,
            BinaryOp::Eq => "===",
            BinaryOp::Ne => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            // Lowered through the function registry
            BinaryOp::Matches => "matches",
        }
    }
}

/// Syntax tree of a parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    /// `data` or `data.<field>`
    Field(Option<String>),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
}

/// Compiles a condition into a DataLogic program.
///
/// Syntax errors, unknown functions and unknown event fields are all
/// reported here, before anything is evaluated.
pub fn compile(condition: &str, registry: &ExpressionRegistry) -> Result<Value, EvaluationError> {
    let trimmed = condition.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| EvaluationError::Parse {
            condition: condition.to_string(),
            details: format!("invalid DataLogic program: {}", e),
        });
    }

    let expr = parse(condition)?;
    lower(&expr, condition, registry)
}

pub(crate) fn parse(condition: &str) -> Result<Expr, EvaluationError> {
    let tokens = tokenize(condition).map_err(|details| EvaluationError::Parse {
        condition: condition.to_string(),
        details,
    })?;

    if tokens.is_empty() {
        return Err(EvaluationError::Parse {
            condition: condition.to_string(),
            details: "condition is empty".to_string(),
        });
    }

    let mut parser = Parser {
        condition,
        tokens,
        position: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected trailing token {:?}", token)));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
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
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '"' | '\'' => {
                let (literal, next) = read_string(&chars, i)?;
                tokens.push(Token::Str(literal));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number {:?} at {}", text, start))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('|', Some('|')) => ("||", 2),
                    ('&', Some('&')) => ("&&", 2),
                    ('=', Some('=')) => ("==", 2),
                    ('=', Some('~')) => ("=~", 2),
                    ('!', Some('=')) => ("!=", 2),
                    ('<', Some('=')) => ("<=", 2),
                    ('>', Some('=')) => (">=", 2),
                    ('<', _) => ("<", 1),
                    ('>', _) => (">", 1),
                    ('!', _) => ("!", 1),
                    ('+', _) => ("+", 1),
                    ('-', _) => ("-", 1),
                    ('*', _) => ("*", 1),
                    ('/', _) => ("/", 1),
                    ('%', _) => ("%", 1),
                    _ => return Err(format!("unexpected character {:?} at {}", c, i)),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
        }
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| format!("unterminated escape at {}", i))?;
                literal.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((literal, i + 1)),
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    Err(format!("unterminated string starting at {}", start))
}

struct Parser<'a> {
    condition: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error(&self, details: String) -> EvaluationError {
        EvaluationError::Parse {
            condition: self.condition.to_string(),
            details,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), EvaluationError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(format!("expected {:?}, found {:?}", expected, token))),
            None => Err(self.error(format!("expected {:?}, found end of input", expected))),
        }
    }

    fn binary_op(&self, levels: &[(&'static str, BinaryOp)]) -> Option<BinaryOp> {
        let token = self.peek()?;
        levels.iter().find_map(|(symbol, op)| match token {
            Token::Op(found) if found == symbol => Some(*op),
            Token::Ident(found) if found == symbol => Some(*op),
            _ => None,
        })
    }

    fn parse_binary_level(
        &mut self,
        levels: &[(&'static str, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, EvaluationError>,
    ) -> Result<Expr, EvaluationError> {
        let mut lhs = operand(self)?;
        while let Some(op) = self.binary_op(levels) {
            self.position += 1;
            let rhs = operand(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, EvaluationError> {
        self.parse_binary_level(&[("||", BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, EvaluationError> {
        self.parse_binary_level(&[("&&", BinaryOp::And)], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvaluationError> {
        self.parse_binary_level(
            &[
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
                ("=~", BinaryOp::Matches),
                ("in", BinaryOp::In),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, EvaluationError> {
        self.parse_binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvaluationError> {
        self.parse_binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, EvaluationError> {
        let op = match self.peek() {
            Some(Token::Op("!")) => UnaryOp::Not,
            Some(Token::Op("-")) => UnaryOp::Neg,
            _ => return self.parse_primary(),
        };
        self.position += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, EvaluationError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.parse_list(Token::RBracket)?;
                Ok(Expr::Array(items))
            }
            Some(Token::Ident(ident)) => self.parse_identifier(ident),
            Some(token) => Err(self.error(format!("unexpected token {:?}", token))),
            None => Err(self.error("unexpected end of input".to_string())),
        }
    }

    fn parse_identifier(&mut self, ident: String) -> Result<Expr, EvaluationError> {
        match ident.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }

        if ident == CONDITION_BINDING {
            if self.peek() != Some(&Token::Dot) {
                return Ok(Expr::Field(None));
            }
            self.position += 1;
            return match self.next() {
                Some(Token::Ident(field)) => {
                    if self.peek() == Some(&Token::Dot) {
                        return Err(self.error(format!(
                            "field {} has no nested fields",
                            field
                        )));
                    }
                    Ok(Expr::Field(Some(field)))
                }
                _ => Err(self.error(format!(
                    "expected a field name after {}.",
                    CONDITION_BINDING
                ))),
            };
        }

        if self.peek() == Some(&Token::LParen) {
            self.position += 1;
            let args = self.parse_list(Token::RParen)?;
            return Ok(Expr::Call {
                function: ident,
                args,
            });
        }

        Ok(Expr::Identifier(ident))
    }

    fn parse_list(&mut self, close: Token) -> Result<Vec<Expr>, EvaluationError> {
        let mut items = Vec::new();
        if self.peek() == Some(&close) {
            self.position += 1;
            return Ok(items);
        }

        loop {
            items.push(self.parse_or()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(token) if token == close => return Ok(items),
                Some(token) => {
                    return Err(self.error(format!(
                        "expected ',' or {:?}, found {:?}",
                        close, token
                    )));
                }
                None => return Err(self.error(format!("expected {:?}, found end of input", close))),
            }
        }
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn lower(
    expr: &Expr,
    condition: &str,
    registry: &ExpressionRegistry,
) -> Result<Value, EvaluationError> {
    let lower_all = |items: &[Expr]| -> Result<Vec<Value>, EvaluationError> {
        items
            .iter()
            .map(|item| lower(item, condition, registry))
            .collect()
    };

    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Array(items) => Ok(Value::Array(lower_all(items)?)),
        Expr::Field(None) => Ok(json!({"val": [CONDITION_BINDING]})),
        Expr::Field(Some(field)) => {
            if !is_event_field(field) {
                return Err(EvaluationError::UnknownField {
                    condition: condition.to_string(),
                    field: format!("{}.{}", CONDITION_BINDING, field),
                });
            }
            Ok(json!({"val": [CONDITION_BINDING, field]}))
        }
        Expr::Identifier(name) => Err(EvaluationError::UnknownField {
            condition: condition.to_string(),
            field: name.clone(),
        }),
        Expr::Unary { op, operand } => {
            let operand = lower(operand, condition, registry)?;
            Ok(match op {
                UnaryOp::Not => json!({ STRICT_NOT_OPERATOR: [operand] }),
                UnaryOp::Neg => json!({"-": [operand]}),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = lower(lhs, condition, registry)?;
            let rhs = lower(rhs, condition, registry)?;
            if *op == BinaryOp::Matches {
                return lower_call(op.datalogic_operator(), vec![lhs, rhs], condition, registry);
            }
            let mut program = serde_json::Map::new();
            program.insert(
                op.datalogic_operator().to_string(),
                Value::Array(vec![lhs, rhs]),
            );
            Ok(Value::Object(program))
        }
        Expr::Call { function, args } => {
            let args = lower_all(args)?;
            lower_call(function, args, condition, registry)
        }
    }
}

fn lower_call(
    function: &str,
    args: Vec<Value>,
    condition: &str,
    registry: &ExpressionRegistry,
) -> Result<Value, EvaluationError> {
    if !registry.contains(function) {
        return Err(EvaluationError::UnknownFunction {
            condition: condition.to_string(),
            function: function.to_string(),
        });
    }
    let mut program = serde_json::Map::new();
    program.insert(operator_name(function), Value::Array(args));
    Ok(Value::Object(program))
}
