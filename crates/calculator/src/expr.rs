//! Restricted numeric expression evaluator.
//!
//! Replaces free-form `eval` of user arithmetic with a recursive-descent
//! parser over a whitelisted token set: numbers, `+ - * /`, parentheses,
//! and postfix `%` (divide by 100). Anything else is rejected up front.
//! Division by zero is detected at the division site, before the result
//! can turn into infinity.

use crate::CalcError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Percent,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '0'..='9' | '.' => {
                let mut number = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == ',' {
                        if d != ',' {
                            number.push(d);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = number.parse().map_err(|_| {
                    CalcError::InvalidExpression(format!("bad number '{}'", number))
                })?;
                tokens.push(Token::Num(value));
            }
            other => {
                return Err(CalcError::InvalidExpression(format!(
                    "character '{}' is not allowed",
                    other
                )));
            }
        }
    }

    if tokens.is_empty() {
        return Err(CalcError::InvalidExpression("empty expression".to_string()));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // factor := ('-' | '+')* primary ('%')*
    fn factor(&mut self) -> Result<f64, CalcError> {
        let mut negate = false;
        while let Some(op) = self.peek() {
            match op {
                Token::Minus => {
                    self.advance();
                    negate = !negate;
                }
                Token::Plus => {
                    self.advance();
                }
                _ => break,
            }
        }

        let mut value = self.primary()?;
        while self.peek() == Some(Token::Percent) {
            self.advance();
            value /= 100.0;
        }

        Ok(if negate { -value } else { value })
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.advance() {
            Some(Token::Num(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(CalcError::InvalidExpression(
                        "unbalanced parenthesis".to_string(),
                    )),
                }
            }
            other => Err(CalcError::InvalidExpression(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }
}

/// Evaluate a whitelisted arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;

    if parser.pos != parser.tokens.len() {
        return Err(CalcError::InvalidExpression(
            "trailing tokens after expression".to_string(),
        ));
    }
    if !value.is_finite() {
        return Err(CalcError::InvalidResult);
    }
    Ok(value)
}
