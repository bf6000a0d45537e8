// Sandboxed arithmetic over numeric literals and + - * / % ** ( )

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArithError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Plus,
    Minus,
    Star,
    Pow,
    Slash,
    Percent,
    LParen,
    RParen,
}

/// Whether `text` only contains characters the arithmetic evaluator accepts.
pub fn is_arithmetic(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| {
            c.is_ascii_digit() || c.is_whitespace() || "+-*/().%".contains(c)
        })
}

/// Evaluate an arithmetic expression with the usual precedence:
/// `**` (right-associative) over unary sign over `* / %` over `+ -`.
pub fn evaluate_arithmetic(text: &str) -> Result<f64, ArithError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ArithError::UnexpectedToken(parser.pos));
    }
    Ok(value)
}

fn tokenize(text: &str) -> Result<Vec<Tok>, ArithError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| ArithError::InvalidNumber(literal.clone()))?;
                tokens.push(Tok::Num(n));
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Tok::Pow);
                } else {
                    tokens.push(Tok::Star);
                }
            }
            _ => {
                let tok = match c {
                    '+' => Tok::Plus,
                    '-' => Tok::Minus,
                    '/' => Tok::Slash,
                    '%' => Tok::Percent,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    other => return Err(ArithError::UnexpectedChar(other)),
                };
                chars.next();
                tokens.push(tok);
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Tok> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expr(&mut self) -> Result<f64, ArithError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.pos += 1;
                    acc += self.term()?;
                }
                Some(Tok::Minus) => {
                    self.pos += 1;
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ArithError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.pos += 1;
                    acc *= self.unary()?;
                }
                Some(Tok::Slash) => {
                    self.pos += 1;
                    acc /= self.unary()?;
                }
                Some(Tok::Percent) => {
                    self.pos += 1;
                    acc %= self.unary()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ArithError> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Tok::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, ArithError> {
        let base = self.primary()?;
        if self.peek() == Some(Tok::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, ArithError> {
        let at = self.pos;
        match self.next() {
            Some(Tok::Num(n)) => Ok(n),
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    Some(_) => Err(ArithError::UnexpectedToken(self.pos - 1)),
                    None => Err(ArithError::UnexpectedEnd),
                }
            }
            Some(_) => Err(ArithError::UnexpectedToken(at)),
            None => Err(ArithError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate_arithmetic("3 * 4"), Ok(12.0));
        assert_eq!(evaluate_arithmetic("2 + 3 * 4"), Ok(14.0));
        assert_eq!(evaluate_arithmetic("(2 + 3) * 4"), Ok(20.0));
        assert_eq!(evaluate_arithmetic("10 - 4 - 3"), Ok(3.0));
        assert_eq!(evaluate_arithmetic("2 ** 3 ** 2"), Ok(512.0));
        assert_eq!(evaluate_arithmetic("7 % 4"), Ok(3.0));
        assert_eq!(evaluate_arithmetic("1 / 4"), Ok(0.25));
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(evaluate_arithmetic("5 - -3"), Ok(8.0));
        assert_eq!(evaluate_arithmetic("-(2 + 1)"), Ok(-3.0));
        assert_eq!(evaluate_arithmetic("+.5"), Ok(0.5));
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        assert_eq!(evaluate_arithmetic("1 / 0"), Ok(f64::INFINITY));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(evaluate_arithmetic("1.2.3"), Err(ArithError::InvalidNumber("1.2.3".into())));
        assert_eq!(evaluate_arithmetic("(1 + 2"), Err(ArithError::UnexpectedEnd));
        assert_eq!(evaluate_arithmetic("1 2"), Err(ArithError::UnexpectedToken(1)));
        assert_eq!(evaluate_arithmetic("()"), Err(ArithError::UnexpectedToken(1)));
        assert_eq!(evaluate_arithmetic("2 *"), Err(ArithError::UnexpectedEnd));
        assert_eq!(evaluate_arithmetic("a"), Err(ArithError::UnexpectedChar('a')));
    }

    #[test]
    fn test_character_whitelist() {
        assert!(is_arithmetic("(1 + 2) % 3"));
        assert!(!is_arithmetic("1 + x"));
        assert!(!is_arithmetic(""));
    }
}
