//! Period description templates: `YYYY` is replaced by a year, then every
//! bracketed expression (`[YYYY-1]`) is evaluated as arithmetic.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::CdmError;

/// Literal placeholder substituted with the year.
pub const YEAR_TOKEN: &str = "YYYY";

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]").unwrap());

/// Substitute `year` and evaluate bracketed arithmetic.
pub fn render(template: &str, year: &str) -> Result<String, CdmError> {
    let text = template.replace(YEAR_TOKEN, year);
    let mut failure = None;
    let out = BRACKETED.replace_all(&text, |caps: &Captures<'_>| match evaluate(&caps[1]) {
        Ok(v) => format_number(v),
        Err(e) => {
            failure.get_or_insert(e);
            String::new()
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}

/// Whole numbers print without a fractional part.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

// ---------------------------------------------------------------------------
// Expression evaluation: + - * / with parentheses and unary minus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, CdmError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
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
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let lexeme: String = chars[start..i].iter().collect();
                let n = lexeme
                    .parse::<f64>()
                    .map_err(|_| CdmError::Template(format!("bad number '{lexeme}' in '{expr}'")))?;
                tokens.push(Token::Num(n));
            }
            other => {
                return Err(CdmError::Template(format!("unexpected '{other}' in '{expr}'")));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    expr: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn error(&self, msg: &str) -> CdmError {
        CdmError::Template(format!("{msg} in '{}'", self.expr))
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CdmError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, CdmError> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == '/' && rhs == 0.0 {
                return Err(self.error("division by zero"));
            }
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, CdmError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, CdmError> {
        match self.peek() {
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.expr()?;
                if self.peek() != Some(Token::RParen) {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error("expected a number")),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, CdmError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        expr,
    };
    let value = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_year_and_evaluates_brackets() {
        assert_eq!(render("GDP in [YYYY-1]", "2019").unwrap(), "GDP in 2018");
        assert_eq!(render("YYYY", "2020").unwrap(), "2020");
        assert_eq!(render("[YYYY-1] to YYYY", "2020").unwrap(), "2019 to 2020");
        assert_eq!(render("Q1 [ (YYYY + 1) * 2 ]", "2000").unwrap(), "Q1 4002");
    }

    #[test]
    fn text_without_template_is_unchanged() {
        assert_eq!(render("Annual total", "2019").unwrap(), "Annual total");
    }

    #[test]
    fn fractional_results_keep_decimals() {
        assert_eq!(render("[YYYY/2]", "2019").unwrap(), "1009.5");
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
    }

    #[test]
    fn malformed_expressions_fail() {
        assert!(matches!(render("[YYYY-]", "2019"), Err(CdmError::Template(_))));
        assert!(matches!(render("[abc]", "2019"), Err(CdmError::Template(_))));
        assert!(evaluate("(1+2").is_err());
        assert!(evaluate("1/0").is_err());
        assert!(evaluate("1 2").is_err());
    }
}
