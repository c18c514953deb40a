//! Closed arithmetic evaluator backing the `python_calculator` tool.
//!
//! A recursive-descent parser over `f64` with a fixed function and constant
//! table. There is no code-execution path: identifiers resolve only against
//! the closed tables, and a blocklist rejects anything that smells like an
//! escape attempt before parsing begins. The 5-second wall-clock cap is
//! enforced by the executor's per-tool timeout.

use crate::error::ToolError;

/// Maximum accepted expression length in bytes.
pub const MAX_EXPRESSION_LEN: usize = 500;

/// Identifiers that are rejected outright.
const BLOCKLIST: [&str; 6] = ["import", "exec", "eval", "open", "__", "file"];

fn err(message: impl Into<String>) -> ToolError {
    ToolError::Execution {
        name: "python_calculator".to_string(),
        message: message.into(),
    }
}

/// Evaluates an arithmetic expression.
///
/// Supports `+ - * / %`, `^` and `**` for powers, unary minus, parentheses,
/// the constants `pi` and `e`, and the functions `sqrt`, `sin`, `cos`,
/// `tan`, `asin`, `acos`, `atan`, `abs`, `ln`, `log`, `exp`, `round`,
/// `floor`, `ceil`, plus two-argument `pow`, `min`, and `max`. A leading
/// `math.` prefix on function and constant names is accepted.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] for blocklisted identifiers, oversized
/// input, syntax errors, unknown identifiers, or a non-finite result.
pub fn evaluate(expression: &str) -> Result<f64, ToolError> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(err(format!(
            "expression too long ({} bytes, max {MAX_EXPRESSION_LEN})",
            expression.len()
        )));
    }
    let lowered = expression.to_lowercase();
    for banned in BLOCKLIST {
        if lowered.contains(banned) {
            return Err(err(format!("illegal identifier '{banned}' in expression")));
        }
    }

    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    if parser.pos != parser.tokens.len() {
        return Err(err(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    if !value.is_finite() {
        return Err(err("result is not a finite number"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                // `**` is the power operator.
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Caret);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
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
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Scientific notation: 1.5e-3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| err(format!("invalid number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                // Accept the `math.` prefix the source examples use.
                let name = text.strip_prefix("math.").unwrap_or(&text);
                tokens.push(Token::Ident(name.to_lowercase()));
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token, context: &str) -> Result<(), ToolError> {
        match self.advance() {
            Some(ref t) if t == token => Ok(()),
            other => Err(err(format!("expected {token:?} {context}, got {other:?}"))),
        }
    }

    /// expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// term := factor (('*' | '/' | '%') factor)*
    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(err("division by zero"));
                    }
                    value /= divisor;
                }
                Token::Percent => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(err("division by zero"));
                    }
                    value %= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// factor := unary ('^' factor)?   (right-associative power)
    fn factor(&mut self) -> Result<f64, ToolError> {
        let base = self.unary()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.factor()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    /// unary := '-' unary | primary
    fn unary(&mut self) -> Result<f64, ToolError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        if self.peek() == Some(&Token::Plus) {
            self.pos += 1;
            return self.unary();
        }
        self.primary()
    }

    /// primary := number | constant | function '(' args ')' | '(' expression ')'
    fn primary(&mut self) -> Result<f64, ToolError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(&Token::RParen, "to close group")?;
                Ok(value)
            }
            Some(Token::Ident(name)) => self.ident(&name),
            other => Err(err(format!("unexpected token {other:?}"))),
        }
    }

    fn ident(&mut self, name: &str) -> Result<f64, ToolError> {
        // Constants.
        match name {
            "pi" => return Ok(std::f64::consts::PI),
            "e" => return Ok(std::f64::consts::E),
            _ => {}
        }

        self.expect(&Token::LParen, &format!("after function '{name}'"))?;
        let first = self.expression()?;
        let second = if self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&Token::RParen, &format!("to close '{name}' arguments"))?;

        if let Some(second) = second {
            return match name {
                "pow" => Ok(first.powf(second)),
                "min" => Ok(first.min(second)),
                "max" => Ok(first.max(second)),
                _ => Err(err(format!("function '{name}' takes one argument"))),
            };
        }

        match name {
            "sqrt" => {
                if first < 0.0 {
                    Err(err("square root of a negative number"))
                } else {
                    Ok(first.sqrt())
                }
            }
            "sin" => Ok(first.sin()),
            "cos" => Ok(first.cos()),
            "tan" => Ok(first.tan()),
            "asin" => Ok(first.asin()),
            "acos" => Ok(first.acos()),
            "atan" => Ok(first.atan()),
            "abs" => Ok(first.abs()),
            "ln" => Ok(first.ln()),
            "log" => Ok(first.log10()),
            "exp" => Ok(first.exp()),
            "round" => Ok(first.round()),
            "floor" => Ok(first.floor()),
            "ceil" => Ok(first.ceil()),
            "pow" | "min" | "max" => Err(err(format!("function '{name}' takes two arguments"))),
            other => Err(err(format!("unknown identifier '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> f64 {
        evaluate(expr).unwrap_or_else(|e| panic!("eval failed for {expr}: {e}"))
    }

    #[test]
    fn test_basic_arithmetic() {
        assert!((eval("2 + 3 * 4") - 14.0).abs() < 1e-12);
        assert!((eval("(2 + 3) * 4") - 20.0).abs() < 1e-12);
        assert!((eval("10 / 4") - 2.5).abs() < 1e-12);
        assert!((eval("7 % 3") - 1.0).abs() < 1e-12);
        assert!((eval("-3 + 5") - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_powers_right_associative() {
        assert!((eval("2 ^ 3") - 8.0).abs() < 1e-12);
        assert!((eval("2 ** 10") - 1024.0).abs() < 1e-12);
        assert!((eval("2 ^ 3 ^ 2") - 512.0).abs() < 1e-12);
    }

    #[test]
    fn test_wingspan_example() {
        // b = sqrt(A * S) for the F-4: sqrt(2.8 * 530)
        let b = eval("sqrt(530 * 2.8)");
        assert!((b - 38.5227).abs() < 1e-3);
        // Root chord: 2S / (b * (1 + lambda))
        let croot = eval("(2 * 530) / (38.5227 * (1 + 0.3))");
        assert!((croot - 21.169).abs() < 1e-2);
    }

    #[test]
    fn test_math_prefix_accepted() {
        assert!((eval("math.sqrt(16)") - 4.0).abs() < 1e-12);
        assert!((eval("math.pi") - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_functions_and_constants() {
        assert!((eval("sin(0)") - 0.0).abs() < 1e-12);
        assert!((eval("cos(0)") - 1.0).abs() < 1e-12);
        assert!((eval("log(1000)") - 3.0).abs() < 1e-9);
        assert!((eval("ln(e)") - 1.0).abs() < 1e-9);
        assert!((eval("pow(2, 8)") - 256.0).abs() < 1e-12);
        assert!((eval("max(3, 7)") - 7.0).abs() < 1e-12);
        assert!((eval("round(2.6)") - 3.0).abs() < 1e-12);
        assert!((eval("1.5e2") - 150.0).abs() < 1e-12);
    }

    #[test]
    fn test_blocklist_rejects_escape_attempts() {
        let err = evaluate("__import__('os').system('ls')").unwrap_err();
        assert!(err.to_string().contains("illegal"), "got: {err}");

        for expr in ["eval(1)", "exec(1)", "open(1)", "file(1)", "import x"] {
            let err = evaluate(expr).unwrap_err();
            assert!(err.to_string().contains("illegal"), "{expr} → {err}");
        }
    }

    #[test]
    fn test_length_cap() {
        let long = "1+".repeat(300) + "1";
        let err = evaluate(&long).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_division_by_zero() {
        let err = evaluate("1 / 0").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("sqrt 4").is_err());
        assert!(evaluate("unknownfn(1)").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
    }

    #[test]
    fn test_no_identifier_resolves_outside_tables() {
        // Identifiers only resolve against the closed tables; nothing else
        // is reachable.
        assert!(evaluate("os(1)").is_err());
        assert!(evaluate("system(1)").is_err());
    }
}
