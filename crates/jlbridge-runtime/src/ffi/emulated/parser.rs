//! Lexer and parser for the Julia subset understood by `EmulatedJulia`
//!
//! Supported forms:
//! - literals: `42`, `-1.5`, `2e3`, `1.5f0` (Float32), `0x0f` (sized unsigned),
//!   `true`, `false`, `"text"`
//! - vector literals `[a, b, c]`
//! - calls `f(a, b)`, splats `f(xs...)`, curly types `Array{Float64, 3}`
//! - binary `+ - * /` with the usual precedence, unary minus
//! - `x = expr`, `f(x, y::T) = expr`, `using Pkg`
//! - `#` comments; statements split on newlines and `;`

use crate::kind::Scalar;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Str(String),
    Ident(String),
    Vector(Vec<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Curly { name: String, params: Vec<Expr> },
    TypeAssert(Box<Expr>, Box<Expr>),
    Splat(Box<Expr>),
}

impl Expr {
    fn binary(op: &str, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Call {
            callee: Box::new(Expr::Ident(op.to_string())),
            args: vec![lhs, rhs],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(String, Expr),
    Method {
        name: String,
        params: Vec<Param>,
        body: Expr,
    },
    Using(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax: {}", self.0)
    }
}

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Scalar),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Separator,
    Assign,
    DoubleColon,
    Ellipsis,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "{}", name),
            Token::Number(value) => write!(f, "{}", value),
            Token::Str(text) => write!(f, "{:?}", text),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Separator => write!(f, "newline"),
            Token::Assign => write!(f, "="),
            Token::DoubleColon => write!(f, "::"),
            Token::Ellipsis => write!(f, "..."),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    depth: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            depth: 0,
        }
    }

    fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                '#' => {
                    while self.chars.next_if(|&c| c != '\n').is_some() {}
                }
                '\n' | ';' => {
                    self.chars.next();
                    // Newlines inside brackets continue the expression
                    if self.depth == 0 || c == ';' {
                        tokens.push(Token::Separator);
                    }
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '"' => tokens.push(self.string()?),
                c if c.is_ascii_digit() => tokens.push(self.number()?),
                c if c.is_alphabetic() || c == '_' => tokens.push(self.ident()),
                _ => tokens.push(self.punct()?),
            }
        }
        tokens.push(Token::Eof);
        Ok(tokens)
    }

    fn punct(&mut self) -> ParseResult<Token> {
        let c = self.chars.next().ok_or_else(|| ParseError("unexpected end of input".into()))?;
        let token = match c {
            '(' | '[' | '{' => {
                self.depth += 1;
                match c {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                }
            }
            ')' | ']' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                match c {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                }
            }
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' if self.chars.peek() == Some(&'=') => {
                return Err(ParseError("comparison operators are not supported".into()))
            }
            '=' => Token::Assign,
            ':' if self.chars.next_if_eq(&':').is_some() => Token::DoubleColon,
            '.' if self.chars.next_if_eq(&'.').is_some() && self.chars.next_if_eq(&'.').is_some() => {
                Token::Ellipsis
            }
            other => return Err(ParseError(format!("unexpected character {:?}", other))),
        };
        Ok(token)
    }

    fn ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self
            .chars
            .next_if(|&c| c.is_alphanumeric() || c == '_' || c == '!')
        {
            name.push(c);
        }
        match name.as_str() {
            "true" => Token::Number(Scalar::Bool(true)),
            "false" => Token::Number(Scalar::Bool(false)),
            _ => Token::Ident(name),
        }
    }

    fn string(&mut self) -> ParseResult<Token> {
        self.chars.next();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some('"') => return Ok(Token::Str(text)),
                Some('\\') => match self.chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c @ ('"' | '\\' | '$')) => text.push(c),
                    Some(c) => return Err(ParseError(format!("invalid escape sequence \\{}", c))),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(ParseError("incomplete: unterminated string literal".into()))
    }

    fn number(&mut self) -> ParseResult<Token> {
        let mut text = String::new();

        if self.chars.peek() == Some(&'0') {
            text.push('0');
            self.chars.next();
            if self.chars.next_if_eq(&'x').is_some() {
                return self.hex();
            }
        }

        self.digits(&mut text);
        let mut float = false;
        let mut float32 = false;

        // Only take the dot when a digit follows, so `xs...` and `1...` still lex
        let mut lookahead = self.chars.clone();
        if lookahead.next() == Some('.') && lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.chars.next();
            text.push('.');
            self.digits(&mut text);
            float = true;
        }

        if let Some(marker) = self.chars.next_if(|&c| c == 'e' || c == 'f') {
            float = true;
            float32 = marker == 'f';
            text.push('e');
            if let Some(sign) = self.chars.next_if(|&c| c == '+' || c == '-') {
                text.push(sign);
            }
            let before = text.len();
            self.digits(&mut text);
            if text.len() == before {
                return Err(ParseError(format!("malformed number \"{}\"", text)));
            }
        }

        let invalid = || ParseError(format!("invalid numeric constant \"{}\"", text));
        let value = if float32 {
            Scalar::F32(text.parse::<f32>().map_err(|_| invalid())?)
        } else if float {
            Scalar::F64(text.parse::<f64>().map_err(|_| invalid())?)
        } else {
            Scalar::I64(text.parse::<i64>().map_err(|_| invalid())?)
        };
        Ok(Token::Number(value))
    }

    /// Hex literals are unsigned and sized by digit count, as in Julia
    fn hex(&mut self) -> ParseResult<Token> {
        let mut digits = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_hexdigit()) {
            digits.push(c);
        }
        let invalid = || ParseError(format!("invalid numeric constant \"0x{}\"", digits));
        let value = u64::from_str_radix(&digits, 16).map_err(|_| invalid())?;
        let scalar = match digits.len() {
            1..=2 => Scalar::U8(value as u8),
            3..=4 => Scalar::U16(value as u16),
            5..=8 => Scalar::U32(value as u32),
            9..=16 => Scalar::U64(value),
            _ => return Err(invalid()),
        };
        Ok(Token::Number(scalar))
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '_') {
            if c != '_' {
                text.push(c);
            }
        }
    }
}

/// Nesting allowed in one expression before it is rejected
const MAX_NESTING: usize = 100;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ParseError(format!("expected \"{}\", got \"{}\"", token, self.peek())))
        }
    }

    fn program(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Separator) {}
            if *self.peek() == Token::Eof {
                return Ok(statements);
            }
            statements.push(self.statement()?);
            match self.peek() {
                Token::Separator | Token::Eof => {}
                other => return Err(ParseError(format!("extra token \"{}\" after end of expression", other))),
            }
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if *self.peek() == Token::Ident("using".to_string()) {
            self.advance();
            let mut packages = vec![self.name()?];
            while self.eat(&Token::Comma) {
                packages.push(self.name()?);
            }
            return Ok(Stmt::Using(packages));
        }

        let target = self.expression()?;
        if !self.eat(&Token::Assign) {
            return Ok(Stmt::Expr(target));
        }
        let value = self.expression()?;

        match target {
            Expr::Ident(name) => Ok(Stmt::Assign(name, value)),
            Expr::Call { callee, args } => {
                let Expr::Ident(name) = *callee else {
                    return Err(ParseError("invalid function name".into()));
                };
                let params = args
                    .into_iter()
                    .map(|arg| match arg {
                        Expr::Ident(name) => Ok(Param { name, annotation: None }),
                        Expr::TypeAssert(inner, annotation) => match *inner {
                            Expr::Ident(name) => Ok(Param {
                                name,
                                annotation: Some(*annotation),
                            }),
                            _ => Err(ParseError("invalid function argument".into())),
                        },
                        _ => Err(ParseError("invalid function argument".into())),
                    })
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Stmt::Method { name, params, body: value })
            }
            _ => Err(ParseError("invalid assignment location".into())),
        }
    }

    fn name(&mut self) -> ParseResult<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError(format!("expected a name, got \"{}\"", other))),
        }
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(Self::sum)
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError("expression nested too deeply".into()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn sum(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => "+",
                Token::Minus => "-",
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => "*",
                Token::Slash => "/",
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.eat(&Token::Plus) {
            return self.nested(Self::unary);
        }
        if !self.eat(&Token::Minus) {
            return self.postfix();
        }
        let operand = self.nested(Self::unary)?;
        Ok(match operand {
            Expr::Literal(value) => match negate(value) {
                Some(negated) => Expr::Literal(negated),
                None => Expr::Call {
                    callee: Box::new(Expr::Ident("-".to_string())),
                    args: vec![Expr::Literal(value)],
                },
            },
            other => Expr::Call {
                callee: Box::new(Expr::Ident("-".to_string())),
                args: vec![other],
            },
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let args = self.list(&Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Token::DoubleColon => {
                    self.advance();
                    let annotation = self.primary()?;
                    expr = Expr::TypeAssert(Box::new(expr), Box::new(annotation));
                }
                Token::Ellipsis => {
                    self.advance();
                    expr = Expr::Splat(Box::new(expr));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.advance() {
            Token::Number(value) => Ok(Expr::Literal(value)),
            Token::Str(text) => Ok(Expr::Str(text)),
            Token::Ident(name) => {
                if self.eat(&Token::LBrace) {
                    let params = self.list(&Token::RBrace)?;
                    Ok(Expr::Curly { name, params })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::Vector(self.list(&Token::RBracket)?)),
            Token::Eof => Err(ParseError("incomplete: premature end of input".into())),
            other => Err(ParseError(format!("unexpected \"{}\"", other))),
        }
    }

    /// Comma-separated expressions up to and including `close`
    fn list(&mut self, close: &Token) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma)?;
        }
    }
}

fn negate(value: Scalar) -> Option<Scalar> {
    Some(match value {
        Scalar::I64(v) => Scalar::I64(v.wrapping_neg()),
        Scalar::F64(v) => Scalar::F64(-v),
        Scalar::F32(v) => Scalar::F32(-v),
        Scalar::U8(v) => Scalar::U8(v.wrapping_neg()),
        Scalar::U16(v) => Scalar::U16(v.wrapping_neg()),
        Scalar::U32(v) => Scalar::U32(v.wrapping_neg()),
        Scalar::U64(v) => Scalar::U64(v.wrapping_neg()),
        _ => return None,
    })
}

/// Parse a whole program
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn expr(source: &str) -> Expr {
        match parse_program(source).unwrap().pop() {
            Some(Stmt::Expr(expr)) => expr,
            other => panic!("expected an expression, got {:?}", other),
        }
    }

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    #[rstest]
    #[case("42", Scalar::I64(42))]
    #[case("-7", Scalar::I64(-7))]
    #[case("2.5", Scalar::F64(2.5))]
    #[case("1e3", Scalar::F64(1000.0))]
    #[case("1.5f0", Scalar::F32(1.5))]
    #[case("0x01", Scalar::U8(1))]
    #[case("0x0100", Scalar::U16(256))]
    #[case("0xdeadbeef", Scalar::U32(0xdead_beef))]
    #[case("1_000", Scalar::I64(1000))]
    #[case("true", Scalar::Bool(true))]
    fn test_literals(#[case] source: &str, #[case] expected: Scalar) {
        assert_eq!(expr(source), Expr::Literal(expected));
    }

    #[test]
    fn test_precedence() {
        let parsed = expr("a + b * c");
        assert_eq!(
            parsed,
            Expr::binary("+", ident("a"), Expr::binary("*", ident("b"), ident("c")))
        );
    }

    #[test]
    fn test_call_with_splat_and_curly() {
        let parsed = expr("Array{Float64, 3}(undef, dims...)");
        assert_eq!(
            parsed,
            Expr::Call {
                callee: Box::new(Expr::Curly {
                    name: "Array".to_string(),
                    params: vec![ident("Float64"), Expr::Literal(Scalar::I64(3))],
                }),
                args: vec![ident("undef"), Expr::Splat(Box::new(ident("dims")))],
            }
        );
    }

    #[test]
    fn test_method_definition() {
        let statements = parse_program("f(x, y::Int64) = x * y").unwrap();
        assert_eq!(
            statements,
            vec![Stmt::Method {
                name: "f".to_string(),
                params: vec![
                    Param { name: "x".to_string(), annotation: None },
                    Param {
                        name: "y".to_string(),
                        annotation: Some(ident("Int64")),
                    },
                ],
                body: Expr::binary("*", ident("x"), ident("y")),
            }]
        );
    }

    #[test]
    fn test_statements_and_comments() {
        let statements = parse_program("# setup\nx = [1, 2,\n 3]; using JSON2\nx").unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            Stmt::Assign(
                "x".to_string(),
                Expr::Vector(vec![
                    Expr::Literal(Scalar::I64(1)),
                    Expr::Literal(Scalar::I64(2)),
                    Expr::Literal(Scalar::I64(3)),
                ])
            )
        );
        assert_eq!(statements[1], Stmt::Using(vec!["JSON2".to_string()]));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(expr(r#""a\"b\n""#), Expr::Str("a\"b\n".to_string()));
    }

    #[rstest]
    #[case("f(")]
    #[case("1 +")]
    #[case("\"open")]
    #[case("x == 1")]
    #[case("1 2")]
    #[case("3 = x")]
    fn test_syntax_errors(#[case] source: &str) {
        assert!(parse_program(source).is_err());
    }

    #[test]
    fn test_nesting_is_bounded() {
        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(expr(&shallow), Expr::Literal(Scalar::I64(1)));

        let deep = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(
            parse_program(&deep),
            Err(ParseError("expression nested too deeply".to_string()))
        );
        let negations = format!("{}x", "-".repeat(200_000));
        assert!(parse_program(&negations).is_err());
        let calls = format!("{}{}", "f(".repeat(200_000), ")".repeat(200_000));
        assert!(parse_program(&calls).is_err());
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(parse_program("  \n# nothing\n").unwrap(), Vec::new());
    }
}
