//! Hand-written lexer for the Pascal front end
//!
//! A streaming cursor over the source text with line/column tracking.
//! `next_token` skips any mixture of whitespace, `{ ... }` comments and
//! `// ...` line comments before classifying the next character.
//! `peek_token` provides the one-token lookahead the parser needs to
//! tell `ID :=` from a procedure call.

use crate::token::{Token, TokenKind};
use std::fmt;

/// Lexical error with the offending source position.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl LexError {
    fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        LexError {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexical error at L{}:C{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if self.current() == Some('\n') {
            self.line += 1;
            self.column = 0;
        }
        self.pos += 1;
        if self.pos < self.chars.len() {
            self.column += 1;
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError::new(self.line, self.column, message))
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) -> bool {
        if self.current() == Some('/') && self.peek_char() == Some('/') {
            while self.current().is_some_and(|c| c != '\n') {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    /// Brace comments do not nest; running into EOF is a lexical error
    /// reported at the comment's opening brace.
    fn skip_brace_comment(&mut self) -> Result<bool, LexError> {
        if self.current() != Some('{') {
            return Ok(false);
        }
        let (start_line, start_column) = (self.line, self.column);
        self.advance();
        loop {
            match self.current() {
                None => {
                    return Err(LexError::new(
                        start_line,
                        start_column,
                        "Unterminated comment",
                    ));
                }
                Some('}') => {
                    self.advance();
                    return Ok(true);
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let (start_line, start_column) = (self.line, self.column);
        let mut text = String::new();
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.current().unwrap());
            self.advance();
        }
        // A dot only belongs to the number when a digit follows; a bare
        // trailing dot is the program terminator.
        if self.current() == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.current().unwrap());
                self.advance();
            }
            let value: f64 = text
                .parse()
                .map_err(|_| LexError::new(start_line, start_column, "Invalid real literal"))?;
            return Ok(Token::new(
                TokenKind::RealConst(value),
                start_line,
                start_column,
            ));
        }
        let value: i64 = text.parse().map_err(|_| {
            LexError::new(
                start_line,
                start_column,
                format!("Integer literal '{}' out of range", text),
            )
        })?;
        Ok(Token::new(
            TokenKind::IntConst(value),
            start_line,
            start_column,
        ))
    }

    fn identifier(&mut self) -> Token {
        let (start_line, start_column) = (self.line, self.column);
        let mut text = String::new();
        while self
            .current()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            text.push(self.current().unwrap());
            self.advance();
        }
        let kind = TokenKind::keyword(&text.to_uppercase()).unwrap_or(TokenKind::Id(text));
        Token::new(kind, start_line, start_column)
    }

    fn string_literal(&mut self) -> Result<Token, LexError> {
        let (start_line, start_column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current() {
                None => {
                    return Err(LexError::new(
                        start_line,
                        start_column,
                        "Unterminated string literal",
                    ));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        None => {
                            return Err(LexError::new(
                                start_line,
                                start_column,
                                "Unterminated escape sequence in string literal",
                            ));
                        }
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('\\') => text.push('\\'),
                        Some('\'') => text.push('\''),
                        // Unknown escapes pass through verbatim.
                        Some(other) => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                    self.advance();
                }
                Some('\'') => {
                    if self.peek_char() == Some('\'') {
                        // Doubled quote yields a literal apostrophe.
                        text.push('\'');
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        return Ok(Token::new(
                            TokenKind::StrConst(text),
                            start_line,
                            start_column,
                        ));
                    }
                }
                Some(other) => {
                    text.push(other);
                    self.advance();
                }
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            match self.current() {
                Some(c) if c.is_whitespace() => self.skip_whitespace(),
                Some('{') => {
                    self.skip_brace_comment()?;
                }
                Some('/') if self.peek_char() == Some('/') => {
                    self.skip_line_comment();
                }
                _ => break,
            }
        }

        let Some(c) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, self.line, self.column));
        };
        let (line, column) = (self.line, self.column);

        if c.is_alphabetic() || c == '_' {
            return Ok(self.identifier());
        }
        if c.is_ascii_digit() {
            return self.number();
        }
        if c == '\'' {
            return self.string_literal();
        }

        let two = (c, self.peek_char());
        let kind = match two {
            (':', Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::Assign
            }
            ('<', Some('>')) => {
                self.advance();
                self.advance();
                TokenKind::NotEqual
            }
            ('<', Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::LessEqual
            }
            ('>', Some('=')) => {
                self.advance();
                self.advance();
                TokenKind::GreaterEqual
            }
            _ => {
                let single = match c {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    ';' => TokenKind::Semi,
                    '.' => TokenKind::Dot,
                    ':' => TokenKind::Colon,
                    ',' => TokenKind::Comma,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '=' => TokenKind::Equal,
                    '<' => TokenKind::Less,
                    '>' => TokenKind::Greater,
                    other => return self.error(format!("Unexpected character '{}'", other)),
                };
                self.advance();
                single
            }
        };
        Ok(Token::new(kind, line, column))
    }

    /// Non-destructive one-token lookahead: lexes the next token, then
    /// restores the cursor.
    pub fn peek_token(&mut self) -> Result<Token, LexError> {
        let saved = (self.pos, self.line, self.column);
        let token = self.next_token();
        (self.pos, self.line, self.column) = saved;
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut kinds = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            let done = token.kind == TokenKind::Eof;
            kinds.push(token.kind);
            if done {
                break;
            }
        }
        kinds
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let kinds = collect_kinds("begin BEGIN Begin");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Begin,
                TokenKind::Begin,
                TokenKind::Begin,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_identifiers_keep_their_spelling() {
        let kinds = collect_kinds("Count count _x1");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Id("Count".to_string()),
                TokenKind::Id("count".to_string()),
                TokenKind::Id("_x1".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_multi_char_operators() {
        let kinds = collect_kinds(":= <> <= >= < > = :");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Assign,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Equal,
                TokenKind::Colon,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers_int_and_real() {
        let kinds = collect_kinds("42 3.25");
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntConst(42),
                TokenKind::RealConst(3.25),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_trailing_dot_stays_with_next_token() {
        // `1.` is an integer followed by the program terminator.
        let kinds = collect_kinds("1.");
        assert_eq!(
            kinds,
            vec![TokenKind::IntConst(1), TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_escapes_and_doubled_quote() {
        let kinds = collect_kinds(r"'a\nb' 'it''s' '\t\\\''");
        assert_eq!(
            kinds,
            vec![
                TokenKind::StrConst("a\nb".to_string()),
                TokenKind::StrConst("it's".to_string()),
                TokenKind::StrConst("\t\\'".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let kinds = collect_kinds("{ skip me } 1 // rest of line\n 2");
        assert_eq!(
            kinds,
            vec![
                TokenKind::IntConst(1),
                TokenKind::IntConst(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_comment_reports_start() {
        let mut lexer = Lexer::new("  { never closed");
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("Unterminated comment"));
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("'hi");
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("Unterminated string literal"));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("@");
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("Unexpected character '@'"));
    }

    #[test]
    fn test_positions_track_lines_and_columns() {
        let mut lexer = Lexer::new("x\n  y");
        let x = lexer.next_token().unwrap();
        assert_eq!((x.line, x.column), (1, 1));
        let y = lexer.next_token().unwrap();
        assert_eq!((y.line, y.column), (2, 3));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("a := 1");
        let first = lexer.next_token().unwrap();
        assert_eq!(first.kind, TokenKind::Id("a".to_string()));
        let peeked = lexer.peek_token().unwrap();
        assert_eq!(peeked.kind, TokenKind::Assign);
        let consumed = lexer.next_token().unwrap();
        assert_eq!(consumed.kind, TokenKind::Assign);
    }

    #[test]
    fn test_huge_integer_literal_is_rejected() {
        let mut lexer = Lexer::new("99999999999999999999999999");
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("out of range"));
    }
}
