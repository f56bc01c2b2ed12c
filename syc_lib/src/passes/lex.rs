//! The hand-written lexer.

use crate::diagnostic::{ErrorKind, ErrorRecorder};
use crate::token::{Token, TokenKind};

pub fn lex(source: &str, recorder: &mut ErrorRecorder) -> Vec<Token> {
    Lexer::new(source, recorder).run()
}

/// The `lexer.txt` payload: `KIND TEXT` per token, EOF excluded.
pub fn write_token_dump(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        if token.kind == TokenKind::Eof {
            break;
        }
        out.push_str(&token.to_string());
        out.push('\n');
    }
    out
}

struct Lexer<'s, 'r> {
    source: &'s [u8],
    pos: usize,
    line: u32,
    recorder: &'r mut ErrorRecorder,
    tokens: Vec<Token>,
}

impl<'s, 'r> Lexer<'s, 'r> {
    fn new(source: &'s str, recorder: &'r mut ErrorRecorder) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            recorder,
            tokens: Vec::new(),
        }
    }

    fn current(&self) -> u8 {
        self.source.get(self.pos).copied().unwrap_or(0)
    }

    fn peek(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.current() == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, line: u32) {
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        self.tokens.push(Token {
            kind,
            text,
            line,
            span: (start..self.pos).into(),
        });
    }

    fn run(mut self) -> Vec<Token> {
        loop {
            self.skip_whitespace_and_comments();
            let c = self.current();
            if c == 0 {
                let at = self.pos;
                self.tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: "EOF".to_owned(),
                    line: self.line,
                    span: (at..at).into(),
                });
                return self.tokens;
            }
            let start = self.pos;
            let line = self.line;
            if c.is_ascii_digit() {
                while self.current().is_ascii_digit() {
                    self.advance();
                }
                self.push(TokenKind::IntConst, start, line);
            } else if c == b'"' {
                self.scan_string();
                self.push(TokenKind::StrConst, start, line);
            } else if c.is_ascii_alphabetic() || c == b'_' {
                while self.current().is_ascii_alphanumeric() || self.current() == b'_' {
                    self.advance();
                }
                let text = &self.source[start..self.pos];
                let kind = std::str::from_utf8(text)
                    .ok()
                    .and_then(TokenKind::keyword)
                    .unwrap_or(TokenKind::Ident);
                self.push(kind, start, line);
            } else {
                self.scan_operator(start, line);
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' | b'\n' => self.advance(),
                b'/' if self.peek(1) == b'/' => {
                    while self.current() != 0 && self.current() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek(1) == b'*' => {
                    self.advance_by(2);
                    while self.current() != 0 && !(self.current() == b'*' && self.peek(1) == b'/') {
                        self.advance();
                    }
                    self.advance_by(2.min(self.source.len().saturating_sub(self.pos)));
                }
                _ => return,
            }
        }
    }

    /// Consumes a string literal including its quotes; escape pairs are kept
    /// verbatim (the printf expansion interprets them later).
    fn scan_string(&mut self) {
        self.advance(); // opening quote
        while self.current() != 0 && self.current() != b'"' {
            if self.current() == b'\\' {
                self.advance();
            }
            if self.current() != 0 {
                self.advance();
            }
        }
        if self.current() == b'"' {
            self.advance();
        }
    }

    fn scan_operator(&mut self, start: usize, line: u32) {
        let c = self.current();
        let n = self.peek(1);
        let two = match (c, n) {
            (b'<', b'=') => Some(TokenKind::LessEq),
            (b'>', b'=') => Some(TokenKind::GreaterEq),
            (b'=', b'=') => Some(TokenKind::EqEq),
            (b'!', b'=') => Some(TokenKind::NotEq),
            (b'&', b'&') => Some(TokenKind::And),
            (b'|', b'|') => Some(TokenKind::Or),
            _ => None,
        };
        if let Some(kind) = two {
            self.advance_by(2);
            self.push(kind, start, line);
            return;
        }

        // A lone `&`/`|` is an illegal symbol; report it but hand the parser
        // the logical operator it almost certainly meant.
        if c == b'&' || c == b'|' {
            self.recorder.record(
                ErrorKind::IllegalSymbol,
                line,
                (start..start + 1).into(),
            );
            self.advance();
            let kind = if c == b'&' { TokenKind::And } else { TokenKind::Or };
            self.push(kind, start, line);
            return;
        }

        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'<' => TokenKind::Less,
            b'>' => TokenKind::Greater,
            b'=' => TokenKind::Assign,
            b'!' => TokenKind::Not,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            _ => {
                // Unknown byte: skip it so lexing cannot stall.
                self.advance();
                return;
            }
        };
        self.advance();
        self.push(kind, start, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut recorder = ErrorRecorder::new();
        lex(source, &mut recorder)
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords_and_operators() {
        assert_eq!(
            kinds("int main() { return 0; }"),
            vec![
                TokenKind::IntKw,
                TokenKind::MainKw,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::ReturnKw,
                TokenKind::IntConst,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ],
        );
    }

    #[test]
    fn skips_comments_and_counts_lines() {
        let mut recorder = ErrorRecorder::new();
        let tokens = lex("// one\n/* two\nthree */ int a;\n", &mut recorder);
        assert_eq!(tokens[0].kind, TokenKind::IntKw);
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn lone_ampersand_records_error_a_but_parses_as_and() {
        let mut recorder = ErrorRecorder::new();
        let tokens = lex("a & b", &mut recorder);
        assert_eq!(tokens[1].kind, TokenKind::And);
        assert_eq!(tokens[1].text, "&");
        assert_eq!(recorder.to_error_file(), "1 a\n");
    }

    #[test]
    fn string_token_keeps_quotes_and_escapes() {
        let mut recorder = ErrorRecorder::new();
        let tokens = lex(r#"printf("a\n%d");"#, &mut recorder);
        assert_eq!(tokens[2].kind, TokenKind::StrConst);
        assert_eq!(tokens[2].text, r#""a\n%d""#);
    }

    #[test]
    fn dump_excludes_eof() {
        let mut recorder = ErrorRecorder::new();
        let tokens = lex("int a;", &mut recorder);
        assert_eq!(write_token_dump(&tokens), "INTTK int\nIDENFR a\nSEMICN ;\n");
    }
}
