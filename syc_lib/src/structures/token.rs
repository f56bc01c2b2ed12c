use crate::diagnostic::Span;
use std::fmt;

/// Token kinds; the `Display` names are the exact strings the token dump
/// uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    IntConst,
    StrConst,

    MainKw,
    ConstKw,
    IntKw,
    StaticKw,
    VoidKw,
    BreakKw,
    ContinueKw,
    IfKw,
    ElseKw,
    ForKw,
    WhileKw,
    PrintfKw,
    ReturnKw,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqEq,
    NotEq,
    Assign,

    Semicolon,
    Comma,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Not,
    And,
    Or,

    Eof,
}

impl TokenKind {
    pub fn dump_name(self) -> &'static str {
        match self {
            TokenKind::Ident => "IDENFR",
            TokenKind::IntConst => "INTCON",
            TokenKind::StrConst => "STRCON",
            TokenKind::MainKw => "MAINTK",
            TokenKind::ConstKw => "CONSTTK",
            TokenKind::IntKw => "INTTK",
            TokenKind::StaticKw => "STATICTK",
            TokenKind::VoidKw => "VOIDTK",
            TokenKind::BreakKw => "BREAKTK",
            TokenKind::ContinueKw => "CONTINUETK",
            TokenKind::IfKw => "IFTK",
            TokenKind::ElseKw => "ELSETK",
            TokenKind::ForKw => "FORTK",
            TokenKind::WhileKw => "WHILETK",
            TokenKind::PrintfKw => "PRINTFTK",
            TokenKind::ReturnKw => "RETURNTK",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINU",
            TokenKind::Star => "MULT",
            TokenKind::Slash => "DIV",
            TokenKind::Percent => "MOD",
            TokenKind::Less => "LSS",
            TokenKind::LessEq => "LEQ",
            TokenKind::Greater => "GRE",
            TokenKind::GreaterEq => "GEQ",
            TokenKind::EqEq => "EQL",
            TokenKind::NotEq => "NEQ",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Semicolon => "SEMICN",
            TokenKind::Comma => "COMMA",
            TokenKind::LParen => "LPARENT",
            TokenKind::RParen => "RPARENT",
            TokenKind::LBracket => "LBRACK",
            TokenKind::RBracket => "RBRACK",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Not => "NOT",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Eof => "EOF",
        }
    }

    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "main" => TokenKind::MainKw,
            "const" => TokenKind::ConstKw,
            "int" => TokenKind::IntKw,
            "static" => TokenKind::StaticKw,
            "void" => TokenKind::VoidKw,
            "break" => TokenKind::BreakKw,
            "continue" => TokenKind::ContinueKw,
            "if" => TokenKind::IfKw,
            "else" => TokenKind::ElseKw,
            "for" => TokenKind::ForKw,
            "while" => TokenKind::WhileKw,
            "printf" => TokenKind::PrintfKw,
            "return" => TokenKind::ReturnKw,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dump_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.text)
    }
}
