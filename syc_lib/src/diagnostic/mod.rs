use std::collections::HashSet;

/// A byte range into the source, used for stderr reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    start: usize,
    length: usize,
}

impl From<std::ops::Range<usize>> for Span {
    fn from(value: std::ops::Range<usize>) -> Self {
        Self {
            start: value.start,
            length: value.len(),
        }
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(val: Span) -> Self {
        val.start..val.start + val.length
    }
}

/// The user-error categories, each with its single-letter code in the error
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Lone `&` or `|`.
    IllegalSymbol,
    /// Redefinition in the same scope.
    Redefinition,
    /// Use of an undefined name.
    Undefined,
    /// Call argument count mismatch.
    ArgCountMismatch,
    /// Call argument kind mismatch (array vs. scalar).
    ArgKindMismatch,
    /// `return <expr>` in a void function.
    ReturnValueInVoid,
    /// Non-void function reaches its end without a return.
    MissingReturn,
    /// Assignment to a const.
    AssignToConst,
    MissingSemicolon,
    MissingRightParen,
    MissingRightBracket,
    /// `printf` format/argument count mismatch.
    PrintfArgMismatch,
    /// `break`/`continue` outside any loop.
    StrayLoopJump,
}

impl ErrorKind {
    pub fn code(self) -> char {
        match self {
            ErrorKind::IllegalSymbol => 'a',
            ErrorKind::Redefinition => 'b',
            ErrorKind::Undefined => 'c',
            ErrorKind::ArgCountMismatch => 'd',
            ErrorKind::ArgKindMismatch => 'e',
            ErrorKind::ReturnValueInVoid => 'f',
            ErrorKind::MissingReturn => 'g',
            ErrorKind::AssignToConst => 'h',
            ErrorKind::MissingSemicolon => 'i',
            ErrorKind::MissingRightParen => 'j',
            ErrorKind::MissingRightBracket => 'k',
            ErrorKind::PrintfArgMismatch => 'l',
            ErrorKind::StrayLoopJump => 'm',
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::IllegalSymbol => "illegal symbol",
            ErrorKind::Redefinition => "name already defined in this scope",
            ErrorKind::Undefined => "use of undefined name",
            ErrorKind::ArgCountMismatch => "wrong number of arguments",
            ErrorKind::ArgKindMismatch => "argument kind mismatch",
            ErrorKind::ReturnValueInVoid => "returning a value from a void function",
            ErrorKind::MissingReturn => "missing return at end of function",
            ErrorKind::AssignToConst => "assignment to a constant",
            ErrorKind::MissingSemicolon => "missing `;`",
            ErrorKind::MissingRightParen => "missing `)`",
            ErrorKind::MissingRightBracket => "missing `]`",
            ErrorKind::PrintfArgMismatch => "printf format/argument count mismatch",
            ErrorKind::StrayLoopJump => "break/continue outside of a loop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    pub line: u32,
    pub span: Span,
    pub kind: ErrorKind,
}

/// Append-only collector for user-program errors, threaded through the
/// phases. Recording never unwinds: each phase keeps going so one run
/// surfaces as many errors as possible.
#[derive(Debug, Default)]
pub struct ErrorRecorder {
    errors: Vec<Error>,
}

impl ErrorRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ErrorKind, line: u32, span: Span) {
        self.errors.push(Error { line, span, kind });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// At most one error per source line (the first recorded wins), in
    /// ascending line order.
    pub fn picked(&self) -> Vec<Error> {
        let mut seen = HashSet::new();
        let mut picked: Vec<Error> = self
            .errors
            .iter()
            .filter(|e| seen.insert(e.line))
            .copied()
            .collect();
        picked.sort_by_key(|e| e.line);
        picked
    }

    /// The `error.txt` payload: `line code` per entry.
    pub fn to_error_file(&self) -> String {
        let mut out = String::new();
        for error in self.picked() {
            out.push_str(&format!("{} {}\n", error.line, error.kind.code()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_error_per_line_and_sorts() {
        let mut recorder = ErrorRecorder::new();
        recorder.record(ErrorKind::MissingSemicolon, 7, Span::default());
        recorder.record(ErrorKind::Undefined, 3, Span::default());
        recorder.record(ErrorKind::Redefinition, 7, Span::default());

        assert_eq!(recorder.to_error_file(), "3 c\n7 i\n");
    }
}
