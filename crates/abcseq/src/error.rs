//! Lexical, syntactic and timing failures.
//!
//! All of them abort compilation of the current input. Musical problems such
//! as wrong bar lengths are not errors; see [`crate::feedback`].

use thiserror::Error;

/// Longest slice of remaining input quoted in a lexer error.
const REMAINDER_PREVIEW: usize = 32;

/// Line and column (both 1-based) of a byte offset in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        Position { line, column }
    }
}

/// The lexer could not match a token at the current position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}: {remainder:?}")]
pub struct LexError {
    pub message: String,
    pub remainder: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, remainder: &str, position: Position) -> Self {
        let remainder = match remainder.char_indices().nth(REMAINDER_PREVIEW) {
            Some((cut, _)) => format!("{}...", &remainder[..cut]),
            None => remainder.to_string(),
        };
        LexError {
            message: message.into(),
            remainder,
            line: position.line,
            column: position.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected {found} at line {line}, column {column}: expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        line: usize,
        column: usize,
    },

    #[error("unexpected end of input: expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: char,
        value: String,
        reason: &'static str,
    },

    #[error("invalid key signature '{0}'")]
    InvalidKey(String),

    #[error("accidental at line {line}, column {column} is not followed by a note")]
    DanglingAccidental { line: usize, column: usize },

    #[error("note at line {line}, column {column} is shifted both up and down an octave")]
    MixedOctave { line: usize, column: usize },

    #[error("length at line {line}, column {column} does not fit in 32 bits")]
    DurationOverflow { line: usize, column: usize },

    /// No 32-bit tick count can place every note of the piece.
    #[error("note lengths do not fit in 32-bit ticks")]
    TickOverflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate() {
        let source = "X:1\nK:C\nCDE";
        assert_eq!(Position::locate(source, 0), Position { line: 1, column: 1 });
        assert_eq!(Position::locate(source, 4), Position { line: 2, column: 1 });
        assert_eq!(Position::locate(source, 10), Position { line: 3, column: 3 });
    }

    #[test]
    fn test_lex_error_truncates_remainder() {
        let long = "x".repeat(100);
        let err = LexError::new("bad token", &long, Position { line: 1, column: 1 });
        assert!(err.remainder.ends_with("..."));
        assert!(err.remainder.len() < 40);
    }

    #[test]
    fn test_parse_error_display_names_fragment() {
        let err = ParseError::InvalidField {
            field: 'L',
            value: "7".to_string(),
            reason: "expected a fraction",
        };
        assert_eq!(err.to_string(), "invalid L field '7': expected a fraction");
    }
}
