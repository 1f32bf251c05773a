//! Tokenizer for ABC notation.
//!
//! The lexer is an iterator: each call to `next` skips whitespace and
//! materializes exactly one token from the remaining input. Matching is a
//! single forward pass; the only lookahead is the digit after `(` and the
//! character after an octave-mark run. The first failure ends the stream.

use std::fmt;

use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use crate::error::{LexError, Position};

type PResult<T> = winnow::ModalResult<T>;

/// Header field letters understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Index,
    Title,
    Composer,
    Key,
    DefaultLength,
    Meter,
    Tempo,
    Voice,
}

impl FieldKind {
    pub fn from_char(c: char) -> Option<FieldKind> {
        match c {
            'X' => Some(FieldKind::Index),
            'T' => Some(FieldKind::Title),
            'C' => Some(FieldKind::Composer),
            'K' => Some(FieldKind::Key),
            'L' => Some(FieldKind::DefaultLength),
            'M' => Some(FieldKind::Meter),
            'Q' => Some(FieldKind::Tempo),
            'V' => Some(FieldKind::Voice),
            _ => None,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            FieldKind::Index => 'X',
            FieldKind::Title => 'T',
            FieldKind::Composer => 'C',
            FieldKind::Key => 'K',
            FieldKind::DefaultLength => 'L',
            FieldKind::Meter => 'M',
            FieldKind::Tempo => 'Q',
            FieldKind::Voice => 'V',
        }
    }
}

/// Bar line types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barline {
    Single,      // |
    Double,      // ||
    ThickThin,   // [|
    ThinThick,   // |]
    RepeatStart, // |:
    RepeatEnd,   // :|
}

impl Barline {
    pub fn symbol(&self) -> &'static str {
        match self {
            Barline::Single => "|",
            Barline::Double => "||",
            Barline::ThickThin => "[|",
            Barline::ThinThick => "|]",
            Barline::RepeatStart => "|:",
            Barline::RepeatEnd => ":|",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Header field with its value, comment stripped, `\%` unescaped and
    /// trimmed
    Field(FieldKind, String),
    Barline(Barline),
    /// `[1` or `[2`
    NthEnding(u8),
    /// `(n`
    Tuplet(u32),
    /// Semitone shift: `^`=1, `^^`=2, `_`=-1, `__`=-2, `=`=0
    Accidental(i8),
    /// Octave marks: positive for `'`, negative for `,`
    Octave(i8),
    NoteLetter(char),
    Rest,
    Digits(u32),
    FractionBar,
    ChordStart,
    ChordEnd,
    Comment(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Field(kind, value) => write!(f, "{}:{}", kind.to_char(), value),
            TokenKind::Barline(bar) => f.write_str(bar.symbol()),
            TokenKind::NthEnding(n) => write!(f, "[{}", n),
            TokenKind::Tuplet(n) => write!(f, "({}", n),
            TokenKind::Accidental(v) => f.write_str(match v {
                2 => "^^",
                1 => "^",
                -1 => "_",
                -2 => "__",
                _ => "=",
            }),
            TokenKind::Octave(n) => {
                let mark = if *n > 0 { "'" } else { "," };
                f.write_str(&mark.repeat(n.unsigned_abs() as usize))
            }
            TokenKind::NoteLetter(c) => write!(f, "{}", c),
            TokenKind::Rest => f.write_str("z"),
            TokenKind::Digits(n) => write!(f, "{}", n),
            TokenKind::FractionBar => f.write_str("/"),
            TokenKind::ChordStart => f.write_str("["),
            TokenKind::ChordEnd => f.write_str("]"),
            TokenKind::Comment(text) => write!(f, "%{}", text),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    pub fn at(kind: TokenKind, offset: usize) -> Self {
        Token { kind, offset }
    }
}

/// A field value up to its first unescaped `%`, with `\%` read as `%`.
fn field_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'%') => {
                chars.next();
                out.push('%');
            }
            '%' => break,
            c => out.push(c),
        }
    }
    out.trim().to_string()
}

fn field_header<'s>(input: &mut &'s str) -> PResult<(char, &'s str)> {
    (
        one_of(['X', 'T', 'C', 'K', 'L', 'M', 'Q', 'V']),
        ':',
        take_till(0.., '\n'),
    )
        .map(|(c, _, value)| (c, value))
        .parse_next(input)
}

fn barline(input: &mut &str) -> PResult<Barline> {
    alt((
        "||".value(Barline::Double),
        "[|".value(Barline::ThickThin),
        "|]".value(Barline::ThinThick),
        ":|".value(Barline::RepeatEnd),
        "|:".value(Barline::RepeatStart),
        "|".value(Barline::Single),
    ))
    .parse_next(input)
}

fn nth_ending(input: &mut &str) -> PResult<u8> {
    alt(("[1".value(1u8), "[2".value(2u8))).parse_next(input)
}

fn digits<'s>(input: &mut &'s str) -> PResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)
}

fn run_of<'s>(input: &mut &'s str, symbol: char) -> PResult<&'s str> {
    take_while(1.., symbol).parse_next(input)
}

fn note_letter(input: &mut &str) -> PResult<char> {
    one_of(['A', 'B', 'C', 'D', 'E', 'F', 'G', 'a', 'b', 'c', 'd', 'e', 'f', 'g']).parse_next(input)
}

fn comment<'s>(input: &mut &'s str) -> PResult<&'s str> {
    ('%', take_till(0.., '\n'))
        .map(|(_, text)| text)
        .parse_next(input)
}

/// Pull-based token producer over a borrowed source string.
pub struct Lexer<'a> {
    source: &'a str,
    rest: &'a str,
    token_start: usize,
    line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            rest: source,
            token_start: 0,
            line_start: true,
        }
    }

    fn offset(&self) -> usize {
        self.source.len() - self.rest.len()
    }

    /// Error anchored at the start of the token being lexed.
    fn error(&self, message: &str) -> LexError {
        LexError::new(
            message,
            &self.source[self.token_start..],
            Position::locate(self.source, self.token_start),
        )
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest.trim_start_matches([' ', '\t', '\r', '\n']);
        if self.rest[..self.rest.len() - trimmed.len()].contains('\n') {
            self.line_start = true;
        }
        self.rest = trimmed;
    }

    /// Run `parser` on a copy of the remaining input, committing only on success.
    fn attempt<O>(&mut self, mut parser: impl FnMut(&mut &'a str) -> PResult<O>) -> Option<O> {
        let mut input = self.rest;
        match parser(&mut input) {
            Ok(out) => {
                self.rest = input;
                Some(out)
            }
            Err(_) => None,
        }
    }

    fn lex(&mut self) -> Result<TokenKind, LexError> {
        if self.line_start {
            if let Some((c, value)) = self.attempt(field_header) {
                // field_header only matches known letters
                if let Some(kind) = FieldKind::from_char(c) {
                    return Ok(TokenKind::Field(kind, field_value(value)));
                }
            }
        }

        if let Some(n) = self.attempt(nth_ending) {
            return Ok(TokenKind::NthEnding(n));
        }
        if let Some(bar) = self.attempt(barline) {
            return Ok(TokenKind::Barline(bar));
        }

        if self.rest.starts_with('(') {
            self.rest = &self.rest[1..];
            return match self.attempt(digits) {
                Some(n) => n
                    .parse()
                    .map(TokenKind::Tuplet)
                    .map_err(|_| self.error("tuplet size out of range")),
                None => Err(self.error("tuplet marker without a following digit")),
            };
        }

        for (symbol, sign, message) in [
            ('^', 1i8, "note is way too sharp"),
            ('_', -1, "note is way too flat"),
            ('=', 0, "too many naturals"),
        ] {
            if let Some(run) = self.attempt(|input: &mut &'a str| run_of(input, symbol)) {
                if run.len() > 2 {
                    return Err(self.error(message));
                }
                return Ok(TokenKind::Accidental(sign * run.len() as i8));
            }
        }

        for (symbol, opposite, sign) in [('\'', ',', 1i8), (',', '\'', -1)] {
            if let Some(run) = self.attempt(|input: &mut &'a str| run_of(input, symbol)) {
                if self.rest.starts_with(opposite) {
                    return Err(self.error("cannot take one note both an octave up and down"));
                }
                let count = i8::try_from(run.len())
                    .map_err(|_| self.error("too many octave marks"))?;
                return Ok(TokenKind::Octave(sign * count));
            }
        }

        if let Some(text) = self.attempt(comment) {
            return Ok(TokenKind::Comment(text.to_string()));
        }
        if let Some(c) = self.attempt(note_letter) {
            return Ok(TokenKind::NoteLetter(c));
        }
        if let Some(n) = self.attempt(digits) {
            return n
                .parse()
                .map(TokenKind::Digits)
                .map_err(|_| self.error("number out of range"));
        }

        let kind = match self.rest.chars().next() {
            Some('z') => TokenKind::Rest,
            Some('/') => TokenKind::FractionBar,
            Some('[') => TokenKind::ChordStart,
            Some(']') => TokenKind::ChordEnd,
            _ => return Err(self.error("bad tokens, check your grammar and syntax")),
        };
        self.rest = &self.rest[1..];
        Ok(kind)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        if self.rest.is_empty() {
            return None;
        }
        let offset = self.offset();
        self.token_start = offset;
        let result = self.lex();
        self.line_start = false;
        match result {
            Ok(kind) => Some(Ok(Token::at(kind, offset))),
            Err(e) => {
                self.rest = "";
                Some(Err(e))
            }
        }
    }
}
