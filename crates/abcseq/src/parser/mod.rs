//! ABC notation parser.
//!
//! Recursive descent over the token stream produced by [`Lexer`], building a
//! [`Music`] value. Parsing is strict: the first lexical or syntactic problem
//! aborts with a [`ParseError`] and no partial tree is returned. Musical
//! problems (bar lengths, chord lengths) are left to the analysis passes.

mod body;
mod header;
mod key;
pub mod lexer;
mod note;

use tracing::debug;

use crate::ast::Music;
use crate::error::{ParseError, Position};

use self::body::Voices;
pub use self::header::infer_default_length;
pub use self::key::resolve_key;
pub use self::lexer::{Barline, FieldKind, Lexer, Token, TokenKind};

/// Parse ABC notation into a Music AST.
pub fn parse(input: &str) -> Result<Music, ParseError> {
    Parser::new(input).parse_music()
}

/// Pulls tokens from a [`Lexer`] one at a time with a single token of
/// lookahead.
pub struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            source,
            lexer: Lexer::new(source),
            lookahead: None,
        }
    }

    pub fn parse_music(mut self) -> Result<Music, ParseError> {
        let mut music = Music {
            voices: Vec::new(),
            ..Music::default()
        };
        let mut voices = Voices::default();
        let mut length_given = false;
        let mut in_body = false;

        while let Some(token) = self.bump()? {
            match &token.kind {
                TokenKind::Field(FieldKind::Key, value) => music.key = resolve_key(value)?,
                TokenKind::Field(FieldKind::Voice, value) => {
                    voices.select(header::voice_name(value)?, in_body);
                }
                TokenKind::Field(kind, value) => {
                    length_given |= header::apply_field(&mut music, *kind, value)?;
                }
                TokenKind::Comment(_) => {}
                TokenKind::Barline(barline) => {
                    in_body = true;
                    voices
                        .current()
                        .barline(*barline)
                        .map_err(|expected| self.unexpected(&token, expected))?;
                }
                TokenKind::NthEnding(n) => {
                    in_body = true;
                    voices
                        .current()
                        .nth_ending(*n)
                        .map_err(|expected| self.unexpected(&token, expected))?;
                }
                _ => {
                    in_body = true;
                    let elements = self.element(&token)?;
                    let builder = voices.current();
                    for element in elements {
                        builder
                            .push_element(element)
                            .map_err(|expected| self.unexpected(&token, expected))?;
                    }
                }
            }
        }

        if !length_given {
            music.default_length = infer_default_length(music.meter);
        }
        music.voices = voices
            .finish()
            .map_err(|expected| ParseError::UnexpectedEnd { expected })?;

        debug!(
            title = %music.title,
            voices = music.voices.len(),
            bars = music.voices.iter().map(|v| v.apparent_bars().count()).sum::<usize>(),
            "parsed piece"
        );
        Ok(music)
    }

    /// The next token's kind without consuming it.
    fn peek(&mut self) -> Result<Option<TokenKind>, ParseError> {
        if self.lookahead.is_none() {
            self.lookahead = self.lexer.next().transpose()?;
        }
        Ok(self.lookahead.as_ref().map(|token| token.kind.clone()))
    }

    fn bump(&mut self) -> Result<Option<Token>, ParseError> {
        match self.lookahead.take() {
            Some(token) => Ok(Some(token)),
            None => Ok(self.lexer.next().transpose()?),
        }
    }

    fn locate(&self, token: &Token) -> Position {
        self.locate_offset(token.offset)
    }

    fn locate_offset(&self, offset: usize) -> Position {
        Position::locate(self.source, offset)
    }

    fn unexpected(&self, token: &Token, expected: &'static str) -> ParseError {
        let position = self.locate(token);
        ParseError::UnexpectedToken {
            found: format!("'{}'", token.kind),
            expected,
            line: position.line,
            column: position.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::duration::Duration;
    use pretty_assertions::assert_eq;

    fn note(letter: char) -> Element {
        let (name, octave) = NoteName::from_letter(letter).unwrap();
        Note::new(Pitch::new(name, octave)).into()
    }

    fn bar(letters: &str) -> Bar {
        Bar::new(letters.chars().map(note).collect())
    }

    fn body(input: &str) -> Vec<Sequence> {
        let music = parse(input).unwrap();
        assert_eq!(music.voices.len(), 1);
        music.voices.into_iter().next().unwrap().sequences
    }

    #[test]
    fn test_parse_minimal() {
        let music = parse("X:1\nT:Test\nK:C\n").unwrap();
        assert_eq!(music.index, 1);
        assert_eq!(music.title, "Test");
        assert_eq!(music.key.code, "C");
        assert_eq!(music.voices, vec![Voice::default()]);
    }

    #[test]
    fn test_parse_header_fields() {
        let music = parse("X:3\nT:Air\nT:Variant\nC:Trad.\nM:3/4\nL:1/4\nQ:1/4=90\nK:Bb\nB2 c|\n").unwrap();
        assert_eq!(music.index, 3);
        assert_eq!(music.subtitles, vec!["Variant".to_string()]);
        assert_eq!(music.composer.as_deref(), Some("Trad."));
        assert_eq!(music.meter, Duration::new(3, 4));
        assert_eq!(music.default_length, Duration::new(1, 4));
        assert_eq!(music.tempo, 90);
        assert_eq!(music.key.shift, -1);
    }

    #[test]
    fn test_default_length_inferred_from_meter() {
        assert_eq!(parse("M:2/4\nK:C\nC").unwrap().default_length, Duration::new(1, 16));
        assert_eq!(parse("M:6/8\nK:C\nC").unwrap().default_length, Duration::new(1, 8));
        assert_eq!(parse("C").unwrap().default_length, Duration::new(1, 8));
    }

    #[test]
    fn test_invalid_default_length() {
        let err = parse("X:1\nL:7\nK:C\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: 'L', .. }));
    }

    #[test]
    fn test_invalid_key() {
        assert_eq!(
            parse("K:H\nC").unwrap_err(),
            ParseError::InvalidKey("H".to_string())
        );
    }

    #[test]
    fn test_single_note() {
        assert_eq!(body("C"), vec![bar("C").into()]);
    }

    #[test]
    fn test_repeat_without_start() {
        assert_eq!(body("C E G :|"), vec![Repeat::new(vec![bar("CEG")]).into()]);
    }

    #[test]
    fn test_repeat_with_start() {
        assert_eq!(
            body("C |: A | D | :| F"),
            vec![
                bar("C").into(),
                Repeat::new(vec![bar("A"), bar("D")]).into(),
                bar("F").into(),
            ]
        );
    }

    #[test]
    fn test_nth_endings() {
        let expected = Repeat {
            normal: vec![bar("C")],
            first_ending: vec![bar("D")],
            second_ending: vec![bar("F")],
        };
        assert_eq!(body("C | [1 D :| [2 F"), vec![expected.into()]);
    }

    #[test]
    fn test_nth_endings_compact() {
        let expected = Repeat {
            normal: vec![bar("CD"), bar("EF")],
            first_ending: vec![bar("CD")],
            second_ending: vec![bar("AB"), bar("c")],
        };
        assert_eq!(
            body("CD|EF|[1CD:|[2AB|c|]d"),
            vec![expected.into(), bar("d").into()]
        );
    }

    #[test]
    fn test_many_repeats() {
        assert_eq!(
            body("C :| D | E :| F"),
            vec![
                Repeat::new(vec![bar("C")]).into(),
                Repeat::new(vec![bar("D"), bar("E")]).into(),
                bar("F").into(),
            ]
        );
        assert_eq!(
            body("C || D | E :| F :|"),
            vec![
                bar("C").into(),
                Repeat::new(vec![bar("D"), bar("E")]).into(),
                Repeat::new(vec![bar("F")]).into(),
            ]
        );
        assert_eq!(
            body("C |] D | E | F :|"),
            vec![
                bar("C").into(),
                Repeat::new(vec![bar("D"), bar("E"), bar("F")]).into(),
            ]
        );
    }

    #[test]
    fn test_comment_between_endings() {
        let expected = Repeat {
            normal: vec![bar("A")],
            first_ending: vec![bar("B")],
            second_ending: vec![bar("c")],
        };
        assert_eq!(body("A | [1 B :| % second time\n[2 c"), vec![expected.into()]);
    }

    #[test]
    fn test_chord_with_accidental() {
        let c = Pitch::new(NoteName::C, 0);
        let e = Pitch::new(NoteName::E, 0);
        assert_eq!(
            body("[^CE]"),
            vec![Bar::new(vec![
                Accidental::new(c, 1).into(),
                Chord {
                    notes: vec![Note::new(c), Note::new(e)]
                }
                .into(),
            ])
            .into()]
        );
    }

    #[test]
    fn test_tuplet_with_accidental() {
        let mut tuplet = Tuplet::new(3);
        tuplet.push(note('C'));
        tuplet.push(Accidental::new(Pitch::new(NoteName::E, 0), 1).into());
        tuplet.push(note('E'));
        tuplet.push(note('G'));
        assert_eq!(body("(3C^EG"), vec![Bar::new(vec![tuplet.into()]).into()]);
    }

    #[test]
    fn test_tuplet_releases_fourth_note() {
        let sequences = body("(3CDEF");
        let Sequence::Bar(bar) = &sequences[0] else {
            panic!("expected a bar");
        };
        assert_eq!(bar.elements.len(), 2);
        assert_eq!(bar.elements[1], note('F'));
    }

    #[test]
    fn test_tuplet_rests_do_not_count() {
        let music = parse("X:1\nK:C\nL:1/8\nM:4/4\n(3zCDE F|\n").unwrap();
        let Sequence::Bar(bar) = &music.voices[0].sequences[0] else {
            panic!("expected a bar");
        };
        let Element::Tuplet(tuplet) = &bar.elements[0] else {
            panic!("expected a tuplet");
        };
        assert_eq!(
            tuplet.elements,
            vec![Rest::new(Duration::unit()).into(), note('C'), note('D'), note('E')]
        );
        assert_eq!(&bar.elements[1..], &[note('F')]);
    }

    #[test]
    fn test_tuplet_chords_do_not_count() {
        let sequences = body("(2[CE]DE F");
        let Sequence::Bar(bar) = &sequences[0] else {
            panic!("expected a bar");
        };
        let Element::Tuplet(tuplet) = &bar.elements[0] else {
            panic!("expected a tuplet");
        };
        assert_eq!(tuplet.elements.len(), 3);
        assert_eq!(&tuplet.elements[1..], &[note('D'), note('E')]);
        assert_eq!(&bar.elements[1..], &[note('F')]);
    }

    #[test]
    fn test_chord_length_overflow_is_error() {
        assert_eq!(
            parse("X:1\nK:C\nL:1/8\nM:4/4\n[C99999]99999|\n").unwrap_err(),
            ParseError::DurationOverflow { line: 5, column: 1 }
        );
    }

    #[test]
    fn test_tuplet_across_bar_line_is_error() {
        assert!(matches!(
            parse("(3 C D | E").unwrap_err(),
            ParseError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            parse("(3 C D").unwrap_err(),
            ParseError::UnexpectedEnd { .. }
        ));
    }

    #[test]
    fn test_misplaced_second_ending() {
        let err = parse("C | [2 D").unwrap_err();
        let ParseError::UnexpectedToken { found, line, column, .. } = err else {
            panic!("expected an unexpected-token error");
        };
        assert_eq!(found, "'[2'");
        assert_eq!((line, column), (1, 5));
    }

    #[test]
    fn test_lex_error_propagates() {
        assert!(matches!(
            parse("K:C\nC ^^^D").unwrap_err(),
            ParseError::Lex(_)
        ));
    }

    #[test]
    fn test_voices() {
        let music = parse("X:1\nV:Hi\nV:Lo\nK:C\nc d|\nV:Lo\nC, D,|\nV:Hi\ne f|\n").unwrap();
        assert_eq!(music.voices.len(), 2);
        let upper = music.voice(Some("Hi")).unwrap();
        assert_eq!(upper.sequences, vec![bar("cd").into(), bar("ef").into()]);
        let lower = music.voice(Some("Lo")).unwrap();
        assert_eq!(lower.apparent_bars().count(), 1);
    }

    #[test]
    fn test_body_voice_created_on_switch() {
        let music = parse("K:C\nC|\nV:2\nD|\n").unwrap();
        assert_eq!(music.voices.len(), 2);
        assert_eq!(music.voices[0].name, None);
        assert_eq!(music.voices[1].name.as_deref(), Some("2"));
    }

    #[test]
    fn test_empty_piece_has_one_voice() {
        let music = parse("").unwrap();
        assert_eq!(music.voices.len(), 1);
        assert!(music.voices[0].sequences.is_empty());
    }
}
