//! Note, rest, chord and tuplet grammar.

use crate::ast::{Accidental, Chord, Element, Note, NoteName, Pitch, Rest, Tuplet};
use crate::duration::Duration;
use crate::error::ParseError;
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::Parser;

impl<'a> Parser<'a> {
    /// Parse the musical element starting at `token`.
    ///
    /// An accidental yields the Accidental followed by its Note. A chord
    /// yields the accidentals of its notes followed by the Chord.
    pub(super) fn element(&mut self, token: &Token) -> Result<Vec<Element>, ParseError> {
        match token.kind {
            TokenKind::NoteLetter(letter) => Ok(vec![self.note(letter, token)?.into()]),
            TokenKind::Rest => Ok(vec![Rest::new(self.duration_suffix()?).into()]),
            TokenKind::Accidental(value) => {
                let (accidental, note) = self.accidental_note(value, token)?;
                Ok(vec![accidental.into(), note.into()])
            }
            TokenKind::ChordStart => self.chord(token),
            TokenKind::Tuplet(size) => Ok(vec![Tuplet::new(size).into()]),
            _ => Err(self.unexpected(token, "a note, rest, chord, tuplet or bar line")),
        }
    }

    fn accidental_note(
        &mut self,
        value: i8,
        token: &Token,
    ) -> Result<(Accidental, Note), ParseError> {
        let dangling = |parser: &Self| {
            let position = parser.locate(token);
            ParseError::DanglingAccidental {
                line: position.line,
                column: position.column,
            }
        };

        let Some(next) = self.bump()? else {
            return Err(dangling(&*self));
        };
        let TokenKind::NoteLetter(letter) = &next.kind else {
            return Err(dangling(&*self));
        };
        let note = self.note(*letter, &next)?;
        Ok((Accidental::new(note.pitch, value), note))
    }

    /// A note letter with its octave marks and length suffix.
    fn note(&mut self, letter: char, token: &Token) -> Result<Note, ParseError> {
        let (name, octave) =
            NoteName::from_letter(letter).ok_or_else(|| self.unexpected(token, "a note letter"))?;

        let mut shift: i8 = 0;
        while let Some(TokenKind::Octave(marks)) = self.peek()? {
            let offset = self.bump()?.map_or(token.offset, |t| t.offset);
            if shift != 0 && shift.signum() != marks.signum() {
                let position = self.locate_offset(offset);
                return Err(ParseError::MixedOctave {
                    line: position.line,
                    column: position.column,
                });
            }
            shift = shift.saturating_add(marks);
        }

        let pitch = Pitch::new(name, octave).octave_transpose(shift);
        Ok(Note::with_duration(pitch, self.duration_suffix()?))
    }

    /// Optional `num`, then optional `/` with optional `denom`.
    ///
    /// `C` is 1/1, `C3` is 3/1, `C/` is 1/2, `C3/4` is 3/4.
    pub(super) fn duration_suffix(&mut self) -> Result<Duration, ParseError> {
        let mut numerator = 1;
        if let Some(TokenKind::Digits(n)) = self.peek()? {
            numerator = n;
            self.bump()?;
        }

        let mut denominator = 1;
        if let Some(TokenKind::FractionBar) = self.peek()? {
            self.bump()?;
            denominator = 2;
            if let Some(TokenKind::Digits(d)) = self.peek()? {
                denominator = d;
                if let Some(token) = self.bump()? {
                    if denominator == 0 {
                        return Err(self.unexpected(&token, "a non-zero denominator"));
                    }
                }
            }
        }

        Ok(Duration::new(numerator, denominator))
    }

    /// Notes up to the closing `]`, then an optional length suffix that
    /// multiplies every note.
    fn chord(&mut self, start: &Token) -> Result<Vec<Element>, ParseError> {
        let mut elements = Vec::new();
        let mut notes = Vec::new();

        loop {
            let Some(token) = self.bump()? else {
                return Err(ParseError::UnexpectedEnd {
                    expected: "']' to close the chord",
                });
            };
            match token.kind {
                TokenKind::NoteLetter(letter) => notes.push(self.note(letter, &token)?),
                TokenKind::Accidental(value) => {
                    let (accidental, note) = self.accidental_note(value, &token)?;
                    elements.push(accidental.into());
                    notes.push(note);
                }
                TokenKind::ChordEnd if !notes.is_empty() => break,
                TokenKind::ChordEnd => {
                    return Err(self.unexpected(&token, "at least one note in the chord"))
                }
                _ => return Err(self.unexpected(&token, "a note or ']'")),
            }
        }

        if matches!(
            self.peek()?,
            Some(TokenKind::Digits(_) | TokenKind::FractionBar)
        ) {
            let factor = self.duration_suffix()?;
            for note in &mut notes {
                note.duration = note.duration.checked_times(factor).ok_or_else(|| {
                    let position = self.locate(start);
                    ParseError::DurationOverflow {
                        line: position.line,
                        column: position.column,
                    }
                })?;
            }
        }

        elements.push(Chord { notes }.into());
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements(input: &str) -> Vec<Element> {
        let mut parser = Parser::new(input);
        let token = parser.bump().unwrap().unwrap();
        parser.element(&token).unwrap()
    }

    fn element_error(input: &str) -> ParseError {
        let mut parser = Parser::new(input);
        let token = parser.bump().unwrap().unwrap();
        parser.element(&token).unwrap_err()
    }

    fn only_note(input: &str) -> Note {
        match elements(input).remove(0) {
            Element::Note(note) => note,
            other => panic!("expected a note, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_note_is_unit_length() {
        let note = only_note("C");
        assert_eq!(note.pitch, Pitch::new(NoteName::C, 0));
        assert_eq!(note.duration, Duration::unit());
    }

    #[test]
    fn test_duration_suffixes() {
        assert_eq!(only_note("C3").duration, Duration::new(3, 1));
        assert_eq!(only_note("C/").duration, Duration::new(1, 2));
        assert_eq!(only_note("C/4").duration, Duration::new(1, 4));
        assert_eq!(only_note("C3/4").duration, Duration::new(3, 4));
        assert_eq!(only_note("C3/").duration, Duration::new(3, 2));
    }

    #[test]
    fn test_zero_denominator_rejected() {
        assert!(matches!(
            element_error("C/0"),
            ParseError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_octave_marks() {
        assert_eq!(only_note("c'").pitch.octave, 2);
        assert_eq!(only_note("C,,").pitch.octave, -2);
        // separate runs accumulate
        assert_eq!(only_note("c' '").pitch.octave, 3);
    }

    #[test]
    fn test_mixed_octave_runs_rejected() {
        let err = element_error("c' ,");
        assert_eq!(err, ParseError::MixedOctave { line: 1, column: 4 });
    }

    #[test]
    fn test_accidental_precedes_note() {
        let parsed = elements("__B,");
        assert_eq!(parsed.len(), 2);
        let Element::Accidental(accidental) = &parsed[0] else {
            panic!("expected an accidental");
        };
        assert_eq!(accidental.value, -2);
        assert_eq!(accidental.pitch, Pitch::new(NoteName::B, -1));
        let Element::Note(note) = &parsed[1] else {
            panic!("expected a note");
        };
        assert_eq!(note.pitch.accidental, 0);
    }

    #[test]
    fn test_neutral_accidental() {
        let parsed = elements("=F");
        assert!(matches!(&parsed[0], Element::Accidental(a) if a.value == 0));
    }

    #[test]
    fn test_dangling_accidental() {
        assert_eq!(
            element_error("^ |"),
            ParseError::DanglingAccidental { line: 1, column: 1 }
        );
        assert!(matches!(
            element_error("^"),
            ParseError::DanglingAccidental { .. }
        ));
    }

    #[test]
    fn test_rest() {
        assert_eq!(
            elements("z2"),
            vec![Rest::new(Duration::new(2, 1)).into()]
        );
    }

    #[test]
    fn test_chord_three_notes() {
        let parsed = elements("[CEG]");
        let Element::Chord(chord) = &parsed[0] else {
            panic!("expected a chord");
        };
        let names: Vec<_> = chord.notes.iter().map(|n| n.pitch.name).collect();
        assert_eq!(names, vec![NoteName::C, NoteName::E, NoteName::G]);
        assert!(chord.notes.iter().all(|n| n.duration == Duration::unit()));
    }

    #[test]
    fn test_chord_accidental_hoisted() {
        let parsed = elements("[^CE]");
        assert_eq!(parsed.len(), 2);
        assert!(matches!(&parsed[0], Element::Accidental(a) if a.pitch.name == NoteName::C && a.value == 1));
        assert!(matches!(&parsed[1], Element::Chord(c) if c.notes.len() == 2));
    }

    #[test]
    fn test_chord_suffix_scales_notes() {
        let parsed = elements("[C2E]/");
        let Element::Chord(chord) = &parsed[0] else {
            panic!("expected a chord");
        };
        assert_eq!(chord.notes[0].duration, Duration::unit());
        assert_eq!(chord.notes[1].duration, Duration::new(1, 2));
    }

    #[test]
    fn test_chord_suffix_overflow() {
        assert_eq!(
            element_error("[C99999]99999"),
            ParseError::DurationOverflow { line: 1, column: 1 }
        );
        // large but representable
        let parsed = elements("[C65535]65537");
        let Element::Chord(chord) = &parsed[0] else {
            panic!("expected a chord");
        };
        assert_eq!(chord.notes[0].duration, Duration::new(4_294_967_295, 1));
    }

    #[test]
    fn test_chord_errors() {
        assert!(matches!(element_error("[]"), ParseError::UnexpectedToken { .. }));
        assert!(matches!(element_error("[Cz]"), ParseError::UnexpectedToken { .. }));
        assert!(matches!(element_error("[CE"), ParseError::UnexpectedEnd { .. }));
    }

    #[test]
    fn test_tuplet_marker() {
        assert_eq!(elements("(3"), vec![Tuplet::new(3).into()]);
    }

    #[test]
    fn test_stray_token_at_element_start() {
        assert!(matches!(element_error("]"), ParseError::UnexpectedToken { .. }));
    }
}
