//! Canonical ABC text for a parsed piece.
//!
//! The output always reparses to an equal tree: every header field is
//! written explicitly, repeats are always opened with `|:`, and a second
//! ending is always closed with `||`. Elements are separated by spaces so no
//! body line can be mistaken for a header field. A `%` in a title, composer
//! or voice name is written as `\%` so it is not read back as a comment.

use std::fmt;

use crate::ast::{Accidental, Bar, Element, Music, Repeat, Sequence, Voice};
use crate::duration::Duration;
use crate::parser::{Barline, TokenKind};

/// Render `music` as ABC notation.
pub fn to_abc(music: &Music) -> String {
    AbcText(music).to_string()
}

/// Display adapter writing the canonical form.
pub struct AbcText<'a>(pub &'a Music);

impl fmt::Display for AbcText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let music = self.0;
        writeln!(f, "X:{}", music.index)?;
        if !music.title.is_empty() {
            writeln!(f, "T:{}", escape_text(&music.title))?;
        }
        for subtitle in &music.subtitles {
            writeln!(f, "T:{}", escape_text(subtitle))?;
        }
        if let Some(composer) = &music.composer {
            writeln!(f, "C:{}", escape_text(composer))?;
        }
        writeln!(f, "M:{}/{}", music.meter.numerator, music.meter.denominator)?;
        writeln!(
            f,
            "L:{}/{}",
            music.default_length.numerator, music.default_length.denominator
        )?;
        writeln!(f, "Q:{}", music.tempo)?;
        writeln!(f, "K:{}", music.key.code)?;

        for voice in &music.voices {
            write_voice(f, voice)?;
        }
        Ok(())
    }
}

fn write_voice(f: &mut fmt::Formatter<'_>, voice: &Voice) -> fmt::Result {
    if let Some(name) = &voice.name {
        writeln!(f, "V:{}", escape_text(name))?;
    }
    if voice.sequences.is_empty() {
        // a bare bar line still creates the voice on reparse
        return writeln!(f, "{}", Barline::Single.symbol());
    }

    let mut words = Vec::new();
    for sequence in &voice.sequences {
        match sequence {
            Sequence::Bar(bar) => {
                words.push(bar_text(bar));
                words.push(Barline::Single.symbol().to_string());
            }
            Sequence::Repeat(repeat) => repeat_words(repeat, &mut words),
        }
    }
    if voice.begin_repeat_seen {
        words.push(Barline::RepeatStart.symbol().to_string());
    }
    writeln!(f, "{}", words.join(" "))
}

fn repeat_words(repeat: &Repeat, words: &mut Vec<String>) {
    let bars = |bars: &[Bar], words: &mut Vec<String>| {
        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                words.push(Barline::Single.symbol().to_string());
            }
            words.push(bar_text(bar));
        }
    };

    words.push(Barline::RepeatStart.symbol().to_string());
    bars(&repeat.normal, words);
    if !repeat.first_ending.is_empty() || !repeat.second_ending.is_empty() {
        words.push(TokenKind::NthEnding(1).to_string());
        bars(&repeat.first_ending, words);
        words.push(Barline::RepeatEnd.symbol().to_string());
        if !repeat.second_ending.is_empty() {
            words.push(TokenKind::NthEnding(2).to_string());
            bars(&repeat.second_ending, words);
            words.push(Barline::Double.symbol().to_string());
        }
    } else {
        words.push(Barline::RepeatEnd.symbol().to_string());
    }
}

fn bar_text(bar: &Bar) -> String {
    elements_text(&bar.elements)
}

/// Elements separated by spaces. Accidentals are written directly in front
/// of their note; accidentals preceding a chord go in front of the matching
/// chord note.
fn elements_text(elements: &[Element]) -> String {
    let mut words = Vec::new();
    let mut pending: Vec<&Accidental> = Vec::new();

    for element in elements {
        match element {
            Element::Accidental(accidental) => pending.push(accidental),
            Element::Note(note) => {
                let mut word = String::new();
                if let Some(position) = pending.iter().position(|a| a.pitch == note.pitch) {
                    word.push_str(&accidental_symbol(pending.remove(position)));
                }
                word.push_str(&note.pitch.to_string());
                word.push_str(&suffix(note.duration));
                words.push(word);
            }
            Element::Rest(rest) => words.push(format!("z{}", suffix(rest.duration))),
            Element::Chord(chord) => {
                let mut word = String::from("[");
                for note in &chord.notes {
                    if let Some(position) = pending.iter().position(|a| a.pitch == note.pitch) {
                        word.push_str(&accidental_symbol(pending.remove(position)));
                    }
                    word.push_str(&note.pitch.to_string());
                    word.push_str(&suffix(note.duration));
                }
                word.push(']');
                words.push(word);
            }
            Element::Tuplet(tuplet) => {
                words.push(TokenKind::Tuplet(tuplet.size).to_string());
                let inner = elements_text(&tuplet.elements);
                if !inner.is_empty() {
                    words.push(inner);
                }
            }
        }
    }
    words.join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('%', "\\%")
}

fn accidental_symbol(accidental: &Accidental) -> String {
    TokenKind::Accidental(accidental.value).to_string()
}

/// Length suffix in lowest terms: "" for 1, "3" for 3/1, "/4" for 1/4.
fn suffix(duration: Duration) -> String {
    let d = duration.reduced();
    match (d.numerator, d.denominator) {
        (1, 1) => String::new(),
        (n, 1) => n.to_string(),
        (1, den) => format!("/{}", den),
        (n, den) => format!("{}/{}", n, den),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn round_trip(input: &str) {
        let music = parse(input).unwrap();
        let text = to_abc(&music);
        let reparsed = parse(&text).unwrap_or_else(|e| panic!("{e}\n{text}"));
        assert_eq!(reparsed, music, "canonical text:\n{text}");
    }

    #[test]
    fn test_canonical_header() {
        let music = parse("T:Song\nK:Em\nE2 G|").unwrap();
        let text = to_abc(&music);
        assert_eq!(
            text,
            "X:1\nT:Song\nM:4/4\nL:1/8\nQ:120\nK:Em\nE2 G |\n"
        );
    }

    #[test]
    fn test_suffix_forms() {
        assert_eq!(suffix(Duration::new(2, 4)), "/2");
        assert_eq!(suffix(Duration::new(3, 1)), "3");
        assert_eq!(suffix(Duration::new(3, 8)), "3/8");
        assert_eq!(suffix(Duration::unit()), "");
    }

    #[test]
    fn test_round_trip_plain_and_repeats() {
        round_trip("X:4\nT:A\nT:B\nC:Someone\nM:3/4\nL:1/4\nQ:1/4=96\nK:D\nA B c | d2 e |: f g a :| b3 | C :|\n");
    }

    #[test]
    fn test_round_trip_endings() {
        round_trip("K:C\nCD|EF|[1CD:|[2AB|c|]d\n");
        round_trip("K:C\nA | [1 B :| C\n");
    }

    #[test]
    fn test_round_trip_elements() {
        round_trip("K:F\n^c'' __B,, =E z/ C3/4 [^CE_G]2 (3C^DE (2z[CE] F G|\n");
    }

    #[test]
    fn test_round_trip_voices() {
        round_trip("K:C\nC|\nV:2\nD|\nV:3\n|\n");
        round_trip("V:Hi\nV:Lo\nK:G\nV:Hi\nc|\nV:Lo\nC,|\n");
    }

    #[test]
    fn test_percent_in_text_fields() {
        let music = parse("T:100\\% Reel\nT:50\\%\nC:Trad. % collected\nV:A\\%\nK:C\nC|\n").unwrap();
        assert_eq!(music.title, "100% Reel");
        assert_eq!(music.composer.as_deref(), Some("Trad."));
        assert_eq!(music.voices[0].name.as_deref(), Some("A%"));

        let text = to_abc(&music);
        assert!(text.contains("T:100\\% Reel\nT:50\\%\n"), "{text}");
        round_trip("T:100\\% Reel\nT:50\\%\nC:Trad. % collected\nV:A\\%\nK:C\nC|\n");
    }

    #[test]
    fn test_round_trip_unclosed_repeat() {
        round_trip("K:C\nC |: D | E\n");
    }
}
