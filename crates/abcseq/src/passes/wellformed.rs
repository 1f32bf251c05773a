//! Well-formedness checking: bar lengths against the meter and chord note
//! lengths against each chord's first note.

use tracing::debug;

use crate::ast::{Chord, Element, Music};
use crate::duration::Duration;
use crate::feedback::{Feedback, FeedbackCollector};

/// Check every bar of every voice, repeats expanded.
pub fn check(music: &Music) -> FeedbackCollector {
    let mut collector = FeedbackCollector::new();

    for voice in &music.voices {
        let name = voice.name.as_deref();
        for (index, bar) in voice.apparent_bars().enumerate() {
            let number = index + 1;
            let mut total = Some(Duration::zero());
            for element in &bar.elements {
                check_chords(element, name, number, &mut collector);
                total = total.and_then(|sum| {
                    let length = element.duration()?.checked_times(music.default_length)?;
                    sum.checked_add(length)
                });
            }
            match total {
                Some(total) if total != music.meter => {
                    collector.push(Feedback::bar_length(name, number, music.meter, total));
                }
                Some(_) => {}
                None => collector.push(Feedback::bar_overflow(name, number)),
            }
        }
    }

    debug!(diagnostics = collector.len(), "checked well-formedness");
    collector
}

fn check_chords(element: &Element, voice: Option<&str>, bar: usize, collector: &mut FeedbackCollector) {
    match element {
        Element::Chord(chord) => check_chord(chord, voice, bar, collector),
        Element::Tuplet(tuplet) => {
            for child in &tuplet.elements {
                check_chords(child, voice, bar, collector);
            }
        }
        Element::Note(_) | Element::Rest(_) | Element::Accidental(_) => {}
    }
}

fn check_chord(chord: &Chord, voice: Option<&str>, bar: usize, collector: &mut FeedbackCollector) {
    let expected = chord.duration();
    for note in &chord.notes {
        if note.duration != expected {
            collector.push(Feedback::chord_length(voice, bar, expected, note.duration));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackKind;
    use crate::parser::parse;

    fn diagnostics(input: &str) -> Vec<Feedback> {
        check(&parse(input).unwrap()).into_feedback()
    }

    #[test]
    fn test_full_bar_is_clean() {
        assert!(diagnostics("M:4/4\nL:1/4\nK:C\nC D E F | G2 A2 |\n").is_empty());
    }

    #[test]
    fn test_short_bar_reported_once() {
        let found = diagnostics("M:4/4\nL:1/4\nK:C\nC D E | C D E F |\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bar, 1);
        assert_eq!(
            found[0].kind,
            FeedbackKind::BarLength {
                expected: Duration::new(4, 4),
                actual: Duration::new(3, 4),
            }
        );
    }

    #[test]
    fn test_default_length_scales_bar() {
        // eight eighth notes fill 4/4 under the inferred L:1/8
        assert!(diagnostics("M:4/4\nK:C\nCDEF GABc|\n").is_empty());
    }

    #[test]
    fn test_repeats_checked_per_pass() {
        let found = diagnostics("M:4/4\nL:1/4\nK:C\n|: C D E F | C D E :|\n");
        let bars: Vec<_> = found.iter().map(|f| f.bar).collect();
        assert_eq!(bars, vec![2, 4]);
    }

    #[test]
    fn test_chord_lengths() {
        let found = diagnostics("M:4/4\nL:1/4\nK:C\n[C2E] C2 |\n");
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].kind,
            FeedbackKind::ChordLength {
                expected: Duration::new(2, 1),
                found: Duration::new(1, 1),
            }
        );
    }

    #[test]
    fn test_accidentals_take_no_time() {
        assert!(diagnostics("M:2/4\nL:1/4\nK:C\n^C _D |\n").is_empty());
    }

    #[test]
    fn test_bar_too_long_to_count() {
        let found = diagnostics("M:4/4\nL:1/1\nK:C\nC | C/65537 C/65539 | C |\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bar, 2);
        assert_eq!(found[0].kind, FeedbackKind::BarOverflow);
    }

    #[test]
    fn test_long_notes_add_up() {
        let found = diagnostics("M:4/4\nL:1/4\nK:C\nC4294967295 C|\n");
        assert_eq!(
            found[0].kind,
            FeedbackKind::BarLength {
                expected: Duration::new(4, 4),
                actual: Duration::new(1_073_741_824, 1),
            }
        );
    }

    #[test]
    fn test_bar_numbers_reset_per_voice() {
        let found = diagnostics("M:2/4\nL:1/4\nK:C\nV:1\nC D | E |\nV:2\nC |\n");
        let located: Vec<_> = found
            .iter()
            .map(|f| (f.voice.as_deref(), f.bar))
            .collect();
        assert_eq!(located, vec![(Some("1"), 2), (Some("2"), 1)]);
        assert!(found[0].to_string().starts_with("In Voice 1, Bar 2, "));
    }
}
