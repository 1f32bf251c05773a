//! Tick resolution: the smallest ticks-per-quarter-note at which every
//! duration in the piece is a whole number of ticks.

use tracing::debug;

use crate::ast::{Bar, Element, Music};
use crate::duration::checked_lcm;
use crate::error::ParseError;

/// LCM of every duration denominator in the piece and the default length's.
///
/// Fails with [`ParseError::TickOverflow`] when that LCM does not fit a `u32`.
pub fn ticks_per_quarter_note(music: &Music) -> Result<u32, ParseError> {
    let ticks = music
        .voices
        .iter()
        .flat_map(|voice| voice.apparent_bars())
        .try_fold(music.default_length.denominator.max(1), |ticks, bar| {
            checked_lcm(ticks, bar_denominator(bar)?)
        })
        .ok_or(ParseError::TickOverflow)?;

    debug!(ticks, "resolved ticks per quarter note");
    Ok(ticks)
}

fn bar_denominator(bar: &Bar) -> Option<u32> {
    bar.elements
        .iter()
        .try_fold(1, |ticks, element| checked_lcm(ticks, element_denominator(element)?))
}

fn element_denominator(element: &Element) -> Option<u32> {
    match element {
        Element::Note(note) => Some(note.duration.denominator),
        Element::Rest(rest) => Some(rest.duration.denominator),
        Element::Accidental(_) => Some(1),
        Element::Chord(chord) => Some(chord.duration().denominator),
        // The tuplet's own scaled length, and every child it plays
        Element::Tuplet(tuplet) => tuplet.elements.iter().try_fold(
            tuplet.duration()?.denominator.max(1),
            |ticks, child| checked_lcm(ticks, element_denominator(child)?),
        ),
    }
}
