//! Linearization: the tree flattened into absolute-time note events.
//!
//! Each voice starts at tick 0. Within a bar, accidentals hold for the rest
//! of the bar for every octave of their letter, starting from the key
//! signature's defaults. Inside a tuplet, child lengths are multiplied by the
//! tuplet's scale. A chord's notes all start together, last as long as its
//! first note, and advance time once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ast::{Accidental, Element, Music, Note, NoteName, Pitch};
use crate::duration::Duration;
use crate::error::ParseError;

/// One note to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Fully resolved pitch (key, bar accidentals and octave applied)
    pub pitch: Pitch,
    /// Index of the voice in `Music::voices`
    pub voice: usize,
    pub start: u32,
    pub duration: u32,
}

impl NoteEvent {
    /// MIDI note number for the resolved pitch.
    pub fn device_note(&self) -> u8 {
        self.pitch.to_midi_note()
    }
}

/// Accidentals in force for the current bar.
struct BarScope {
    accidentals: HashMap<NoteName, Accidental>,
}

impl BarScope {
    fn new(defaults: &HashMap<NoteName, Accidental>) -> Self {
        BarScope {
            accidentals: defaults.clone(),
        }
    }

    fn record(&mut self, accidental: &Accidental) {
        self.accidentals
            .insert(accidental.pitch.name, accidental.clone());
    }

    fn resolve(&self, pitch: Pitch) -> Pitch {
        match self.accidentals.get(&pitch.name) {
            Some(accidental) => Pitch {
                accidental: accidental.value,
                ..pitch
            },
            None => pitch,
        }
    }
}

struct Linearizer<'m> {
    music: &'m Music,
    ticks_per_quarter: u32,
    voice: usize,
    cursor: u32,
    events: Vec<NoteEvent>,
}

impl<'m> Linearizer<'m> {
    /// `duration` in ticks: unit lengths to quarter notes, then the
    /// default length, then the tuplet scale.
    fn ticks(&self, duration: Duration, scale: Duration) -> Result<u32, ParseError> {
        duration
            .to_ticks_wide(self.ticks_per_quarter as u64)
            .and_then(|quarters| quarters.checked_mul(4))
            .and_then(|ticks| self.music.default_length.to_ticks_wide(ticks))
            .and_then(|ticks| scale.to_ticks_wide(ticks))
            .and_then(|ticks| u32::try_from(ticks).ok())
            .ok_or(ParseError::TickOverflow)
    }

    fn advance(&mut self, ticks: u32) -> Result<(), ParseError> {
        self.cursor = self
            .cursor
            .checked_add(ticks)
            .ok_or(ParseError::TickOverflow)?;
        Ok(())
    }

    fn emit(&mut self, pitch: Pitch, duration: u32) {
        trace!(voice = self.voice, start = self.cursor, duration, %pitch, "note");
        self.events.push(NoteEvent {
            pitch,
            voice: self.voice,
            start: self.cursor,
            duration,
        });
    }

    fn element(
        &mut self,
        element: &Element,
        scope: &mut BarScope,
        scale: Duration,
    ) -> Result<(), ParseError> {
        match element {
            Element::Note(note) => {
                let ticks = self.ticks(note.duration, scale)?;
                self.emit(scope.resolve(note.pitch), ticks);
                self.advance(ticks)?;
            }
            Element::Rest(rest) => {
                let ticks = self.ticks(rest.duration, scale)?;
                self.advance(ticks)?;
            }
            Element::Accidental(accidental) => scope.record(accidental),
            Element::Chord(chord) => {
                let ticks = self.ticks(chord.duration(), scale)?;
                for Note { pitch, .. } in &chord.notes {
                    self.emit(scope.resolve(*pitch), ticks);
                }
                self.advance(ticks)?;
            }
            Element::Tuplet(tuplet) => {
                let scale = tuplet.scale();
                for child in &tuplet.elements {
                    self.element(child, scope, scale)?;
                }
            }
        }
        Ok(())
    }
}

/// Flatten the piece into events ordered by voice, then by start tick.
///
/// Fails with [`ParseError::TickOverflow`] if a voice runs past `u32::MAX`
/// ticks.
pub fn linearize(music: &Music, ticks_per_quarter: u32) -> Result<Vec<NoteEvent>, ParseError> {
    let defaults = music.key.default_accidentals();
    let mut linearizer = Linearizer {
        music,
        ticks_per_quarter,
        voice: 0,
        cursor: 0,
        events: Vec::new(),
    };

    for (index, voice) in music.voices.iter().enumerate() {
        linearizer.voice = index;
        linearizer.cursor = 0;
        for bar in voice.apparent_bars() {
            let mut scope = BarScope::new(&defaults);
            for element in &bar.elements {
                linearizer.element(element, &mut scope, Duration::unit())?;
            }
        }
    }

    debug!(events = linearizer.events.len(), "linearized piece");
    Ok(linearizer.events)
}
