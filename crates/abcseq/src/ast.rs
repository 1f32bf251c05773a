//! Abstract Syntax Tree types for ABC notation.
//!
//! The tree is strictly owned top-down: a `Music` owns its voices, a voice
//! owns its sequences, and sequences own their elements. Adding a node moves
//! it into its parent, so a bar or repeat can only ever belong to one voice.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::duration::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Convert to semitone offset from C (0-11)
    pub fn to_semitone(&self) -> i8 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    /// All note names in order
    pub fn all() -> [NoteName; 7] {
        [
            NoteName::C,
            NoteName::D,
            NoteName::E,
            NoteName::F,
            NoteName::G,
            NoteName::A,
            NoteName::B,
        ]
    }

    /// Parse a note letter. Upper case is octave 0, lower case octave 1.
    pub fn from_letter(c: char) -> Option<(NoteName, i8)> {
        let name = NoteName::parse(c)?;
        let octave = if c.is_ascii_lowercase() { 1 } else { 0 };
        Some((name, octave))
    }

    /// Parse from a single letter (case-insensitive)
    pub fn parse(c: char) -> Option<NoteName> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        }
    }
}

/// A pitch: note letter, octave and accidental shift in semitones.
///
/// Equality and hashing consider only the letter and octave. The accidental
/// shift is what a measure's accidentals modify, so lookups key on the
/// unmodified pitch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pitch {
    pub name: NoteName,
    /// 0 = C-B (middle C octave), 1 = c-b, -1 = C,-B,
    pub octave: i8,
    pub accidental: i8,
}

impl Pitch {
    pub fn new(name: NoteName, octave: i8) -> Self {
        Pitch {
            name,
            octave,
            accidental: 0,
        }
    }

    /// A new pitch shifted by `semitones` from this one.
    pub fn accidental_transpose(&self, semitones: i8) -> Self {
        Pitch {
            accidental: self.accidental + semitones,
            ..*self
        }
    }

    /// A new pitch shifted by `octaves`.
    pub fn octave_transpose(&self, octaves: i8) -> Self {
        Pitch {
            octave: self.octave + octaves,
            ..*self
        }
    }

    /// Convert to a MIDI note number. Upper-case `C` is middle C (60).
    pub fn to_midi_note(&self) -> u8 {
        let base = self.name.to_semitone() as i16;
        let octave_offset = (self.octave as i16 + 5) * 12;
        (base + octave_offset + self.accidental as i16).clamp(0, 127) as u8
    }
}

impl PartialEq for Pitch {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.octave == other.octave
    }
}

impl Eq for Pitch {}

impl Hash for Pitch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.octave.hash(state);
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.accidental {
            2 => "^^",
            1 => "^",
            -1 => "_",
            -2 => "__",
            _ => "",
        };
        f.write_str(symbol)?;
        if self.octave >= 1 {
            write!(f, "{}", self.name.to_char().to_ascii_lowercase())?;
            for _ in 1..self.octave {
                f.write_str("'")?;
            }
        } else {
            write!(f, "{}", self.name.to_char())?;
            for _ in self.octave..0 {
                f.write_str(",")?;
            }
        }
        Ok(())
    }
}

/// A single note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    pub duration: Duration,
}

impl Note {
    /// Create a simple note with default duration
    pub fn new(pitch: Pitch) -> Self {
        Note {
            pitch,
            duration: Duration::unit(),
        }
    }

    pub fn with_duration(pitch: Pitch, duration: Duration) -> Self {
        Note { pitch, duration }
    }
}

/// Rest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub duration: Duration,
}

impl Rest {
    pub fn new(duration: Duration) -> Self {
        Rest { duration }
    }
}

/// A sharp, flat or natural that holds for the rest of the measure.
///
/// It has no length of its own; it changes how later notes of the same letter
/// sound until the next bar line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accidental {
    pub pitch: Pitch,
    pub value: i8,
}

impl Accidental {
    pub fn new(pitch: Pitch, value: i8) -> Self {
        Accidental { pitch, value }
    }

    /// The base pitch with this accidental's shift applied.
    pub fn modified_pitch(&self) -> Pitch {
        self.pitch.accidental_transpose(self.value)
    }
}

/// Chord (simultaneous notes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub notes: Vec<Note>,
}

impl Chord {
    /// A chord lasts as long as its first note.
    pub fn duration(&self) -> Duration {
        self.notes
            .first()
            .map(|n| n.duration)
            .unwrap_or_else(Duration::zero)
    }
}

/// Tuplet: `size` notes played with a scaled length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuplet {
    pub size: u32,
    pub elements: Vec<Element>,
    notes: u32,
}

impl Tuplet {
    pub fn new(size: u32) -> Self {
        Tuplet {
            size,
            elements: Vec::new(),
            notes: 0,
        }
    }

    /// Append a child. Only notes count toward the tuplet's size; rests,
    /// chords and accidentals ride along.
    pub fn push(&mut self, element: Element) {
        if matches!(element, Element::Note(_)) {
            self.notes += 1;
        }
        self.elements.push(element);
    }

    /// True once `size` notes have been absorbed.
    pub fn is_full(&self) -> bool {
        self.notes >= self.size
    }

    /// Length multiplier: 2 in the time of 3, 3 in 2, 4 in 3.
    /// Unsupported sizes scale to zero.
    pub fn scale(&self) -> Duration {
        match self.size {
            2 => Duration::new(3, 2),
            3 => Duration::new(2, 3),
            4 => Duration::new(3, 4),
            _ => Duration::zero(),
        }
    }

    /// The first timed child's length, scaled. `None` if that does not fit.
    pub fn duration(&self) -> Option<Duration> {
        let first = match self.elements.iter().find(|e| e.is_timed()) {
            Some(element) => element.duration()?,
            None => Duration::zero(),
        };
        match self.size {
            2..=4 => first.checked_times(self.scale()),
            _ => Some(Duration::zero()),
        }
    }
}

/// A music element inside a bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Note(Note),
    Rest(Rest),
    Accidental(Accidental),
    Chord(Chord),
    Tuplet(Tuplet),
}

impl Element {
    /// Length in unit notes; only a tuplet can fail to represent its own.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Element::Note(n) => Some(n.duration),
            Element::Rest(r) => Some(r.duration),
            Element::Accidental(_) => Some(Duration::zero()),
            Element::Chord(c) => Some(c.duration()),
            Element::Tuplet(t) => t.duration(),
        }
    }

    /// Elements that take up time (everything except accidentals).
    pub fn is_timed(&self) -> bool {
        !matches!(self, Element::Accidental(_))
    }
}

impl From<Note> for Element {
    fn from(n: Note) -> Self {
        Element::Note(n)
    }
}

impl From<Rest> for Element {
    fn from(r: Rest) -> Self {
        Element::Rest(r)
    }
}

impl From<Accidental> for Element {
    fn from(a: Accidental) -> Self {
        Element::Accidental(a)
    }
}

impl From<Chord> for Element {
    fn from(c: Chord) -> Self {
        Element::Chord(c)
    }
}

impl From<Tuplet> for Element {
    fn from(t: Tuplet) -> Self {
        Element::Tuplet(t)
    }
}

/// One measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Bar {
    pub elements: Vec<Element>,
}

impl Bar {
    pub fn new(elements: Vec<Element>) -> Self {
        Bar { elements }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// A repeated section with optional first and second endings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Repeat {
    pub normal: Vec<Bar>,
    pub first_ending: Vec<Bar>,
    pub second_ending: Vec<Bar>,
}

impl Repeat {
    pub fn new(normal: Vec<Bar>) -> Self {
        Repeat {
            normal,
            first_ending: Vec::new(),
            second_ending: Vec::new(),
        }
    }

    /// The bars as played: normal, first ending, normal again, second ending.
    /// Nothing is copied; the expansion is a view over the stored bars.
    pub fn apparent_bars(&self) -> impl Iterator<Item = &Bar> + '_ {
        self.normal
            .iter()
            .chain(self.first_ending.iter())
            .chain(self.normal.iter())
            .chain(self.second_ending.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.first_ending.is_empty() && self.second_ending.is_empty()
    }
}

/// A top-level unit of a voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Sequence {
    Bar(Bar),
    Repeat(Repeat),
}

impl Sequence {
    /// The bars this sequence plays, in order.
    pub fn apparent_bars(&self) -> Box<dyn Iterator<Item = &Bar> + '_> {
        match self {
            Sequence::Bar(bar) => Box::new(std::iter::once(bar)),
            Sequence::Repeat(repeat) => Box::new(repeat.apparent_bars()),
        }
    }
}

impl From<Bar> for Sequence {
    fn from(b: Bar) -> Self {
        Sequence::Bar(b)
    }
}

impl From<Repeat> for Sequence {
    fn from(r: Repeat) -> Self {
        Sequence::Repeat(r)
    }
}

/// A voice (track) in the piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Voice {
    pub name: Option<String>,
    pub sequences: Vec<Sequence>,
    /// Set while a `|:` is waiting for its `:|`.
    pub begin_repeat_seen: bool,
}

impl Voice {
    pub fn new(name: Option<String>) -> Self {
        Voice {
            name,
            sequences: Vec::new(),
            begin_repeat_seen: false,
        }
    }

    /// Move a bar or repeat into this voice.
    pub fn push(&mut self, sequence: impl Into<Sequence>) {
        self.sequences.push(sequence.into());
    }

    /// Every bar as played, repeats expanded.
    pub fn apparent_bars(&self) -> impl Iterator<Item = &Bar> + '_ {
        self.sequences.iter().flat_map(Sequence::apparent_bars)
    }
}

/// Key signature, resolved from a key code such as "G", "F#m" or "Bb".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    /// The code as written in the K: field.
    pub code: String,
    /// Letters sharped or flatted by the key, in circle-of-fifths order.
    pub notes: Vec<NoteName>,
    /// +1 sharp, -1 flat, 0 for C major / A minor.
    pub shift: i8,
}

impl KeySignature {
    /// One accidental per affected letter. Keyed by letter so it applies in
    /// every octave.
    pub fn default_accidentals(&self) -> HashMap<NoteName, Accidental> {
        self.notes
            .iter()
            .map(|&name| (name, Accidental::new(Pitch::new(name, 0), self.shift)))
            .collect()
    }
}

impl Default for KeySignature {
    fn default() -> Self {
        KeySignature {
            code: "C".to_string(),
            notes: Vec::new(),
            shift: 0,
        }
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// A complete piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Music {
    pub index: u32,
    pub title: String,
    pub subtitles: Vec<String>,
    pub composer: Option<String>,
    /// Unit note length (L: field)
    pub default_length: Duration,
    /// Meter as a fraction (M: field)
    pub meter: Duration,
    /// Quarter notes per minute (Q: field)
    pub tempo: u32,
    pub key: KeySignature,
    pub voices: Vec<Voice>,
}

impl Music {
    /// Look up a voice by name. `None` finds the unnamed default voice.
    pub fn voice(&self, name: Option<&str>) -> Option<&Voice> {
        self.voices.iter().find(|v| v.name.as_deref() == name)
    }
}

impl Default for Music {
    fn default() -> Self {
        Music {
            index: 1,
            title: String::new(),
            subtitles: Vec::new(),
            composer: None,
            default_length: Duration::new(1, 8),
            meter: Duration::new(4, 4),
            tempo: 120,
            key: KeySignature::default(),
            voices: vec![Voice::default()],
        }
    }
}
