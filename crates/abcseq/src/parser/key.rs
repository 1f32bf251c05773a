//! Key signature resolution for the K: field.

use crate::ast::{KeySignature, NoteName};
use crate::error::ParseError;

/// Order in which sharps are added to a key signature.
const SHARP_ORDER: [NoteName; 7] = [
    NoteName::F,
    NoteName::C,
    NoteName::G,
    NoteName::D,
    NoteName::A,
    NoteName::E,
    NoteName::B,
];

/// Order in which flats are added to a key signature.
const FLAT_ORDER: [NoteName; 7] = [
    NoteName::B,
    NoteName::E,
    NoteName::A,
    NoteName::D,
    NoteName::G,
    NoteName::C,
    NoteName::F,
];

/// Number of accidentals per key code. Positive counts are sharps, negative
/// counts are flats.
const KEYS: [(&str, i8); 30] = [
    ("C", 0),
    ("G", 1),
    ("D", 2),
    ("A", 3),
    ("E", 4),
    ("B", 5),
    ("F#", 6),
    ("C#", 7),
    ("F", -1),
    ("Bb", -2),
    ("Eb", -3),
    ("Ab", -4),
    ("Db", -5),
    ("Gb", -6),
    ("Cb", -7),
    ("Am", 0),
    ("Em", 1),
    ("Bm", 2),
    ("F#m", 3),
    ("C#m", 4),
    ("G#m", 5),
    ("D#m", 6),
    ("A#m", 7),
    ("Dm", -1),
    ("Gm", -2),
    ("Cm", -3),
    ("Fm", -4),
    ("Bbm", -5),
    ("Ebm", -6),
    ("Abm", -7),
];

/// Canonical spelling: upper-case root, lower-case rest ("f#M" -> "F#m").
fn normalize(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(root) => root
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Resolve a key code such as "G", "F#m" or "Bb".
pub fn resolve_key(code: &str) -> Result<KeySignature, ParseError> {
    let trimmed = code.trim();
    let length = trimmed.chars().count();
    if !(1..=3).contains(&length) {
        return Err(ParseError::InvalidKey(trimmed.to_string()));
    }

    let normalized = normalize(trimmed);
    let (_, count) = KEYS
        .iter()
        .find(|(name, _)| *name == normalized)
        .ok_or_else(|| ParseError::InvalidKey(trimmed.to_string()))?;

    let (notes, shift) = match count.signum() {
        1 => (SHARP_ORDER[..*count as usize].to_vec(), 1),
        -1 => (FLAT_ORDER[..count.unsigned_abs() as usize].to_vec(), -1),
        _ => (Vec::new(), 0),
    };

    Ok(KeySignature {
        code: normalized,
        notes,
        shift,
    })
}
