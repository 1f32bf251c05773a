//! Header field values for ABC notation.
//!
//! Each function takes a field value as captured by the lexer (comment
//! stripped, trimmed) and either produces the typed value or an
//! `InvalidField` error naming the field and the offending text.

use crate::ast::Music;
use crate::duration::Duration;
use crate::error::ParseError;
use crate::parser::lexer::FieldKind;

fn invalid(field: char, value: &str, reason: &'static str) -> ParseError {
    ParseError::InvalidField {
        field,
        value: value.to_string(),
        reason,
    }
}

/// Apply an X, T, C, M, L or Q field to the piece.
///
/// Returns true when the field was an explicit L: so the caller knows not
/// to infer the default length from the meter.
pub fn apply_field(music: &mut Music, kind: FieldKind, value: &str) -> Result<bool, ParseError> {
    match kind {
        FieldKind::Index => music.index = parse_index(value)?,
        FieldKind::Title => {
            if music.title.is_empty() {
                music.title = value.to_string();
            } else {
                music.subtitles.push(value.to_string());
            }
        }
        FieldKind::Composer => music.composer = Some(value.to_string()),
        FieldKind::Meter => music.meter = parse_meter(value)?,
        FieldKind::DefaultLength => {
            music.default_length = parse_default_length(value)?;
            return Ok(true);
        }
        FieldKind::Tempo => music.tempo = parse_tempo(value)?,
        FieldKind::Key | FieldKind::Voice => {}
    }
    Ok(false)
}

/// Parse the X: reference number.
pub fn parse_index(value: &str) -> Result<u32, ParseError> {
    value
        .parse()
        .map_err(|_| invalid('X', value, "expected an unsigned integer"))
}

/// Parse a fraction of the form `[num]/[denom]`.
///
/// A missing numerator is 1 and a missing denominator is 2, the same rule
/// as a note length suffix. The slash is required.
fn parse_fraction(field: char, value: &str) -> Result<Duration, ParseError> {
    let (num, den) = value
        .split_once('/')
        .ok_or_else(|| invalid(field, value, "expected a fraction such as 1/8"))?;

    let num = match num.trim() {
        "" => 1,
        n => n
            .parse()
            .map_err(|_| invalid(field, value, "numerator is not a number"))?,
    };
    let den = match den.trim() {
        "" => 2,
        d => d
            .parse()
            .map_err(|_| invalid(field, value, "denominator is not a number"))?,
    };
    if den == 0 {
        return Err(invalid(field, value, "denominator must not be zero"));
    }
    Ok(Duration::new(num, den))
}

/// Parse the L: default note length (e.g., "1/8", "1/16").
pub fn parse_default_length(value: &str) -> Result<Duration, ParseError> {
    parse_fraction('L', value)
}

/// Parse the M: meter (e.g., "4/4", "6/8", "C", "C|").
pub fn parse_meter(value: &str) -> Result<Duration, ParseError> {
    match value {
        "C" => Ok(Duration::new(4, 4)),
        "C|" => Ok(Duration::new(2, 2)),
        _ => {
            let (num, den) = value
                .split_once('/')
                .ok_or_else(|| invalid('M', value, "expected n/d, C or C|"))?;
            let num: u32 = num
                .trim()
                .parse()
                .map_err(|_| invalid('M', value, "expected n/d, C or C|"))?;
            let den: u32 = den
                .trim()
                .parse()
                .map_err(|_| invalid('M', value, "expected n/d, C or C|"))?;
            if num == 0 || den == 0 {
                return Err(invalid('M', value, "meter must not be zero"));
            }
            Ok(Duration::new(num, den))
        }
    }
}

/// Parse the Q: tempo into quarter notes per minute.
///
/// Accepts a bare number ("120") or a beat and rate ("3/8=60").
pub fn parse_tempo(value: &str) -> Result<u32, ParseError> {
    let tempo = match value.split_once('=') {
        Some((beat, bpm)) => {
            let beat = parse_fraction('Q', beat.trim())?;
            let bpm: u32 = bpm
                .trim()
                .parse()
                .map_err(|_| invalid('Q', value, "beats per minute is not a number"))?;
            beat
                .checked_scale(4, 1)
                .and_then(|quarters| quarters.to_ticks(bpm))
                .ok_or_else(|| invalid('Q', value, "tempo is too large"))?
        }
        None => value
            .parse()
            .map_err(|_| invalid('Q', value, "expected bpm or n/d=bpm"))?,
    };
    if tempo == 0 {
        return Err(invalid('Q', value, "tempo must be positive"));
    }
    Ok(tempo)
}

/// The voice name from a V: field: its first word.
pub fn voice_name(value: &str) -> Result<String, ParseError> {
    value
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| invalid('V', value, "expected a voice name"))
}

/// Default length when no L: field is given, per the ABC standard:
/// meters below 3/4 use 1/16, everything else 1/8.
pub fn infer_default_length(meter: Duration) -> Duration {
    if (meter.numerator as u64) * 4 < 3 * (meter.denominator as u64) {
        Duration::new(1, 16)
    } else {
        Duration::new(1, 8)
    }
}
