//! ABC notation compiler.
//!
//! Text goes through the [`parser`] into a [`Music`] tree, which three
//! read-only [`passes`] then check, resolve to a tick resolution, and flatten
//! into absolute-time note events. The [`midi`] module turns those events into
//! a Standard MIDI File.
//!
//! # Example
//!
//! ```
//! use abcseq::{compile, to_midi, MidiParams};
//!
//! let abc = r#"
//! X:1
//! T:Test Tune
//! M:4/4
//! L:1/8
//! K:G
//! GABc dedB|cBAG D2D2|
//! "#;
//!
//! let compiled = compile(abc).unwrap();
//! assert!(compiled.feedback.is_empty());
//! let midi_bytes = to_midi(&compiled, &MidiParams::default());
//! assert_eq!(&midi_bytes[..4], b"MThd");
//! ```

pub mod ast;
pub mod duration;
pub mod error;
pub mod feedback;
pub mod midi;
pub mod parser;
pub mod passes;
pub mod render;

use tracing::debug;

pub use ast::*;
pub use duration::Duration;
pub use error::{LexError, ParseError};
pub use feedback::{Feedback, FeedbackCollector, FeedbackKind};
pub use passes::{check, linearize, ticks_per_quarter_note, NoteEvent};
pub use render::to_abc;

/// Parse ABC notation into a Music AST.
///
/// Parsing is strict: the first malformed token, field or key aborts with
/// an error describing the offending fragment.
pub fn parse(input: &str) -> Result<Music, ParseError> {
    parser::parse(input)
}

/// Parameters for MIDI generation
#[derive(Debug, Clone)]
pub struct MidiParams {
    /// MIDI velocity for notes (1-127)
    pub velocity: u8,
    /// MIDI channel (0-15, default 0). Use 9 for GM drums.
    pub channel: u8,
    /// Program change sent at the start of every track
    pub program: Option<u8>,
    /// Replaces the piece's Q: tempo
    pub tempo_override: Option<u32>,
}

impl Default for MidiParams {
    fn default() -> Self {
        MidiParams {
            velocity: 80,
            channel: 0,
            program: None,
            tempo_override: None,
        }
    }
}

/// Everything the pipeline produces for one piece.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub music: Music,
    pub feedback: FeedbackCollector,
    pub ticks_per_quarter: u32,
    pub events: Vec<NoteEvent>,
}

/// Parse, check, resolve ticks and linearize.
///
/// Well-formedness diagnostics never block the later passes; the events are
/// produced for whatever was written. Note lengths that cannot be placed on
/// a 32-bit tick grid fail with [`ParseError::TickOverflow`].
pub fn compile(input: &str) -> Result<Compilation, ParseError> {
    let music = parse(input)?;
    let feedback = check(&music);
    let ticks_per_quarter = ticks_per_quarter_note(&music)?;
    let events = linearize(&music, ticks_per_quarter)?;
    debug!(
        diagnostics = feedback.len(),
        ticks_per_quarter,
        events = events.len(),
        "compiled piece"
    );

    Ok(Compilation {
        music,
        feedback,
        ticks_per_quarter,
        events,
    })
}

/// Convert a compiled piece to MIDI bytes (SMF format 0 or 1)
pub fn to_midi(compilation: &Compilation, params: &MidiParams) -> Vec<u8> {
    midi::generate(
        &compilation.events,
        compilation.ticks_per_quarter,
        compilation.music.tempo,
        params,
    )
}
