//! MIDI sink for linearized note events.
//!
//! Writes a Standard MIDI File: format 0 for a single voice, format 1 with
//! one track per voice otherwise. Events arrive with absolute start ticks
//! and are delta-encoded per track.

use tracing::{debug, warn};

use crate::passes::NoteEvent;
use crate::MidiParams;

/// Largest division the SMF header can express in ticks per quarter note.
const MAX_DIVISION: u32 = 0x7FFF;

/// Division used when the piece needs a finer resolution than MIDI allows.
const FALLBACK_DIVISION: u32 = 480;

/// Sort rank at equal ticks: setup first, then releases, then new notes.
const RANK_SETUP: u8 = 0;
const RANK_NOTE_OFF: u8 = 1;
const RANK_NOTE_ON: u8 = 2;

struct MidiEvent {
    tick: u32,
    rank: u8,
    data: Vec<u8>,
}

struct TrackWriter {
    channel: u8,
    events: Vec<MidiEvent>,
}

impl TrackWriter {
    fn new(channel: u8) -> Self {
        TrackWriter {
            channel: channel & 0x0F,
            events: Vec::new(),
        }
    }

    fn tempo(&mut self, bpm: u32) {
        let us_per_beat = 60_000_000u32 / bpm.max(1);
        self.meta_event(
            0x51,
            vec![
                ((us_per_beat >> 16) & 0xFF) as u8,
                ((us_per_beat >> 8) & 0xFF) as u8,
                (us_per_beat & 0xFF) as u8,
            ],
        );
    }

    fn program_change(&mut self, program: u8) {
        self.push(0, RANK_SETUP, vec![0xC0 | self.channel, program & 0x7F]);
    }

    /// Data bytes are kept below 0x80; a zero velocity would read as a release.
    fn note(&mut self, pitch: u8, velocity: u8, start: u32, duration: u32) {
        let pitch = pitch & 0x7F;
        let velocity = velocity.clamp(1, 0x7F);
        self.push(start, RANK_NOTE_ON, vec![0x90 | self.channel, pitch, velocity]);
        self.push(start.saturating_add(duration), RANK_NOTE_OFF, vec![0x80 | self.channel, pitch, 0]);
    }

    fn meta_event(&mut self, event_type: u8, data: Vec<u8>) {
        let mut event_data = vec![0xFF, event_type];
        event_data.extend(encode_variable_length(data.len() as u32));
        event_data.extend(data);
        self.push(0, RANK_SETUP, event_data);
    }

    fn push(&mut self, tick: u32, rank: u8, data: Vec<u8>) {
        self.events.push(MidiEvent { tick, rank, data });
    }

    /// The complete MTrk chunk.
    fn finish(mut self) -> Vec<u8> {
        self.events.sort_by_key(|e| (e.tick, e.rank));

        let mut track_data = Vec::new();
        let mut last_tick = 0u32;
        for event in &self.events {
            let delta = event.tick.saturating_sub(last_tick);
            track_data.extend(encode_variable_length(delta));
            track_data.extend(&event.data);
            last_tick = event.tick;
        }
        // End of track
        track_data.extend(&[0x00, 0xFF, 0x2F, 0x00]);

        let mut out = Vec::new();
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        out.extend(track_data);
        out
    }
}

/// Encode events as a Standard MIDI File.
///
/// Zero-length events are dropped. `tempo` is in quarter notes per minute,
/// overridden by `params.tempo_override` when set.
pub fn generate(
    events: &[NoteEvent],
    ticks_per_quarter: u32,
    tempo: u32,
    params: &MidiParams,
) -> Vec<u8> {
    let (division, rescale) = if ticks_per_quarter <= MAX_DIVISION {
        (ticks_per_quarter.max(1), None)
    } else {
        warn!(
            ticks_per_quarter,
            "resolution exceeds MIDI division, rounding to {}",
            FALLBACK_DIVISION
        );
        (FALLBACK_DIVISION, Some(ticks_per_quarter))
    };
    let to_division = |ticks: u32| match rescale {
        Some(from) => ((ticks as u64 * FALLBACK_DIVISION as u64 + from as u64 / 2) / from as u64) as u32,
        None => ticks,
    };

    let track_count = events.iter().map(|e| e.voice + 1).max().unwrap_or(1);
    let mut tracks: Vec<TrackWriter> = (0..track_count)
        .map(|_| TrackWriter::new(params.channel))
        .collect();

    for (index, track) in tracks.iter_mut().enumerate() {
        if index == 0 {
            track.tempo(params.tempo_override.unwrap_or(tempo));
        }
        if let Some(program) = params.program {
            track.program_change(program);
        }
    }

    for event in events.iter().filter(|e| e.duration > 0) {
        let start = to_division(event.start);
        let end = to_division(event.start.saturating_add(event.duration));
        tracks[event.voice].note(
            event.device_note(),
            params.velocity,
            start,
            end.saturating_sub(start).max(1),
        );
    }

    let format: u16 = if track_count == 1 { 0 } else { 1 };
    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes()); // chunk length
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&(track_count as u16).to_be_bytes());
    out.extend_from_slice(&(division as u16).to_be_bytes());
    for track in tracks {
        out.extend(track.finish());
    }

    debug!(format, tracks = track_count, bytes = out.len(), "wrote midi");
    out
}

/// Encode a value as MIDI variable-length quantity
fn encode_variable_length(mut value: u32) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }

    bytes.reverse();
    bytes
}
