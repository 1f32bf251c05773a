//! Musical diagnostics (bar lengths, chord lengths).
//!
//! These never stop compilation. The well-formedness pass collects them and
//! the caller decides what to show; every message renders as one
//! newline-terminated line of text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duration::Duration;

/// What was wrong with the music
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedbackKind {
    /// A bar's total length differs from the meter
    BarLength { expected: Duration, actual: Duration },
    /// A chord note's length differs from the chord's first note
    ChordLength { expected: Duration, found: Duration },
    /// A bar's total length is past what a 32-bit fraction holds
    BarOverflow,
}

/// One diagnostic, located by voice and 1-based bar number.
///
/// Bars are counted as played, so each pass through a repeat is numbered
/// again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub voice: Option<String>,
    pub bar: usize,
    pub kind: FeedbackKind,
}

impl Feedback {
    pub fn bar_length(voice: Option<&str>, bar: usize, expected: Duration, actual: Duration) -> Self {
        Feedback {
            voice: voice.map(str::to_string),
            bar,
            kind: FeedbackKind::BarLength { expected, actual },
        }
    }

    pub fn chord_length(voice: Option<&str>, bar: usize, expected: Duration, found: Duration) -> Self {
        Feedback {
            voice: voice.map(str::to_string),
            bar,
            kind: FeedbackKind::ChordLength { expected, found },
        }
    }

    pub fn bar_overflow(voice: Option<&str>, bar: usize) -> Self {
        Feedback {
            voice: voice.map(str::to_string),
            bar,
            kind: FeedbackKind::BarOverflow,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(voice) = &self.voice {
            write!(f, "In Voice {}, ", voice)?;
        }
        write!(f, "Bar {}, ", self.bar)?;
        match &self.kind {
            FeedbackKind::BarLength { expected, actual } => write!(
                f,
                "incorrect number of beats encountered: expected {} but got {}",
                expected, actual
            ),
            FeedbackKind::ChordLength { expected, found } => write!(
                f,
                "chord with inconsistent note-lengths encountered: expected {}, but found {}",
                expected, found
            ),
            FeedbackKind::BarOverflow => f.write_str("note lengths too long to add up"),
        }
    }
}

/// Collector for diagnostics during a pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackCollector {
    feedback: Vec<Feedback>,
}

impl FeedbackCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feedback: Feedback) {
        self.feedback.push(feedback);
    }

    pub fn is_empty(&self) -> bool {
        self.feedback.is_empty()
    }

    pub fn len(&self) -> usize {
        self.feedback.len()
    }

    /// The diagnostics in the order they were found.
    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    pub fn into_feedback(self) -> Vec<Feedback> {
        self.feedback
    }

    /// All messages, one per line, each terminated by a newline.
    pub fn text(&self) -> String {
        self.feedback
            .iter()
            .map(|f| format!("{}\n", f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_length_message() {
        let fb = Feedback::bar_length(Some("1"), 3, Duration::new(4, 4), Duration::new(3, 4));
        assert_eq!(
            fb.to_string(),
            "In Voice 1, Bar 3, incorrect number of beats encountered: expected 1/1 but got 3/4"
        );
    }

    #[test]
    fn test_unnamed_voice_has_no_prefix() {
        let fb = Feedback::chord_length(None, 1, Duration::new(1, 1), Duration::new(1, 2));
        assert_eq!(
            fb.to_string(),
            "Bar 1, chord with inconsistent note-lengths encountered: expected 1/1, but found 1/2"
        );
    }

    #[test]
    fn test_bar_overflow_message() {
        let fb = Feedback::bar_overflow(Some("Bass"), 7);
        assert_eq!(fb.to_string(), "In Voice Bass, Bar 7, note lengths too long to add up");
    }

    #[test]
    fn test_collector_text_is_newline_terminated() {
        let mut collector = FeedbackCollector::new();
        assert_eq!(collector.text(), "");

        collector.push(Feedback::bar_length(None, 1, Duration::new(4, 4), Duration::new(1, 1)));
        collector.push(Feedback::bar_length(None, 2, Duration::new(4, 4), Duration::new(1, 2)));

        let text = collector.text();
        assert_eq!(collector.len(), 2);
        let bars: Vec<_> = collector.feedback().iter().map(|f| f.bar).collect();
        assert_eq!(bars, vec![1, 2]);
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));
    }
}
