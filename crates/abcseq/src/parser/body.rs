//! Bar and repeat assembly for the tune body.
//!
//! Each voice has its own [`VoiceBuilder`], so voices can be interleaved
//! line by line and every voice keeps its own in-progress bar, tuplet and
//! repeat state.

use tracing::warn;

use crate::ast::{Bar, Element, Repeat, Tuplet, Voice};
use crate::parser::lexer::Barline;

/// Error side of the builder operations: what the builder expected instead.
pub type Expected = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatState {
    Normal,
    InRepeat,
    InFirstEnding,
    InSecondEnding,
}

/// Accumulates elements into bars and bars into a voice.
///
/// Bars outside an explicit `|:` collect as the normal bars of an implicit
/// repeat. A `:|` turns them into a [`Repeat`]; a thick or double bar line,
/// `|:` or the end of the voice writes them out as plain bars.
#[derive(Debug)]
pub struct VoiceBuilder {
    voice: Voice,
    state: RepeatState,
    bar: Vec<Element>,
    tuplet: Option<Tuplet>,
    repeat: Repeat,
    /// Repeat whose first ending was closed by `:|`, waiting for `[2`.
    held: Option<Repeat>,
}

impl VoiceBuilder {
    pub fn new(name: Option<String>) -> Self {
        VoiceBuilder {
            voice: Voice::new(name),
            state: RepeatState::Normal,
            bar: Vec::new(),
            tuplet: None,
            repeat: Repeat::default(),
            held: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.voice.name.as_deref()
    }

    /// Add an element to the current bar, or to the open tuplet.
    ///
    /// A tuplet element opens the tuplet; it absorbs the following elements
    /// until `size` notes have been added.
    pub fn push_element(&mut self, element: Element) -> Result<(), Expected> {
        self.commit_held();

        if let Some(tuplet) = self.tuplet.as_mut() {
            if matches!(element, Element::Tuplet(_)) {
                return Err("the notes of the open tuplet, not a nested tuplet");
            }
            tuplet.push(element);
            if tuplet.is_full() {
                if let Some(done) = self.tuplet.take() {
                    self.bar.push(done.into());
                }
            }
            return Ok(());
        }

        match element {
            Element::Tuplet(tuplet) if !tuplet.is_full() => self.tuplet = Some(tuplet),
            element => self.bar.push(element),
        }
        Ok(())
    }

    pub fn barline(&mut self, barline: Barline) -> Result<(), Expected> {
        self.commit_held();
        self.flush_bar()?;

        match (self.state, barline) {
            (RepeatState::Normal, Barline::Single) => {}
            (RepeatState::Normal, Barline::Double | Barline::ThickThin | Barline::ThinThick) => {
                self.emit_plain();
            }
            (RepeatState::Normal, Barline::RepeatStart) => self.open_repeat(),
            (RepeatState::Normal, Barline::RepeatEnd) => self.commit_repeat(),

            (RepeatState::InRepeat, Barline::RepeatEnd) => self.commit_repeat(),
            (RepeatState::InRepeat, Barline::RepeatStart) => {
                return Err("':|' to close the open repeat before another '|:'");
            }
            (RepeatState::InRepeat, _) => {}

            (RepeatState::InFirstEnding, Barline::RepeatEnd) => {
                self.held = Some(std::mem::take(&mut self.repeat));
                self.voice.begin_repeat_seen = false;
                self.state = RepeatState::Normal;
            }
            (RepeatState::InFirstEnding, Barline::RepeatStart) => {
                return Err("':|' to close the first ending");
            }
            (RepeatState::InFirstEnding, _) => {}

            (RepeatState::InSecondEnding, Barline::Single) => {}
            (RepeatState::InSecondEnding, Barline::RepeatStart) => {
                self.commit_repeat();
                self.open_repeat();
            }
            (RepeatState::InSecondEnding, _) => self.commit_repeat(),
        }
        Ok(())
    }

    pub fn nth_ending(&mut self, n: u8) -> Result<(), Expected> {
        if n == 2 {
            return match self.held.take() {
                Some(repeat) => {
                    self.flush_bar()?;
                    self.repeat = repeat;
                    self.state = RepeatState::InSecondEnding;
                    Ok(())
                }
                None => Err("'[2' only after a first ending closed by ':|'"),
            };
        }

        self.commit_held();
        match self.state {
            RepeatState::Normal | RepeatState::InRepeat => {
                self.flush_bar()?;
                self.state = RepeatState::InFirstEnding;
                Ok(())
            }
            _ => Err("a bar line closing the current ending before '[1'"),
        }
    }

    /// Close the voice, flushing whatever is still open.
    pub fn finish(mut self) -> Result<Voice, Expected> {
        if self.tuplet.is_some() {
            return Err("the remaining notes of the open tuplet");
        }
        self.commit_held();
        self.flush_bar()?;

        match self.state {
            RepeatState::Normal => self.emit_plain(),
            RepeatState::InRepeat => {
                warn!(
                    voice = self.name().unwrap_or("default"),
                    "repeat opened with '|:' never closed, keeping its bars unrepeated"
                );
                self.emit_plain();
            }
            RepeatState::InFirstEnding | RepeatState::InSecondEnding => self.commit_repeat(),
        }
        Ok(self.voice)
    }

    fn flush_bar(&mut self) -> Result<(), Expected> {
        if self.tuplet.is_some() {
            return Err("the remaining notes of the open tuplet before a bar line");
        }
        if self.bar.is_empty() {
            return Ok(());
        }
        let bar = Bar::new(std::mem::take(&mut self.bar));
        match self.state {
            RepeatState::Normal | RepeatState::InRepeat => self.repeat.normal.push(bar),
            RepeatState::InFirstEnding => self.repeat.first_ending.push(bar),
            RepeatState::InSecondEnding => self.repeat.second_ending.push(bar),
        }
        Ok(())
    }

    /// Write the pending normal bars into the voice as plain bars.
    fn emit_plain(&mut self) {
        let repeat = std::mem::take(&mut self.repeat);
        for bar in repeat.normal {
            self.voice.push(bar);
        }
    }

    fn open_repeat(&mut self) {
        self.emit_plain();
        self.voice.begin_repeat_seen = true;
        self.state = RepeatState::InRepeat;
    }

    fn commit_repeat(&mut self) {
        let repeat = std::mem::take(&mut self.repeat);
        if !repeat.is_empty() {
            self.voice.push(repeat);
        }
        self.voice.begin_repeat_seen = false;
        self.state = RepeatState::Normal;
    }

    fn commit_held(&mut self) {
        if let Some(repeat) = self.held.take() {
            self.voice.push(repeat);
        }
    }
}

/// All voices of a piece, in declaration order, and which one is current.
#[derive(Debug, Default)]
pub struct Voices {
    builders: Vec<VoiceBuilder>,
    current: Option<usize>,
}

impl Voices {
    /// Declare or switch to the named voice.
    ///
    /// A header declaration only becomes current if no voice is current yet;
    /// a body `V:` always switches.
    pub fn select(&mut self, name: String, switch: bool) {
        let index = match self
            .builders
            .iter()
            .position(|b| b.name() == Some(name.as_str()))
        {
            Some(index) => index,
            None => {
                self.builders.push(VoiceBuilder::new(Some(name)));
                self.builders.len() - 1
            }
        };
        if switch || self.current.is_none() {
            self.current = Some(index);
        }
    }

    /// The current voice, creating the unnamed default voice on first use.
    pub fn current(&mut self) -> &mut VoiceBuilder {
        let index = match self.current {
            Some(index) => index,
            None => {
                self.builders.push(VoiceBuilder::new(None));
                let index = self.builders.len() - 1;
                self.current = Some(index);
                index
            }
        };
        &mut self.builders[index]
    }

    /// Every piece has at least one voice.
    pub fn finish(self) -> Result<Vec<Voice>, Expected> {
        if self.builders.is_empty() {
            return Ok(vec![Voice::default()]);
        }
        self.builders.into_iter().map(VoiceBuilder::finish).collect()
    }
}
