//! Card capture and operator feedback
//!
//! Readers block until a card is presented, so the client drives them from a
//! blocking task. Feedback is given as soon as a card is read, before the
//! scan is queued or any network I/O happens.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

#[cfg(test)]
use mockall::automock;
use tracing::warn;

use crate::domain::{CardUid, ScanOutcome};

/// Source of card scans.
pub trait CardReader: Send {
    /// Block until the next card is read.
    ///
    /// Returns `Ok(None)` once the reader is exhausted or asked to stop.
    fn read_card(&mut self) -> io::Result<Option<CardUid>>;
}

/// Reader for devices that emit one UID per line (keyboard-wedge and serial
/// readers, or an operator typing UIDs by hand).
///
/// Blank lines are skipped; a line of `q` ends the stream.
pub struct LineReader<R> {
    input: R,
    line: String,
}

impl<R: BufRead + Send> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
        }
    }
}

impl LineReader<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send> CardReader for LineReader<R> {
    fn read_card(&mut self) -> io::Result<Option<CardUid>> {
        loop {
            self.line.clear();
            if self.input.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }

            let raw = self.line.trim();
            if raw.is_empty() {
                continue;
            }
            if raw.eq_ignore_ascii_case("q") {
                return Ok(None);
            }

            match CardUid::parse(raw) {
                Ok(uid) => return Ok(Some(uid)),
                Err(e) => warn!(error = %e, "ignoring unreadable card UID"),
            }
        }
    }
}

/// Reader replaying a fixed list of UIDs.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    cards: VecDeque<CardUid>,
}

impl ScriptedReader {
    pub fn new(cards: impl IntoIterator<Item = CardUid>) -> Self {
        Self {
            cards: cards.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

impl CardReader for ScriptedReader {
    fn read_card(&mut self) -> io::Result<Option<CardUid>> {
        Ok(self.cards.pop_front())
    }
}

/// Operator feedback at the edge device.
#[cfg_attr(test, automock)]
pub trait Feedback: Send + Sync {
    /// A card was read (given before any network I/O)
    fn captured(&self);

    /// The server could not be reached; the scan stays queued locally
    fn queued_offline(&self);

    /// The server adjudicated the scan
    fn confirmed(&self, outcome: ScanOutcome);
}

/// Audible feedback through the terminal bell.
///
/// One bell on capture, two when the scan was kept offline, three when the
/// server turned the card away.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl TerminalBell {
    fn ring(times: usize) {
        let mut err = io::stderr().lock();
        let _ = err.write_all("\x07".repeat(times).as_bytes());
        let _ = err.flush();
    }
}

impl Feedback for TerminalBell {
    fn captured(&self) {
        Self::ring(1);
    }

    fn queued_offline(&self) {
        Self::ring(2);
    }

    fn confirmed(&self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Accepted | ScanOutcome::AlreadyRecorded => {}
            ScanOutcome::RejectedTooEarly | ScanOutcome::UnknownCard => Self::ring(3),
        }
    }
}

/// No-op feedback for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl Feedback for SilentFeedback {
    fn captured(&self) {}
    fn queued_offline(&self) {}
    fn confirmed(&self, _outcome: ScanOutcome) {}
}
