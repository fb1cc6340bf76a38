//! Out-of-band abort marker detection.

use std::collections::VecDeque;

use log::debug;

/// Sequence the adapter firmware injects into the stream to cancel a print.
pub const ABORT_SEQUENCE: [u8; 10] = *b"ABORTPRINT";

/// Emitted when the last ten bytes seen spell [`ABORT_SEQUENCE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortSignal;

/// Watches every raw byte for the abort sequence, regardless of what the
/// packet parser is doing with it.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    window: VecDeque<u8>,
}

impl MarkerDetector {
    pub fn new() -> Self {
        MarkerDetector {
            window: VecDeque::with_capacity(ABORT_SEQUENCE.len()),
        }
    }

    /// Push one byte into the sliding window and check for the abort sequence.
    ///
    /// The window is emptied after a match so the tail of one sequence can
    /// not count towards the next.
    pub fn observe(&mut self, byte: u8) -> Option<AbortSignal> {
        if self.window.len() == ABORT_SEQUENCE.len() {
            self.window.pop_front();
        }
        self.window.push_back(byte);

        if self.window.len() == ABORT_SEQUENCE.len() && self.window.iter().eq(ABORT_SEQUENCE.iter())
        {
            debug!("abort marker detected");
            self.window.clear();
            return Some(AbortSignal);
        }
        None
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new()
    }
}
