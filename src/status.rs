//! Status updates reported to the sink while a capture runs.

use std::fmt;

/// Coarse state of the capture, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Receiving,
    Printing,
    /// A partial print was thrown away (abort marker, break or idle timeout).
    Cancelled,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Receiving => "receiving",
            Self::Printing => "printing",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Status update with the size of the print buffer at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: Status,
    pub detail: String,
    pub bytes: usize,
}

impl StatusEvent {
    pub fn new(status: Status, detail: impl Into<String>, bytes: usize) -> Self {
        StatusEvent {
            status,
            detail: detail.into(),
            bytes,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({} bytes)", self.status, self.detail, self.bytes)
    }
}
