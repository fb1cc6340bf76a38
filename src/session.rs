//! Print session accumulator.
//!
//! Collects the decompressed payload of data packets until the print-trigger
//! marker asks for the buffer to be rendered.

use std::mem;

use log::{debug, info, warn};

use crate::{
    packet::{Command, Compression, PendingPacket},
    rle,
    status::{Status, StatusEvent},
    MAX_PRINT_BUFFER,
};

/// Settings carried by the payload of a print command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintParams {
    pub sheets: u8,
    /// Blank lines fed before the image (high nibble of the margin byte).
    pub margin_before: u8,
    /// Blank lines fed after the image (low nibble of the margin byte).
    pub margin_after: u8,
    /// Palette mapping requested by the game. Rendering always uses the fixed grayscale.
    pub palette: u8,
    pub exposure: u8,
}

impl PrintParams {
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match *payload {
            [sheets, margins, palette, exposure] => Some(PrintParams {
                sheets,
                margin_before: margins >> 4,
                margin_after: margins & 0x0F,
                palette,
                exposure: exposure & 0x7F,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrintSession {
    buffer: Vec<u8>,
    print_requested: bool,
    params: Option<PrintParams>,
}

impl PrintSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a completed packet to the session.
    pub fn dispatch(&mut self, packet: PendingPacket) -> StatusEvent {
        debug!(
            "packet {:?} {:?} length {}",
            packet.command, packet.compression, packet.declared_length
        );

        match packet.command {
            Command::Init => {
                // Also drops a buffer whose print trigger never arrived.
                if !self.buffer.is_empty() {
                    info!("init discards {} buffered bytes", self.buffer.len());
                }
                self.clear();
                StatusEvent::new(Status::Idle, "ready", 0)
            }
            Command::Data => {
                match packet.compression {
                    Compression::Raw => self.buffer.extend_from_slice(&packet.payload),
                    Compression::Rle => self.buffer.extend(rle::decompress(&packet.payload)),
                }
                if self.buffer.len() > MAX_PRINT_BUFFER {
                    warn!(
                        "print buffer full, dropping {} bytes",
                        self.buffer.len() - MAX_PRINT_BUFFER
                    );
                    self.buffer.truncate(MAX_PRINT_BUFFER);
                    return StatusEvent::new(
                        Status::Receiving,
                        "print buffer full",
                        MAX_PRINT_BUFFER,
                    );
                }
                let detail = if packet.payload.is_empty() {
                    "end of data"
                } else {
                    "receiving data"
                };
                StatusEvent::new(Status::Receiving, detail, self.buffer.len())
            }
            Command::Print => {
                self.print_requested = true;
                self.params = PrintParams::from_payload(&packet.payload);
                let detail = match self.params {
                    Some(params) => format!(
                        "print requested: {} sheet(s), margins {}/{}, exposure {}",
                        params.sheets, params.margin_before, params.margin_after, params.exposure
                    ),
                    None => "print requested".to_string(),
                };
                StatusEvent::new(Status::Printing, detail, self.buffer.len())
            }
            Command::Break => {
                let dropped = self.buffer.len();
                info!("break command, dropping {} bytes", dropped);
                self.clear();
                StatusEvent::new(Status::Cancelled, "print cancelled by break command", dropped)
            }
            Command::Inquiry => {
                let status = if self.print_requested {
                    Status::Printing
                } else if self.buffer.is_empty() {
                    Status::Idle
                } else {
                    Status::Receiving
                };
                StatusEvent::new(status, "inquiry", self.buffer.len())
            }
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn print_requested(&self) -> bool {
        self.print_requested
    }

    pub fn params(&self) -> Option<PrintParams> {
        self.params
    }

    /// Hand the buffer over for rendering and start a fresh session.
    pub fn take_buffer(&mut self) -> Vec<u8> {
        let buffer = mem::take(&mut self.buffer);
        self.clear();
        buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.print_requested = false;
        self.params = None;
    }
}
