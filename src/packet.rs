//! Packet framing for the adapter byte stream.
//!
//! Between packets the stream may carry the stream-start marker, the
//! print-trigger marker and link-cable sync bytes. A packet is:
//!
//! ```text
//! command  compression  length (LE u16)  payload
//! 0x04     0x00|0x01    lo hi            `length` bytes
//! ```

use log::{debug, warn};

use crate::{error::Desync, MAX_PACKET_LENGTH, PRINT_TRIGGER, STREAM_START, SYNC_BYTES};

/// Position of the parser inside the framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Dropping everything until the stream-start marker.
    WaitStart,
    WaitCommand,
    WaitCompression,
    WaitLengthLow,
    WaitLengthHigh,
    ReadData,
}

/// Printer command codes relayed by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Init,
    Print,
    Data,
    Break,
    Inquiry,
}

impl Command {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Init),
            0x02 => Some(Self::Print),
            0x04 => Some(Self::Data),
            0x08 => Some(Self::Break),
            0x0F => Some(Self::Inquiry),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Init => 0x01,
            Self::Print => 0x02,
            Self::Data => 0x04,
            Self::Break => 0x08,
            Self::Inquiry => 0x0F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Raw,
    Rle,
}

impl Compression {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Raw),
            0x01 => Some(Self::Rle),
            _ => None,
        }
    }
}

/// A packet being assembled, handed over once its payload is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPacket {
    pub command: Command,
    pub compression: Compression,
    pub declared_length: u16,
    pub payload: Vec<u8>,
}

impl PendingPacket {
    fn new(command: Command) -> Self {
        PendingPacket {
            command,
            compression: Compression::Raw,
            declared_length: 0,
            payload: Vec::new(),
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.payload.len()
    }

    fn is_complete(&self) -> bool {
        self.bytes_read() == self.declared_length as usize
    }
}

/// What one byte produced, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    /// Stream-start marker: the current session must be reset.
    StreamStart,
    /// Print-trigger marker: the accumulated buffer can be rendered.
    PrintTrigger,
    Packet(PendingPacket),
    /// Framing was lost; the in-flight packet has been dropped.
    Desync(Desync),
}

/// Byte-at-a-time packet parser.
#[derive(Debug, Clone)]
pub struct PacketParser {
    state: ParserState,
    pending: Option<PendingPacket>,
    length_low: u8,
}

impl PacketParser {
    /// Parser waiting for a command byte.
    pub fn new() -> Self {
        Self::starting_in(ParserState::WaitCommand)
    }

    /// Parser that ignores everything before the first stream-start marker.
    pub fn wait_for_start() -> Self {
        Self::starting_in(ParserState::WaitStart)
    }

    fn starting_in(state: ParserState) -> Self {
        PacketParser {
            state,
            pending: None,
            length_low: 0,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingPacket> {
        self.pending.as_ref()
    }

    /// Drop any in-flight packet and wait for the next command byte.
    pub fn reset(&mut self) {
        self.state = ParserState::WaitCommand;
        self.pending = None;
        self.length_low = 0;
    }

    /// Advance the state machine by one byte.
    pub fn feed(&mut self, byte: u8) -> Option<ParserEvent> {
        match self.state {
            ParserState::WaitStart => {
                if byte == STREAM_START {
                    self.reset();
                    return Some(ParserEvent::StreamStart);
                }
                None
            }
            ParserState::WaitCommand => self.on_command_byte(byte),
            ParserState::WaitCompression => match Compression::from_code(byte) {
                Some(compression) => {
                    if let Some(packet) = self.pending.as_mut() {
                        packet.compression = compression;
                    }
                    self.state = ParserState::WaitLengthLow;
                    None
                }
                None => self.desync(Desync::InvalidCompression(byte)),
            },
            ParserState::WaitLengthLow => {
                self.length_low = byte;
                self.state = ParserState::WaitLengthHigh;
                None
            }
            ParserState::WaitLengthHigh => {
                let length = u16::from_le_bytes([self.length_low, byte]);
                if length > MAX_PACKET_LENGTH {
                    return self.desync(Desync::OversizedLength(length));
                }
                match self.pending.as_mut() {
                    Some(packet) => {
                        packet.declared_length = length;
                        packet.payload.reserve_exact(length as usize);
                    }
                    None => {
                        self.reset();
                        return None;
                    }
                }
                if length == 0 {
                    return self.dispatch();
                }
                self.state = ParserState::ReadData;
                None
            }
            ParserState::ReadData => {
                let complete = match self.pending.as_mut() {
                    Some(packet) => {
                        packet.payload.push(byte);
                        packet.is_complete()
                    }
                    None => true,
                };
                if complete {
                    return self.dispatch();
                }
                None
            }
        }
    }

    fn on_command_byte(&mut self, byte: u8) -> Option<ParserEvent> {
        match byte {
            STREAM_START => {
                self.reset();
                Some(ParserEvent::StreamStart)
            }
            PRINT_TRIGGER => Some(ParserEvent::PrintTrigger),
            b if SYNC_BYTES.contains(&b) => {
                debug!("sync byte {:#04X}", b);
                None
            }
            b => {
                if let Some(command) = Command::from_code(b) {
                    self.pending = Some(PendingPacket::new(command));
                    self.state = ParserState::WaitCompression;
                }
                None
            }
        }
    }

    fn dispatch(&mut self) -> Option<ParserEvent> {
        let packet = self.pending.take();
        self.reset();
        packet.map(ParserEvent::Packet)
    }

    fn desync(&mut self, reason: Desync) -> Option<ParserEvent> {
        warn!("lost packet framing in {:?}: {}", self.state, reason);
        self.reset();
        Some(ParserEvent::Desync(reason))
    }
}

impl Default for PacketParser {
    fn default() -> Self {
        Self::new()
    }
}
