//! Game Boy Printer capture
//!
//! This crate receives the byte stream emitted by a link-cable USB adapter
//! that emulates the Game Boy Printer, recovers the printer packets from it
//! and rebuilds every print as a 2-bit grayscale image.
//!
//! # Example
//!
//! ```rust
//! use gbp_capture::{Decoder, Event};
//!
//! let mut decoder = Decoder::new();
//! let mut events = Vec::new();
//!
//! // stream start, one raw data packet holding a single blank tile, print trigger
//! events.extend(decoder.feed(&[0xFF, 0x04, 0x00, 0x10, 0x00]));
//! events.extend(decoder.feed(&[0x00; 16]));
//! events.extend(decoder.feed(&[0xFE]));
//!
//! let image = events
//!     .into_iter()
//!     .find_map(|event| match event {
//!         Event::Image(image) => Some(image),
//!         _ => None,
//!     })
//!     .unwrap();
//! assert_eq!((image.width(), image.height()), (160, 8));
//! ```

mod config;
mod decoder;
mod error;
mod marker;
mod packet;
mod receiver;
pub mod rle;
mod session;
mod status;
mod tile;
mod transport;

pub use crate::{
    config::{Config, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID},
    decoder::{Decoder, Event, Stats},
    error::{Desync, Error},
    marker::{AbortSignal, MarkerDetector, ABORT_SEQUENCE},
    packet::{Command, Compression, PacketParser, ParserEvent, ParserState, PendingPacket},
    receiver::{Receiver, Sink},
    session::{PrintParams, PrintSession},
    status::{Status, StatusEvent},
    tile::{render, DecodedImage, PALETTE},
    transport::{Chunk, ReplayTransport, Transport, UsbAdapter},
};

/// Marker byte the adapter sends when a new stream starts.
pub const STREAM_START: u8 = 0xFF;

/// Marker byte the adapter sends once every byte of a print has been relayed.
pub const PRINT_TRIGGER: u8 = 0xFE;

/// Link-cable preamble bytes that may show up between packets.
pub const SYNC_BYTES: [u8; 2] = [0x88, 0x33];

/// Largest payload length accepted before the parser assumes it lost sync.
///
/// Real packets never go beyond a few hundred bytes (a full data packet is 640).
pub const MAX_PACKET_LENGTH: u16 = 1000;

/// Size of the printer's image memory; data past it is dropped.
pub const MAX_PRINT_BUFFER: usize = 8 * 1024;

/// Number of tiles in one row of the printed image.
pub const TILES_PER_ROW: u32 = 20;

/// Width and height of a tile in pixels.
pub const TILE_SIZE: u32 = 8;

/// Bytes used to encode one 8x8 tile at 2 bits per pixel.
pub const BYTES_PER_TILE: usize = 16;

/// Width in pixels of every printed image (20 tiles of 8 pixels).
pub const IMAGE_WIDTH: u32 = TILES_PER_ROW * TILE_SIZE;
