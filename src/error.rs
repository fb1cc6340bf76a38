//! Error types for link-cable adapter capture.
//!
//! Only the boundary can fail: opening and reading the USB adapter, reading
//! a recorded capture, and exporting images. The byte-stream decoder itself
//! never fails, it resynchronizes and reports a [`Desync`] instead.

use thiserror::Error;

/// Main error type for capture operations.
#[derive(Error, Debug)]
pub enum Error {
    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for device communication issues
    /// or permission problems. Read timeouts are not reported through
    /// this variant, they surface as [`crate::Chunk::Timeout`].
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    /// Adapter is not connected or not responding.
    #[error("Device is offline")]
    DeviceOffline,

    #[error("Can't read device list, permission issue ?")]
    DeviceListNotReadable,

    #[error("Device is missing endpoint")]
    MissingEndpoint,

    /// Invalid configuration parameter provided.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    /// Reading a recorded capture or writing an export failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Reasons the packet parser lost track of the sender's framing.
///
/// A desync is recovered locally: the in-flight packet is dropped and the
/// parser goes back to waiting for a command byte.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desync {
    #[error("invalid compression flag {0:#04X}")]
    InvalidCompression(u8),

    /// Declared payload length is above the sanity ceiling.
    #[error("declared length {0} exceeds {max}", max = crate::MAX_PACKET_LENGTH)]
    OversizedLength(u16),
}
