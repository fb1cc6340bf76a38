//! Byte stream to image pipeline.
//!
//! [`Decoder`] runs every incoming byte through the abort marker detector and
//! the packet parser, applies completed packets to the print session and
//! renders the session buffer when the print trigger arrives. It never reads
//! a clock: the caller reports quiet periods through [`Decoder::idle`].

use std::time::Duration;

use log::{debug, info, warn};

use crate::{
    config::{Config, DEFAULT_PRINT_TIMEOUT},
    marker::MarkerDetector,
    packet::{PacketParser, ParserEvent, ParserState},
    session::PrintSession,
    status::{Status, StatusEvent},
    tile::{self, DecodedImage},
};

/// Output of the decoder, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(StatusEvent),
    Image(DecodedImage),
}

/// Counters kept over the lifetime of a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub bytes: usize,
    pub packets: usize,
    pub desyncs: usize,
    pub aborts: usize,
    pub timeouts: usize,
    pub images: usize,
}

#[derive(Debug, Clone)]
pub struct Decoder {
    marker: MarkerDetector,
    parser: PacketParser,
    session: PrintSession,
    print_timeout: Duration,
    stats: Stats,
}

impl Decoder {
    /// Decoder with the default 2 s print timeout, waiting for a command byte.
    pub fn new() -> Self {
        Decoder {
            marker: MarkerDetector::new(),
            parser: PacketParser::new(),
            session: PrintSession::new(),
            print_timeout: DEFAULT_PRINT_TIMEOUT,
            stats: Stats::default(),
        }
    }

    pub fn with_config(config: &Config) -> Self {
        let parser = if config.require_start_marker {
            PacketParser::wait_for_start()
        } else {
            PacketParser::new()
        };
        Decoder {
            parser,
            print_timeout: config.print_timeout,
            ..Self::new()
        }
    }

    pub fn state(&self) -> ParserState {
        self.parser.state()
    }

    /// Bytes accumulated for the current print.
    pub fn buffer(&self) -> &[u8] {
        self.session.buffer()
    }

    pub fn session(&self) -> &PrintSession {
        &self.session
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn print_timeout(&self) -> Duration {
        self.print_timeout
    }

    /// Feed one chunk from the transport.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in bytes {
            self.feed_byte(byte, &mut events);
        }
        events
    }

    pub fn feed_byte(&mut self, byte: u8, events: &mut Vec<Event>) {
        self.stats.bytes += 1;

        if self.marker.observe(byte).is_some() {
            self.stats.aborts += 1;
            let dropped = self.session.len();
            info!("abort marker, dropping {} bytes", dropped);
            self.reset();
            events.push(Event::Status(StatusEvent::new(
                Status::Cancelled,
                "print aborted",
                dropped,
            )));
            return;
        }

        match self.parser.feed(byte) {
            None => {}
            Some(ParserEvent::StreamStart) => {
                debug!("stream start");
                self.reset();
                events.push(Event::Status(StatusEvent::new(Status::Idle, "ready", 0)));
            }
            Some(ParserEvent::PrintTrigger) => self.print(events),
            Some(ParserEvent::Packet(packet)) => {
                self.stats.packets += 1;
                let status = self.session.dispatch(packet);
                events.push(Event::Status(status));
            }
            Some(ParserEvent::Desync(reason)) => {
                self.stats.desyncs += 1;
                debug!("resynchronized after {}", reason);
            }
        }
    }

    fn print(&mut self, events: &mut Vec<Event>) {
        if self.session.is_empty() {
            debug!("print trigger with empty buffer");
            return;
        }

        let buffer = self.session.take_buffer();
        let image = tile::render(&buffer);
        if image.is_empty() {
            warn!("print trigger with {} bytes, not a single tile", buffer.len());
            events.push(Event::Status(StatusEvent::new(
                Status::Cancelled,
                "incomplete tile data discarded",
                buffer.len(),
            )));
            return;
        }

        self.stats.images += 1;
        info!(
            "print complete: {}x{} from {} bytes",
            image.width(),
            image.height(),
            buffer.len()
        );
        events.push(Event::Status(StatusEvent::new(
            Status::Printing,
            "print complete",
            buffer.len(),
        )));
        events.push(Event::Image(image));
    }

    /// Report that nothing arrived for `quiet`.
    ///
    /// Once the print timeout has passed the parser goes back to waiting
    /// for a command byte, dropping any half-read packet, and a partial
    /// print is discarded. This applies to a parser still waiting for the
    /// stream-start marker too.
    pub fn idle(&mut self, quiet: Duration) -> Option<Event> {
        if quiet < self.print_timeout {
            return None;
        }

        if self.parser.state() != ParserState::WaitCommand {
            debug!("no data for {:?} in {:?}", quiet, self.parser.state());
        }
        if self.session.is_empty() {
            self.parser.reset();
            return None;
        }

        self.stats.timeouts += 1;
        let dropped = self.session.len();
        info!("no data for {:?}, dropping {} bytes", quiet, dropped);
        self.reset();
        Some(Event::Status(StatusEvent::new(
            Status::Cancelled,
            "print timed out",
            dropped,
        )))
    }

    /// Drop the in-flight packet and the print buffer.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.session.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marker::ABORT_SEQUENCE, rle};
    use pretty_assertions::assert_eq;

    fn data_packet(payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x04, 0x00];
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn images(events: &[Event]) -> Vec<&DecodedImage> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::Image(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    /// Decoder with buffered data and a half-read packet.
    fn busy_decoder() -> Decoder {
        let mut decoder = Decoder::new();
        decoder.feed(&data_packet(&[0x11; 32]));
        decoder.feed(&[0x04, 0x00, 0x10, 0x00, 0xAA, 0xBB]);
        assert_eq!(decoder.state(), ParserState::ReadData);
        assert_eq!(decoder.buffer().len(), 32);
        decoder
    }

    fn assert_reset(decoder: &Decoder) {
        assert_eq!(decoder.state(), ParserState::WaitCommand);
        assert!(decoder.buffer().is_empty());
    }

    #[test]
    fn test_packet_assembly() {
        let mut decoder = Decoder::new();
        decoder.feed(&[0x04, 0x00, 0x03, 0x00, 0x11, 0x22, 0x33]);

        assert_eq!(decoder.buffer(), &[0x11, 0x22, 0x33]);
        assert_eq!(decoder.state(), ParserState::WaitCommand);
        assert_eq!(decoder.stats().packets, 1);
    }

    #[test]
    fn test_stream_start_resets() {
        let mut decoder = Decoder::new();
        decoder.feed(&data_packet(&[0x11; 32]));
        assert_eq!(decoder.state(), ParserState::WaitCommand);
        assert_eq!(decoder.buffer().len(), 32);

        let events = decoder.feed(&[0xFF]);

        assert_reset(&decoder);
        assert_eq!(
            events,
            vec![Event::Status(StatusEvent::new(Status::Idle, "ready", 0))]
        );
    }

    #[test]
    fn test_marker_bytes_mid_payload_are_image_data() {
        let mut decoder = busy_decoder();
        let mut rest = vec![0xFF, 0xFE];
        rest.extend_from_slice(&[0x00; 12]);

        let events = decoder.feed(&rest);

        assert_eq!(decoder.state(), ParserState::WaitCommand);
        assert_eq!(decoder.buffer().len(), 48);
        assert_eq!(&decoder.buffer()[32..36], &[0xAA, 0xBB, 0xFF, 0xFE]);
        assert!(images(&events).is_empty());
    }

    /// Decoder sitting in `state`, holding buffered data whenever the state allows it.
    fn decoder_in(state: ParserState) -> Decoder {
        let mut decoder = match state {
            ParserState::WaitStart => {
                Decoder::with_config(&Config::default().require_start_marker(true))
            }
            _ => {
                let mut decoder = Decoder::new();
                decoder.feed(&data_packet(&[0x11; 32]));
                decoder
            }
        };
        let prefix: &[u8] = match state {
            ParserState::WaitStart | ParserState::WaitCommand => &[],
            ParserState::WaitCompression => &[0x04],
            ParserState::WaitLengthLow => &[0x04, 0x00],
            ParserState::WaitLengthHigh => &[0x04, 0x00, 0x10],
            ParserState::ReadData => &[0x04, 0x00, 0x10, 0x00, 0xAA],
        };
        decoder.feed(prefix);
        assert_eq!(decoder.state(), state);
        decoder
    }

    #[test]
    fn test_every_trigger_resets_every_state() {
        let states = [
            ParserState::WaitStart,
            ParserState::WaitCommand,
            ParserState::WaitCompression,
            ParserState::WaitLengthLow,
            ParserState::WaitLengthHigh,
            ParserState::ReadData,
        ];

        for state in states {
            let mut decoder = decoder_in(state);
            decoder.feed(&ABORT_SEQUENCE);
            assert_reset(&decoder);

            let mut decoder = decoder_in(state);
            decoder.idle(Duration::from_secs(2));
            assert_reset(&decoder);

            // The markers and Init are only framing outside a packet.
            if matches!(state, ParserState::WaitStart | ParserState::WaitCommand) {
                let mut decoder = decoder_in(state);
                decoder.feed(&[0xFF]);
                assert_reset(&decoder);
            }
            if state == ParserState::WaitCommand {
                let mut decoder = decoder_in(state);
                decoder.feed(&[0x01, 0x00, 0x00, 0x00]);
                assert_reset(&decoder);
            }
        }
    }

    #[test]
    fn test_abort_mid_payload_resets() {
        let mut decoder = busy_decoder();
        let events = decoder.feed(&ABORT_SEQUENCE);

        assert_reset(&decoder);
        assert_eq!(decoder.stats().aborts, 1);
        assert_eq!(
            events,
            vec![Event::Status(StatusEvent::new(
                Status::Cancelled,
                "print aborted",
                32
            ))]
        );
    }

    #[test]
    fn test_init_packet_resets() {
        let mut decoder = Decoder::new();
        decoder.feed(&data_packet(&[0x11; 32]));
        decoder.feed(&[0x01, 0x00, 0x00, 0x00]);
        assert_reset(&decoder);
    }

    #[test]
    fn test_idle_timeout_resets() {
        let mut decoder = busy_decoder();

        assert_eq!(decoder.idle(Duration::from_millis(1999)), None);
        assert_eq!(decoder.state(), ParserState::ReadData);

        let event = decoder.idle(Duration::from_millis(2000));
        assert_reset(&decoder);
        assert_eq!(
            event,
            Some(Event::Status(StatusEvent::new(
                Status::Cancelled,
                "print timed out",
                32
            )))
        );
        assert_eq!(decoder.stats().timeouts, 1);
    }

    #[test]
    fn test_idle_drops_stalled_packet_without_buffer() {
        let mut decoder = Decoder::new();
        decoder.feed(&[0x04, 0x00, 0x10]);
        assert_eq!(decoder.idle(Duration::from_secs(5)), None);
        assert_reset(&decoder);
    }

    #[test]
    fn test_end_to_end_single_tile() {
        let mut decoder = Decoder::new();
        let mut stream = vec![0xFF];
        stream.extend(data_packet(&[0xFF; 16]));
        stream.push(0xFE);

        let events = decoder.feed(&stream);
        let images = images(&events);

        assert_eq!(images.len(), 1);
        assert_eq!((images[0].width(), images[0].height()), (160, 8));
        assert_eq!(images[0].tiles(), 1);
        assert_eq!(images[0].pixel(0, 0), Some(tile::PALETTE[3]));
        assert_eq!(images[0].pixel(8, 0), Some(tile::PALETTE[0]));
        assert_reset(&decoder);
        assert_eq!(decoder.stats().images, 1);
    }

    #[test]
    fn test_compressed_packets_across_chunks() {
        let tiles: Vec<u8> = (0..40 * 16).map(|i| (i % 3) as u8 * 0x55).collect();
        let packed = rle::compress(&tiles);

        let mut stream = vec![0xFF, 0x88, 0x33, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01];
        stream.extend_from_slice(&(packed.len() as u16).to_le_bytes());
        stream.extend_from_slice(&packed);
        stream.extend_from_slice(&[0x04, 0x00, 0x00, 0x00]);
        stream.extend_from_slice(&[0x02, 0x00, 0x04, 0x00, 0x01, 0x13, 0xE4, 0x40]);
        stream.push(0xFE);

        let mut decoder = Decoder::new();
        let mut events = Vec::new();
        for chunk in stream.chunks(7) {
            events.extend(decoder.feed(chunk));
        }

        let images = images(&events);
        assert_eq!(images.len(), 1);
        assert_eq!((images[0].width(), images[0].height()), (160, 16));
        assert_eq!(images[0].tiles(), 40);
    }

    #[test]
    fn test_print_trigger_with_empty_buffer() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(&[0xFE]).is_empty());
    }

    #[test]
    fn test_print_trigger_with_partial_tile() {
        let mut decoder = Decoder::new();
        decoder.feed(&data_packet(&[0xFF; 8]));
        let events = decoder.feed(&[0xFE]);

        assert!(images(&events).is_empty());
        assert!(decoder.buffer().is_empty());
    }

    #[test]
    fn test_desync_recovers() {
        let mut decoder = Decoder::new();
        // bad compression, then an oversized length, then a valid packet
        decoder.feed(&[0x04, 0x09, 0x04, 0x00, 0xD0, 0x07]);
        decoder.feed(&data_packet(&[1, 2]));

        assert_eq!(decoder.stats().desyncs, 2);
        assert_eq!(decoder.buffer(), &[1, 2]);
    }

    #[test]
    fn test_wait_for_start_marker() {
        let config = Config::default().require_start_marker(true);
        let mut decoder = Decoder::with_config(&config);

        decoder.feed(&data_packet(&[1, 2]));
        assert_eq!(decoder.state(), ParserState::WaitStart);
        assert!(decoder.buffer().is_empty());

        decoder.feed(&[0xFF]);
        decoder.feed(&data_packet(&[1, 2]));
        assert_eq!(decoder.buffer(), &[1, 2]);
    }
}
