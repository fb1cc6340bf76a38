use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use gbp_capture::{
    rle, Config, DecodedImage, Decoder, Event, ParserState, ReplayTransport, Receiver, Status,
    ABORT_SEQUENCE, PALETTE,
};
use pretty_assertions::assert_eq;

fn packet(command: u8, compressed: bool, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![command, compressed as u8];
    bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Two tile rows: a black bar on the left of row one, a dark gray tile starting row two.
fn tile_data() -> Vec<u8> {
    let mut tiles = vec![0x00; 21 * 16];
    tiles[..16].copy_from_slice(&[0xFF; 16]);
    for row in 0..8 {
        tiles[20 * 16 + row * 2 + 1] = 0xFF;
    }
    tiles
}

/// Game session as relayed by the adapter: init, data split in two
/// compressed packets, end of data, print, trigger.
fn print_stream() -> Vec<u8> {
    let tiles = tile_data();
    let (first, second) = tiles.split_at(160);

    let mut stream = vec![0xFF];
    stream.extend(packet(0x01, false, &[]));
    stream.extend(packet(0x0F, false, &[]));
    stream.extend(packet(0x04, true, &rle::compress(first)));
    stream.extend([0x88, 0x33]);
    stream.extend(packet(0x04, true, &rle::compress(second)));
    stream.extend(packet(0x04, false, &[]));
    stream.extend(packet(0x02, false, &[0x01, 0x00, 0xE4, 0x40]));
    stream.push(0xFE);
    stream
}

fn images(events: Vec<Event>) -> Vec<DecodedImage> {
    events
        .into_iter()
        .filter_map(|event| match event {
            Event::Image(image) => Some(image),
            _ => None,
        })
        .collect()
}

#[test]
fn replay_decodes_print() {
    let transport = ReplayTransport::new(Cursor::new(print_stream()), 5);
    let mut receiver = Receiver::new(transport, &Config::default());
    let mut events = Vec::new();

    receiver
        .run(&mut events, &AtomicBool::new(false))
        .expect("replay should not fail");

    let images = images(events);
    assert_eq!(images.len(), 1);

    let image = &images[0];
    assert_eq!((image.width(), image.height()), (160, 16));
    assert_eq!(image.tiles(), 21);
    assert_eq!(image.pixel(3, 3), Some(PALETTE[3]));
    assert_eq!(image.pixel(10, 3), Some(PALETTE[0]));
    assert_eq!(image.pixel(0, 8), Some(PALETTE[2]));
    // remainder of the second row was never printed
    assert_eq!(image.pixel(100, 12), Some(PALETTE[0]));
    assert_eq!(receiver.decoder().stats().images, 1);
}

#[test]
fn prints_arrive_in_order() {
    let mut stream = print_stream();
    stream.extend(packet(0x04, false, &[0xFF; 32]));
    stream.push(0xFE);

    let mut decoder = Decoder::new();
    let images = images(decoder.feed(&stream));

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].tiles(), 21);
    assert_eq!(images[1].tiles(), 2);
}

#[test]
fn abort_discards_partial_print() {
    let mut stream = print_stream();
    let trigger = stream.pop();
    assert_eq!(trigger, Some(0xFE));
    // half of another data packet, then the abort marker
    stream.extend(&packet(0x04, false, &[0x55; 64])[..20]);
    stream.extend(ABORT_SEQUENCE);
    stream.push(0xFE);

    let mut decoder = Decoder::new();
    let events = decoder.feed(&stream);

    assert!(events.iter().any(|event| matches!(
        event,
        Event::Status(status) if status.status == Status::Cancelled
    )));
    assert!(images(events).is_empty());
    assert_eq!(decoder.state(), ParserState::WaitCommand);
    assert!(decoder.buffer().is_empty());
}

#[test]
fn stalled_print_times_out() {
    let mut stream = print_stream();
    stream.pop();

    let mut decoder = Decoder::new();
    decoder.feed(&stream);
    assert_eq!(decoder.buffer().len(), 21 * 16);

    let event = decoder.idle(Duration::from_secs(3));
    assert!(matches!(
        event,
        Some(Event::Status(ref status)) if status.status == Status::Cancelled
    ));
    assert!(decoder.feed(&[0xFE]).is_empty());
}
