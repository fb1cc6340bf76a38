//! Receive loop tying a transport to the decoder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::{
    config::Config,
    decoder::{Decoder, Event},
    status::{Status, StatusEvent},
    tile::DecodedImage,
    transport::{Chunk, Transport},
    Error,
};

/// Destination for everything the receive loop produces.
pub trait Sink {
    fn status(&mut self, event: StatusEvent);
    fn image(&mut self, image: DecodedImage);
}

impl Sink for Vec<Event> {
    fn status(&mut self, event: StatusEvent) {
        self.push(Event::Status(event));
    }

    fn image(&mut self, image: DecodedImage) {
        self.push(Event::Image(image));
    }
}

pub struct Receiver<T> {
    transport: T,
    decoder: Decoder,
    read_timeout: Duration,
    last_data: Instant,
}

impl<T: Transport> Receiver<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Receiver {
            transport,
            decoder: Decoder::with_config(config),
            read_timeout: config.read_timeout,
            last_data: Instant::now(),
        }
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Read and decode until the transport disconnects or `stop` is set.
    ///
    /// `stop` is checked between chunks. Read timeouts and protocol
    /// trouble never end the loop; only a disconnect or a transport error does.
    pub fn run(&mut self, sink: &mut impl Sink, stop: &AtomicBool) -> Result<(), Error> {
        sink.status(StatusEvent::new(Status::Idle, "waiting for data", 0));

        while !stop.load(Ordering::Relaxed) {
            if !self.poll(sink)? {
                break;
            }
        }

        let stats = self.decoder.stats();
        info!(
            "capture ended: {} bytes, {} packets, {} images, {} desyncs, {} aborts, {} timeouts",
            stats.bytes, stats.packets, stats.images, stats.desyncs, stats.aborts, stats.timeouts
        );
        Ok(())
    }

    /// Handle a single read. Returns `false` once the transport is gone.
    pub fn poll(&mut self, sink: &mut impl Sink) -> Result<bool, Error> {
        let timeout = self.next_timeout();

        let chunk = match self.transport.read_chunk(timeout) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!("read failed: {}", err);
                sink.status(StatusEvent::new(
                    Status::Error,
                    err.to_string(),
                    self.decoder.buffer().len(),
                ));
                return Err(err);
            }
        };

        match chunk {
            Chunk::Data(bytes) => {
                self.last_data = Instant::now();
                for event in self.decoder.feed(&bytes) {
                    deliver(sink, event);
                }
            }
            Chunk::Timeout => {
                debug!("no data within {:?}", timeout);
                if let Some(event) = self.decoder.idle(self.last_data.elapsed()) {
                    deliver(sink, event);
                }
            }
            Chunk::Disconnected => {
                sink.status(StatusEvent::new(
                    Status::Error,
                    "disconnected",
                    self.decoder.buffer().len(),
                ));
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Wait no longer than the print timeout while a print is buffered, so
    /// a stalled print is noticed on time.
    fn next_timeout(&self) -> Duration {
        if self.decoder.buffer().is_empty() {
            self.read_timeout
        } else {
            self.read_timeout.min(self.decoder.print_timeout())
        }
    }
}

fn deliver(sink: &mut impl Sink, event: Event) {
    match event {
        Event::Status(status) => sink.status(status),
        Event::Image(image) => sink.image(image),
    }
}
