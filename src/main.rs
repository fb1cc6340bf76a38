//! # gbp-capture
//!
//! Save Game Boy Printer output received from a link-cable USB adapter.
//!
//! ```bash
//! # capture from the adapter, writing prints to ./prints
//! gbp-capture capture --out prints
//!
//! # decode a recorded byte stream
//! gbp-capture replay dump.bin --out prints
//! ```

use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use gbp_capture::{
    Config, DecodedImage, Error, Receiver, ReplayTransport, Sink, Status, StatusEvent, Transport,
    UsbAdapter, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID,
};

/// Game Boy Printer capture over a link-cable adapter
#[derive(Parser, Debug)]
#[command(name = "gbp-capture")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Receive prints from the USB adapter until it disconnects
    Capture {
        /// USB vendor id
        #[arg(long, default_value_t = DEFAULT_VENDOR_ID, value_parser = parse_id)]
        vid: u16,

        /// USB product id
        #[arg(long, default_value_t = DEFAULT_PRODUCT_ID, value_parser = parse_id)]
        pid: u16,

        /// Only use the adapter with this serial number
        #[arg(long)]
        serial: Option<String>,

        /// Wait per USB read in milliseconds
        #[arg(long, default_value = "5000")]
        read_timeout_ms: u64,

        /// Silence after which a partial print is dropped, in milliseconds
        #[arg(long, default_value = "2000")]
        print_timeout_ms: u64,

        /// Directory for the decoded prints
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Decode a recorded adapter byte stream
    Replay {
        /// Capture file
        file: PathBuf,

        /// Bytes handed to the decoder per read
        #[arg(long, default_value = "64")]
        chunk_size: usize,

        /// Directory for the decoded prints
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

fn parse_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid USB id {:?}: {}", s, e))
}

/// Writes every print as `print-NNNN.png`.
struct PngSink {
    out: PathBuf,
    count: usize,
}

impl Sink for PngSink {
    fn status(&mut self, event: StatusEvent) {
        match event.status {
            Status::Error => warn!("{}", event),
            _ => info!("{}", event),
        }
    }

    fn image(&mut self, image: DecodedImage) {
        self.count += 1;
        let path = self.out.join(format!("print-{:04}.png", self.count));
        match image.save_png(&path) {
            Ok(()) => info!(
                "saved {}x{} print to {}",
                image.width(),
                image.height(),
                path.display()
            ),
            Err(err) => error!("could not save {}: {}", path.display(), err),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Capture {
            vid,
            pid,
            serial,
            read_timeout_ms,
            print_timeout_ms,
            out,
        } => {
            let config = Config::new(vid, pid)
                .serial(serial)
                .read_timeout(Duration::from_millis(read_timeout_ms))
                .print_timeout(Duration::from_millis(print_timeout_ms));

            let adapter = UsbAdapter::open(&config)?;
            adapter.start()?;
            capture(adapter, &config, out)
        }
        Commands::Replay {
            file,
            chunk_size,
            out,
        } => {
            let config = Config::default().chunk_size(chunk_size);
            config.validate()?;

            let reader = BufReader::new(File::open(&file)?);
            capture(ReplayTransport::new(reader, chunk_size), &config, out)
        }
    }
}

fn capture<T: Transport>(transport: T, config: &Config, out: PathBuf) -> Result<(), Error> {
    fs::create_dir_all(&out)?;

    let mut sink = PngSink { out, count: 0 };
    let mut receiver = Receiver::new(transport, config);
    receiver.run(&mut sink, &AtomicBool::new(false))?;

    info!("{} print(s) saved", sink.count);
    Ok(())
}
