//! Byte sources feeding the decoder.
//!
//! [`UsbAdapter`] talks to the link-cable adapter over USB bulk transfers,
//! [`ReplayTransport`] plays back a recorded capture.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use log::{debug, info, warn};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};

use crate::{config::Config, error::Error};

/// Result of one read from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Vec<u8>),
    /// Nothing arrived within the timeout. Expected while the game is idle.
    Timeout,
    /// The adapter went away or the capture ended.
    Disconnected,
}

pub trait Transport {
    fn read_chunk(&mut self, timeout: Duration) -> Result<Chunk, Error>;
}

/// Plays back a recorded byte stream in fixed size chunks.
pub struct ReplayTransport<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: Read> ReplayTransport<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        ReplayTransport {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R: Read> Transport for ReplayTransport<R> {
    fn read_chunk(&mut self, _timeout: Duration) -> Result<Chunk, Error> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(Chunk::Disconnected),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Chunk::Data(buf));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    config: u8,
    iface: u8,
    setting: u8,
    address: u8,
}

// CDC ACM class request; firmware only streams while DTR is raised.
const SET_CONTROL_LINE_STATE: u8 = 0x22;
const CLASS_INTERFACE_OUT: u8 = 0x21;
const LINE_STATE_DTR: u16 = 0x0001;

/// USB connection to the link-cable adapter.
pub struct UsbAdapter {
    handle: Box<DeviceHandle<Context>>,
    endpoint_in: Endpoint,
    chunk_size: usize,
}

impl UsbAdapter {
    pub fn open(config: &Config) -> Result<Self, Error> {
        config.validate()?;

        let mut context = Context::new()?;
        let (mut device, device_desc, mut handle) = match Self::open_device(
            &mut context,
            config.vendor_id,
            config.product_id,
            config.serial.as_deref(),
        ) {
            Ok(found) => found,
            Err(err) => {
                debug!("{:?}", err);
                return Err(Error::DeviceOffline);
            }
        };
        handle.reset()?;

        let endpoint_in = Self::find_endpoint(
            &mut device,
            &device_desc,
            Direction::In,
            TransferType::Bulk,
        )
        .ok_or(Error::MissingEndpoint)?;

        // Linux binds cdc_acm to the adapter, it has to let go of the interface first.
        handle.set_auto_detach_kernel_driver(true).ok();
        let has_kernel_driver = matches!(handle.kernel_driver_active(endpoint_in.iface), Ok(true));
        info!(" Kernel driver support is {}", has_kernel_driver);

        handle.set_active_configuration(endpoint_in.config)?;
        handle.claim_interface(endpoint_in.iface)?;
        handle.set_alternate_setting(endpoint_in.iface, endpoint_in.setting)?;
        debug!("bulk in {:?}", endpoint_in);

        Ok(UsbAdapter {
            handle: Box::new(handle),
            endpoint_in,
            chunk_size: config.chunk_size,
        })
    }

    fn open_device(
        context: &mut Context,
        vid: u16,
        pid: u16,
        serial: Option<&str>,
    ) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>), Error> {
        let devices = context.devices()?;

        if devices.is_empty() {
            debug!("Failed to read device list");
            return Err(Error::DeviceListNotReadable);
        }
        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() != vid || device_desc.product_id() != pid {
                continue;
            }
            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    debug!("Failed to open device: {:?}", err);
                    continue;
                }
            };

            let wanted = match serial {
                Some(wanted) => wanted,
                None => return Ok((device, device_desc, handle)),
            };
            let timeout = Duration::from_secs(1);
            let languages = handle.read_languages(timeout)?;
            let language = match languages.first() {
                Some(&language) => language,
                None => continue,
            };
            match handle.read_serial_number_string(language, &device_desc, timeout) {
                Ok(s) if s == wanted => return Ok((device, device_desc, handle)),
                Ok(_) => continue,
                Err(err) => {
                    debug!("Failed to read serial number string: {:?}", err);
                    continue;
                }
            }
        }
        debug!("No device match {:04x}:{:04x} serial {:?}", vid, pid, serial);
        Err(Error::DeviceOffline)
    }

    fn find_endpoint(
        device: &mut Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == transfer_type
                        {
                            return Some(Endpoint {
                                config: config_desc.number(),
                                iface: interface_desc.interface_number(),
                                setting: interface_desc.setting_number(),
                                address: endpoint_desc.address(),
                            });
                        }
                    }
                }
            }
        }
        None
    }

    /// Tell the firmware the host is listening.
    pub fn start(&self) -> Result<(), Error> {
        self.set_line_state(LINE_STATE_DTR)
    }

    pub fn stop(&self) -> Result<(), Error> {
        self.set_line_state(0)
    }

    fn set_line_state(&self, value: u16) -> Result<(), Error> {
        // The control interface precedes the data interface on CDC devices.
        let control_iface = self.endpoint_in.iface.saturating_sub(1);
        self.handle.write_control(
            CLASS_INTERFACE_OUT,
            SET_CONTROL_LINE_STATE,
            value,
            control_iface as u16,
            &[],
            Duration::from_secs(1),
        )?;
        debug!("line state {:#06x} on interface {}", value, control_iface);
        Ok(())
    }
}

impl Transport for UsbAdapter {
    fn read_chunk(&mut self, timeout: Duration) -> Result<Chunk, Error> {
        let mut buf = vec![0u8; self.chunk_size];
        match self
            .handle
            .read_bulk(self.endpoint_in.address, &mut buf, timeout)
        {
            Ok(0) => Ok(Chunk::Timeout),
            Ok(n) => {
                buf.truncate(n);
                Ok(Chunk::Data(buf))
            }
            Err(rusb::Error::Timeout) | Err(rusb::Error::Interrupted) => Ok(Chunk::Timeout),
            Err(rusb::Error::NoDevice) | Err(rusb::Error::Io) => {
                warn!("adapter disconnected");
                Ok(Chunk::Disconnected)
            }
            Err(e) => Err(Error::UsbError(e)),
        }
    }
}

impl Drop for UsbAdapter {
    fn drop(&mut self) {
        self.stop().ok();
        self.handle.release_interface(self.endpoint_in.iface).ok();
    }
}
