use std::time::Duration;

use crate::error::Error;

/// Vendor id of the RP2040 based link-cable adapters.
pub const DEFAULT_VENDOR_ID: u16 = 0x2E8A;

pub const DEFAULT_PRODUCT_ID: u16 = 0x000A;

pub(crate) const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const DEFAULT_PRINT_TIMEOUT: Duration = Duration::from_millis(2000);

const DEFAULT_CHUNK_SIZE: usize = 64;

/// Config
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) serial: Option<String>,
    pub(crate) read_timeout: Duration,
    pub(crate) print_timeout: Duration,
    pub(crate) require_start_marker: bool,
    pub(crate) chunk_size: usize,
}

impl Config {
    /// Initialize configuration data with default values for the adapter with the given USB ids.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use gbp_capture::Config;
    ///
    /// let config = Config::new(0x2E8A, 0x000A)
    ///     .serial(Some("E6614103E7".to_string()))
    ///     .print_timeout(Duration::from_millis(1500));
    /// assert!(config.validate().is_ok());
    /// ```
    ///
    pub fn new(vendor_id: u16, product_id: u16) -> Config {
        Config {
            vendor_id,
            product_id,
            serial: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            print_timeout: DEFAULT_PRINT_TIMEOUT,
            require_start_marker: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Only open the adapter reporting this serial number.
    pub fn serial(self, serial: Option<String>) -> Self {
        Config { serial, ..self }
    }

    /// How long a single read waits before reporting a timeout.
    pub fn read_timeout(self, read_timeout: Duration) -> Self {
        Config {
            read_timeout,
            ..self
        }
    }

    /// Quiet interval after which a partial print is thrown away.
    pub fn print_timeout(self, print_timeout: Duration) -> Self {
        Config {
            print_timeout,
            ..self
        }
    }

    pub fn require_start_marker(self, flag: bool) -> Self {
        Config {
            require_start_marker: flag,
            ..self
        }
    }

    pub fn chunk_size(self, chunk_size: usize) -> Self {
        Config { chunk_size, ..self }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.read_timeout.is_zero() {
            return Err(Error::InvalidConfig("read timeout must be nonzero".to_string()));
        }
        if self.print_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "print timeout must be nonzero".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be nonzero".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID)
    }
}
