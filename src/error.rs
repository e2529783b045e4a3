//! Error types for the USB-1608FS-Plus library
//!
//! This module defines the error types used throughout the library
//! for handling USB communication and protocol errors.

use thiserror::Error;

/// Result type alias for USB-1608FS-Plus operations
pub type Result<T> = std::result::Result<T, DaqError>;

/// Error types for USB-1608FS-Plus operations
#[derive(Error, Debug)]
pub enum DaqError {
    /// USB error from the rusb library
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// No USB-1608FS-Plus found
    #[error("No USB-1608FS-Plus device found")]
    DeviceNotFound,

    /// No device with the requested serial number found
    #[error("No USB-1608FS-Plus with serial number {0} found")]
    SerialNotFound(String),

    /// Failed to claim interface
    #[error("Failed to claim USB interface: {0}")]
    ClaimInterface(rusb::Error),

    /// Failed to detach kernel driver
    #[error("Failed to detach kernel driver: {0}")]
    DetachKernelDriver(rusb::Error),

    /// Control transfer failed, tagged with the originating command
    #[error("Command '{command}' failed: {source}")]
    ControlTransfer {
        command: &'static str,
        #[source]
        source: rusb::Error,
    },

    /// Bulk transfer failed
    #[error("Bulk transfer failed: {0}")]
    BulkTransfer(rusb::Error),

    /// Timeout during a bulk read
    #[error("Read timeout")]
    ReadTimeout,

    /// Unrecognized voltage range string
    #[error("Invalid voltage input range {0:?}")]
    InvalidRange(String),

    /// Unrecognized trigger type string
    #[error("Invalid trigger type {0:?}")]
    InvalidTrigger(String),

    /// Channel index outside the device's channel count
    #[error("Channel {channel} outside valid range 0..{num_channels}")]
    InvalidChannel { channel: usize, num_channels: usize },

    /// Requested calibration memory read outside 0x0000..=0x02FF
    #[error("Calibration memory access outside range 0x0000 to 0x02FF (address {address}, count {count})")]
    CalMemoryRange { address: i64, count: i64 },

    /// Failed to populate the gain table from calibration memory
    #[error("Failed to read gain table at address 0x{address:04x}: {source}")]
    CalibrationRead {
        address: u16,
        #[source]
        source: Box<DaqError>,
    },

    /// A stop/clear/start sub-step of starting a scan failed
    #[error("Failed to {phase} prior to starting analog input scan: {source}")]
    ScanStart {
        phase: &'static str,
        #[source]
        source: Box<DaqError>,
    },

    /// Requested scan read does not tile the bulk packet size
    #[error(
        "Scan read of {bytes} bytes is not a non-zero multiple of the {packet_size}-byte bulk packet size"
    )]
    Framing { bytes: usize, packet_size: usize },

    /// Scan data buffer does not divide evenly into whole scans
    #[error("Scan buffer of {len} bytes does not divide into {bytes_per_scan}-byte scans")]
    ScanBufferSize { len: usize, bytes_per_scan: usize },

    /// Device FIFO overran during a scan. The session has already issued
    /// stop + clear-buffer; `data` holds the samples collected before the
    /// overrun, which are valid.
    #[error("Analog input scan overrun")]
    ScanOverrun { data: Vec<u8> },

    /// Block-mode bulk read returned fewer bytes than requested
    #[error("Short bulk read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Immediate-mode transfer did not return a whole sample word
    #[error("Incomplete sample word: expected 2 bytes, got {actual}")]
    IncompleteWord { actual: usize },

    /// Configuration (de)serialization failed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl DaqError {
    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DaqError::ReadTimeout
                | DaqError::Usb(rusb::Error::Timeout)
                | DaqError::BulkTransfer(rusb::Error::Timeout)
                | DaqError::ControlTransfer {
                    source: rusb::Error::Timeout,
                    ..
                }
        )
    }

    /// Check if the failed operation may be retried against the device.
    /// Overrun recovery (stop + clear) has already run by the time a
    /// `ScanOverrun` is surfaced, so a fresh scan can be started.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DaqError::ScanOverrun { .. }) || self.is_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrun_is_retryable() {
        let err = DaqError::ScanOverrun { data: vec![0; 64] };
        assert!(err.is_retryable());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_framing_is_not_retryable() {
        let err = DaqError::Framing {
            bytes: 10,
            packet_size: 64,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_detection() {
        let err = DaqError::BulkTransfer(rusb::Error::Timeout);
        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }
}
