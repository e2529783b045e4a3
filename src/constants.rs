//! USB-1608FS-Plus protocol constants
//!
//! This module contains the vendor command codes, status bits, and device
//! geometry constants used by the USB-1608FS-Plus wire protocol.

use std::time::Duration;

// ============================================================================
// USB Vendor/Product IDs
// ============================================================================

/// Measurement Computing vendor ID
pub const MCC_VENDOR_ID: u16 = 0x09DB;
/// USB-1608FS-Plus product ID
pub const USB1608FS_PLUS_PRODUCT_ID: u16 = 0x00EA;

/// Bulk IN endpoint carrying analog scan data
pub const BULK_IN_ENDPOINT: u8 = 0x81;

/// Default per-call transfer timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

// ============================================================================
// Device Geometry
// ============================================================================

/// Number of analog input channels
pub const NUM_CHANNELS: usize = 8;
/// Number of gain levels in the calibration table
pub const NUM_GAIN_LEVELS: usize = 8;

/// Maximum bulk transfer packet size for a full-speed device. Scan reads
/// must tile this size exactly or the device FIFO state becomes ambiguous.
pub const MAX_BULK_TRANSFER_PACKET_SIZE: usize = 64;

// ============================================================================
// Pacer Timing
// ============================================================================

/// Base rate of the internal 32-bit pacer timer
pub const BASE_CLOCK_HZ: f64 = 40e6;
/// Maximum internal pacer frequency; higher requests are clamped
pub const MAX_FREQUENCY_HZ: f64 = 500_000.0;
/// Sampling frequency used when none is configured
pub const DEFAULT_FREQUENCY_HZ: f64 = 10_000.0;

// ============================================================================
// Calibration Memory
// ============================================================================

/// Size of the nonvolatile calibration memory in bytes
pub const CAL_MEMORY_SIZE: usize = 768;
/// Highest addressable calibration memory location (0x0000..=0x02FF)
pub const CAL_MEMORY_MAX_ADDRESS: i64 = 0x02FF;

// ============================================================================
// Status Bits (from GetStatus response)
// ============================================================================

/// An analog input scan is running
pub const STATUS_SCAN_RUNNING: u8 = 1 << 1;
/// The scan FIFO overran and the bulk endpoint stalled
pub const STATUS_SCAN_OVERRUN: u8 = 1 << 2;

// ============================================================================
// Vendor Command Codes
// ============================================================================

/// Vendor-specific command codes sent in the bRequest field of a control
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Digital I/O commands
    DigitalTristate = 0x00,
    DigitalPort = 0x01,
    DigitalLatch = 0x02,
    // Analog input commands
    AnalogInput = 0x10,
    AnalogStartScan = 0x11,
    AnalogStopScan = 0x12,
    AnalogConfig = 0x14,
    AnalogClearBuffer = 0x15,
    // Counter/timer commands
    EventCounter = 0x20,
    // Memory commands
    CalibrationMemory = 0x30,
    UserMemory = 0x31,
    MbdMemory = 0x32,
    // Miscellaneous commands
    BlinkLed = 0x41,
    Reset = 0x42,
    GetStatus = 0x44,
    SerialNumber = 0x48,
    UpgradeFirmware = 0x50,
    // Message-Based DAQ (MBD) protocol commands
    TextMbd = 0x80,
    RawMbd = 0x81,
}

impl Command {
    /// Get the wire code for this command
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Get a human-readable description of this command
    pub fn description(self) -> &'static str {
        match self {
            Command::DigitalTristate => "Read/write tri-state register",
            Command::DigitalPort => "Read digital port pins",
            Command::DigitalLatch => "Read/write digital port output latch register",
            Command::AnalogInput => "Read analog input channel",
            Command::AnalogStartScan => "Start analog input scan",
            Command::AnalogStopScan => "Stop analog input scan",
            Command::AnalogConfig => "Configure the analog input channel",
            Command::AnalogClearBuffer => "Clear the analog input scan FIFO buffer",
            Command::EventCounter => "Read/reset event counter",
            Command::CalibrationMemory => "Read/write calibration memory",
            Command::UserMemory => "Read/write user memory",
            Command::MbdMemory => "Read/write Message-Based DAQ (MBD) memory",
            Command::BlinkLed => "Blink LED",
            Command::Reset => "Reset device",
            Command::GetStatus => "Read device status",
            Command::SerialNumber => "Read/write serial number",
            Command::UpgradeFirmware => "Enter device firmware upgrade (DFU) mode",
            Command::TextMbd => "Text-based MBD command/response",
            Command::RawMbd => "Raw MBD response",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
