//! USB-1608FS-Plus Driver for Rust
//!
//! This crate provides a Rust driver for the Measurement Computing
//! USB-1608FS-Plus, an 8-channel 16-bit USB data-acquisition module. It
//! speaks the device's vendor-specific command protocol over USB control
//! and bulk transfers and exposes a channel-oriented analog input scanning
//! API.
//!
//! # Features
//!
//! - Continuous or fixed-count multichannel analog input scans at up to
//!   500 kHz aggregate, paced by the internal 40 MHz timer or an external
//!   clock on the SYNC pin
//! - Per-channel input ranges from ±10V down to ±0.3125V
//! - Calibrated voltage conversion using the slope/offset gain table stored
//!   in the device's nonvolatile memory
//! - Block and immediate bulk transfer modes, with overrun detection and
//!   recovery
//! - Device discovery by vendor/product ID or serial number
//! - JSON configuration of scan setups
//!
//! # Example
//!
//! ```no_run
//! use usb1608fs_plus::Usb1608fsPlus;
//!
//! fn main() -> usb1608fs_plus::Result<()> {
//!     let daq = Usb1608fsPlus::first_device()?;
//!     println!("Found {}", daq);
//!
//!     // The analog input session reads the gain table from the device
//!     let mut ai = daq.new_analog_input()?;
//!     ai.frequency = 20_000.0;
//!     ai.configure_channel(0, true, "10V", "pressure sensor")?;
//!     ai.configure_channel(1, true, "5V", "flow meter")?;
//!     ai.set_scan_ranges()?;
//!
//!     // Scan continuously, reading 256 scans at a time
//!     ai.start_scan(0)?;
//!     loop {
//!         match ai.read_scan(256) {
//!             Ok(data) => {
//!                 let volts = ai.voltages(&data)?;
//!                 println!("ch0 first sample: {:.5} V", volts[0][0]);
//!             }
//!             // Overrun recovery (stop + clear) has already run; restart
//!             Err(e) if e.is_retryable() => {
//!                 ai.start_scan(0)?;
//!             }
//!             Err(e) => return Err(e),
//!         }
//!     }
//! }
//! ```

pub mod analog;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod transport;
pub mod voltage;

// Re-export main types at crate root
pub use analog::{
    calculate_pacer_period, pack_scan_data, AnalogInput, Channel, Stall, TransferMode, TriggerType,
};
pub use calibration::{read_cal_memory, valid_cal_memory_range, GainTable};
pub use config::{AnalogConfig, ChannelConfig};
pub use constants::Command;
pub use device::Usb1608fsPlus;
pub use error::{DaqError, Result};
pub use transport::Transport;
pub use voltage::{
    adjust_raw_value, raw_volts_from_bytes, raw_volts_from_word, volts_from_bytes,
    volts_from_word, VoltageRange,
};
