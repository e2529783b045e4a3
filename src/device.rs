//! USB-1608FS-Plus device implementation
//!
//! This module provides the `Usb1608fsPlus` struct for opening and driving
//! a Measurement Computing USB-1608FS-Plus DAQ over USB: device discovery by
//! vendor/product ID or serial number, the vendor control-transfer plumbing
//! behind the [`Transport`] trait, and the simple one-shot commands (blink
//! LED, reset, status, serial number, firmware upgrade).

use std::time::Duration;

use rusb::{DeviceHandle, Direction, GlobalContext, Recipient, RequestType};

use crate::analog::AnalogInput;
use crate::calibration::GainTable;
use crate::constants::{
    Command, BULK_IN_ENDPOINT, DEFAULT_TIMEOUT, MCC_VENDOR_ID, USB1608FS_PLUS_PRODUCT_ID,
};
use crate::error::{DaqError, Result};
use crate::transport::Transport;
use crate::voltage::VoltageRange;

/// USB-1608FS-Plus device handle
///
/// # Example
///
/// ```no_run
/// use usb1608fs_plus::Usb1608fsPlus;
///
/// let daq = Usb1608fsPlus::first_device()?;
/// println!("Found {}", daq);
/// daq.blink_led(3)?;
///
/// let mut ai = daq.new_analog_input()?;
/// ai.configure_channel(0, true, "10V", "accelerometer")?;
/// ai.set_scan_ranges()?;
/// # Ok::<(), usb1608fs_plus::DaqError>(())
/// ```
pub struct Usb1608fsPlus {
    /// USB device handle
    handle: DeviceHandle<GlobalContext>,
    /// Per-call transfer timeout
    timeout: Duration,
    /// USB bus number
    bus: u8,
    /// USB device address
    address: u8,
}

impl Usb1608fsPlus {
    /// Open a device: detach any kernel driver and claim the bulk interface.
    fn new(handle: DeviceHandle<GlobalContext>, bus: u8, address: u8) -> Result<Self> {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            if handle.kernel_driver_active(0).unwrap_or(false) {
                handle
                    .detach_kernel_driver(0)
                    .map_err(DaqError::DetachKernelDriver)?;
            }
        }

        handle
            .claim_interface(0)
            .map_err(DaqError::ClaimInterface)?;

        Ok(Self {
            handle,
            timeout: DEFAULT_TIMEOUT,
            bus,
            address,
        })
    }

    fn is_usb1608fs_plus(vendor_id: u16, product_id: u16) -> bool {
        vendor_id == MCC_VENDOR_ID && product_id == USB1608FS_PLUS_PRODUCT_ID
    }

    /// Scan for USB-1608FS-Plus devices.
    ///
    /// Returns every connected device that could be opened and claimed.
    pub fn scan() -> Result<Vec<Usb1608fsPlus>> {
        let mut devices = Vec::new();

        for device in rusb::devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(_) => continue,
            };

            if Self::is_usb1608fs_plus(desc.vendor_id(), desc.product_id()) {
                let handle = match device.open() {
                    Ok(handle) => handle,
                    Err(_) => continue,
                };

                if let Ok(daq) = Usb1608fsPlus::new(handle, device.bus_number(), device.address())
                {
                    devices.push(daq);
                }
            }
        }

        Ok(devices)
    }

    /// Open the first USB-1608FS-Plus found.
    pub fn first_device() -> Result<Usb1608fsPlus> {
        for device in rusb::devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(_) => continue,
            };

            if Self::is_usb1608fs_plus(desc.vendor_id(), desc.product_id()) {
                let handle = device.open()?;
                return Usb1608fsPlus::new(handle, device.bus_number(), device.address());
            }
        }

        Err(DaqError::DeviceNotFound)
    }

    /// Open the USB-1608FS-Plus with the given serial number.
    ///
    /// Serial numbers are read from the USB string descriptor, so several
    /// devices on one bus can be told apart and driven independently.
    pub fn find_by_serial(serial: &str) -> Result<Usb1608fsPlus> {
        for device in rusb::devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(_) => continue,
            };

            if !Self::is_usb1608fs_plus(desc.vendor_id(), desc.product_id()) {
                continue;
            }

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(_) => continue,
            };

            let index = match desc.serial_number_string_index() {
                Some(index) => index,
                None => continue,
            };
            match handle.read_string_descriptor_ascii(index) {
                Ok(sn) if sn == serial => {
                    log::debug!("found USB-1608FS-Plus with S/N {}", serial);
                    return Usb1608fsPlus::new(handle, device.bus_number(), device.address());
                }
                _ => continue,
            }
        }

        Err(DaqError::SerialNotFound(serial.to_string()))
    }

    /// Set the per-call transfer timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Get the USB bus number
    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Get the USB device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Create an analog input session bound to this device.
    ///
    /// Reads the gain table out of calibration memory first; the session
    /// owns the table for its lifetime.
    pub fn new_analog_input(&self) -> Result<AnalogInput<&Usb1608fsPlus>> {
        let gain_table = GainTable::read(&self, self.timeout)?;
        Ok(AnalogInput::new(self, gain_table))
    }

    /// Blink the device LED the given number of times. The LED starts
    /// unlit but ends lit.
    pub fn blink_led(&self, count: u8) -> Result<()> {
        self.send_command(Command::BlinkLed, 0, 0, &[count], self.timeout)?;
        Ok(())
    }

    /// Reset the device.
    pub fn reset(&self) -> Result<()> {
        self.send_command(Command::Reset, 0, 0, &[0x00], self.timeout)?;
        Ok(())
    }

    /// Read the device status byte and clear its error indicators.
    pub fn status(&self) -> Result<u8> {
        Transport::status(self, self.timeout)
    }

    /// Read the serial number via the vendor command (as opposed to the
    /// USB string descriptor).
    pub fn serial_number(&self) -> Result<String> {
        let mut data = [0u8; 8];
        self.read_command(Command::SerialNumber, 0, 0, &mut data, self.timeout)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Read a single conversion from an analog input channel. This command
    /// will stall the bus if a scan is currently running.
    pub fn read_analog_input(&self, channel: u8, range: VoltageRange) -> Result<u16> {
        let mut data = [0u8; 2];
        self.read_command(
            Command::AnalogInput,
            u16::from(channel),
            u16::from(range.code()),
            &mut data,
            self.timeout,
        )?;
        Ok(u16::from_le_bytes(data))
    }

    /// Place the device in firmware upgrade (DFU) mode by erasing part of
    /// its program memory. After the next reset the device enumerates in
    /// the bootloader and is unusable as a DAQ until new firmware is
    /// loaded.
    pub fn upgrade_firmware(&self) -> Result<()> {
        let key = 0xADAD;
        self.send_command(Command::UpgradeFirmware, key, 0, &[], self.timeout)?;
        Ok(())
    }
}

impl Transport for Usb1608fsPlus {
    fn send_command(
        &self,
        cmd: Command,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize> {
        // The device expects at least one payload byte on every command
        let data = if data.is_empty() { &[0u8][..] } else { data };
        self.handle
            .write_control(
                rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device),
                cmd.code(),
                value,
                index,
                data,
                timeout,
            )
            .map_err(|source| DaqError::ControlTransfer {
                command: cmd.description(),
                source,
            })
    }

    fn read_command(
        &self,
        cmd: Command,
        value: u16,
        index: u16,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        self.handle
            .read_control(
                rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device),
                cmd.code(),
                value,
                index,
                data,
                timeout,
            )
            .map_err(|source| DaqError::ControlTransfer {
                command: cmd.description(),
                source,
            })
    }

    fn read_bulk(&self, data: &mut [u8], timeout: Duration) -> Result<usize> {
        match self.handle.read_bulk(BULK_IN_ENDPOINT, data, timeout) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Err(DaqError::ReadTimeout),
            Err(e) => Err(DaqError::BulkTransfer(e)),
        }
    }
}

impl std::fmt::Display for Usb1608fsPlus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "USB-1608FS-Plus {:04x}:{:04x} (bus {}, addr {})",
            MCC_VENDOR_ID, USB1608FS_PLUS_PRODUCT_ID, self.bus, self.address
        )
    }
}

impl std::fmt::Debug for Usb1608fsPlus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Usb1608fsPlus")
            .field("bus", &self.bus)
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Drop for Usb1608fsPlus {
    fn drop(&mut self) {
        // Leave no scan running and release the interface
        let _ = self.send_command(Command::AnalogStopScan, 0, 0, &[], self.timeout);
        let _ = self.handle.release_interface(0);
    }
}
