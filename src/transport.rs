//! Device transport abstraction
//!
//! Everything that talks to the DAQ does so through the [`Transport`] trait:
//! vendor control transfers out and in, plus bulk reads of scan data. The
//! concrete implementation lives on [`crate::device::Usb1608fsPlus`]; tests
//! substitute an in-memory fake.

use std::time::Duration;

use crate::constants::Command;
use crate::error::Result;

/// Capability required to drive a USB-1608FS-Plus.
///
/// All operations are blocking and bounded by the given timeout. Every call
/// may fail; callers must not assume success.
pub trait Transport {
    /// Send a vendor command with a payload (host-to-device control
    /// transfer). Returns the number of bytes transferred.
    fn send_command(
        &self,
        cmd: Command,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize>;

    /// Send a vendor command and read its response (device-to-host control
    /// transfer). Returns the number of bytes read into `data`.
    fn read_command(
        &self,
        cmd: Command,
        value: u16,
        index: u16,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize>;

    /// Read scan data from the bulk IN endpoint. Returns the number of
    /// bytes read into `data`.
    fn read_bulk(&self, data: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Read the device status byte. Bit 1 is the scan-running flag and
    /// bit 2 the overrun flag. Reading the status also clears the device's
    /// error indicators.
    fn status(&self, timeout: Duration) -> Result<u8> {
        let mut data = [0u8; 2];
        self.read_command(Command::GetStatus, 0, 0, &mut data, timeout)?;
        Ok(u16::from_le_bytes(data) as u8)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send_command(
        &self,
        cmd: Command,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize> {
        (**self).send_command(cmd, value, index, data, timeout)
    }

    fn read_command(
        &self,
        cmd: Command,
        value: u16,
        index: u16,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        (**self).read_command(cmd, value, index, data, timeout)
    }

    fn read_bulk(&self, data: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read_bulk(data, timeout)
    }
}
