//! Gain table and calibration memory access
//!
//! The device stores per-channel, per-gain-level calibration coefficients in
//! 768 bytes of nonvolatile memory (addresses 0x0000..=0x02FF) as IEEE-754
//! 4-byte floats: a slope word followed by an offset word for each (gain
//! level, channel) pair, at monotonically increasing addresses. The memory
//! is write protected; unlocking requires writing 0xAA55 to address 0x300.

use std::time::Duration;

use crate::constants::{
    Command, CAL_MEMORY_MAX_ADDRESS, CAL_MEMORY_SIZE, NUM_CHANNELS, NUM_GAIN_LEVELS,
};
use crate::error::{DaqError, Result};
use crate::transport::Transport;
use crate::voltage::VoltageRange;

/// Calibration slope/offset pairs for every (gain level, channel) pair.
///
/// Built once per device session and immutable afterward. Values are stored
/// on the device as f32 and widened to f64 here.
#[derive(Debug, Clone)]
pub struct GainTable {
    slope: [[f64; NUM_CHANNELS]; NUM_GAIN_LEVELS],
    offset: [[f64; NUM_CHANNELS]; NUM_GAIN_LEVELS],
}

impl GainTable {
    /// Populate the gain table by sequentially reading calibration memory.
    ///
    /// Fails with [`DaqError::CalibrationRead`] if any underlying transfer
    /// fails.
    pub fn read<T: Transport>(transport: &T, timeout: Duration) -> Result<Self> {
        let mut table = GainTable {
            slope: [[0.0; NUM_CHANNELS]; NUM_GAIN_LEVELS],
            offset: [[0.0; NUM_CHANNELS]; NUM_GAIN_LEVELS],
        };
        let mut address: u16 = 0;
        for gain in 0..NUM_GAIN_LEVELS {
            for channel in 0..NUM_CHANNELS {
                table.slope[gain][channel] = read_cal_f32(transport, address, timeout)?;
                address += 4;
                table.offset[gain][channel] = read_cal_f32(transport, address, timeout)?;
                address += 4;
            }
        }
        Ok(table)
    }

    /// Identity gain table (slope 1, offset 0) for use when the device's
    /// calibration should be bypassed.
    pub fn identity() -> Self {
        GainTable {
            slope: [[1.0; NUM_CHANNELS]; NUM_GAIN_LEVELS],
            offset: [[0.0; NUM_CHANNELS]; NUM_GAIN_LEVELS],
        }
    }

    /// Calibration slope for a channel at the given range
    pub fn slope(&self, range: VoltageRange, channel: usize) -> f64 {
        self.slope[range.code() as usize][channel]
    }

    /// Calibration offset for a channel at the given range
    pub fn offset(&self, range: VoltageRange, channel: usize) -> f64 {
        self.offset[range.code() as usize][channel]
    }
}

fn read_cal_f32<T: Transport>(transport: &T, address: u16, timeout: Duration) -> Result<f64> {
    let data = read_cal_memory(transport, address, 4, timeout).map_err(|err| {
        DaqError::CalibrationRead {
            address,
            source: Box::new(err),
        }
    })?;
    let bits = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    Ok(f64::from(f32::from_bits(bits)))
}

/// Read `count` bytes of nonvolatile calibration memory starting at
/// `address`.
///
/// Reads outside the 0x0000..=0x02FF range fail fast without touching the
/// transport.
pub fn read_cal_memory<T: Transport>(
    transport: &T,
    address: u16,
    count: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    if !valid_cal_memory_range(i64::from(address), count as i64) {
        return Err(DaqError::CalMemoryRange {
            address: i64::from(address),
            count: count as i64,
        });
    }
    let mut data = vec![0u8; count];
    transport.read_command(Command::CalibrationMemory, address, 0, &mut data, timeout)?;
    Ok(data)
}

/// Check whether a calibration memory read of `count` bytes at `address`
/// stays within the 768-byte memory (0x0000..=0x02FF).
pub fn valid_cal_memory_range(address: i64, count: i64) -> bool {
    if count <= 0 || count > CAL_MEMORY_SIZE as i64 {
        return false;
    }
    if address < 0 || address + count - 1 > CAL_MEMORY_MAX_ADDRESS {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TIMEOUT;
    use crate::transport::testing::FakeTransport;

    #[test]
    fn test_valid_cal_memory_range() {
        assert!(valid_cal_memory_range(0, 768));
        assert!(!valid_cal_memory_range(0, 769));
        assert!(valid_cal_memory_range(0x2FF, 1));
        assert!(!valid_cal_memory_range(0x2FF, 2));
        assert!(!valid_cal_memory_range(-1, 1));
        assert!(!valid_cal_memory_range(0, 0));
        assert!(!valid_cal_memory_range(0, -4));
    }

    #[test]
    fn test_out_of_range_read_fails_before_transfer() {
        let fake = FakeTransport::new();
        let err = read_cal_memory(&fake, 0x2FF, 2, DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, DaqError::CalMemoryRange { .. }));
        assert!(fake.sent.borrow().is_empty());
    }

    #[test]
    fn test_read_cal_memory() {
        let fake = FakeTransport::new();
        fake.cal_memory.borrow_mut()[16..20].copy_from_slice(&1.5f32.to_le_bytes());
        let data = read_cal_memory(&fake, 16, 4, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(data, 1.5f32.to_le_bytes());
    }

    #[test]
    fn test_gain_table_layout() {
        let fake = FakeTransport::new();
        {
            // Slope/offset pairs interleave at 4-byte strides: the pair for
            // (gain g, channel c) sits at address 8 * (g * 8 + c).
            let mut memory = fake.cal_memory.borrow_mut();
            for gain in 0..NUM_GAIN_LEVELS {
                for channel in 0..NUM_CHANNELS {
                    let base = 8 * (gain * NUM_CHANNELS + channel);
                    let slope = 1.0 + gain as f32 / 10.0;
                    let offset = -(channel as f32);
                    memory[base..base + 4].copy_from_slice(&slope.to_le_bytes());
                    memory[base + 4..base + 8].copy_from_slice(&offset.to_le_bytes());
                }
            }
        }
        let table = GainTable::read(&fake, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(table.slope(VoltageRange::Range10V, 0), 1.0);
        assert_eq!(table.offset(VoltageRange::Range10V, 3), -3.0);
        assert_eq!(
            table.slope(VoltageRange::Range2_5V, 5),
            f64::from(1.0f32 + 2.0f32 / 10.0)
        );
        assert_eq!(table.offset(VoltageRange::Range0_3125V, 7), -7.0);
    }

    #[test]
    fn test_identity_table() {
        let table = GainTable::identity();
        assert_eq!(table.slope(VoltageRange::Range5V, 4), 1.0);
        assert_eq!(table.offset(VoltageRange::Range5V, 4), 0.0);
    }
}
