//! Analog input scan engine
//!
//! This module provides the [`AnalogInput`] session for configuring and
//! running a continuous multichannel scan: per-channel enablement and
//! voltage ranges, pacer frequency, the 10-byte start-scan command, and the
//! transfer-mode-specific read protocol with end-of-scan drain and overrun
//! recovery.
//!
//! The ADC is paced by an internal 32-bit timer running at a 40 MHz base
//! rate. The pacer period is `40 MHz / frequency - 1`; a period of 0 tells
//! the device to treat the SYNC pin as an externally driven clock input
//! instead of generating its own pacing.
//!
//! Scan data arrives on the bulk IN endpoint as little-endian u16 words,
//! one word per enabled channel per scan cycle, low channel first. In block
//! transfer mode the device sends 64-byte packets as soon as data is
//! available; in immediate transfer mode it sends one short packet per scan
//! cycle, which is only usable at low pacer rates.

use std::str::FromStr;
use std::time::Duration;

use crate::calibration::GainTable;
use crate::constants::{
    Command, BASE_CLOCK_HZ, DEFAULT_FREQUENCY_HZ, DEFAULT_TIMEOUT, MAX_BULK_TRANSFER_PACKET_SIZE,
    MAX_FREQUENCY_HZ, NUM_CHANNELS, STATUS_SCAN_OVERRUN, STATUS_SCAN_RUNNING,
};
use crate::error::{DaqError, Result};
use crate::transport::Transport;
use crate::voltage::{adjust_raw_value, raw_volts_from_word, VoltageRange};

const BYTES_PER_WORD: usize = 2;

/// How scan data is framed on the bulk endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransferMode {
    /// 64-byte packets as soon as data is available
    #[default]
    Block = 0x0,
    /// One short packet per scan cycle; low pacer rates only
    Immediate = 0x1,
}

/// External trigger condition gating the start of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TriggerType {
    #[default]
    None = 0x0,
    RisingEdge = 0x1,
    FallingEdge = 0x2,
    HighLevel = 0x3,
    LowLevel = 0x4,
}

impl TriggerType {
    /// String key used in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::None => "none",
            TriggerType::RisingEdge => "rising",
            TriggerType::FallingEdge => "falling",
            TriggerType::HighLevel => "high",
            TriggerType::LowLevel => "low",
        }
    }
}

impl FromStr for TriggerType {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(TriggerType::None),
            "rising" => Ok(TriggerType::RisingEdge),
            "falling" => Ok(TriggerType::FallingEdge),
            "high" => Ok(TriggerType::HighLevel),
            "low" => Ok(TriggerType::LowLevel),
            _ => Err(DaqError::InvalidTrigger(s.to_string())),
        }
    }
}

/// Bulk endpoint policy when the scan FIFO overruns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Stall {
    /// Stall the bulk endpoint on overrun
    #[default]
    OnOverrun = 0x0,
    /// Keep the endpoint alive on overrun
    Inhibited = 0x1,
}

/// One physical analog input channel.
///
/// `slope` and `offset` are looked up from the gain table for the channel's
/// currently selected range; they change whenever the range changes.
#[derive(Debug, Clone)]
pub struct Channel {
    pub enabled: bool,
    pub range: VoltageRange,
    pub description: String,
    pub slope: f64,
    pub offset: f64,
}

/// Analog input scan session.
///
/// Owns the per-channel configuration, the gain table, and the device
/// transport for the duration of a scan. A session must have exclusive use
/// of its device handle while a scan is running.
///
/// # Example
///
/// ```no_run
/// use usb1608fs_plus::Usb1608fsPlus;
///
/// let daq = Usb1608fsPlus::first_device()?;
/// let mut ai = daq.new_analog_input()?;
/// ai.configure_channel(0, true, "10V", "pressure sensor")?;
/// ai.configure_channel(1, true, "5V", "thermocouple")?;
/// ai.set_scan_ranges()?;
/// ai.start_scan(0)?; // scan continuously until stopped
/// let data = ai.read_scan(256)?;
/// let volts = ai.voltages(&data)?;
/// ai.stop_scan()?;
/// # Ok::<(), usb1608fs_plus::DaqError>(())
/// ```
pub struct AnalogInput<T: Transport> {
    transport: T,
    gain_table: GainTable,
    /// Requested sampling frequency in Hz, clamped to 500 kHz
    pub frequency: f64,
    pub transfer_mode: TransferMode,
    pub trigger: TriggerType,
    /// Drive the ADC from the SYNC pin instead of the internal pacer
    pub use_external_pacer: bool,
    /// Output the internal pacer on the SYNC pin
    pub output_pacer_on_sync: bool,
    /// Emit an incrementing counter pattern instead of A/D data
    pub debug_mode: bool,
    pub stall: Stall,
    channels: [Channel; NUM_CHANNELS],
    timeout: Duration,
}

impl<T: Transport> AnalogInput<T> {
    /// Create a new analog input session over the given transport.
    ///
    /// All channels start disabled at ±10V with calibration coefficients
    /// from the gain table.
    pub fn new(transport: T, gain_table: GainTable) -> Self {
        let channels = std::array::from_fn(|i| Channel {
            enabled: false,
            range: VoltageRange::Range10V,
            description: String::new(),
            slope: gain_table.slope(VoltageRange::Range10V, i),
            offset: gain_table.offset(VoltageRange::Range10V, i),
        });
        Self {
            transport,
            gain_table,
            frequency: DEFAULT_FREQUENCY_HZ,
            transfer_mode: TransferMode::default(),
            trigger: TriggerType::default(),
            use_external_pacer: false,
            output_pacer_on_sync: false,
            debug_mode: false,
            stall: Stall::default(),
            channels,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-call transfer timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Per-channel configuration
    pub fn channels(&self) -> &[Channel; NUM_CHANNELS] {
        &self.channels
    }

    /// Calibration table read from the device at session construction
    pub fn gain_table(&self) -> &GainTable {
        &self.gain_table
    }

    /// Configure a channel's enablement, input voltage range (by its string
    /// key, e.g. "10V"), and description.
    ///
    /// Ranges are not pushed to hardware until [`Self::set_scan_ranges`] is
    /// called.
    pub fn configure_channel(
        &mut self,
        channel: usize,
        enabled: bool,
        range: &str,
        description: &str,
    ) -> Result<()> {
        let range = range.parse::<VoltageRange>()?;
        self.configure_channel_range(channel, enabled, range, description)
    }

    /// Configure a channel using a [`VoltageRange`] value directly.
    pub fn configure_channel_range(
        &mut self,
        channel: usize,
        enabled: bool,
        range: VoltageRange,
        description: &str,
    ) -> Result<()> {
        self.check_channel(channel)?;
        let slope = self.gain_table.slope(range, channel);
        let offset = self.gain_table.offset(range, channel);
        let ch = &mut self.channels[channel];
        ch.enabled = enabled;
        ch.range = range;
        ch.description = description.to_string();
        ch.slope = slope;
        ch.offset = offset;
        Ok(())
    }

    /// Enable and configure a channel in one call.
    pub fn configure_enabled_channel(
        &mut self,
        channel: usize,
        range: &str,
        description: &str,
    ) -> Result<()> {
        self.configure_channel(channel, true, range, description)
    }

    /// Enable a channel without changing its other configuration.
    pub fn enable_channel(&mut self, channel: usize) -> Result<()> {
        self.check_channel(channel)?;
        self.channels[channel].enabled = true;
        Ok(())
    }

    /// Disable a channel without changing its other configuration.
    pub fn disable_channel(&mut self, channel: usize) -> Result<()> {
        self.check_channel(channel)?;
        self.channels[channel].enabled = false;
        Ok(())
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= NUM_CHANNELS {
            return Err(DaqError::InvalidChannel {
                channel,
                num_channels: NUM_CHANNELS,
            });
        }
        Ok(())
    }

    /// Bitmask of enabled channels; bit *i* is set iff channel *i* is
    /// enabled.
    pub fn enabled_channels(&self) -> u8 {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.enabled)
            .fold(0u8, |mask, (i, _)| mask | 1 << i)
    }

    /// Number of enabled channels
    pub fn num_enabled_channels(&self) -> usize {
        self.channels.iter().filter(|ch| ch.enabled).count()
    }

    /// Build the analog input scan options byte:
    ///
    ///   Bit 0: Transfer mode (0 = block / 1 = immediate)
    ///   Bit 1: Pacer output to SYNC pin (0 = off / 1 = on), ignored when
    ///          an external clock paces the ADC
    ///   Bits 2-4: Trigger setting (0 = none, 1 = rising edge, 2 = falling
    ///          edge, 3 = high level, 4 = low level)
    ///   Bit 5: Debug mode (0 = A/D data, 1 = incrementing counter)
    ///   Bit 7: Inhibit bulk endpoint stall on overrun (0 = stall)
    pub fn options(&self) -> u8 {
        let transfer_mode = self.transfer_mode as u8;
        let pacer = self.output_pacer_on_sync as u8;
        let trigger = self.trigger as u8;
        let debug = self.debug_mode as u8;
        let stall = self.stall as u8;
        transfer_mode | pacer << 1 | trigger << 2 | debug << 5 | stall << 7
    }

    /// Write all channels' range codes to the device as the 8-byte analog
    /// configuration packet.
    pub fn set_scan_ranges(&self) -> Result<()> {
        let mut ranges = [0u8; NUM_CHANNELS];
        for (code, channel) in ranges.iter_mut().zip(&self.channels) {
            *code = channel.range.code();
        }
        let sent = self.transport.send_command(
            Command::AnalogConfig,
            0,
            0,
            &ranges,
            self.timeout,
        )?;
        if sent != NUM_CHANNELS {
            return Err(DaqError::ShortRead {
                expected: NUM_CHANNELS,
                actual: sent,
            });
        }
        Ok(())
    }

    /// Read back the 8-byte range configuration from the device.
    pub fn scan_ranges(&self) -> Result<[u8; NUM_CHANNELS]> {
        let mut ranges = [0u8; NUM_CHANNELS];
        let read = self.transport.read_command(
            Command::AnalogConfig,
            0,
            0,
            &mut ranges,
            self.timeout,
        )?;
        if read != NUM_CHANNELS {
            return Err(DaqError::ShortRead {
                expected: NUM_CHANNELS,
                actual: read,
            });
        }
        Ok(ranges)
    }

    /// Start an analog input scan.
    ///
    /// `num_scans = 0` means scan continuously until stopped. A stop and
    /// clear-buffer are always issued first so that restarting over a
    /// running scan cannot stall the bus; the failing phase is reported in
    /// the error if any sub-step fails.
    pub fn start_scan(&mut self, num_scans: u32) -> Result<()> {
        let frequency = if self.use_external_pacer {
            0.0
        } else {
            self.frequency
        };
        let data = pack_scan_data(num_scans, frequency, self.enabled_channels(), self.options());

        self.stop_scan().map_err(|err| DaqError::ScanStart {
            phase: "stop previous scan",
            source: Box::new(err),
        })?;
        self.clear_scan_buffer().map_err(|err| DaqError::ScanStart {
            phase: "clear scan buffer",
            source: Box::new(err),
        })?;
        log::debug!(
            "starting analog scan: {} scans at {} Hz, channels 0x{:02x}, options 0x{:02x}",
            num_scans,
            frequency,
            self.enabled_channels(),
            self.options()
        );
        self.transport
            .send_command(Command::AnalogStartScan, 0, 0, &data, self.timeout)
            .map_err(|err| DaqError::ScanStart {
                phase: "send start command",
                source: Box::new(err),
            })?;
        Ok(())
    }

    /// Read the sample data for the given number of scans.
    ///
    /// The returned buffer holds one little-endian u16 word per enabled
    /// channel per scan, low channel first within each scan. The requested
    /// size must tile the 64-byte bulk packet size exactly; non-conforming
    /// sizes are rejected before any transfer.
    ///
    /// If the device reports an overrun, the session issues stop +
    /// clear-buffer and returns [`DaqError::ScanOverrun`] carrying the data
    /// collected so far, which is valid up to the overrun point. The caller
    /// may reconfigure and restart.
    pub fn read_scan(&mut self, num_scans: usize) -> Result<Vec<u8>> {
        let words_to_read = num_scans * self.num_enabled_channels();
        let bytes_to_read = words_to_read * BYTES_PER_WORD;
        if bytes_to_read == 0 || bytes_to_read % MAX_BULK_TRANSFER_PACKET_SIZE != 0 {
            return Err(DaqError::Framing {
                bytes: bytes_to_read,
                packet_size: MAX_BULK_TRANSFER_PACKET_SIZE,
            });
        }

        let mut data = vec![0u8; bytes_to_read];
        match self.transfer_mode {
            TransferMode::Immediate => {
                // The device emits one short packet per completed scan
                // cycle; pull the words out one at a time.
                let mut word = [0u8; BYTES_PER_WORD];
                for i in 0..words_to_read {
                    let received = self.transport.read_bulk(&mut word, self.timeout)?;
                    if received != BYTES_PER_WORD {
                        return Err(DaqError::IncompleteWord { actual: received });
                    }
                    data[BYTES_PER_WORD * i..BYTES_PER_WORD * (i + 1)].copy_from_slice(&word);
                }
            }
            TransferMode::Block => {
                let received = self.transport.read_bulk(&mut data, self.timeout)?;
                if received != bytes_to_read {
                    return Err(DaqError::ShortRead {
                        expected: bytes_to_read,
                        actual: received,
                    });
                }
            }
        }

        let status = self.transport.status(self.timeout)?;

        // When the read tiles wMaxPacketSize exactly and the scan has
        // finished, the device emits a trailing zero-length-equivalent
        // packet. Absorb it or it corrupts the next read's framing.
        if bytes_to_read % MAX_BULK_TRANSFER_PACKET_SIZE == 0
            && status & STATUS_SCAN_RUNNING == 0
        {
            let mut drain = [0u8; BYTES_PER_WORD];
            let _ = self.transport.read_bulk(&mut drain, self.timeout);
        }

        if status & STATUS_SCAN_OVERRUN != 0 {
            log::warn!("analog input scan overrun; stopping and clearing scan buffer");
            let _ = self.stop_scan();
            let _ = self.clear_scan_buffer();
            return Err(DaqError::ScanOverrun { data });
        }

        Ok(data)
    }

    /// Stop the analog input scan if running. Safe to retry.
    pub fn stop_scan(&self) -> Result<()> {
        self.transport
            .send_command(Command::AnalogStopScan, 0, 0, &[], self.timeout)?;
        Ok(())
    }

    /// Clear the internal scan endpoint FIFO buffer. Safe to retry.
    pub fn clear_scan_buffer(&self) -> Result<()> {
        self.transport
            .send_command(Command::AnalogClearBuffer, 0, 0, &[], self.timeout)?;
        Ok(())
    }

    /// Stop the scan and release the session.
    pub fn close(self) -> Result<()> {
        self.stop_scan()
    }

    /// Convert a scan data buffer into calibrated voltages.
    ///
    /// The buffer is a sequence of scans, each holding one word per enabled
    /// channel in channel order. Returns one row per enabled channel (low
    /// channel first), each with one voltage per scan. Fails if the buffer
    /// does not divide into whole scans.
    pub fn voltages(&self, data: &[u8]) -> Result<Vec<Vec<f64>>> {
        let enabled: Vec<&Channel> = self.channels.iter().filter(|ch| ch.enabled).collect();
        let bytes_per_scan = BYTES_PER_WORD * enabled.len();
        if bytes_per_scan == 0 || data.len() % bytes_per_scan != 0 {
            return Err(DaqError::ScanBufferSize {
                len: data.len(),
                bytes_per_scan,
            });
        }
        let num_scans = data.len() / bytes_per_scan;
        let mut volts = vec![Vec::with_capacity(num_scans); enabled.len()];
        for scan in 0..num_scans {
            for (k, channel) in enabled.iter().enumerate() {
                let at = scan * bytes_per_scan + BYTES_PER_WORD * k;
                let word = u16::from_le_bytes([data[at], data[at + 1]]);
                let adjusted = adjust_raw_value(word, channel.slope, channel.offset);
                volts[k].push(raw_volts_from_word(adjusted, channel.range));
            }
        }
        Ok(volts)
    }
}

/// Pack the 10-byte configuration needed by the start-scan command:
/// `[numScans u32 LE][pacerPeriod u32 LE][channel mask u8][options u8]`.
pub fn pack_scan_data(num_scans: u32, frequency: f64, channels: u8, options: u8) -> [u8; 10] {
    let mut data = [0u8; 10];
    data[0..4].copy_from_slice(&num_scans.to_le_bytes());
    data[4..8].copy_from_slice(&calculate_pacer_period(frequency).to_le_bytes());
    data[8] = channels;
    data[9] = options;
    data
}

/// Compute the hardware pacer period for a sampling frequency.
///
/// Frequencies above the 500 kHz device ceiling are clamped before the
/// computation. A frequency of 0 (or below) yields a period of 0, which
/// tells the device to use the SYNC pin as an external pacer input.
pub fn calculate_pacer_period(frequency: f64) -> u32 {
    let frequency = frequency.min(MAX_FREQUENCY_HZ);
    if frequency > 0.0 {
        // f64::round rounds half away from zero
        (BASE_CLOCK_HZ / frequency - 1.0).round() as u32
    } else {
        0
    }
}
