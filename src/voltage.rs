//! Voltage ranges and sample word conversion
//!
//! Raw scan samples are unsigned 16-bit words centered on 0x8000. This
//! module maps them into signed voltages, optionally applying the per-channel
//! slope/offset correction from the gain table before conversion. The
//! correction reproduces in software what the device's own gain stage would
//! do when the uncorrected path is used.

use std::str::FromStr;

use crate::error::{DaqError, Result};

/// Midpoint of the 16-bit sample domain, i.e. 0 volts
const WORD_MIDPOINT: f64 = 32768.0;

/// Input voltage range code for an analog channel.
///
/// Each code carries the full-scale multiplier used when converting sample
/// words to volts, and doubles as the gain-level index into the calibration
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum VoltageRange {
    /// ±10V
    #[default]
    Range10V = 0x0,
    /// ±5V
    Range5V = 0x1,
    /// ±2.5V
    Range2_5V = 0x2,
    /// ±2V
    Range2V = 0x3,
    /// ±1.25V
    Range1_25V = 0x4,
    /// ±1V
    Range1V = 0x5,
    /// ±0.625V
    Range0_625V = 0x6,
    /// ±0.3125V
    Range0_3125V = 0x7,
}

impl VoltageRange {
    /// Get the wire code for this range
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a range by its wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x0 => Some(VoltageRange::Range10V),
            0x1 => Some(VoltageRange::Range5V),
            0x2 => Some(VoltageRange::Range2_5V),
            0x3 => Some(VoltageRange::Range2V),
            0x4 => Some(VoltageRange::Range1_25V),
            0x5 => Some(VoltageRange::Range1V),
            0x6 => Some(VoltageRange::Range0_625V),
            0x7 => Some(VoltageRange::Range0_3125V),
            _ => None,
        }
    }

    /// String key for this range as used in configuration files
    pub fn key(self) -> &'static str {
        match self {
            VoltageRange::Range10V => "10V",
            VoltageRange::Range5V => "5V",
            VoltageRange::Range2_5V => "2.5V",
            VoltageRange::Range2V => "2V",
            VoltageRange::Range1_25V => "1.25V",
            VoltageRange::Range1V => "1V",
            VoltageRange::Range0_625V => "0.625V",
            VoltageRange::Range0_3125V => "0.3125V",
        }
    }

    /// Full-scale voltage multiplier for this range
    pub fn multiplier(self) -> f64 {
        match self {
            VoltageRange::Range10V => 10.0,
            VoltageRange::Range5V => 5.0,
            VoltageRange::Range2_5V => 2.5,
            VoltageRange::Range2V => 2.0,
            VoltageRange::Range1_25V => 1.25,
            VoltageRange::Range1V => 1.0,
            VoltageRange::Range0_625V => 0.625,
            VoltageRange::Range0_3125V => 0.3125,
        }
    }
}

impl FromStr for VoltageRange {
    type Err = DaqError;

    /// Parse the string keys used in configuration files ("10V", "5V", ...)
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "10V" => Ok(VoltageRange::Range10V),
            "5V" => Ok(VoltageRange::Range5V),
            "2.5V" => Ok(VoltageRange::Range2_5V),
            "2V" => Ok(VoltageRange::Range2V),
            "1.25V" => Ok(VoltageRange::Range1_25V),
            "1V" => Ok(VoltageRange::Range1V),
            "0.625V" => Ok(VoltageRange::Range0_625V),
            "0.3125V" => Ok(VoltageRange::Range0_3125V),
            _ => Err(DaqError::InvalidRange(s.to_string())),
        }
    }
}

impl std::fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VoltageRange::Range10V => "±10V",
            VoltageRange::Range5V => "±5V",
            VoltageRange::Range2_5V => "±2.5V",
            VoltageRange::Range2V => "±2V",
            VoltageRange::Range1_25V => "±1.25V",
            VoltageRange::Range1V => "±1V",
            VoltageRange::Range0_625V => "±0.625V",
            VoltageRange::Range0_3125V => "±0.3125V",
        };
        write!(f, "{}", name)
    }
}

/// Convert an uncorrected sample word to volts for the given range.
///
/// The word is treated as a signed offset from the 0x8000 midpoint, so
/// 0x0000 is negative full scale, 0x8000 is 0V, and 0xFFFF is one LSB below
/// positive full scale.
pub fn raw_volts_from_word(word: u16, range: VoltageRange) -> f64 {
    range.multiplier() * (f64::from(word) - WORD_MIDPOINT) / WORD_MIDPOINT
}

/// Convert an uncorrected little-endian byte pair to volts.
pub fn raw_volts_from_bytes(bytes: &[u8], range: VoltageRange) -> Result<f64> {
    if bytes.len() != 2 {
        return Err(DaqError::IncompleteWord {
            actual: bytes.len(),
        });
    }
    let word = u16::from_le_bytes([bytes[0], bytes[1]]);
    Ok(raw_volts_from_word(word, range))
}

/// Apply a gain-table slope/offset correction to a raw sample word.
///
/// The float intermediate is rounded half-away-from-zero and saturated to
/// the 16-bit word domain, matching the device's own correction arithmetic.
pub fn adjust_raw_value(word: u16, slope: f64, offset: f64) -> u16 {
    let adjusted = (f64::from(word) * slope + offset).round();
    adjusted.clamp(0.0, 65535.0) as u16
}

/// Convert a sample word to volts, applying the slope/offset correction
/// first.
pub fn volts_from_word(word: u16, range: VoltageRange, slope: f64, offset: f64) -> f64 {
    raw_volts_from_word(adjust_raw_value(word, slope, offset), range)
}

/// Convert a little-endian byte pair to corrected volts.
pub fn volts_from_bytes(bytes: &[u8], range: VoltageRange, slope: f64, offset: f64) -> Result<f64> {
    if bytes.len() != 2 {
        return Err(DaqError::IncompleteWord {
            actual: bytes.len(),
        });
    }
    let word = u16::from_le_bytes([bytes[0], bytes[1]]);
    Ok(volts_from_word(word, range, slope, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_RANGES: [VoltageRange; 8] = [
        VoltageRange::Range10V,
        VoltageRange::Range5V,
        VoltageRange::Range2_5V,
        VoltageRange::Range2V,
        VoltageRange::Range1_25V,
        VoltageRange::Range1V,
        VoltageRange::Range0_625V,
        VoltageRange::Range0_3125V,
    ];

    #[test]
    fn test_raw_volts_from_bytes() {
        let cases: [(f64, VoltageRange, [u8; 2]); 6] = [
            (-10.0, VoltageRange::Range10V, [0x00, 0x00]),
            (0.0, VoltageRange::Range10V, [0x00, 0x80]),
            (9.99969482421875, VoltageRange::Range10V, [0xFF, 0xFF]),
            (-5.0, VoltageRange::Range5V, [0x00, 0x00]),
            (0.0, VoltageRange::Range5V, [0x00, 0x80]),
            (4.999847412109375, VoltageRange::Range5V, [0xFF, 0xFF]),
        ];
        for (expected, range, bytes) in cases {
            assert_eq!(raw_volts_from_bytes(&bytes, range).unwrap(), expected);
        }
    }

    #[test]
    fn test_raw_volts_rejects_bad_length() {
        assert!(matches!(
            raw_volts_from_bytes(&[0, 0, 0], VoltageRange::Range5V),
            Err(DaqError::IncompleteWord { actual: 3 })
        ));
        assert!(matches!(
            raw_volts_from_bytes(&[0], VoltageRange::Range5V),
            Err(DaqError::IncompleteWord { actual: 1 })
        ));
    }

    #[test]
    fn test_midpoint_is_zero_for_every_range() {
        for range in ALL_RANGES {
            assert_eq!(raw_volts_from_word(0x8000, range), 0.0);
        }
    }

    #[test]
    fn test_raw_volts_monotonic() {
        for range in ALL_RANGES {
            let mut previous = raw_volts_from_word(0, range);
            for word in (1..=u16::MAX).step_by(97) {
                let volts = raw_volts_from_word(word, range);
                assert!(volts > previous, "not monotonic at word {}", word);
                previous = volts;
            }
        }
    }

    #[test]
    fn test_adjust_raw_value() {
        let cases: [(u16, f64, f64, u16); 8] = [
            (0x0000, 1.0, 0.0, 0x0000),
            (0x8000, 1.0, 0.0, 0x8000),
            (0x8000, 1.154856, -5152.185547, 0x7FB2),
            (0x8000, 1.155244, -5451.133301, 0x7E94),
            (10, 1.0, 1.0, 11),
            (10, 2.0, -1.0, 19),
            (65535, 1.0, -5000.0, 60535),
            // Values outside the word domain saturate
            (65535, 1.15, -5000.0, 65535),
        ];
        for (word, slope, offset, expected) in cases {
            assert_eq!(adjust_raw_value(word, slope, offset), expected);
        }
    }

    #[test]
    fn test_identity_correction_matches_raw() {
        for range in ALL_RANGES {
            for word in (0..=u16::MAX).step_by(251) {
                assert_eq!(
                    volts_from_word(word, range, 1.0, 0.0),
                    raw_volts_from_word(word, range)
                );
            }
        }
    }

    #[test]
    fn test_volts_from_bytes() {
        let cases: [([u8; 2], VoltageRange, f64, f64, f64); 5] = [
            ([0x00, 0x00], VoltageRange::Range10V, 1.0, 0.0, -10.0),
            ([0x00, 0x00], VoltageRange::Range10V, 2.0, 0.0, -10.0),
            (
                [0xFF, 0xFF],
                VoltageRange::Range10V,
                1.0,
                0.0,
                9.99969482421875,
            ),
            ([0x00, 0x80], VoltageRange::Range10V, 1.0, 0.0, 0.0),
            // One LSB below midpoint with +1 offset lands back on 0V
            ([0xFF, 0x7F], VoltageRange::Range10V, 1.0, 1.0, 0.0),
        ];
        for (bytes, range, slope, offset, expected) in cases {
            assert_eq!(
                volts_from_bytes(&bytes, range, slope, offset).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_range_codes_round_trip() {
        for range in ALL_RANGES {
            assert_eq!(VoltageRange::from_code(range.code()), Some(range));
        }
        assert_eq!(VoltageRange::from_code(0x8), None);
    }

    #[test]
    fn test_range_parsing() {
        assert_eq!("10V".parse::<VoltageRange>().unwrap(), VoltageRange::Range10V);
        assert_eq!("2V".parse::<VoltageRange>().unwrap(), VoltageRange::Range2V);
        assert_eq!(
            "0.3125V".parse::<VoltageRange>().unwrap(),
            VoltageRange::Range0_3125V
        );
        assert!(matches!(
            "3V".parse::<VoltageRange>(),
            Err(DaqError::InvalidRange(_))
        ));
    }
}
