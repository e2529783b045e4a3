//! JSON configuration for analog input sessions
//!
//! Scan setups are often kept in JSON files. The structs here are a plain
//! serde mapping of that schema; they are applied to an [`AnalogInput`]
//! explicitly rather than living on the domain types themselves.
//!
//! ```json
//! {
//!   "freq": 10000.0,
//!   "block_transfer": true,
//!   "trigger": "none",
//!   "ext_pacer": false,
//!   "output_sync": false,
//!   "debug_mode": false,
//!   "stall_overrun": true,
//!   "channels": [
//!     { "enabled": true, "range": "10V", "desc": "pressure sensor" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::analog::{AnalogInput, Stall, TransferMode, TriggerType};
use crate::constants::NUM_CHANNELS;
use crate::error::{DaqError, Result};
use crate::transport::Transport;

/// One channel's entry in a configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub enabled: bool,
    /// Voltage range key, e.g. "10V", "5V", "2V", "1V"
    pub range: String,
    #[serde(rename = "desc", default)]
    pub description: String,
}

/// Serializable analog input configuration.
///
/// Field names match the historical JSON schema: `stall_overrun` is `true`
/// when the endpoint should stall on overrun, `block_transfer` is `true`
/// for block transfer mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogConfig {
    #[serde(rename = "freq")]
    pub frequency: f64,
    pub block_transfer: bool,
    pub trigger: String,
    #[serde(rename = "ext_pacer", default)]
    pub use_external_pacer: bool,
    #[serde(rename = "output_sync", default)]
    pub output_pacer_on_sync: bool,
    #[serde(default)]
    pub debug_mode: bool,
    pub stall_overrun: bool,
    pub channels: Vec<ChannelConfig>,
}

impl AnalogConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize this configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply this configuration to an analog input session.
    ///
    /// Validates the trigger and every channel's range before mutating
    /// anything; the device is not touched (call
    /// [`AnalogInput::set_scan_ranges`] afterwards to push the ranges).
    pub fn apply<T: Transport>(&self, ai: &mut AnalogInput<T>) -> Result<()> {
        if self.channels.len() > NUM_CHANNELS {
            return Err(DaqError::InvalidChannel {
                channel: self.channels.len() - 1,
                num_channels: NUM_CHANNELS,
            });
        }
        let trigger = self.trigger.parse::<TriggerType>()?;
        for channel in &self.channels {
            channel.range.parse::<crate::voltage::VoltageRange>()?;
        }

        ai.frequency = self.frequency;
        ai.transfer_mode = if self.block_transfer {
            TransferMode::Block
        } else {
            TransferMode::Immediate
        };
        ai.trigger = trigger;
        ai.use_external_pacer = self.use_external_pacer;
        ai.output_pacer_on_sync = self.output_pacer_on_sync;
        ai.debug_mode = self.debug_mode;
        ai.stall = if self.stall_overrun {
            Stall::OnOverrun
        } else {
            Stall::Inhibited
        };
        for (i, channel) in self.channels.iter().enumerate() {
            ai.configure_channel(i, channel.enabled, &channel.range, &channel.description)?;
        }
        Ok(())
    }

    /// Snapshot a session's current settings.
    pub fn from_analog_input<T: Transport>(ai: &AnalogInput<T>) -> Self {
        AnalogConfig {
            frequency: ai.frequency,
            block_transfer: ai.transfer_mode == TransferMode::Block,
            trigger: ai.trigger.as_str().to_string(),
            use_external_pacer: ai.use_external_pacer,
            output_pacer_on_sync: ai.output_pacer_on_sync,
            debug_mode: ai.debug_mode,
            stall_overrun: ai.stall == Stall::OnOverrun,
            channels: ai
                .channels()
                .iter()
                .map(|ch| ChannelConfig {
                    enabled: ch.enabled,
                    range: ch.range.key().to_string(),
                    description: ch.description.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::GainTable;
    use crate::transport::testing::FakeTransport;
    use crate::voltage::VoltageRange;

    const CONFIG_JSON: &str = r#"{
        "freq": 500.0,
        "block_transfer": false,
        "trigger": "rising",
        "ext_pacer": true,
        "output_sync": true,
        "debug_mode": false,
        "stall_overrun": false,
        "channels": [
            { "enabled": true, "range": "10V", "desc": "pressure" },
            { "enabled": true, "range": "2V", "desc": "strain" },
            { "enabled": false, "range": "5V" }
        ]
    }"#;

    #[test]
    fn test_apply_config() {
        let config = AnalogConfig::from_json(CONFIG_JSON).unwrap();
        let mut ai = AnalogInput::new(FakeTransport::new(), GainTable::identity());
        config.apply(&mut ai).unwrap();

        assert_eq!(ai.frequency, 500.0);
        assert_eq!(ai.transfer_mode, TransferMode::Immediate);
        assert_eq!(ai.trigger, TriggerType::RisingEdge);
        assert!(ai.use_external_pacer);
        assert!(ai.output_pacer_on_sync);
        assert_eq!(ai.stall, Stall::Inhibited);
        assert_eq!(ai.enabled_channels(), 0b0000_0011);
        assert_eq!(ai.channels()[1].range, VoltageRange::Range2V);
        assert_eq!(ai.channels()[1].description, "strain");
        assert_eq!(ai.channels()[2].range, VoltageRange::Range5V);
    }

    #[test]
    fn test_bad_range_rejected_before_mutation() {
        let mut config = AnalogConfig::from_json(CONFIG_JSON).unwrap();
        config.channels[2].range = "7V".to_string();
        let mut ai = AnalogInput::new(FakeTransport::new(), GainTable::identity());
        assert!(matches!(
            config.apply(&mut ai),
            Err(DaqError::InvalidRange(_))
        ));
        // The session was left untouched
        assert_eq!(ai.enabled_channels(), 0);
        assert_eq!(ai.frequency, crate::constants::DEFAULT_FREQUENCY_HZ);
    }

    #[test]
    fn test_bad_trigger_rejected() {
        let mut config = AnalogConfig::from_json(CONFIG_JSON).unwrap();
        config.trigger = "both-edges".to_string();
        let mut ai = AnalogInput::new(FakeTransport::new(), GainTable::identity());
        assert!(matches!(
            config.apply(&mut ai),
            Err(DaqError::InvalidTrigger(_))
        ));
    }

    #[test]
    fn test_round_trip() {
        let config = AnalogConfig::from_json(CONFIG_JSON).unwrap();
        let mut ai = AnalogInput::new(FakeTransport::new(), GainTable::identity());
        config.apply(&mut ai).unwrap();

        let snapshot = AnalogConfig::from_analog_input(&ai);
        assert_eq!(snapshot.frequency, 500.0);
        assert!(!snapshot.block_transfer);
        assert_eq!(snapshot.trigger, "rising");
        assert!(!snapshot.stall_overrun);
        assert_eq!(snapshot.channels.len(), NUM_CHANNELS);
        assert_eq!(snapshot.channels[1].range, "2V");

        let json = snapshot.to_json().unwrap();
        let reparsed = AnalogConfig::from_json(&json).unwrap();
        assert_eq!(reparsed.channels[1].range, "2V");
        assert_eq!(reparsed.channels[1].description, "strain");
    }
}
