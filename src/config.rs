use std::collections::BTreeMap;
use std::fmt;

use crate::channel::Channel;
use crate::validate::{parse_bitfield, I2cAddr, ValidationError, MAX_CHANNELS};

pub const MODULE_TYPES: &[&str] = &["IoTbase PICO", "IoTbase Nano", "IoTsmart ESP32-S3"];

pub const DIGITAL_MEZZANINES: &[&str] = &[
    "IoTextra Input",
    "IoTextra Octal",
    "IoTextra Relay",
    "IoTextra SSR Small",
];

pub const ANALOG_MEZZANINES: &[&str] = &[
    "IoTextra Analog",
    "IoTextra Combo",
    "IoTextra Analog V2",
    "IoTextra Analog V3",
];

/// Typical ADC count for the known analog mezzanines.
pub fn mezzanine_adc_count(mezzanine_type: &str) -> Option<u8> {
    match mezzanine_type {
        "IoTextra Analog" => Some(2),
        "IoTextra Combo" => Some(1),
        "IoTextra Analog V2" => Some(2),
        "IoTextra Analog V3" => Some(2),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: String::new(),
            port: 1883,
            client_id: "pico-iotextra-controller-1".to_string(),
            base_topic: "iotextra/device_1".to_string(),
        }
    }
}

impl MqttConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::OutOfRange {
                field: "mqtt.port",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    Gpio,
    I2c,
}

impl HardwareMode {
    pub fn code(self) -> &'static str {
        match self {
            HardwareMode::Gpio => "gpio",
            HardwareMode::I2c => "i2c",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "gpio" => Some(HardwareMode::Gpio),
            "i2c" => Some(HardwareMode::I2c),
            _ => None,
        }
    }
}

impl fmt::Display for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// ADS1x15 sampling rate in samples per second, with its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingRate {
    Sps8,
    Sps16,
    Sps32,
    Sps64,
    #[default]
    Sps128,
    Sps250,
    Sps475,
    Sps860,
}

impl SamplingRate {
    pub fn sps(self) -> u32 {
        match self {
            SamplingRate::Sps8 => 8,
            SamplingRate::Sps16 => 16,
            SamplingRate::Sps32 => 32,
            SamplingRate::Sps64 => 64,
            SamplingRate::Sps128 => 128,
            SamplingRate::Sps250 => 250,
            SamplingRate::Sps475 => 475,
            SamplingRate::Sps860 => 860,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            SamplingRate::Sps8 => 0,
            SamplingRate::Sps16 => 1,
            SamplingRate::Sps32 => 2,
            SamplingRate::Sps64 => 3,
            SamplingRate::Sps128 => 4,
            SamplingRate::Sps250 => 5,
            SamplingRate::Sps475 => 6,
            SamplingRate::Sps860 => 7,
        }
    }

    pub fn from_sps(sps: u32) -> Option<Self> {
        match sps {
            8 => Some(SamplingRate::Sps8),
            16 => Some(SamplingRate::Sps16),
            32 => Some(SamplingRate::Sps32),
            64 => Some(SamplingRate::Sps64),
            128 => Some(SamplingRate::Sps128),
            250 => Some(SamplingRate::Sps250),
            475 => Some(SamplingRate::Sps475),
            860 => Some(SamplingRate::Sps860),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HardwareConfig {
    pub mode: HardwareMode,
    pub i2c_bus_id: u8,
    pub sda_pin: u8,
    pub scl_pin: u8,
    pub expander_addr: I2cAddr,
    pub eeprom_addr: I2cAddr,
    pub eeprom_size: u32,
    pub adc_count: u8,
    pub adc_addrs: Vec<I2cAddr>,
    pub sampling_rate: SamplingRate,
    /// Host connector channel (1-8) to GPIO pin number.
    pub gpio_host_pins: BTreeMap<u8, u8>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            mode: HardwareMode::I2c,
            i2c_bus_id: 0,
            sda_pin: 20,
            scl_pin: 21,
            expander_addr: I2cAddr::known(0x3f),
            eeprom_addr: I2cAddr::known(0x57),
            eeprom_size: 1024,
            adc_count: 0,
            adc_addrs: Vec::new(),
            sampling_rate: SamplingRate::default(),
            gpio_host_pins: default_gpio_host_pins(),
        }
    }
}

/// Default HOST connector pin mapping (AP0-AP7).
pub fn default_gpio_host_pins() -> BTreeMap<u8, u8> {
    BTreeMap::from([
        (1, 10),
        (2, 11),
        (3, 12),
        (4, 13),
        (5, 14),
        (6, 15),
        (7, 18),
        (8, 19),
    ])
}

impl HardwareConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.adc_count > 4 {
            return Err(ValidationError::OutOfRange {
                field: "num_of_adcs",
                value: self.adc_count.to_string(),
            });
        }
        if self.adc_addrs.len() != self.adc_count as usize {
            return Err(ValidationError::OutOfRange {
                field: "adc_i2c_addrs",
                value: format!(
                    "expected {} addresses, got {}",
                    self.adc_count,
                    self.adc_addrs.len()
                ),
            });
        }
        for (i, addr) in self.adc_addrs.iter().enumerate() {
            if self.adc_addrs[..i].contains(addr) {
                return Err(ValidationError::OutOfRange {
                    field: "adc_i2c_addrs",
                    value: format!("duplicate address {addr}"),
                });
            }
        }
        for channel in self.gpio_host_pins.keys() {
            if !(1..=8).contains(channel) {
                return Err(ValidationError::OutOfRange {
                    field: "gpio_host_pins",
                    value: format!("host channel {channel}"),
                });
            }
        }
        Ok(())
    }
}

/// Complete configuration for one I/O node.
///
/// Channel and hardware fields are only reachable through the mutation
/// operations, which either fully apply a change or leave the aggregate
/// untouched. An editing session owns exactly one of these at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub module_type: String,
    pub mezzanine_type: String,
    channels: Vec<Channel>,
    network: NetworkConfig,
    mqtt: MqttConfig,
    hardware: HardwareConfig,
    pin_config: u8,
    status_update_interval_s: u32,
}

impl Configuration {
    pub fn new(module_type: &str, mezzanine_type: &str) -> Self {
        Self {
            module_type: module_type.to_string(),
            mezzanine_type: mezzanine_type.to_string(),
            channels: Vec::new(),
            network: NetworkConfig::default(),
            mqtt: MqttConfig::default(),
            hardware: HardwareConfig::default(),
            // Channels 0-3 outputs, 4-7 inputs.
            pin_config: 0b0000_1111,
            status_update_interval_s: 30,
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|ch| ch.name() == name)
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    pub fn hardware(&self) -> &HardwareConfig {
        &self.hardware
    }

    pub fn pin_config(&self) -> u8 {
        self.pin_config
    }

    pub fn status_update_interval_s(&self) -> u32 {
        self.status_update_interval_s
    }

    pub fn add_channel(&mut self, channel: Channel) -> Result<(), ValidationError> {
        if self.channels.len() >= MAX_CHANNELS {
            return Err(ValidationError::CapacityExceeded);
        }
        self.check_unique(&channel, None)?;
        self.channels.push(channel);
        Ok(())
    }

    pub fn remove_channel(&mut self, name: &str) -> Result<Channel, ValidationError> {
        let idx = self
            .channels
            .iter()
            .position(|ch| ch.name() == name)
            .ok_or_else(|| ValidationError::NotFound { name: name.to_string() })?;
        Ok(self.channels.remove(idx))
    }

    /// Applies `patch` to a copy of the named channel and re-validates it
    /// against the aggregate as if newly added, excluding the channel itself
    /// from the duplicate checks. The aggregate is unchanged on failure.
    pub fn edit_channel<F>(&mut self, name: &str, patch: F) -> Result<(), ValidationError>
    where
        F: FnOnce(&mut Channel) -> Result<(), ValidationError>,
    {
        let idx = self
            .channels
            .iter()
            .position(|ch| ch.name() == name)
            .ok_or_else(|| ValidationError::NotFound { name: name.to_string() })?;
        let mut updated = self.channels[idx].clone();
        patch(&mut updated)?;
        self.check_unique(&updated, Some(idx))?;
        self.channels[idx] = updated;
        Ok(())
    }

    pub fn set_network(&mut self, network: NetworkConfig) {
        self.network = network;
    }

    pub fn set_mqtt(&mut self, mqtt: MqttConfig) -> Result<(), ValidationError> {
        mqtt.validate()?;
        self.mqtt = mqtt;
        Ok(())
    }

    pub fn set_hardware(&mut self, hardware: HardwareConfig) -> Result<(), ValidationError> {
        hardware.validate()?;
        if hardware.mode == HardwareMode::Gpio {
            if let Some(channel) = self.channels.iter().find(|ch| ch.requires_i2c()) {
                return Err(ValidationError::InconsistentMode {
                    channel: channel.name().to_string(),
                });
            }
        }
        self.hardware = hardware;
        Ok(())
    }

    /// Accepts the pin map in any of the 8-bit literal forms; the canonical
    /// stored value is the integer.
    pub fn set_pin_config(&mut self, literal: &str) -> Result<(), ValidationError> {
        self.pin_config = parse_bitfield(literal)?;
        Ok(())
    }

    pub fn set_status_interval(&mut self, seconds: u32) -> Result<(), ValidationError> {
        if seconds == 0 {
            return Err(ValidationError::OutOfRange {
                field: "status_update_interval_s",
                value: "0".to_string(),
            });
        }
        self.status_update_interval_s = seconds;
        Ok(())
    }

    /// Re-checks every aggregate invariant. Used after decoding a persisted
    /// document, where the fields were not built up through the mutation
    /// operations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channels.len() > MAX_CHANNELS {
            return Err(ValidationError::CapacityExceeded);
        }
        for (i, channel) in self.channels.iter().enumerate() {
            for other in &self.channels[..i] {
                if other.name() == channel.name() {
                    return Err(ValidationError::DuplicateName {
                        name: channel.name().to_string(),
                    });
                }
                if other.kind() == channel.kind() && other.number() == channel.number() {
                    return Err(ValidationError::DuplicateNumber {
                        kind: channel.kind(),
                        number: channel.number(),
                    });
                }
            }
        }
        self.mqtt.validate()?;
        self.hardware.validate()?;
        if self.hardware.mode == HardwareMode::Gpio {
            if let Some(channel) = self.channels.iter().find(|ch| ch.requires_i2c()) {
                return Err(ValidationError::InconsistentMode {
                    channel: channel.name().to_string(),
                });
            }
        }
        if self.status_update_interval_s == 0 {
            return Err(ValidationError::OutOfRange {
                field: "status_update_interval_s",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Name uniqueness is case-sensitive and spans both kinds; numbers only
    /// collide within a kind, so combo boards can use digital 3 and analog 3
    /// side by side.
    fn check_unique(&self, channel: &Channel, exclude: Option<usize>) -> Result<(), ValidationError> {
        for (i, other) in self.channels.iter().enumerate() {
            if Some(i) == exclude {
                continue;
            }
            if other.name() == channel.name() {
                return Err(ValidationError::DuplicateName {
                    name: channel.name().to_string(),
                });
            }
            if other.kind() == channel.kind() && other.number() == channel.number() {
                return Err(ValidationError::DuplicateNumber {
                    kind: channel.kind(),
                    number: channel.number(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn from_decoded_parts(
        module_type: String,
        mezzanine_type: String,
        channels: Vec<Channel>,
        network: NetworkConfig,
        mqtt: MqttConfig,
        hardware: HardwareConfig,
        pin_config: u8,
        status_update_interval_s: u32,
    ) -> Self {
        Self {
            module_type,
            mezzanine_type,
            channels,
            network,
            mqtt,
            hardware,
            pin_config,
            status_update_interval_s,
        }
    }
}
