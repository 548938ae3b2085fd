use std::fmt;

use crate::validate::{
    validate_finite, validate_name, validate_positive, ValidationError,
};

pub const MAX_CHANNEL_NUMBER: u8 = 7;

// Per-channel calibration defaults for IoTextra analog boards (two 49.9k
// resistors in parallel on the divider, 249 Ohm shunt).
pub const DEFAULT_ADC_HARDWARE_GAIN: f64 = 0.23761904761904762;
pub const DEFAULT_SHUNT_RESISTANCE: f64 = 0.249;
pub const DEFAULT_ADC_OFFSET: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Digital,
    Analog,
}

impl ChannelKind {
    /// Wire code used in the document schema ("1" = digital, "2" = analog).
    pub fn code(self) -> &'static str {
        match self {
            ChannelKind::Digital => "1",
            ChannelKind::Analog => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(ChannelKind::Digital),
            "2" => Some(ChannelKind::Analog),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Digital => write!(f, "digital"),
            ChannelKind::Analog => write!(f, "analog"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actions {
    ReadOnly,
    ReadWrite,
}

impl Actions {
    pub fn bit(self) -> u8 {
        match self {
            Actions::ReadOnly => 0,
            Actions::ReadWrite => 1,
        }
    }

    pub fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(Actions::ReadOnly),
            1 => Some(Actions::ReadWrite),
            _ => None,
        }
    }
}

/// Interface path of a digital channel: direct host GPIO, the TCA9534 I/O
/// expander, or both on combo boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalInterface {
    Gpio,
    Expander,
    GpioExpander,
}

impl DigitalInterface {
    pub fn code(self) -> &'static str {
        match self {
            DigitalInterface::Gpio => "01",
            DigitalInterface::Expander => "11",
            DigitalInterface::GpioExpander => "12",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(DigitalInterface::Gpio),
            "11" => Some(DigitalInterface::Expander),
            "12" => Some(DigitalInterface::GpioExpander),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DigitalInterface::Gpio => "GPIO",
            DigitalInterface::Expander => "I2C via TCA9534",
            DigitalInterface::GpioExpander => "GPIO + I2C via TCA9534",
        }
    }

    pub fn requires_i2c(self) -> bool {
        !matches!(self, DigitalInterface::Gpio)
    }
}

/// Analog interface codes are per-board; all of them read through I2C ADCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogInterface {
    Analog,
    Combo,
    AnalogV2,
    AnalogV3,
}

impl AnalogInterface {
    pub fn code(self) -> &'static str {
        match self {
            AnalogInterface::Analog => "01",
            AnalogInterface::Combo => "21",
            AnalogInterface::AnalogV2 => "02",
            AnalogInterface::AnalogV3 => "03",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(AnalogInterface::Analog),
            "21" => Some(AnalogInterface::Combo),
            "02" => Some(AnalogInterface::AnalogV2),
            "03" => Some(AnalogInterface::AnalogV3),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalogInterface::Analog => "IoTextra Analog",
            AnalogInterface::Combo => "IoTextra Combo",
            AnalogInterface::AnalogV2 => "IoT Analog 2",
            AnalogInterface::AnalogV3 => "IoT Analog 3",
        }
    }
}

/// One of the ten supported analog measurement ranges.
///
/// The 8-bit code combines a polarity bit (bit 7 = bipolar), a domain
/// selector (bit 5 = current) and a magnitude index in the low bits. The
/// code is stored and round-tripped opaquely; interpreting the bits is a
/// firmware concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementRange {
    Volts0To0_5,
    Volts0To5,
    Volts0To10,
    VoltsPm0_5,
    VoltsPm5,
    VoltsPm10,
    Milliamps0To20,
    MilliampsPm20,
    Milliamps4To20,
    Milliamps0To40,
}

/// Single source of truth for range code and label; adding a range means
/// extending this table (and the enum) only.
pub const RANGE_TABLE: &[(MeasurementRange, u8, &str)] = &[
    (MeasurementRange::Volts0To0_5, 0b0000_0001, "Voltage 0-0.5V"),
    (MeasurementRange::Volts0To5, 0b0000_0010, "Voltage 0-5V"),
    (MeasurementRange::Volts0To10, 0b0000_0011, "Voltage 0-10V"),
    (MeasurementRange::VoltsPm0_5, 0b1000_0001, "Voltage ±0.5V"),
    (MeasurementRange::VoltsPm5, 0b1000_0010, "Voltage ±5V"),
    (MeasurementRange::VoltsPm10, 0b1000_0011, "Voltage ±10V"),
    (MeasurementRange::Milliamps0To20, 0b0010_0001, "Current 0-20mA"),
    (MeasurementRange::MilliampsPm20, 0b1010_0001, "Current ±20mA"),
    (MeasurementRange::Milliamps4To20, 0b0010_0010, "Current 4-20mA"),
    (MeasurementRange::Milliamps0To40, 0b0010_0011, "Current 0-40mA"),
];

impl MeasurementRange {
    pub fn code(self) -> u8 {
        RANGE_TABLE
            .iter()
            .find(|(range, _, _)| *range == self)
            .map(|(_, code, _)| *code)
            .unwrap_or(0)
    }

    pub fn label(self) -> &'static str {
        RANGE_TABLE
            .iter()
            .find(|(range, _, _)| *range == self)
            .map(|(_, _, label)| *label)
            .unwrap_or("")
    }

    pub fn from_code(code: u8) -> Option<Self> {
        RANGE_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(range, _, _)| *range)
    }

    /// Textual form used in documents, e.g. "0b10000010".
    pub fn code_literal(self) -> String {
        format!("0b{:08b}", self.code())
    }

    pub fn parse_code_literal(text: &str) -> Result<Self, ValidationError> {
        let code = crate::validate::parse_bitfield(text)?;
        Self::from_code(code).ok_or(ValidationError::OutOfRange {
            field: "measurement_range",
            value: text.to_string(),
        })
    }
}

/// Calibration triple converting a raw ADC reading to an engineering unit.
/// Always per-channel; multi-ADC boards may mix calibrations freely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub gain: f64,
    pub shunt_ohms: f64,
    pub offset_volts: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gain: DEFAULT_ADC_HARDWARE_GAIN,
            shunt_ohms: DEFAULT_SHUNT_RESISTANCE,
            offset_volts: DEFAULT_ADC_OFFSET,
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_positive("adc_hardware_gain", self.gain)?;
        validate_positive("shunt_resistance", self.shunt_ohms)?;
        validate_finite("adc_offset", self.offset_volts)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigitalChannel {
    pub name: String,
    pub interface: DigitalInterface,
    pub number: u8,
    pub actions: Actions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalogChannel {
    pub name: String,
    pub interface: AnalogInterface,
    pub number: u8,
    pub range: MeasurementRange,
    pub calibration: Calibration,
}

impl DigitalChannel {
    pub fn new(
        name: &str,
        interface: DigitalInterface,
        number: u8,
        actions: Actions,
    ) -> Result<Self, ValidationError> {
        validate_name(name)?;
        validate_channel_number(number)?;
        Ok(Self {
            name: name.to_string(),
            interface,
            number,
            actions,
        })
    }
}

impl AnalogChannel {
    /// Creates an analog channel; without an explicit calibration the board
    /// defaults apply.
    pub fn new(
        name: &str,
        interface: AnalogInterface,
        number: u8,
        range: MeasurementRange,
        calibration: Option<Calibration>,
    ) -> Result<Self, ValidationError> {
        validate_name(name)?;
        validate_channel_number(number)?;
        let calibration = calibration.unwrap_or_default();
        calibration.validate()?;
        Ok(Self {
            name: name.to_string(),
            interface,
            number,
            range,
            calibration,
        })
    }
}

/// A single configured I/O line. Digital and analog channels are distinct
/// variants; analog channels are read-only by construction and carry the
/// measurement range and calibration the digital variant lacks.
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Digital(DigitalChannel),
    Analog(AnalogChannel),
}

impl Channel {
    pub fn name(&self) -> &str {
        match self {
            Channel::Digital(ch) => &ch.name,
            Channel::Analog(ch) => &ch.name,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Channel::Digital(ch) => ch.number,
            Channel::Analog(ch) => ch.number,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Digital(_) => ChannelKind::Digital,
            Channel::Analog(_) => ChannelKind::Analog,
        }
    }

    pub fn actions(&self) -> Actions {
        match self {
            Channel::Digital(ch) => ch.actions,
            Channel::Analog(_) => Actions::ReadOnly,
        }
    }

    pub fn interface_code(&self) -> &'static str {
        match self {
            Channel::Digital(ch) => ch.interface.code(),
            Channel::Analog(ch) => ch.interface.code(),
        }
    }

    /// True when this channel cannot be served by direct host GPIO alone.
    pub fn requires_i2c(&self) -> bool {
        match self {
            Channel::Digital(ch) => ch.interface.requires_i2c(),
            // Analog interfaces read through I2C ADCs.
            Channel::Analog(_) => true,
        }
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        validate_name(name)?;
        match self {
            Channel::Digital(ch) => ch.name = name.to_string(),
            Channel::Analog(ch) => ch.name = name.to_string(),
        }
        Ok(())
    }

    pub fn set_number(&mut self, number: u8) -> Result<(), ValidationError> {
        validate_channel_number(number)?;
        match self {
            Channel::Digital(ch) => ch.number = number,
            Channel::Analog(ch) => ch.number = number,
        }
        Ok(())
    }

    /// Changes the action policy. Analog inputs are read-only; requesting
    /// ReadWrite on one fails and the stored value never changes.
    pub fn set_actions(&mut self, actions: Actions) -> Result<(), ValidationError> {
        match self {
            Channel::Digital(ch) => {
                ch.actions = actions;
                Ok(())
            }
            Channel::Analog(_) => match actions {
                Actions::ReadOnly => Ok(()),
                Actions::ReadWrite => Err(ValidationError::OutOfRange {
                    field: "actions",
                    value: "analog input channels are read-only".to_string(),
                }),
            },
        }
    }

    pub fn set_range(&mut self, range: MeasurementRange) -> Result<(), ValidationError> {
        match self {
            Channel::Analog(ch) => {
                ch.range = range;
                Ok(())
            }
            Channel::Digital(_) => Err(ValidationError::OutOfRange {
                field: "measurement_range",
                value: "digital channels have no measurement range".to_string(),
            }),
        }
    }

    pub fn set_calibration(&mut self, calibration: Calibration) -> Result<(), ValidationError> {
        match self {
            Channel::Analog(ch) => {
                calibration.validate()?;
                ch.calibration = calibration;
                Ok(())
            }
            Channel::Digital(_) => Err(ValidationError::OutOfRange {
                field: "calibration",
                value: "digital channels carry no calibration".to_string(),
            }),
        }
    }
}

fn validate_channel_number(number: u8) -> Result<(), ValidationError> {
    if number <= MAX_CHANNEL_NUMBER {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: "channel_number",
            value: number.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_channel_new() {
        let ch = DigitalChannel::new("Relay1", DigitalInterface::Gpio, 3, Actions::ReadWrite)
            .unwrap();
        assert_eq!(ch.name, "Relay1");
        assert_eq!(ch.number, 3);
        assert!(DigitalChannel::new("Relay1", DigitalInterface::Gpio, 8, Actions::ReadOnly).is_err());
        assert!(DigitalChannel::new("way too long", DigitalInterface::Gpio, 0, Actions::ReadOnly).is_err());
    }

    #[test]
    fn test_analog_channel_default_calibration() {
        let ch = AnalogChannel::new(
            "Temp1",
            AnalogInterface::Analog,
            0,
            MeasurementRange::Volts0To10,
            None,
        )
        .unwrap();
        assert_eq!(ch.calibration.gain, DEFAULT_ADC_HARDWARE_GAIN);
        assert_eq!(ch.calibration.shunt_ohms, DEFAULT_SHUNT_RESISTANCE);
        assert_eq!(ch.calibration.offset_volts, DEFAULT_ADC_OFFSET);
    }

    #[test]
    fn test_analog_channel_rejects_bad_calibration() {
        let bad = Calibration { gain: -1.0, ..Default::default() };
        assert_eq!(
            AnalogChannel::new("A0", AnalogInterface::Analog, 0, MeasurementRange::Volts0To5, Some(bad))
                .unwrap_err(),
            ValidationError::OutOfRange { field: "adc_hardware_gain", value: "-1".to_string() }
        );
    }

    #[test]
    fn test_analog_actions_stay_read_only() {
        let mut ch = Channel::Analog(
            AnalogChannel::new("A0", AnalogInterface::Analog, 0, MeasurementRange::Volts0To5, None)
                .unwrap(),
        );
        assert!(ch.set_actions(Actions::ReadWrite).is_err());
        assert_eq!(ch.actions(), Actions::ReadOnly);
        assert!(ch.set_actions(Actions::ReadOnly).is_ok());
    }

    #[test]
    fn test_range_codes_round_trip() {
        for (range, code, _) in RANGE_TABLE {
            assert_eq!(range.code(), *code);
            assert_eq!(MeasurementRange::from_code(*code), Some(*range));
            assert_eq!(
                MeasurementRange::parse_code_literal(&range.code_literal()).unwrap(),
                *range
            );
        }
        assert_eq!(MeasurementRange::VoltsPm5.code_literal(), "0b10000010");
        assert!(MeasurementRange::from_code(0xff).is_none());
    }

    #[test]
    fn test_interface_codes_round_trip() {
        for iface in [
            DigitalInterface::Gpio,
            DigitalInterface::Expander,
            DigitalInterface::GpioExpander,
        ] {
            assert_eq!(DigitalInterface::from_code(iface.code()), Some(iface));
        }
        for iface in [
            AnalogInterface::Analog,
            AnalogInterface::Combo,
            AnalogInterface::AnalogV2,
            AnalogInterface::AnalogV3,
        ] {
            assert_eq!(AnalogInterface::from_code(iface.code()), Some(iface));
        }
        assert!(DigitalInterface::Gpio.requires_i2c() == false);
        assert!(DigitalInterface::Expander.requires_i2c());
    }
}
