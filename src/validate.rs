use std::fmt;

use snafu::Snafu;

use crate::channel::ChannelKind;

pub const MAX_NAME_LENGTH: usize = 8;
pub const MAX_CHANNELS: usize = 8;

const I2C_ADDR_MIN: u8 = 0x03;
const I2C_ADDR_MAX: u8 = 0x77;

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum ValidationError {
    #[snafu(display("channel name must be 1-{MAX_NAME_LENGTH} alphanumeric characters: '{name}'"))]
    InvalidName { name: String },

    #[snafu(display("'{text}' is not a 7-bit I2C address (0x03-0x77)"))]
    InvalidAddress { text: String },

    #[snafu(display("'{text}' is not an 8-bit field literal (binary, hex or decimal)"))]
    InvalidBitfield { text: String },

    #[snafu(display("channel name '{name}' is already in use"))]
    DuplicateName { name: String },

    #[snafu(display("{kind} channel number {number} is already in use"))]
    DuplicateNumber { kind: ChannelKind, number: u8 },

    #[snafu(display("a node supports at most {MAX_CHANNELS} channels"))]
    CapacityExceeded,

    #[snafu(display("no channel named '{name}'"))]
    NotFound { name: String },

    #[snafu(display("hardware mode 'gpio' is not valid: channel '{channel}' requires the I2C bus"))]
    InconsistentMode { channel: String },

    #[snafu(display("{field} is out of range: {value}"))]
    OutOfRange { field: &'static str, value: String },
}

/// A 7-bit I2C device address, constructible only inside 0x03-0x77.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct I2cAddr(u8);

impl I2cAddr {
    pub fn new(raw: u8) -> Result<Self, ValidationError> {
        if (I2C_ADDR_MIN..=I2C_ADDR_MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidAddress { text: format!("{raw:#04x}") })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// For addresses baked into defaults, statically known to be in range.
    pub(crate) const fn known(raw: u8) -> Self {
        Self(raw)
    }
}

impl fmt::Display for I2cAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let ok = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidName { name: name.to_string() })
    }
}

/// Parse a hexadecimal I2C address literal, with or without a `0x` prefix.
pub fn parse_i2c_address(text: &str) -> Result<I2cAddr, ValidationError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let raw = u8::from_str_radix(digits, 16)
        .map_err(|_| ValidationError::InvalidAddress { text: text.to_string() })?;
    I2cAddr::new(raw)
        .map_err(|_| ValidationError::InvalidAddress { text: text.to_string() })
}

/// Parse an 8-bit field from its binary (`0b...`), hex (`0x...`) or decimal
/// textual form.
pub fn parse_bitfield(text: &str) -> Result<u8, ValidationError> {
    let parsed = if let Some(digits) = text.strip_prefix("0b") {
        u8::from_str_radix(digits, 2)
    } else if let Some(digits) = text.strip_prefix("0x") {
        u8::from_str_radix(digits, 16)
    } else {
        text.parse::<u8>()
    };
    parsed.map_err(|_| ValidationError::InvalidBitfield { text: text.to_string() })
}

pub fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value: value.to_string() })
    }
}

pub fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value: value.to_string() })
    }
}
