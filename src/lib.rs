//! Configuration model, JSON codec and framed serial protocol for IoTextra
//! I/O nodes.
//!
//! A [`config::Configuration`] describes one node: its mezzanine, up to 8
//! digital/analog channels, network/MQTT settings and the hardware wiring.
//! [`document`] maps it to and from the JSON document shared with the device
//! firmware and the on-disk config files, and [`link`] frames that document
//! for the byte-stream link to the device.

pub mod channel;
pub mod config;
pub mod document;
pub mod link;
pub mod topics;
pub mod validate;

pub use channel::{Actions, AnalogChannel, Calibration, Channel, ChannelKind, DigitalChannel};
pub use config::{Configuration, HardwareConfig, HardwareMode, MqttConfig, NetworkConfig};
pub use document::{decode, encode, SchemaError};
pub use link::{pull_document, push_config, ConfigLink, TransportError};
pub use validate::{parse_bitfield, parse_i2c_address, validate_name, I2cAddr, ValidationError};
