//! Canonical mapping between [`Configuration`] and the JSON document shape
//! shared with the device firmware and the on-disk config files.
//!
//! Decoding collects every schema violation before reporting, so a caller can
//! surface all problems in one pass instead of fixing them one at a time.

use serde_json::{json, Map, Value};
use snafu::Snafu;

use crate::channel::{
    Actions, AnalogChannel, AnalogInterface, Calibration, Channel, ChannelKind, DigitalChannel,
    DigitalInterface, MeasurementRange, DEFAULT_ADC_HARDWARE_GAIN, DEFAULT_ADC_OFFSET,
    DEFAULT_SHUNT_RESISTANCE,
};
use crate::config::{
    Configuration, HardwareConfig, HardwareMode, MqttConfig, NetworkConfig, SamplingRate,
};
use crate::validate::{parse_bitfield, parse_i2c_address, I2cAddr};

#[derive(Debug, Snafu, PartialEq)]
#[snafu(display("invalid configuration document: {}", issues.join("; ")))]
pub struct SchemaError {
    pub issues: Vec<String>,
}

/// Renders a configuration as the canonical document: hex addresses as
/// lowercase `0x` strings, the pin map as an 8-digit `0b` literal (MSB =
/// host channel 8), floats untouched so calibration round-trips exactly.
pub fn encode(cfg: &Configuration) -> Value {
    let hw = cfg.hardware();
    let mut hardware = Map::new();
    hardware.insert("mode".into(), json!(hw.mode.code()));
    hardware.insert("i2c_bus_id".into(), json!(hw.i2c_bus_id));
    hardware.insert("i2c_sda_pin".into(), json!(hw.sda_pin));
    hardware.insert("i2c_scl_pin".into(), json!(hw.scl_pin));
    hardware.insert("i2c_device_addr".into(), json!(hw.expander_addr.to_string()));
    hardware.insert("eeprom_i2c_addr".into(), json!(hw.eeprom_addr.to_string()));
    hardware.insert("eeprom_size".into(), json!(hw.eeprom_size));
    hardware.insert("num_of_adcs".into(), json!(hw.adc_count));
    if hw.adc_count > 0 {
        hardware.insert(
            "adc_i2c_addrs".into(),
            json!(hw.adc_addrs.iter().map(|a| a.to_string()).collect::<Vec<_>>()),
        );
    }
    hardware.insert("adc_sampling_rate".into(), json!(hw.sampling_rate.sps()));
    let pins: Map<String, Value> = hw
        .gpio_host_pins
        .iter()
        .map(|(ch, pin)| (ch.to_string(), json!(pin)))
        .collect();
    hardware.insert("gpio_host_pins".into(), Value::Object(pins));

    json!({
        "module_type": cfg.module_type,
        "mezzanine_type": cfg.mezzanine_type,
        "channels": cfg.channels().iter().map(encode_channel).collect::<Vec<_>>(),
        "network": {
            "wifi_ssid": cfg.network().wifi_ssid,
            "wifi_password": cfg.network().wifi_password,
        },
        "mqtt": {
            "broker": cfg.mqtt().broker,
            "port": cfg.mqtt().port,
            "client_id": cfg.mqtt().client_id,
            "base_topic": cfg.mqtt().base_topic,
        },
        "hardware": hardware,
        "pin_config": format!("0b{:08b}", cfg.pin_config()),
        "status_update_interval_s": cfg.status_update_interval_s(),
    })
}

fn encode_channel(channel: &Channel) -> Value {
    match channel {
        Channel::Digital(ch) => json!({
            "name": ch.name,
            "channel_type": ChannelKind::Digital.code(),
            "interface_type": ch.interface.code(),
            "channel_number": ch.number,
            "actions": ch.actions.bit(),
        }),
        Channel::Analog(ch) => json!({
            "name": ch.name,
            "channel_type": ChannelKind::Analog.code(),
            "interface_type": ch.interface.code(),
            "channel_number": ch.number,
            "actions": Actions::ReadOnly.bit(),
            "measurement_range": ch.range.code_literal(),
            "adc_hardware_gain": ch.calibration.gain,
            "shunt_resistance": ch.calibration.shunt_ohms,
            "adc_offset": ch.calibration.offset_volts,
        }),
    }
}

/// Parses and validates a document. All missing or malformed keys are
/// reported together in the returned [`SchemaError`].
pub fn decode(doc: &Value) -> Result<Configuration, SchemaError> {
    let mut issues = Vec::new();

    let root = match doc.as_object() {
        Some(obj) => obj,
        None => {
            return Err(SchemaError { issues: vec!["document is not a JSON object".to_string()] })
        }
    };

    let module_type = get_str(root, "", "module_type", &mut issues).unwrap_or_default();
    let mezzanine_type = get_str(root, "", "mezzanine_type", &mut issues).unwrap_or_default();

    let mut channels = Vec::new();
    match root.get("channels") {
        Some(Value::Array(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                if let Some(decoded) = decode_channel(entry, i, &mut issues) {
                    channels.push(decoded);
                }
            }
        }
        Some(_) => issues.push("'channels' must be an array".to_string()),
        None => issues.push("missing key 'channels'".to_string()),
    }

    let network = decode_network(root, &mut issues);
    let mqtt = decode_mqtt(root, &mut issues);
    let (hardware, board_calibration) = decode_hardware(root, &mut issues);

    let pin_config = match get_str(root, "", "pin_config", &mut issues) {
        Some(literal) => match parse_bitfield(&literal) {
            Ok(value) => value,
            Err(e) => {
                issues.push(format!("pin_config: {e}"));
                0
            }
        },
        None => 0,
    };

    let status_update_interval_s =
        match get_u64(root, "", "status_update_interval_s", &mut issues) {
            Some(0) => {
                issues.push("status_update_interval_s must be positive".to_string());
                30
            }
            Some(v) if v > u32::MAX as u64 => {
                issues.push(format!("status_update_interval_s is out of range: {v}"));
                30
            }
            Some(v) => v as u32,
            None => 30,
        };

    // Legacy migration: a board-level calibration triple applies to every
    // analog channel that carried no calibration keys of its own. Channels
    // with any explicit calibration are left alone, so re-decoding an
    // already-migrated document is a no-op.
    if board_calibration.validate().is_err() {
        issues.push("hardware calibration values are out of range".to_string());
    }
    let channels: Vec<Channel> = channels
        .into_iter()
        .map(|decoded| {
            let DecodedChannel { mut channel, wants_board_calibration } = decoded;
            if wants_board_calibration {
                if let Channel::Analog(ref mut ch) = channel {
                    ch.calibration = board_calibration;
                }
            }
            channel
        })
        .collect();

    if !issues.is_empty() {
        return Err(SchemaError { issues });
    }

    let cfg = Configuration::from_decoded_parts(
        module_type,
        mezzanine_type,
        channels,
        network,
        mqtt,
        hardware,
        pin_config,
        status_update_interval_s,
    );
    cfg.validate()
        .map_err(|e| SchemaError { issues: vec![e.to_string()] })?;
    Ok(cfg)
}

struct DecodedChannel {
    channel: Channel,
    wants_board_calibration: bool,
}

fn decode_channel(entry: &Value, index: usize, issues: &mut Vec<String>) -> Option<DecodedChannel> {
    let path = format!("channels[{index}]");
    let obj = match entry.as_object() {
        Some(obj) => obj,
        None => {
            issues.push(format!("{path} is not an object"));
            return None;
        }
    };

    let name = get_str(obj, &path, "name", issues);
    let kind = get_str(obj, &path, "channel_type", issues).and_then(|code| {
        let kind = ChannelKind::from_code(&code);
        if kind.is_none() {
            issues.push(format!("{path}.channel_type: unknown code '{code}'"));
        }
        kind
    });
    let interface = get_str(obj, &path, "interface_type", issues);
    let number = match get_u64(obj, &path, "channel_number", issues) {
        Some(n) if n <= u8::MAX as u64 => Some(n as u8),
        Some(n) => {
            issues.push(format!("{path}.channel_number is out of range: {n}"));
            None
        }
        None => None,
    };
    let actions = get_u64(obj, &path, "actions", issues).and_then(|bit| {
        let actions = u8::try_from(bit).ok().and_then(Actions::from_bit);
        if actions.is_none() {
            issues.push(format!("{path}.actions must be 0 or 1, got {bit}"));
        }
        actions
    });

    let (name, kind, interface, number, actions) =
        (name?, kind?, interface?, number?, actions?);

    match kind {
        ChannelKind::Digital => {
            let interface = match DigitalInterface::from_code(&interface) {
                Some(i) => i,
                None => {
                    issues.push(format!("{path}.interface_type: unknown digital code '{interface}'"));
                    return None;
                }
            };
            match DigitalChannel::new(&name, interface, number, actions) {
                Ok(ch) => Some(DecodedChannel {
                    channel: Channel::Digital(ch),
                    wants_board_calibration: false,
                }),
                Err(e) => {
                    issues.push(format!("{path}: {e}"));
                    None
                }
            }
        }
        ChannelKind::Analog => {
            let interface = match AnalogInterface::from_code(&interface) {
                Some(i) => i,
                None => {
                    issues.push(format!("{path}.interface_type: unknown analog code '{interface}'"));
                    return None;
                }
            };
            if actions != Actions::ReadOnly {
                issues.push(format!("{path}: analog input channels are read-only"));
                return None;
            }
            let range = match get_str(obj, &path, "measurement_range", issues) {
                Some(literal) => match MeasurementRange::parse_code_literal(&literal) {
                    Ok(range) => range,
                    Err(_) => {
                        issues.push(format!("{path}.measurement_range: unknown code '{literal}'"));
                        return None;
                    }
                },
                None => return None,
            };

            let gain = get_opt_f64(obj, &path, "adc_hardware_gain", issues);
            let shunt = get_opt_f64(obj, &path, "shunt_resistance", issues);
            let offset = get_opt_f64(obj, &path, "adc_offset", issues);
            let wants_board_calibration =
                gain.is_none() && shunt.is_none() && offset.is_none();
            let calibration = Calibration {
                gain: gain.unwrap_or(DEFAULT_ADC_HARDWARE_GAIN),
                shunt_ohms: shunt.unwrap_or(DEFAULT_SHUNT_RESISTANCE),
                offset_volts: offset.unwrap_or(DEFAULT_ADC_OFFSET),
            };
            match AnalogChannel::new(&name, interface, number, range, Some(calibration)) {
                Ok(ch) => Some(DecodedChannel {
                    channel: Channel::Analog(ch),
                    wants_board_calibration,
                }),
                Err(e) => {
                    issues.push(format!("{path}: {e}"));
                    None
                }
            }
        }
    }
}

fn decode_network(root: &Map<String, Value>, issues: &mut Vec<String>) -> NetworkConfig {
    let mut network = NetworkConfig::default();
    if let Some(obj) = get_obj(root, "network", issues) {
        network.wifi_ssid = get_str(&obj, "network", "wifi_ssid", issues).unwrap_or_default();
        network.wifi_password =
            get_str(&obj, "network", "wifi_password", issues).unwrap_or_default();
    }
    network
}

fn decode_mqtt(root: &Map<String, Value>, issues: &mut Vec<String>) -> MqttConfig {
    let mut mqtt = MqttConfig::default();
    if let Some(obj) = get_obj(root, "mqtt", issues) {
        mqtt.broker = get_str(&obj, "mqtt", "broker", issues).unwrap_or_default();
        match get_u64(&obj, "mqtt", "port", issues) {
            Some(p) if (1..=65535).contains(&p) => mqtt.port = p as u16,
            Some(p) => issues.push(format!("mqtt.port must be 1-65535, got {p}")),
            None => {}
        }
        mqtt.client_id = get_str(&obj, "mqtt", "client_id", issues).unwrap_or_default();
        mqtt.base_topic = get_str(&obj, "mqtt", "base_topic", issues).unwrap_or_default();
    }
    mqtt
}

fn decode_hardware(
    root: &Map<String, Value>,
    issues: &mut Vec<String>,
) -> (HardwareConfig, Calibration) {
    let mut hw = HardwareConfig::default();
    let mut board_calibration = Calibration::default();
    let obj = match get_obj(root, "hardware", issues) {
        Some(obj) => obj,
        None => return (hw, board_calibration),
    };

    if let Some(code) = get_str(&obj, "hardware", "mode", issues) {
        match HardwareMode::from_code(&code) {
            Some(mode) => hw.mode = mode,
            None => issues.push(format!("hardware.mode must be 'gpio' or 'i2c', got '{code}'")),
        }
    }
    hw.i2c_bus_id = get_u8(&obj, "hardware", "i2c_bus_id", issues).unwrap_or(hw.i2c_bus_id);
    hw.sda_pin = get_u8(&obj, "hardware", "i2c_sda_pin", issues).unwrap_or(hw.sda_pin);
    hw.scl_pin = get_u8(&obj, "hardware", "i2c_scl_pin", issues).unwrap_or(hw.scl_pin);
    if let Some(addr) = get_addr(&obj, "hardware", "i2c_device_addr", issues) {
        hw.expander_addr = addr;
    }
    if let Some(addr) = get_addr(&obj, "hardware", "eeprom_i2c_addr", issues) {
        hw.eeprom_addr = addr;
    }
    match get_u64(&obj, "hardware", "eeprom_size", issues) {
        Some(size) if size <= u32::MAX as u64 => hw.eeprom_size = size as u32,
        Some(size) => issues.push(format!("hardware.eeprom_size is out of range: {size}")),
        None => {}
    }

    // Deprecated board-level calibration; migrated onto channels by decode().
    if let Some(gain) = get_opt_f64(&obj, "hardware", "adc_hardware_gain", issues) {
        board_calibration.gain = gain;
    }
    if let Some(shunt) = get_opt_f64(&obj, "hardware", "shunt_resistance", issues) {
        board_calibration.shunt_ohms = shunt;
    }
    if let Some(offset) = get_opt_f64(&obj, "hardware", "adc_offset", issues) {
        board_calibration.offset_volts = offset;
    }

    let mut addrs = Vec::new();
    match obj.get("adc_i2c_addrs") {
        Some(Value::Array(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                match entry.as_str().map(parse_i2c_address) {
                    Some(Ok(addr)) => addrs.push(addr),
                    Some(Err(e)) => issues.push(format!("hardware.adc_i2c_addrs[{i}]: {e}")),
                    None => issues.push(format!("hardware.adc_i2c_addrs[{i}] must be a string")),
                }
            }
        }
        Some(_) => issues.push("hardware.adc_i2c_addrs must be an array".to_string()),
        // Older documents stored one key per ADC (adc_1_i2c_addr, ...).
        None => addrs = collect_legacy_adc_addrs(&obj, issues),
    }
    hw.adc_count = match obj.get("num_of_adcs").and_then(Value::as_u64) {
        Some(n) if n <= 4 => n as u8,
        Some(n) => {
            issues.push(format!("hardware.num_of_adcs must be 0-4, got {n}"));
            0
        }
        None => addrs.len() as u8,
    };
    hw.adc_addrs = addrs;

    if let Some(sps) = obj.get("adc_sampling_rate").and_then(Value::as_u64) {
        match u32::try_from(sps).ok().and_then(SamplingRate::from_sps) {
            Some(rate) => hw.sampling_rate = rate,
            None => issues.push(format!("hardware.adc_sampling_rate: unsupported rate {sps}")),
        }
    }

    match obj.get("gpio_host_pins") {
        Some(Value::Object(pins)) => {
            hw.gpio_host_pins.clear();
            for (key, pin) in pins {
                let channel = key.parse::<u8>().ok().filter(|c| (1..=8).contains(c));
                let pin = pin.as_u64().and_then(|p| u8::try_from(p).ok());
                match (channel, pin) {
                    (Some(channel), Some(pin)) => {
                        hw.gpio_host_pins.insert(channel, pin);
                    }
                    _ => issues.push(format!("hardware.gpio_host_pins: bad entry '{key}'")),
                }
            }
        }
        Some(_) => issues.push("hardware.gpio_host_pins must be an object".to_string()),
        None => issues.push("missing key 'hardware.gpio_host_pins'".to_string()),
    }

    (hw, board_calibration)
}

/// Older documents carried one address key per ADC in assorted spellings
/// (`adc_1_i2c_addr`, `ADC2_I2C_ADDR`, ...). Collect them ordered by ADC
/// number.
fn collect_legacy_adc_addrs(obj: &Map<String, Value>, issues: &mut Vec<String>) -> Vec<I2cAddr> {
    let mut by_number = std::collections::BTreeMap::new();
    for (key, value) in obj {
        let lower = key.to_ascii_lowercase();
        if !(lower.contains("adc") && lower.contains("i2c") && lower.contains("addr")) {
            continue;
        }
        let digits: String = key.chars().filter(|c| c.is_ascii_digit()).collect();
        let number = match digits.parse::<u32>() {
            Ok(n) => n,
            Err(_) => continue,
        };
        match value.as_str().map(parse_i2c_address) {
            Some(Ok(addr)) => {
                by_number.insert(number, addr);
            }
            Some(Err(e)) => issues.push(format!("hardware.{key}: {e}")),
            None => issues.push(format!("hardware.{key} must be a string")),
        }
    }
    by_number.into_values().collect()
}

fn get_obj(
    root: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<Map<String, Value>> {
    match root.get(key) {
        Some(Value::Object(obj)) => Some(obj.clone()),
        Some(_) => {
            issues.push(format!("'{key}' must be an object"));
            None
        }
        None => {
            issues.push(format!("missing key '{key}'"));
            None
        }
    }
}

fn get_str(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(format!("{} must be a string", joined(path, key)));
            None
        }
        None => {
            issues.push(format!("missing key '{}'", joined(path, key)));
            None
        }
    }
}

fn get_u64(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<u64> {
    match obj.get(key) {
        Some(value) => match value.as_u64() {
            Some(v) => Some(v),
            None => {
                issues.push(format!("{} must be an unsigned integer", joined(path, key)));
                None
            }
        },
        None => {
            issues.push(format!("missing key '{}'", joined(path, key)));
            None
        }
    }
}

fn get_u8(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<u8> {
    match get_u64(obj, path, key, issues) {
        Some(v) if v <= u8::MAX as u64 => Some(v as u8),
        Some(v) => {
            issues.push(format!("{} is out of range: {v}", joined(path, key)));
            None
        }
        None => None,
    }
}

fn get_addr(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<I2cAddr> {
    let text = get_str(obj, path, key, issues)?;
    match parse_i2c_address(&text) {
        Ok(addr) => Some(addr),
        Err(e) => {
            issues.push(format!("{}: {e}", joined(path, key)));
            None
        }
    }
}

/// Optional float field: absent is fine, present-but-not-a-number is an issue.
fn get_opt_f64(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    issues: &mut Vec<String>,
) -> Option<f64> {
    match obj.get(key) {
        Some(value) => match value.as_f64() {
            Some(v) => Some(v),
            None => {
                issues.push(format!("{} must be a number", joined(path, key)));
                None
            }
        },
        None => None,
    }
}

fn joined(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{AnalogChannel, AnalogInterface, MeasurementRange};
    use crate::config::Configuration;

    fn analog_doc_channel(name: &str, number: u8) -> Value {
        json!({
            "name": name,
            "channel_type": "2",
            "interface_type": "01",
            "channel_number": number,
            "actions": 0,
            "measurement_range": "0b00000011",
        })
    }

    fn minimal_doc(channels: Vec<Value>, hardware_extra: &[(&str, Value)]) -> Value {
        let mut hardware = json!({
            "mode": "i2c",
            "i2c_bus_id": 0,
            "i2c_sda_pin": 20,
            "i2c_scl_pin": 21,
            "i2c_device_addr": "0x3f",
            "eeprom_i2c_addr": "0x57",
            "eeprom_size": 1024,
            "num_of_adcs": 0,
            "gpio_host_pins": {
                "1": 10, "2": 11, "3": 12, "4": 13,
                "5": 14, "6": 15, "7": 18, "8": 19,
            },
        });
        for (key, value) in hardware_extra {
            hardware[*key] = value.clone();
        }
        json!({
            "module_type": "IoTbase PICO",
            "mezzanine_type": "IoTextra Analog",
            "channels": channels,
            "network": { "wifi_ssid": "lab", "wifi_password": "secret" },
            "mqtt": {
                "broker": "10.0.0.2",
                "port": 1883,
                "client_id": "pico-iotextra-controller-1",
                "base_topic": "iotextra/device_1",
            },
            "hardware": hardware,
            "pin_config": "0b00001111",
            "status_update_interval_s": 30,
        })
    }

    #[test]
    fn test_pin_config_rendering() {
        let mut cfg = Configuration::new("IoTbase PICO", "IoTextra Octal");
        cfg.set_pin_config("0xf0").unwrap();
        let doc = encode(&cfg);
        assert_eq!(doc["pin_config"], "0b11110000");
    }

    #[test]
    fn test_hex_fields_render_lowercase_prefixed() {
        let cfg = Configuration::new("IoTbase PICO", "IoTextra Octal");
        let doc = encode(&cfg);
        assert_eq!(doc["hardware"]["i2c_device_addr"], "0x3f");
        assert_eq!(doc["hardware"]["eeprom_i2c_addr"], "0x57");
        // No ADCs configured: the count is still written, only the address
        // list is absent.
        assert_eq!(doc["hardware"]["num_of_adcs"], 0);
        assert!(doc["hardware"].get("adc_i2c_addrs").is_none());
    }

    #[test]
    fn test_sampling_rate_survives_round_trip_without_adcs() {
        let mut cfg = Configuration::new("IoTbase PICO", "IoTextra Octal");
        cfg.set_hardware(HardwareConfig {
            sampling_rate: SamplingRate::Sps250,
            ..HardwareConfig::default()
        })
        .unwrap();
        let doc = encode(&cfg);
        assert_eq!(doc["hardware"]["num_of_adcs"], 0);
        assert_eq!(doc["hardware"]["adc_sampling_rate"], 250);
        assert!(doc["hardware"].get("adc_i2c_addrs").is_none());
        assert_eq!(decode(&doc).unwrap(), cfg);
    }

    #[test]
    fn test_schema_errors_are_collected_not_fail_fast() {
        let doc = json!({
            "mezzanine_type": "IoTextra Octal",
            "channels": [],
            "network": { "wifi_ssid": "lab" },
            "mqtt": { "broker": "x", "port": 0, "client_id": "c", "base_topic": "t" },
            "pin_config": "0b2",
            "status_update_interval_s": 30,
        });
        let err = decode(&doc).unwrap_err();
        // module_type, network.wifi_password, mqtt.port, hardware, pin_config
        assert!(err.issues.len() >= 5, "issues: {:?}", err.issues);
        assert!(err.issues.iter().any(|i| i.contains("module_type")));
        assert!(err.issues.iter().any(|i| i.contains("wifi_password")));
        assert!(err.issues.iter().any(|i| i.contains("mqtt.port")));
        assert!(err.issues.iter().any(|i| i.contains("hardware")));
        assert!(err.issues.iter().any(|i| i.contains("pin_config")));
    }

    #[test]
    fn test_board_calibration_migrates_to_bare_channels() {
        let doc = minimal_doc(
            vec![
                analog_doc_channel("Ain0", 0),
                analog_doc_channel("Ain1", 1),
            ],
            &[
                ("adc_hardware_gain", json!(0.5)),
                ("shunt_resistance", json!(0.12)),
                ("adc_offset", json!(-0.01)),
            ],
        );
        let cfg = decode(&doc).unwrap();
        for channel in cfg.channels() {
            let Channel::Analog(ch) = channel else { panic!("expected analog") };
            assert_eq!(ch.calibration.gain, 0.5);
            assert_eq!(ch.calibration.shunt_ohms, 0.12);
            assert_eq!(ch.calibration.offset_volts, -0.01);
        }
        // The board triple is never re-encoded; decoding the migrated
        // document again changes nothing.
        let reencoded = encode(&cfg);
        assert!(reencoded["hardware"].get("adc_hardware_gain").is_none());
        assert_eq!(decode(&reencoded).unwrap(), cfg);
    }

    #[test]
    fn test_explicit_calibration_wins_over_board_triple() {
        let mut explicit = analog_doc_channel("Ain0", 0);
        explicit["adc_hardware_gain"] = json!(0.2);
        explicit["shunt_resistance"] = json!(0.249);
        explicit["adc_offset"] = json!(0.0);
        let doc = minimal_doc(
            vec![explicit, analog_doc_channel("Ain1", 1)],
            &[("adc_hardware_gain", json!(0.5))],
        );
        let cfg = decode(&doc).unwrap();
        let Channel::Analog(ch0) = &cfg.channels()[0] else { panic!() };
        let Channel::Analog(ch1) = &cfg.channels()[1] else { panic!() };
        assert_eq!(ch0.calibration.gain, 0.2);
        assert_eq!(ch1.calibration.gain, 0.5);
        // Triple fields the document omitted fall back to module defaults.
        assert_eq!(ch1.calibration.shunt_ohms, DEFAULT_SHUNT_RESISTANCE);
    }

    #[test]
    fn test_partial_channel_calibration_fills_from_defaults() {
        let mut partial = analog_doc_channel("Ain0", 0);
        partial["adc_offset"] = json!(0.25);
        let doc = minimal_doc(vec![partial], &[("adc_hardware_gain", json!(0.5))]);
        let cfg = decode(&doc).unwrap();
        let Channel::Analog(ch) = &cfg.channels()[0] else { panic!() };
        // A partially calibrated channel is not migrated; missing fields come
        // from the module defaults, never the board triple.
        assert_eq!(ch.calibration.offset_volts, 0.25);
        assert_eq!(ch.calibration.gain, DEFAULT_ADC_HARDWARE_GAIN);
        assert_eq!(ch.calibration.shunt_ohms, DEFAULT_SHUNT_RESISTANCE);
    }

    #[test]
    fn test_legacy_per_adc_address_keys() {
        let doc = minimal_doc(
            vec![analog_doc_channel("Ain0", 0)],
            &[
                ("adc_1_i2c_addr", json!("0x49")),
                ("ADC2_I2C_ADDR", json!("0x48")),
                ("num_of_adcs", json!(2)),
            ],
        );
        let cfg = decode(&doc).unwrap();
        let addrs: Vec<String> = cfg
            .hardware()
            .adc_addrs
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(addrs, vec!["0x49", "0x48"]);
        assert_eq!(cfg.hardware().adc_count, 2);
    }

    #[test]
    fn test_analog_write_actions_rejected_at_decode() {
        let mut bad = analog_doc_channel("Ain0", 0);
        bad["actions"] = json!(1);
        let doc = minimal_doc(vec![bad], &[]);
        let err = decode(&doc).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("read-only")), "{:?}", err.issues);
    }

    #[test]
    fn test_decode_runs_aggregate_validation() {
        let doc = minimal_doc(
            vec![analog_doc_channel("Same", 0), analog_doc_channel("Same", 1)],
            &[],
        );
        let err = decode(&doc).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("already in use")), "{:?}", err.issues);
    }

    #[test]
    fn test_calibration_round_trips_bitwise() {
        let mut cfg = Configuration::new("IoTbase PICO", "IoTextra Analog");
        let cal = Calibration {
            gain: 0.23761904761904762,
            shunt_ohms: 0.249,
            offset_volts: -1.5e-7,
        };
        cfg.add_channel(Channel::Analog(
            AnalogChannel::new(
                "Ain0",
                AnalogInterface::Analog,
                0,
                MeasurementRange::VoltsPm5,
                Some(cal),
            )
            .unwrap(),
        ))
        .unwrap();
        let decoded = decode(&encode(&cfg)).unwrap();
        let Channel::Analog(ch) = &decoded.channels()[0] else { panic!() };
        assert_eq!(ch.calibration.gain.to_bits(), cal.gain.to_bits());
        assert_eq!(ch.calibration.shunt_ohms.to_bits(), cal.shunt_ohms.to_bits());
        assert_eq!(ch.calibration.offset_volts.to_bits(), cal.offset_volts.to_bits());
    }
}
