//! End-to-end exercises of the public API: build a configuration through the
//! mutation operations, run it through the document codec, and decode legacy
//! documents the way stored ones actually look.

use iotextra_config::channel::{
    Actions, AnalogChannel, AnalogInterface, Calibration, Channel, DigitalChannel,
    DigitalInterface, MeasurementRange,
};
use iotextra_config::config::{
    Configuration, HardwareConfig, MqttConfig, NetworkConfig, SamplingRate,
};
use iotextra_config::document::{decode, encode};
use iotextra_config::validate::parse_i2c_address;
use serde_json::json;

fn combo_board_config() -> Configuration {
    let mut cfg = Configuration::new("IoTbase PICO", "IoTextra Combo");

    cfg.add_channel(Channel::Digital(
        DigitalChannel::new("Relay1", DigitalInterface::Expander, 0, Actions::ReadWrite).unwrap(),
    ))
    .unwrap();
    cfg.add_channel(Channel::Digital(
        DigitalChannel::new("Din0", DigitalInterface::Gpio, 4, Actions::ReadOnly).unwrap(),
    ))
    .unwrap();
    cfg.add_channel(Channel::Analog(
        AnalogChannel::new(
            "Press1",
            AnalogInterface::Combo,
            0,
            MeasurementRange::Milliamps4To20,
            Some(Calibration {
                gain: 0.2376,
                shunt_ohms: 0.249,
                offset_volts: 0.003,
            }),
        )
        .unwrap(),
    ))
    .unwrap();
    cfg.add_channel(Channel::Analog(
        AnalogChannel::new("Temp1", AnalogInterface::Combo, 1, MeasurementRange::VoltsPm5, None)
            .unwrap(),
    ))
    .unwrap();

    cfg.set_network(NetworkConfig {
        wifi_ssid: "plantnet".to_string(),
        wifi_password: "hunter2".to_string(),
    });
    cfg.set_mqtt(MqttConfig {
        broker: "10.1.0.5".to_string(),
        port: 8883,
        client_id: "pico-line3".to_string(),
        base_topic: "iotextra/line3".to_string(),
    })
    .unwrap();
    cfg.set_hardware(HardwareConfig {
        adc_count: 2,
        adc_addrs: vec![
            parse_i2c_address("0x48").unwrap(),
            parse_i2c_address("0x49").unwrap(),
        ],
        sampling_rate: SamplingRate::Sps250,
        ..HardwareConfig::default()
    })
    .unwrap();
    cfg.set_pin_config("0b00010001").unwrap();
    cfg.set_status_interval(120).unwrap();
    cfg
}

#[test]
fn built_configuration_survives_the_codec() {
    let cfg = combo_board_config();
    cfg.validate().unwrap();

    let doc = encode(&cfg);
    assert_eq!(doc["pin_config"], "0b00010001");
    assert_eq!(doc["hardware"]["adc_i2c_addrs"], json!(["0x48", "0x49"]));
    assert_eq!(doc["hardware"]["adc_sampling_rate"], 250);
    assert_eq!(doc["channels"][2]["measurement_range"], "0b00100010");

    let decoded = decode(&doc).unwrap();
    assert_eq!(decoded, cfg);

    // A second pass through the codec is byte-stable.
    assert_eq!(encode(&decoded), doc);
}

#[test]
fn legacy_document_decodes_with_migrations_applied() {
    // The shape older firmware wrote: per-ADC address keys and a board-level
    // calibration triple instead of per-channel values.
    let doc = json!({
        "module_type": "IoTbase PICO",
        "mezzanine_type": "IoTextra Analog",
        "channels": [
            {
                "name": "Ain0",
                "channel_type": "2",
                "interface_type": "01",
                "channel_number": 0,
                "actions": 0,
                "measurement_range": "0b10000010",
            },
        ],
        "network": { "wifi_ssid": "plantnet", "wifi_password": "hunter2" },
        "mqtt": {
            "broker": "10.1.0.5",
            "port": 1883,
            "client_id": "pico-iotextra-controller-1",
            "base_topic": "iotextra/device_1",
        },
        "hardware": {
            "mode": "i2c",
            "i2c_bus_id": 0,
            "i2c_sda_pin": 20,
            "i2c_scl_pin": 21,
            "i2c_device_addr": "0x3F",
            "eeprom_i2c_addr": "0x57",
            "eeprom_size": 1024,
            "num_of_adcs": 2,
            "adc_1_i2c_addr": "0x48",
            "adc_2_i2c_addr": "0x49",
            "adc_hardware_gain": 0.31,
            "shunt_resistance": 0.2,
            "adc_offset": -0.004,
            "gpio_host_pins": {
                "1": 10, "2": 11, "3": 12, "4": 13,
                "5": 14, "6": 15, "7": 18, "8": 19,
            },
        },
        "pin_config": "0b00001111",
        "status_update_interval_s": 30,
    });

    let cfg = decode(&doc).unwrap();

    let addrs: Vec<String> = cfg.hardware().adc_addrs.iter().map(|a| a.to_string()).collect();
    assert_eq!(addrs, vec!["0x48", "0x49"]);

    let Channel::Analog(ch) = &cfg.channels()[0] else { panic!("expected analog channel") };
    assert_eq!(ch.range, MeasurementRange::VoltsPm5);
    assert_eq!(ch.calibration.gain, 0.31);
    assert_eq!(ch.calibration.shunt_ohms, 0.2);
    assert_eq!(ch.calibration.offset_volts, -0.004);

    // Re-encoding yields the modern shape, which decodes to the same value.
    let modern = encode(&cfg);
    assert!(modern["hardware"].get("adc_1_i2c_addr").is_none());
    assert!(modern["hardware"].get("adc_hardware_gain").is_none());
    assert_eq!(modern["hardware"]["adc_i2c_addrs"], json!(["0x48", "0x49"]));
    assert_eq!(decode(&modern).unwrap(), cfg);
}

#[test]
fn broken_document_reports_every_problem_at_once() {
    let doc = json!({
        "module_type": "IoTbase PICO",
        "channels": [
            {
                "name": "no spaces allowed",
                "channel_type": "1",
                "interface_type": "01",
                "channel_number": 42,
                "actions": 0,
            },
            {
                "name": "Ain0",
                "channel_type": "2",
                "interface_type": "01",
                "channel_number": 0,
                "actions": 1,
                "measurement_range": "0b11111111",
            },
        ],
        "network": { "wifi_ssid": "lab", "wifi_password": "secret" },
        "mqtt": {
            "broker": "10.0.0.2",
            "port": 70000,
            "client_id": "c",
            "base_topic": "t",
        },
        "hardware": {
            "mode": "spi",
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
        },
        "pin_config": "0b00001111",
        "status_update_interval_s": 30,
    });

    let err = decode(&doc).unwrap_err();
    assert!(err.issues.len() >= 5, "issues: {:?}", err.issues);
    assert!(err.issues.iter().any(|i| i.contains("mezzanine_type")));
    assert!(err.issues.iter().any(|i| i.contains("channels[0]")));
    assert!(err.issues.iter().any(|i| i.contains("read-only")));
    assert!(err.issues.iter().any(|i| i.contains("mqtt.port")));
    assert!(err.issues.iter().any(|i| i.contains("hardware.mode")));

    // Every issue lands in the one displayed message.
    let message = err.to_string();
    assert!(message.contains("mezzanine_type"));
    assert!(message.contains("mqtt.port"));
}
