//! Topic naming convention for the broker clients that talk to a configured
//! node. The node publishes/subscribes under `mqtt.base_topic`; everything
//! here is string building, the actual broker traffic lives elsewhere.

pub fn status(base_topic: &str) -> String {
    format!("{base_topic}/status")
}

pub fn input(base_topic: &str, channel: &str) -> String {
    format!("{base_topic}/input/{channel}")
}

pub fn output_set(base_topic: &str, channel: &str) -> String {
    format!("{base_topic}/output/{channel}/set")
}

pub fn output_state(base_topic: &str, channel: &str) -> String {
    format!("{base_topic}/output/{channel}/state")
}

pub fn analog(base_topic: &str, channel: &str) -> String {
    format!("{base_topic}/analog/{channel}")
}
