//! Transport implementations

pub mod mqtt;

pub use mqtt::MqttTransport;
