//! Relays JSON messages published on an MQTT topic to an SMTP submission
//! server, over a fixed pool of authenticated connections.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod source;

pub use config::{Config, find_config_file};
pub use controller::Courier;
pub use dispatch::{DispatchError, Dispatcher};
pub use source::{MqttConfig, MqttSource};
