//! # homeflow-adapter-mqtt
//!
//! MQTT adapter — carries the homeflow bus over an MQTT broker.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker and keep the connection alive
//! - Subscribe to the subjects the automation engine consumes
//! - Decode incoming publishes into `Inbound` messages for the engine
//! - Implement the `MessagePublisher` port for outbound messages
//!
//! Subjects map onto topics segment by segment (`home.time.tick` is
//! published as `home/time/tick`).
//!
//! ## Dependency rule
//! Same as other adapters: depends on `homeflow-app` and `homeflow-domain`.

pub mod bus;
pub mod config;
pub mod error;
pub mod topic;

pub use bus::{MqttBus, MqttSubscriber, connect};
pub use config::MqttConfig;
