//! MQTT adapter error types.

use homeflow_domain::error::HomeflowError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to encode an outbound payload as JSON.
    #[error("failed to encode MQTT payload")]
    Encode(#[source] serde_json::Error),
}

impl From<MqttError> for HomeflowError {
    fn from(err: MqttError) -> Self {
        Self::Bus(Box::new(err))
    }
}
