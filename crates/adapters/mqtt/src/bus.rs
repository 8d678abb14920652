//! MQTT-backed message bus.
//!
//! [`connect`] returns two halves sharing one broker connection:
//! [`MqttBus`] publishes outbound messages, [`MqttSubscriber`] drives the
//! rumqttc event loop and forwards decoded inbound messages to the engine.
//!
//! The event loop also carries every outbound publish, so it is never
//! blocked on the engine: inbound messages that do not fit in the engine's
//! queue are dropped.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use homeflow_app::ports::MessagePublisher;
use homeflow_domain::error::HomeflowError;
use homeflow_domain::message::{Inbound, Outbound, subject};

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::topic::{subject_to_topic, topic_to_subject};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the client and event loop for `config`.
///
/// No network activity happens until [`MqttSubscriber::run`] polls the
/// event loop.
#[must_use]
pub fn connect(config: &MqttConfig) -> (MqttBus, MqttSubscriber) {
    let mut options = MqttOptions::new(
        config.client_id.as_str(),
        config.broker_host.as_str(),
        config.broker_port,
    );
    options.set_keep_alive(config.keep_alive());

    let (client, event_loop) = AsyncClient::new(options, config.channel_capacity.max(1));
    (
        MqttBus {
            client: client.clone(),
        },
        MqttSubscriber { client, event_loop },
    )
}

/// Publishing half of the MQTT connection.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MessagePublisher for MqttBus {
    async fn publish(&self, message: Outbound) -> Result<(), HomeflowError> {
        let payload = message.encode().map_err(MqttError::Encode)?;
        self.client
            .publish(
                subject_to_topic(&message.subject),
                QoS::AtLeastOnce,
                false,
                payload,
            )
            .await
            .map_err(MqttError::Client)?;
        Ok(())
    }
}

/// Receiving half of the MQTT connection.
pub struct MqttSubscriber {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttSubscriber {
    /// Poll the broker connection until `shutdown` is cancelled.
    ///
    /// Polling continues after the engine stops receiving, so publishes
    /// issued while the engine drains still reach the broker. Subscriptions are (re)issued on every connection acknowledgement so
    /// they survive reconnects. Connection errors are logged and retried
    /// after a short pause. On exit, publishes still queued on the client
    /// are flushed before disconnecting.
    pub async fn run(mut self, sender: mpsc::Sender<Inbound>, shutdown: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = self.event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("connected to MQTT broker");
                    self.subscribe_all();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(message) = decode(&publish.topic, &publish.payload) {
                        forward(&sender, message);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "MQTT connection error, retrying");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        self.disconnect().await;
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.client.try_disconnect() {
            tracing::debug!(error = %err, "MQTT disconnect request failed");
            return;
        }
        let event_loop = &mut self.event_loop;
        let flush = async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
            tracing::debug!("MQTT disconnect timed out");
        }
        tracing::info!("disconnected from MQTT broker");
    }

    fn subscribe_all(&self) {
        for pattern in subject::SUBSCRIPTIONS {
            let topic = subject_to_topic(pattern);
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => tracing::debug!(%topic, "subscribed"),
                Err(err) => tracing::warn!(%topic, error = %err, "failed to subscribe"),
            }
        }
    }
}

/// Hand `message` to the engine without waiting. Returns whether it was
/// queued.
fn forward(sender: &mpsc::Sender<Inbound>, message: Inbound) -> bool {
    match sender.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(message)) => {
            tracing::warn!(
                capacity = sender.max_capacity(),
                ?message,
                "engine inbound queue full, dropping message"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("engine stopped receiving, discarding message");
            false
        }
    }
}

/// Decode a publish packet into an inbound message, logging and dropping
/// anything malformed.
fn decode(topic: &str, payload: &[u8]) -> Option<Inbound> {
    let address = topic_to_subject(topic);
    match Inbound::decode(&address, payload) {
        Ok(Some(message)) => Some(message),
        Ok(None) => {
            tracing::debug!(subject = %address, "ignoring message on unhandled subject");
            None
        }
        Err(err) => {
            tracing::warn!(subject = %address, error = %err, "dropping malformed message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use homeflow_domain::id::{AutomationId, DeviceId};
    use homeflow_domain::value::AttributeValue;

    use super::*;

    #[test]
    fn should_decode_device_state_from_topic() {
        let message = decode(
            "home/devices/sensor/sensor1/state",
            br#"{"temperature": 21.5}"#,
        )
        .unwrap();

        let Inbound::DeviceState {
            device_id,
            device_type,
            attributes,
        } = message
        else {
            panic!("expected device state, got {message:?}");
        };
        assert_eq!(device_id, DeviceId::new("sensor1"));
        assert_eq!(device_type.as_deref(), Some("sensor"));
        assert_eq!(
            attributes.get("temperature"),
            Some(&AttributeValue::Float(21.5))
        );
    }

    #[test]
    fn should_decode_test_run_request() {
        let message = decode(
            "home/automations/test",
            br#"{"automation_id": "porch", "test": true}"#,
        );
        assert_eq!(
            message,
            Some(Inbound::TestRun {
                automation_id: AutomationId::new("porch"),
            })
        );
    }

    #[test]
    fn should_drop_malformed_payload() {
        assert!(decode("home/devices/sensor/sensor1/state", b"{oops").is_none());
    }

    #[test]
    fn should_ignore_unhandled_topic() {
        assert!(decode("home/devices/light/l1/command", b"{}").is_none());
    }

    #[tokio::test]
    async fn should_queue_publish_without_broker() {
        let (bus, _subscriber) = connect(&MqttConfig::default());

        let result = bus
            .publish(Outbound::scene_activation("movie", homeflow_domain::time::now()))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_stop_when_cancelled() {
        let (_bus, subscriber) = connect(&MqttConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            ..MqttConfig::default()
        });
        let (tx, _rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        subscriber.run(tx, shutdown).await;
    }

    #[tokio::test]
    async fn should_drop_message_when_engine_queue_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward(&tx, Inbound::TimeTick));

        let forwarded = forward(
            &tx,
            Inbound::NamedEvent {
                name: "doorbell".to_string(),
            },
        );

        assert!(!forwarded);
        assert_eq!(rx.recv().await, Some(Inbound::TimeTick));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_discard_message_when_engine_stopped_receiving() {
        let (tx, mut rx) = mpsc::channel(4);
        rx.close();

        assert!(!forward(&tx, Inbound::TimeTick));
    }

    #[tokio::test]
    async fn should_keep_polling_after_engine_stopped_receiving_until_cancelled() {
        let (_bus, subscriber) = connect(&MqttConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            ..MqttConfig::default()
        });
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(subscriber.run(tx, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
