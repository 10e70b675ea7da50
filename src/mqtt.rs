use std::time::Duration;

use rumqttc::mqttbytes::v4::Packet;
use serde_json::Value;

use crate::config::MqttConfig;
use crate::server::AppState;
use crate::webhooks::{self, Topics};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Publishes observed wallbox status to the configured topic.
#[derive(Clone)]
pub struct StatusPublisher {
    client: rumqttc::AsyncClient,
    topic: String,
}

impl StatusPublisher {
    /// Queue the status without waiting.  When the broker is away and the
    /// request queue is full the status is dropped with a warning.
    pub fn publish(&self, status: &str) {
        if let Err(e) = self.client.try_publish(
            self.topic.as_str(),
            rumqttc::QoS::AtLeastOnce,
            true,
            status.as_bytes().to_vec(),
        ) {
            tracing::warn!("failed to publish status to {}: {e}", self.topic);
        }
    }
}

/// Broker connection feeding command and solar messages into the webhook
/// handler.  Nothing flows until [`Bridge::run`] polls it.
pub struct Bridge {
    client: rumqttc::AsyncClient,
    eventloop: rumqttc::EventLoop,
    topics: Topics,
    reconnect_delay: Duration,
}

pub fn connect(config: &MqttConfig) -> (StatusPublisher, Bridge) {
    let mut mqtt_options =
        rumqttc::MqttOptions::new(config.client_id.as_str(), config.broker.as_str(), config.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));

    let (mqtt_client, mqtt_eventloop) = rumqttc::AsyncClient::new(mqtt_options, 10);

    let publisher = StatusPublisher {
        client: mqtt_client.clone(),
        topic: config.topic.clone(),
    };
    let bridge = Bridge {
        client: mqtt_client,
        eventloop: mqtt_eventloop,
        topics: Topics::from(config),
        reconnect_delay: RECONNECT_DELAY,
    };
    (publisher, bridge)
}

impl Bridge {
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    // Clean sessions lose their subscriptions, so this runs on every ConnAck.
    fn subscribe(&self) {
        for topic in [&self.topics.command, &self.topics.solar] {
            if let Err(e) = self
                .client
                .try_subscribe(topic.as_str(), rumqttc::QoS::AtMostOnce)
            {
                tracing::warn!("failed to subscribe to {topic}: {e}");
            }
        }
    }

    /// Each message is handled on its own task so the event loop keeps
    /// answering pings while a browser session runs.
    pub async fn run(mut self, state: AppState) {
        loop {
            match self.eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("MQTT connected, subscribing");
                    self.subscribe();
                }
                Ok(rumqttc::Event::Incoming(Packet::Publish(msg))) => {
                    let payload = String::from_utf8_lossy(&msg.payload).into_owned();
                    let state = state.clone();
                    let topics = self.topics.clone();
                    tokio::spawn(async move {
                        let reply = webhooks::handle_mqtt_message(
                            &state,
                            &topics,
                            &msg.topic,
                            &Value::String(payload),
                        )
                        .await;
                        tracing::info!("MQTT {} handled: {reply}", msg.topic);
                    });
                }
                Ok(_) => (),
                Err(e) => {
                    tracing::warn!("MQTT connection error: {e}");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}
