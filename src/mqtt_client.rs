use std::{sync::{atomic::{AtomicBool, Ordering}, Arc}, time::Duration};

use async_trait::async_trait;
use rumqttc::{self, AsyncClient, MqttOptions, EventLoop, QoS, SubscribeFilter, Event, Packet};
use tokio::time;

use crate::{error::PublishError, message_handler::MessageHandler, model::ControlCommand, state::State};

/// Sends control commands towards the AC controller.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
  async fn publish(&self, command: &ControlCommand) -> Result<(), PublishError>;
}

/// Whether the event loop currently holds an acknowledged broker session.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus(Arc<AtomicBool>);

impl ConnectionStatus {
  pub fn new() -> Self {
    ConnectionStatus::default()
  }

  pub fn is_connected(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  pub fn set_connected(&self, connected: bool) {
    self.0.store(connected, Ordering::SeqCst);
  }
}

pub struct MqttClient {
  pub client: AsyncClient,
  event_loop: EventLoop,
  handler: Arc<MessageHandler>,
  topics: Vec<String>,
  qos: QoS,
  reconnect_delay: Duration,
  status: ConnectionStatus,
}

impl MqttClient {
  pub fn new(options: MqttOptions, cap: usize, topics: Vec<String>, qos: QoS, handler: Arc<MessageHandler>) -> Self {
    let (client, event_loop) = AsyncClient::new(options, cap);
    MqttClient {
      client,
      event_loop,
      handler,
      topics,
      qos,
      reconnect_delay: Duration::from_secs(5),
      status: ConnectionStatus::new(),
    }
  }

  pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
    self.reconnect_delay = reconnect_delay;
    self
  }

  pub fn publisher(&self, topic: String) -> MqttPublisher {
    MqttPublisher::new(self.client.clone(), topic, self.qos, self.status.clone())
  }

  pub fn status(&self) -> ConnectionStatus {
    self.status.clone()
  }

  /// Drives the connection forever. A failed poll is retried after the
  /// reconnect delay; the state keeps its last values meanwhile.
  pub async fn run(&mut self, state: State) {
    loop {
      match self.event_loop.poll().await {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
          log::info!("connected to MQTT broker");
          self.status.set_connected(true);
          self.subscribe_to_topics();
        },
        Ok(Event::Incoming(Packet::Publish(publish))) => {
          self.handler.handle_message(&publish.payload, &publish.topic, &state);
        },
        Ok(Event::Incoming(Packet::SubAck(ack))) => {
          log::debug!("subscription acknowledged {:?}", ack.return_codes);
        },
        Ok(_) => {},
        Err(err) => {
          self.status.set_connected(false);
          log::error!("MQTT connection error: {}, retrying in {:?}", err, self.reconnect_delay);
          time::sleep(self.reconnect_delay).await;
        }
      }
    }
  }

  // the session is clean, so subscriptions are lost on every reconnect
  fn subscribe_to_topics(&self) {
    let subscribe_filters = self.topics.iter()
      .map(|topic| SubscribeFilter::new(topic.to_string(), self.qos))
      .collect::<Vec<_>>();
    match self.client.try_subscribe_many(subscribe_filters) {
      Ok(()) => log::info!("subscribing to topics {:?}", self.topics),
      Err(err) => log::error!("error subscribing to topics {:?}: {}", self.topics, err),
    }
  }
}

#[derive(Clone)]
pub struct MqttPublisher {
  client: AsyncClient,
  topic: String,
  qos: QoS,
  status: ConnectionStatus,
}

impl MqttPublisher {
  pub fn new(client: AsyncClient, topic: String, qos: QoS, status: ConnectionStatus) -> Self {
    MqttPublisher {
      client,
      topic,
      qos,
      status
    }
  }
}

#[async_trait]
impl CommandPublisher for MqttPublisher {
  async fn publish(&self, command: &ControlCommand) -> Result<(), PublishError> {
    // a queued request is not a delivered one while no session exists
    if !self.status.is_connected() {
      return Err(PublishError::NotConnected);
    }
    let payload = serde_json::to_vec(command)?;
    self.client.publish(self.topic.as_str(), self.qos, false, payload).await?;
    log::info!("message published to topic {}: {:?}", self.topic, command);
    Ok(())
  }
}
