use warp::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Cannot read config file: {0}")]
  Io(#[from] std::io::Error),

  #[error("Cannot parse config file: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("Invalid qos value {0}, expected 0, 1 or 2")]
  InvalidQos(u8),

  #[error("Topic `{0}` must not be empty")]
  EmptyTopic(&'static str),

  #[error("Invalid http address `{0}`")]
  InvalidAddress(String),
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum IngestError {
  #[error("Batch has no reading inside the grid ({dropped} dropped)")]
  NoValidReadings { dropped: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
  #[error("Payload is not a JSON object: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error("Field `heatmap` is not a list of readings")]
  InvalidHeatmap,

  #[error(transparent)]
  Ingest(#[from] IngestError),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
  #[error("Failed to send message to MQTT broker: {0}")]
  Client(#[from] rumqttc::ClientError),

  #[error("Cannot encode command: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("Not connected to MQTT broker")]
  NotConnected,

  #[error("Timed out sending message to MQTT broker")]
  Timeout,
}

impl PublishError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      PublishError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
      PublishError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
      PublishError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
      PublishError::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
  }
}
