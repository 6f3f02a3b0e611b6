use serde::{Serialize, Deserialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rumqttc::{MqttOptions, QoS};

use crate::error::ConfigError;


#[derive(Serialize, Deserialize, Debug)]
struct ReadingConfig{
    mqtt: MqttConfig,
    #[serde(default)]
    http: HttpConfig,
}

#[derive(Debug)]
pub struct RunningConfig{
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
    pub client_id: String,
    pub qos: QoS,
    pub bind_address: SocketAddr,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MqttConfig{
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub channel_capacity: usize,
    pub data_topic: String,
    pub ac_topic: String,
    pub command_topic: String,
    qos_value: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "climate-relay".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 5000,
            channel_capacity: 10,
            data_topic: "gw/sc-main/data".to_string(),
            ac_topic: "gw/sc-ac-controller/data".to_string(),
            command_topic: "gw/sc-main/set".to_string(),
            qos_value: 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HttpConfig{
    pub address: String,
    pub port: u16,
    pub publish_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            address: "127.0.0.1".to_string(),
            port: 3001,
            publish_timeout_ms: 3000,
        }
    }
}

impl HttpConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}


impl RunningConfig{
    pub fn new(file_name: &str) -> Result<RunningConfig, ConfigError>{
      let input_file = std::fs::File::open(file_name)?;
      let init_config: ReadingConfig = serde_yaml::from_reader(input_file)?;
      RunningConfig::from_reading(init_config)
    }

    pub fn from_yaml(yaml: &str) -> Result<RunningConfig, ConfigError>{
      let init_config: ReadingConfig = serde_yaml::from_str(yaml)?;
      RunningConfig::from_reading(init_config)
    }

    fn from_reading(init_config: ReadingConfig) -> Result<RunningConfig, ConfigError>{
      let qos = match init_config.mqtt.qos_value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        other => return Err(ConfigError::InvalidQos(other)),
      };
      for (name, topic) in [
        ("data_topic", &init_config.mqtt.data_topic),
        ("ac_topic", &init_config.mqtt.ac_topic),
        ("command_topic", &init_config.mqtt.command_topic),
      ] {
        if topic.is_empty() {
          return Err(ConfigError::EmptyTopic(name));
        }
      }
      let ip: IpAddr = init_config.http.address.parse()
        .map_err(|_| ConfigError::InvalidAddress(init_config.http.address.clone()))?;
      // random suffix so a second instance does not take over the session
      let client_id = format!("{}-{:08x}", init_config.mqtt.client_id, rand::random::<u32>());
      let config = RunningConfig{
        bind_address: SocketAddr::new(ip, init_config.http.port),
        mqtt: init_config.mqtt,
        http: init_config.http,
        client_id,
        qos,
      };

      Ok(config)
    }

    pub fn topics(&self) -> Vec<String> {
      vec![self.mqtt.data_topic.clone(), self.mqtt.ac_topic.clone()]
    }

    pub fn mqtt_options(&self) -> MqttOptions {
      let mut options = MqttOptions::new(&self.client_id, &self.mqtt.host, self.mqtt.port);
      options.set_keep_alive(Duration::from_secs(self.mqtt.keep_alive_secs));
      options.set_clean_session(true);
      if let (Some(username), Some(password)) = (&self.mqtt.username, &self.mqtt.password) {
        options.set_credentials(username, password);
      }
      options
    }
}
