use std::{env, error::Error, sync::Arc, time::Duration};

use env_logger::Env;
use climate_heatmap_relay::{
    message_handler::MessageHandler,
    mqtt_client::MqttClient,
    server::{self, Commands},
    RunningConfig, State,
};
#[macro_use]
extern crate log;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize the logger from the environment
    let env = Env::default()
    .filter_or("RELAY_LOG_LEVEL", "info")
    .write_style_or("RELAY_LOG_STYLE", "always");

    env_logger::init_from_env(env);

    let config_file = env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = RunningConfig::new(&config_file).map_err(|err| {
        error!("cannot load {}: {}", config_file, err);
        err
    })?;
    debug!("{:?}", config);

    let state = State::new();
    let handler = Arc::new(MessageHandler::new(
        config.mqtt.data_topic.clone(),
        config.mqtt.ac_topic.clone(),
    ));
    let mut mqtt_client = MqttClient::new(
        config.mqtt_options(),
        config.mqtt.channel_capacity,
        config.topics(),
        config.qos,
        handler,
    )
    .with_reconnect_delay(Duration::from_millis(config.mqtt.reconnect_delay_ms));

    let publisher = Arc::new(mqtt_client.publisher(config.mqtt.command_topic.clone()));
    let commands = Commands::new(publisher, config.http.publish_timeout());
    server::set_up_web_server(state.clone(), commands, config.bind_address)?;

    info!("Connecting to the MQTT server {}:{} as {}", config.mqtt.host, config.mqtt.port, config.client_id);
    mqtt_client.run(state).await;
    Ok(())
}
