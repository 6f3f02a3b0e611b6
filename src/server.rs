use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{task, time};
use warp::{http::StatusCode, Filter, Reply, Rejection};

use crate::{
  error::PublishError,
  model::{Ack, ControlCommand, ControlRequest, ErrorBody, SetpointRequest},
  mqtt_client::CommandPublisher,
  state::State,
  view,
};

const INDEX_HTML: &str = include_str!("../static/index.html");
const MAX_BODY_BYTES: u64 = 4 * 1024;

/// Outbound side of the HTTP handlers: every publish is bounded by `timeout`.
#[derive(Clone)]
pub struct Commands {
  publisher: Arc<dyn CommandPublisher>,
  timeout: Duration,
}

impl Commands {
  pub fn new(publisher: Arc<dyn CommandPublisher>, timeout: Duration) -> Self {
    Commands { publisher, timeout }
  }

  async fn send(&self, command: &ControlCommand) -> Result<(), PublishError> {
    time::timeout(self.timeout, self.publisher.publish(command))
      .await
      .map_err(|_| PublishError::Timeout)?
  }
}

pub fn routes(state: State, commands: Commands) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
  let state_filter = warp::any().map(move || state.clone());
  let commands_filter = warp::any().map(move || commands.clone());

  let index_route = warp::path::end()
      .and(warp::get())
      .map(|| warp::reply::html(INDEX_HTML));
  let grid_route = warp::path!("grid")
      .and(warp::get())
      .and(state_filter.clone())
      .and_then(get_grid);
  let view_route = warp::path!("view")
      .and(warp::get())
      .and(state_filter.clone())
      .and_then(get_view);
  let get_control_route = warp::path!("control")
      .and(warp::get())
      .and(state_filter.clone())
      .and_then(get_control);
  let post_control_route = warp::path!("control")
      .and(warp::post())
      .and(warp::body::content_length_limit(MAX_BODY_BYTES))
      .and(warp::body::json())
      .and(state_filter.clone())
      .and(commands_filter.clone())
      .and_then(post_control);
  let get_setpoint_route = warp::path!("setpoint")
      .and(warp::get())
      .and(state_filter.clone())
      .and_then(get_setpoint);
  let post_setpoint_route = warp::path!("setpoint")
      .and(warp::post())
      .and(warp::body::content_length_limit(MAX_BODY_BYTES))
      .and(warp::body::json())
      .and(state_filter)
      .and(commands_filter)
      .and_then(post_setpoint);

  let cors = warp::cors()
      .allow_any_origin()
      .allow_methods(vec!["GET", "POST"])
      .allow_header("content-type");

  index_route
      .or(grid_route)
      .or(view_route)
      .or(get_control_route)
      .or(post_control_route)
      .or(get_setpoint_route)
      .or(post_setpoint_route)
      .with(cors)
      .recover(handle_rejection)
      .with(warp::log("climate_heatmap_relay::http"))
}

/// Binds the HTTP server and runs it in the background.
pub fn set_up_web_server(state: State, commands: Commands, address: SocketAddr) -> Result<SocketAddr, warp::Error> {
  let (bound, server) = warp::serve(routes(state, commands)).try_bind_ephemeral(address)?;
  log::info!("Server running on http://{}", bound);
  task::spawn(server);
  Ok(bound)
}

async fn get_grid(state: State) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&state.grid()))
}

async fn get_view(state: State) -> Result<impl Reply, Rejection> {
  let (grid, batch) = state.snapshot();
  Ok(warp::reply::json(&view::render(&grid, batch)))
}

async fn get_control(state: State) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&state.ac_status()))
}

async fn get_setpoint(state: State) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&state.desired_temp()))
}

async fn post_control(request: ControlRequest, state: State, commands: Commands) -> Result<impl Reply, Rejection> {
  let ac_status = Value::from(request.ac_status.as_str());
  log::info!("received ac_status {}", ac_status);
  let result = commands.send(&ControlCommand::AcCmd(ac_status.clone())).await;
  if result.is_ok() {
    state.set_ac_status(ac_status.clone());
  }
  Ok(acknowledge(result, ac_status))
}

async fn post_setpoint(request: SetpointRequest, state: State, commands: Commands) -> Result<impl Reply, Rejection> {
  let desired_temp = request.desired_temp;
  log::info!("received desired_temp {}", desired_temp);
  let result = commands.send(&ControlCommand::DesiredTemp(desired_temp)).await;
  if result.is_ok() {
    state.set_desired_temp(desired_temp);
  }
  Ok(acknowledge(result, Value::from(desired_temp)))
}

// The reply reflects the publish outcome, never a blanket success.
fn acknowledge(result: Result<(), PublishError>, received: Value) -> warp::reply::WithStatus<warp::reply::Json> {
  match result {
    Ok(()) => warp::reply::with_status(
      warp::reply::json(&Ack {
        message: "Data received and published to MQTT successfully!",
        received_data: received,
      }),
      StatusCode::OK,
    ),
    Err(err) => {
      log::error!("failed to publish message: {}", err);
      error_reply(err.to_string(), err.status_code())
    }
  }
}

fn error_reply(error: String, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
  warp::reply::with_status(warp::reply::json(&ErrorBody { error }), status)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
  let (error, status) = if err.is_not_found() {
    ("Not found".to_string(), StatusCode::NOT_FOUND)
  } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
    (e.to_string(), StatusCode::BAD_REQUEST)
  } else if err.find::<warp::reject::LengthRequired>().is_some() {
    ("Content-Length required".to_string(), StatusCode::LENGTH_REQUIRED)
  } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
    ("Payload too large".to_string(), StatusCode::PAYLOAD_TOO_LARGE)
  } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
    ("Expected a JSON body".to_string(), StatusCode::UNSUPPORTED_MEDIA_TYPE)
  } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
    ("Method not allowed".to_string(), StatusCode::METHOD_NOT_ALLOWED)
  } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
    (e.to_string(), StatusCode::FORBIDDEN)
  } else {
    log::error!("unhandled rejection: {:?}", err);
    ("Internal server error".to_string(), StatusCode::INTERNAL_SERVER_ERROR)
  };
  Ok(error_reply(error, status))
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;
  use rumqttc::{AsyncClient, MqttOptions, QoS};
  use serde_json::json;

  use super::*;
  use crate::{grid::ingest, model::Reading, mqtt_client::{ConnectionStatus, MqttPublisher}};

  #[derive(Default)]
  struct RecordingPublisher {
    sent: Mutex<Vec<ControlCommand>>,
  }

  #[async_trait]
  impl CommandPublisher for RecordingPublisher {
    async fn publish(&self, command: &ControlCommand) -> Result<(), PublishError> {
      self.sent.lock().unwrap().push(command.clone());
      Ok(())
    }
  }

  struct HangingPublisher;

  #[async_trait]
  impl CommandPublisher for HangingPublisher {
    async fn publish(&self, _command: &ControlCommand) -> Result<(), PublishError> {
      std::future::pending().await
    }
  }

  // session was acknowledged, then the event loop went away
  fn broken_publisher() -> Arc<dyn CommandPublisher> {
    let (client, event_loop) = AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 10);
    drop(event_loop);
    let status = ConnectionStatus::new();
    status.set_connected(true);
    Arc::new(MqttPublisher::new(client, "gw/set".to_string(), QoS::AtLeastOnce, status))
  }

  fn commands(publisher: Arc<dyn CommandPublisher>) -> Commands {
    Commands::new(publisher, Duration::from_millis(100))
  }

  fn body_json(response: &warp::http::Response<bytes::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
  }

  #[tokio::test]
  async fn grid_starts_with_nulls() {
    let api = routes(State::new(), commands(Arc::new(RecordingPublisher::default())));
    let response = warp::test::request().path("/grid").reply(&api).await;
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(json!([[null, null, null], [null, null, null]]), body_json(&response));
  }

  #[tokio::test]
  async fn grid_reflects_last_batch() {
    let state = State::new();
    let batch = vec![
      Reading { x: 1, y: 1, t: 20.0 },
      Reading { x: 2, y: 1, t: 22.0 },
      Reading { x: 3, y: 1, t: 24.0 },
      Reading { x: 1, y: 2, t: 18.0 },
      Reading { x: 2, y: 2, t: 19.0 },
    ];
    let (grid, summary) = ingest(&batch).unwrap();
    state.replace_grid(grid, summary);
    let api = routes(state, commands(Arc::new(RecordingPublisher::default())));

    let response = warp::test::request().path("/grid").reply(&api).await;
    assert_eq!(json!([[20.0, 22.0, 24.0], [18.0, 19.0, 20.6]]), body_json(&response));

    let response = warp::test::request().path("/view").reply(&api).await;
    let view = body_json(&response);
    assert_eq!(json!("#ffff99"), view["cells"][0]["color"]);
    assert_eq!(json!(true), view["cells"][5]["synthesized"]);
    assert_eq!(6, view["heatmap"].as_array().unwrap().len());
    assert_eq!(json!({"accepted": 5, "dropped": 0}), view["batch"]);
  }

  #[tokio::test]
  async fn control_round_trip() {
    let publisher = Arc::new(RecordingPublisher::default());
    let api = routes(State::new(), commands(publisher.clone()));

    let response = warp::test::request().path("/control").reply(&api).await;
    assert_eq!(json!(null), body_json(&response));

    let response = warp::test::request()
      .method("POST")
      .path("/control")
      .json(&json!({"ac_status": "on"}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(json!("on"), body_json(&response)["receivedData"]);
    assert_eq!(vec![ControlCommand::AcCmd(json!("on"))], *publisher.sent.lock().unwrap());

    let response = warp::test::request().path("/control").reply(&api).await;
    assert_eq!(json!("on"), body_json(&response));
  }

  #[tokio::test]
  async fn setpoint_is_published() {
    let publisher = Arc::new(RecordingPublisher::default());
    let api = routes(State::new(), commands(publisher.clone()));
    let response = warp::test::request()
      .method("POST")
      .path("/setpoint")
      .json(&json!({"desired_temp": 23}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(vec![ControlCommand::DesiredTemp(23.0)], *publisher.sent.lock().unwrap());
    let response = warp::test::request().path("/setpoint").reply(&api).await;
    assert_eq!(json!(23.0), body_json(&response));
  }

  #[tokio::test]
  async fn failed_publish_is_reported() {
    let state = State::new();
    let api = routes(state.clone(), commands(broken_publisher()));
    let response = warp::test::request()
      .method("POST")
      .path("/control")
      .json(&json!({"ac_status": "off"}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    assert!(body_json(&response)["error"].is_string());
    assert_eq!(None, state.ac_status());
  }

  #[tokio::test]
  async fn no_broker_session_is_unavailable() {
    let state = State::new();
    // never polled, so the broker was never reached
    let (client, _event_loop) = AsyncClient::new(MqttOptions::new("test", "127.0.0.1", 1), 10);
    let publisher = MqttPublisher::new(client, "gw/set".to_string(), QoS::AtLeastOnce, ConnectionStatus::new());
    let api = routes(state.clone(), commands(Arc::new(publisher)));
    let response = warp::test::request()
      .method("POST")
      .path("/control")
      .json(&json!({"ac_status": "on"}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, response.status());
    assert_eq!(json!("Not connected to MQTT broker"), body_json(&response)["error"]);
    assert_eq!(None, state.ac_status());

    let response = warp::test::request().path("/control").reply(&api).await;
    assert_eq!(json!(null), body_json(&response));
  }

  #[tokio::test]
  async fn hanging_publish_times_out() {
    let state = State::new();
    let api = routes(state.clone(), commands(Arc::new(HangingPublisher)));
    let response = warp::test::request()
      .method("POST")
      .path("/setpoint")
      .json(&json!({"desired_temp": 19.5}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::GATEWAY_TIMEOUT, response.status());
    assert_eq!(None, state.desired_temp());
  }

  #[tokio::test]
  async fn bad_requests_are_rejected() {
    let publisher = Arc::new(RecordingPublisher::default());
    let api = routes(State::new(), commands(publisher.clone()));
    let response = warp::test::request()
      .method("POST")
      .path("/control")
      .json(&json!({"ac_status": "maybe"}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
    let response = warp::test::request()
      .method("POST")
      .path("/setpoint")
      .json(&json!({"desired_temp": "warm"}))
      .reply(&api)
      .await;
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
    assert!(publisher.sent.lock().unwrap().is_empty());

    let response = warp::test::request().path("/nowhere").reply(&api).await;
    assert_eq!(StatusCode::NOT_FOUND, response.status());
  }

  #[tokio::test]
  async fn body_without_length_is_refused() {
    let publisher = Arc::new(RecordingPublisher::default());
    let api = routes(State::new(), commands(publisher.clone()));
    let response = warp::test::request()
      .method("POST")
      .path("/setpoint")
      .header("content-type", "application/json")
      .header("transfer-encoding", "chunked")
      .reply(&api)
      .await;
    assert_eq!(StatusCode::LENGTH_REQUIRED, response.status());
    assert!(publisher.sent.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn index_serves_dashboard() {
    let api = routes(State::new(), commands(Arc::new(RecordingPublisher::default())));
    let response = warp::test::request().path("/").reply(&api).await;
    assert_eq!(StatusCode::OK, response.status());
    assert!(std::str::from_utf8(response.body()).unwrap().contains("/view"));
  }
}
