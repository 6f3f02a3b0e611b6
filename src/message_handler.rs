use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::{error::MessageError, grid, model::{InboundMessage, Reading}, state::State};

pub struct MessageHandler {
  data_topic: String,
  ac_topic: String,
}

impl MessageHandler {
  pub fn new(data_topic: String, ac_topic: String) -> Self {
    MessageHandler {
      data_topic,
      ac_topic,
    }
  }

  pub fn handle_message(&self, message: &Bytes, topic: &str, state: &State) {
    let result = if topic == self.data_topic {
      self.handle_data(message, state)
    } else if topic == self.ac_topic {
      self.handle_ac(message, state)
    } else {
      log::debug!("ignoring message on unexpected topic {}", topic);
      Ok(())
    };
    if let Err(err) = result {
      log::warn!("dropping message on {}: {}", topic, err);
    }
  }

  fn handle_data(&self, message: &Bytes, state: &State) -> Result<(), MessageError> {
    let inbound: InboundMessage = serde_json::from_slice(message)?;
    // control values are mirrored even when the heatmap is missing or broken
    apply_control(&inbound, state);
    match &inbound.heatmap {
      Some(heatmap) => {
        let (readings, malformed) = parse_batch(heatmap)?;
        if malformed > 0 {
          log::warn!("dropped {} malformed readings", malformed);
        }
        let (grid, mut summary) = grid::ingest(&readings)?;
        summary.dropped += malformed;
        log::info!("updated temperature grid {:?} ({} accepted, {} dropped)",
          grid.rows(), summary.accepted, summary.dropped);
        state.replace_grid(grid, summary);
        Ok(())
      },
      None => {
        if inbound.ac_cmd.is_none() && inbound.desired_temp.is_none() {
          log::warn!("message without heatmap or control fields");
        }
        Ok(())
      }
    }
  }

  fn handle_ac(&self, message: &Bytes, state: &State) -> Result<(), MessageError> {
    let inbound: InboundMessage = serde_json::from_slice(message)?;
    apply_control(&inbound, state);
    Ok(())
  }
}

fn apply_control(inbound: &InboundMessage, state: &State) {
  if let Some(ac_cmd) = &inbound.ac_cmd {
    log::debug!("mirroring ac_cmd {}", ac_cmd);
    state.set_ac_status(ac_cmd.clone());
  }
  match &inbound.desired_temp {
    Some(Value::Number(number)) => {
      if let Some(desired_temp) = number.as_f64() {
        log::debug!("mirroring desired_temp {}", desired_temp);
        state.set_desired_temp(desired_temp);
      }
    },
    Some(other) => log::warn!("ignoring non-numeric desired_temp {}", other),
    None => {}
  }
}

/// Splits a `heatmap` value into well-formed readings and a count of the
/// elements that could not be read. Anything but a list rejects the batch.
pub fn parse_batch(heatmap: &Value) -> Result<(Vec<Reading>, usize), MessageError> {
  let items = heatmap.as_array().ok_or(MessageError::InvalidHeatmap)?;
  let mut readings = Vec::with_capacity(items.len());
  let mut malformed = 0;
  for item in items {
    match Reading::deserialize(item) {
      Ok(reading) => readings.push(reading),
      Err(err) => {
        log::debug!("malformed reading {}: {}", item, err);
        malformed += 1;
      }
    }
  }
  Ok((readings, malformed))
}
