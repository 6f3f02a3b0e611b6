use serde::{de, Serialize, Deserialize, Deserializer};
use serde_json::Value;

/// One sensor sample. `x` is the column (1..=3), `y` the row (1..=2).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Reading{
    #[serde(deserialize_with = "whole_number")]
    pub x: i64,
    #[serde(deserialize_with = "whole_number")]
    pub y: i64,
    pub t: f64
}

/// Accepts `1` as well as `1.0`, rejects `1.5`.
fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return Err(de::Error::custom(format!("expected a whole number, got {}", value)));
    }
    Ok(value as i64)
}

/// Payload published by the room controller on the data topic and by the AC
/// controller on its own topic. Every field is optional.
#[derive(Deserialize, Debug, Default)]
pub struct InboundMessage{
    #[serde(default)]
    pub heatmap: Option<Value>,
    #[serde(default)]
    pub ac_cmd: Option<Value>,
    #[serde(default)]
    pub desired_temp: Option<Value>
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AcPower{
    On,
    Off
}

impl AcPower {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcPower::On => "on",
            AcPower::Off => "off",
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ControlRequest{
    pub ac_status: AcPower
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SetpointRequest{
    pub desired_temp: f64
}

/// Message sent to the AC controller. Serializes as `{"ac_cmd": ..}` or
/// `{"desired_temp": ..}`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand{
    AcCmd(Value),
    DesiredTemp(f64)
}

#[derive(Serialize, Debug)]
pub struct Ack{
    pub message: &'static str,
    #[serde(rename = "receivedData")]
    pub received_data: Value
}

#[derive(Serialize, Debug)]
pub struct ErrorBody{
    pub error: String
}
