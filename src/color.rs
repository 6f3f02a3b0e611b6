use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}

impl Rgb {
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    Rgb { r, g, b }
  }
}

impl fmt::Display for Rgb {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
  }
}

impl Serialize for Rgb {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

pub const BLUE: Rgb = Rgb::new(0x00, 0x66, 0xcc);
pub const LIGHT_BLUE: Rgb = Rgb::new(0x4d, 0x94, 0xff);
pub const YELLOW: Rgb = Rgb::new(0xff, 0xff, 0x99);
pub const ORANGE: Rgb = Rgb::new(0xff, 0x94, 0x4d);
pub const RED: Rgb = Rgb::new(0xcc, 0x33, 0x00);

/// Gradient stops in °C. The scale is labelled 10..35 but only has five
/// colors, so 30..35 stays red.
pub const STOPS: [(f64, Rgb); 5] = [
  (10.0, BLUE),
  (15.0, LIGHT_BLUE),
  (20.0, YELLOW),
  (25.0, ORANGE),
  (30.0, RED),
];

pub const SCALE_MIN: f64 = 10.0;
pub const SCALE_MAX: f64 = 35.0;

pub fn color_of(temperature: f64) -> Rgb {
  let (first_temp, first_color) = STOPS[0];
  let (last_temp, last_color) = STOPS[STOPS.len() - 1];
  if temperature.is_nan() || temperature <= first_temp {
    return first_color;
  }
  if temperature >= last_temp {
    return last_color;
  }
  for pair in STOPS.windows(2) {
    let (low_temp, low_color) = pair[0];
    let (high_temp, high_color) = pair[1];
    if temperature <= high_temp {
      let fraction = (temperature - low_temp) / (high_temp - low_temp);
      return Rgb::new(
        lerp(low_color.r, high_color.r, fraction),
        lerp(low_color.g, high_color.g, fraction),
        lerp(low_color.b, high_color.b, fraction),
      );
    }
  }
  last_color
}

fn lerp(from: u8, to: u8, fraction: f64) -> u8 {
  let value = from as f64 + (to as f64 - from as f64) * fraction;
  value.round().clamp(0.0, 255.0) as u8
}
