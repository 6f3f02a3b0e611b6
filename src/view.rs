//! Render model for the dashboard. The tiles and the blurred heatmap both
//! take their colors from [`color_of`], so equal temperatures always get
//! equal colors.

use serde::Serialize;

use crate::{
  color::{color_of, Rgb, SCALE_MAX, SCALE_MIN, STOPS},
  grid::{BatchSummary, Grid, COLS, ROWS},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CellView {
  pub id: usize,
  pub row: usize,
  pub col: usize,
  pub value: Option<f64>,
  pub color: Option<Rgb>,
  /// No sensor here, the value is the batch mean.
  pub synthesized: bool,
}

/// One radial blob of the heatmap, centered in percent of the room size.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HeatmapLayer {
  pub cx: f64,
  pub cy: f64,
  pub color: Rgb,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LegendStop {
  pub temperature: f64,
  pub color: Rgb,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Legend {
  pub min: f64,
  pub max: f64,
  pub stops: Vec<LegendStop>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct View {
  pub cells: Vec<CellView>,
  pub heatmap: Vec<HeatmapLayer>,
  pub average: Option<f64>,
  /// Readings accepted and dropped in the batch behind `cells`.
  pub batch: Option<BatchSummary>,
  pub legend: Legend,
}

pub fn cell_color(value: Option<f64>) -> Option<Rgb> {
  value.map(color_of)
}

pub fn cells(grid: &Grid) -> Vec<CellView> {
  let mut cells = Vec::with_capacity(ROWS * COLS);
  for row in 0..ROWS {
    for col in 0..COLS {
      let value = grid.get(row, col);
      cells.push(CellView {
        id: row * COLS + col + 1,
        row,
        col,
        value,
        color: cell_color(value),
        synthesized: Grid::is_synthesized(row, col),
      });
    }
  }
  cells
}

/// Empty cells get no layer rather than a made-up color.
pub fn heatmap(grid: &Grid) -> Vec<HeatmapLayer> {
  let mut layers = Vec::new();
  for row in 0..ROWS {
    for col in 0..COLS {
      if let Some(value) = grid.get(row, col) {
        layers.push(HeatmapLayer {
          cx: (2 * col + 1) as f64 * 100.0 / (2 * COLS) as f64,
          cy: (2 * row + 1) as f64 * 100.0 / (2 * ROWS) as f64,
          color: color_of(value),
        });
      }
    }
  }
  layers
}

pub fn legend() -> Legend {
  Legend {
    min: SCALE_MIN,
    max: SCALE_MAX,
    stops: STOPS.iter()
      .map(|(temperature, color)| LegendStop { temperature: *temperature, color: *color })
      .collect(),
  }
}

pub fn render(grid: &Grid, batch: Option<BatchSummary>) -> View {
  View {
    cells: cells(grid),
    heatmap: heatmap(grid),
    average: grid.mean(),
    batch,
    legend: legend(),
  }
}
