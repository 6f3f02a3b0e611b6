use serde::Serialize;

use crate::{error::IngestError, model::Reading};

pub const ROWS: usize = 2;
pub const COLS: usize = 3;

/// Cell that has no physical sensor. It always holds the mean of the batch,
/// which assumes the temperature is roughly uniform around it.
pub const SYNTHESIZED_CELL: (usize, usize) = (1, 2);

/// Room temperatures, row-major. Serializes as a 2x3 nested array with
/// `null` for cells never written.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(transparent)]
pub struct Grid {
  cells: [[Option<f64>; COLS]; ROWS],
}

impl Grid {
  pub fn empty() -> Self {
    Grid::default()
  }

  pub fn get(&self, row: usize, col: usize) -> Option<f64> {
    self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
  }

  pub fn rows(&self) -> &[[Option<f64>; COLS]; ROWS] {
    &self.cells
  }

  pub fn is_synthesized(row: usize, col: usize) -> bool {
    (row, col) == SYNTHESIZED_CELL
  }

  /// Mean over every populated cell, synthesized one included.
  pub fn mean(&self) -> Option<f64> {
    let values: Vec<f64> = self.cells.iter().flatten().filter_map(|cell| *cell).collect();
    if values.is_empty() {
      None
    } else {
      Some(mean(&values))
    }
  }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
  pub accepted: usize,
  pub dropped: usize,
}

/// Maps 1-based sensor coordinates to 0-based `(row, col)` storage.
pub fn cell_position(x: i64, y: i64) -> Option<(usize, usize)> {
  if (1..=COLS as i64).contains(&x) && (1..=ROWS as i64).contains(&y) {
    Some(((y - 1) as usize, (x - 1) as usize))
  } else {
    None
  }
}

/// Builds a fresh grid from one batch. Readings outside the grid or with a
/// non-finite temperature are dropped and do not count towards the
/// synthesized average.
pub fn ingest(batch: &[Reading]) -> Result<(Grid, BatchSummary), IngestError> {
  let mut grid = Grid::empty();
  let mut accepted = Vec::with_capacity(batch.len());
  for reading in batch {
    match cell_position(reading.x, reading.y) {
      Some((row, col)) if reading.t.is_finite() => {
        grid.cells[row][col] = Some(reading.t);
        accepted.push(reading.t);
      },
      _ => {
        log::debug!("dropping reading {:?}", reading);
      }
    }
  }
  let dropped = batch.len() - accepted.len();
  if accepted.is_empty() {
    return Err(IngestError::NoValidReadings { dropped });
  }
  let (row, col) = SYNTHESIZED_CELL;
  grid.cells[row][col] = Some(mean(&accepted));
  Ok((grid, BatchSummary { accepted: accepted.len(), dropped }))
}

// Plain sum first so ordinary batches get the exact mean; only a sum that
// overflows falls back to summing pre-divided values.
fn mean(values: &[f64]) -> f64 {
  let count = values.len() as f64;
  let sum: f64 = values.iter().sum();
  if sum.is_finite() {
    sum / count
  } else {
    values.iter().map(|value| value / count).sum()
  }
}
