use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::grid::{BatchSummary, Grid};

#[derive(Debug, Default)]
struct ControlState {
  ac_status: Option<Value>,
  desired_temp: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
  grid: Grid,
  last_batch: Option<BatchSummary>,
  control: ControlState,
}

/// Owner of the room grid and the AC control values. Every access goes
/// through one lock, so a reader sees either the old grid or the new one.
#[derive(Debug, Clone, Default)]
pub struct State {
  inner: Arc<Mutex<Inner>>,
}

impl State {
  pub fn new() -> Self {
    State::default()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn replace_grid(&self, grid: Grid, summary: BatchSummary) {
    let mut state_lock = self.lock();
    state_lock.grid = grid;
    state_lock.last_batch = Some(summary);
    log::debug!("{:?}", state_lock.grid);
  }

  pub fn grid(&self) -> Grid {
    self.lock().grid
  }

  /// Grid together with the summary of the batch that produced it.
  pub fn snapshot(&self) -> (Grid, Option<BatchSummary>) {
    let state_lock = self.lock();
    (state_lock.grid, state_lock.last_batch)
  }

  pub fn set_ac_status(&self, ac_status: Value) {
    self.lock().control.ac_status = Some(ac_status);
  }

  pub fn ac_status(&self) -> Option<Value> {
    self.lock().control.ac_status.clone()
  }

  pub fn set_desired_temp(&self, desired_temp: f64) {
    self.lock().control.desired_temp = Some(desired_temp);
  }

  pub fn desired_temp(&self) -> Option<f64> {
    self.lock().control.desired_temp
  }
}
