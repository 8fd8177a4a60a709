use anyhow::Context;
use glue_js::GlueOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runner settings, read from a JSON file and then overridden by command line flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
  /// Stop after this many frames. `None` runs until the module cancels its frame loop.
  pub frames: Option<u64>,
  /// Target frame rate. Zero or less runs frames back to back.
  pub fps: f64,
  pub glue: GlueOptions,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      frames: None,
      fps: 60.0,
      glue: GlueOptions::default(),
    }
  }
}

impl RunConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = fs::read_to_string(path)
      .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
  }

  /// Time to wait before each frame. Rates too small for a representable interval disable pacing.
  pub fn frame_interval(&self) -> Option<Duration> {
    if !(self.fps.is_finite() && self.fps > 0.0) {
      return None;
    }
    Duration::try_from_secs_f64(1.0 / self.fps).ok()
  }
}
