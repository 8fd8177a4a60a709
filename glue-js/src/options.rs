use serde::{Deserialize, Serialize};

/// Construction-time bridge options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlueOptions {
  /// Free slots created up front in the value table.
  pub initial_capacity: u32,
  /// Upper bound on the value table's capacity. `None` allows the whole 32-bit id space.
  pub max_slots: Option<u32>,
}

impl Default for GlueOptions {
  fn default() -> Self {
    Self {
      initial_capacity: 16,
      max_slots: None,
    }
  }
}
