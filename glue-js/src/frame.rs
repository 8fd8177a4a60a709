use crate::error::GlueError;
use crate::module::ModuleEnv;

/// The host's native frame clock.
pub trait FrameScheduler {
  /// Asks for exactly one future frame.
  fn request_frame(&mut self);
}

/// A scheduler that only records requests; the embedder decides when frames happen.
#[derive(Debug, Default)]
pub struct ManualScheduler {
  pending: u32,
  requested: u64,
}

impl ManualScheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Consumes one pending frame request, if any.
  pub fn take_frame(&mut self) -> bool {
    if self.pending == 0 {
      return false;
    }
    self.pending -= 1;
    true
  }

  pub fn pending(&self) -> u32 {
    self.pending
  }

  /// Total requests ever made.
  pub fn requested(&self) -> u64 {
    self.requested
  }
}

impl FrameScheduler for ManualScheduler {
  fn request_frame(&mut self) {
    self.pending += 1;
    self.requested += 1;
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameLoopState {
  Idle,
  Running,
  Stopped,
}

/// Drives the module's per-frame tick function.
///
/// The tick function lives at `tick_index` in the module's function table and returns whether it
/// wants another frame. Returning `false` stops the loop permanently: nothing outside the loop can
/// cancel or restart it.
#[derive(Debug)]
pub struct FrameLoop {
  tick_index: u32,
  state: FrameLoopState,
  ticks: u64,
}

impl FrameLoop {
  pub fn new(tick_index: u32) -> Self {
    Self {
      tick_index,
      state: FrameLoopState::Idle,
      ticks: 0,
    }
  }

  pub fn state(&self) -> FrameLoopState {
    self.state
  }

  pub fn ticks(&self) -> u64 {
    self.ticks
  }

  pub fn is_stopped(&self) -> bool {
    self.state == FrameLoopState::Stopped
  }

  /// Registers the tick function by requesting the first frame. Only the first call has an effect.
  pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
    if self.state == FrameLoopState::Idle {
      self.state = FrameLoopState::Running;
      scheduler.request_frame();
    }
  }

  /// Runs one frame. Returns whether the loop is still running afterwards.
  pub fn tick(
    &mut self,
    env: &mut dyn ModuleEnv,
    scheduler: &mut dyn FrameScheduler,
  ) -> Result<bool, GlueError> {
    if self.state != FrameLoopState::Running {
      return Ok(false);
    }
    self.ticks += 1;
    let again = match env.invoke_tick(self.tick_index) {
      Ok(again) => again,
      Err(err) => {
        self.state = FrameLoopState::Stopped;
        return Err(err);
      }
    };
    if again {
      scheduler.request_frame();
    } else {
      tracing::debug!(ticks = self.ticks, "frame loop cancelled by module");
      self.state = FrameLoopState::Stopped;
    }
    Ok(again)
  }

  /// Ticks once per pending frame until the loop stops, the scheduler has nothing pending, or
  /// `max_frames` frames have run. Returns the number of frames run.
  pub fn run(
    &mut self,
    env: &mut dyn ModuleEnv,
    scheduler: &mut ManualScheduler,
    max_frames: Option<u64>,
    mut between_frames: impl FnMut(),
  ) -> Result<u64, GlueError> {
    self.start(scheduler);
    let mut frames = 0;
    while max_frames.map_or(true, |max| frames < max) && scheduler.take_frame() {
      between_frames();
      self.tick(env, scheduler)?;
      frames += 1;
    }
    Ok(frames)
  }
}
