//! Canvas and drawing-context helpers layered on top of the bridge.
//!
//! These take the wire value of a canvas-like or context-like host object and go through the same
//! decode/property/call primitives as the module does. They add no lifecycle rules: nothing here
//! allocates a slot that the caller has to release.

use crate::error::GlueError;
use crate::module::ModuleEnv;
use crate::value::{call_function, HostValue};
use crate::wire::WireValue;
use crate::Glue;

fn dimension(receiver: &HostValue, key: &'static str) -> Result<u32, GlueError> {
  let Some(value) = receiver.get_property(key) else {
    return Err(GlueError::NotAnObject { operation: key });
  };
  Ok(match value {
    HostValue::Number(n) if n.is_finite() && n > 0.0 => n.min(u32::MAX as f64) as u32,
    _ => 0,
  })
}

/// The `(width, height)` of a canvas.
pub fn canvas_size(glue: &Glue, canvas: WireValue) -> Result<(u32, u32), GlueError> {
  let canvas = glue.decode(canvas)?;
  Ok((dimension(&canvas, "width")?, dimension(&canvas, "height")?))
}

pub fn set_canvas_size(
  glue: &Glue,
  canvas: WireValue,
  width: u32,
  height: u32,
) -> Result<(), GlueError> {
  let canvas = glue.decode(canvas)?;
  if !canvas.set_property("width", HostValue::Number(width as f64))
    || !canvas.set_property("height", HostValue::Number(height as f64))
  {
    return Err(GlueError::NotAnObject {
      operation: "set_canvas_size",
    });
  }
  Ok(())
}

/// Clears a drawing context to a color: `clearColor(r, g, b, a)` then `clear(COLOR_BUFFER_BIT)`.
///
/// Host exceptions are returned as [`GlueError::Throw`].
pub fn clear(
  env: &mut dyn ModuleEnv,
  context: WireValue,
  rgba: [f32; 4],
) -> Result<(), GlueError> {
  let context = env.glue().decode(context)?;
  let Some(clear_color) = context.get_property("clearColor") else {
    return Err(GlueError::NotAnObject { operation: "clear" });
  };
  let clear = context.get_property("clear").unwrap_or(HostValue::Undefined);
  let mask = context
    .get_property("COLOR_BUFFER_BIT")
    .unwrap_or(HostValue::Undefined);

  let color = rgba.map(|c| HostValue::Number(c as f64));
  call_function(env, &clear_color, &context, &color)?;
  call_function(env, &clear, &context, &[mask])?;
  Ok(())
}
