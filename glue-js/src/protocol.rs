//! The operations a module imports from the bridge.
//!
//! Strings cross as `(ptr, len)` pairs into module memory and argument lists as `len` contiguous
//! little-endian 8-byte wire values at `ptr`. Values handed to an operation are borrowed: the
//! module keeps its counts. Values returned from an operation are owned: the module must release
//! each of them exactly once.

use crate::error::GlueError;
use crate::module::ModuleEnv;
use crate::value::{call_function, construct_function, FunctionRef, HostValue};
use crate::wire::WireValue;

/// The pointer returned by `string_get` for empty strings: non-null, aligned, never dereferenced.
pub const EMPTY_STRING_PTR: u32 = 1;

fn read_string(env: &mut dyn ModuleEnv, ptr: u32, len: u32) -> Result<String, GlueError> {
  let mut memory = env.memory()?;
  let s = String::from_utf8_lossy(memory.read_bytes(ptr, len)?).into_owned();
  Ok(s)
}

fn read_args(
  env: &mut dyn ModuleEnv,
  args_ptr: u32,
  args_len: u32,
) -> Result<Vec<HostValue>, GlueError> {
  let wires: Vec<WireValue> = {
    let mut memory = env.memory()?;
    let Some(byte_len) = args_len.checked_mul(8) else {
      return Err(GlueError::OutOfBounds {
        ptr: args_ptr,
        len: u32::MAX,
        memory_len: memory.len(),
      });
    };
    // Bounds are checked before anything is sized by `args_len`.
    let bytes = memory.read_bytes(args_ptr, byte_len)?;
    let mut wires = Vec::with_capacity(args_len as usize);
    for chunk in bytes.chunks_exact(8) {
      let mut word = [0u8; 8];
      word.copy_from_slice(chunk);
      wires.push(WireValue(u64::from_le_bytes(word)));
    }
    wires
  };
  env.glue().decode_all(&wires)
}

/// Reads `len` bytes at `ptr` and returns them as a fatal [`GlueError::ModuleThrow`].
///
/// The module has no way to continue after calling this.
pub fn throw_str(env: &mut dyn ModuleEnv, ptr: u32, len: u32) -> GlueError {
  if let Err(err) = env.glue().ensure_attached() {
    return err;
  }
  match read_string(env, ptr, len) {
    Ok(message) => {
      tracing::error!(%message, "module raised an error");
      GlueError::ModuleThrow(message)
    }
    Err(err) => err,
  }
}

/// Copies `len` bytes of UTF-8 text at `ptr` into a host string.
pub fn string_new(env: &mut dyn ModuleEnv, ptr: u32, len: u32) -> Result<WireValue, GlueError> {
  env.glue().ensure_attached()?;
  let s = read_string(env, ptr, len)?;
  env.glue().encode(HostValue::string(&s))
}

/// Copies a host string into memory obtained from the module's `alloc` export.
pub fn string_get(env: &mut dyn ModuleEnv, r#ref: WireValue) -> Result<(u32, u32), GlueError> {
  env.glue().ensure_attached()?;
  let value = env.glue().decode(r#ref)?;
  let Some(s) = value.as_str() else {
    return Err(GlueError::NotAString);
  };
  let len = u32::try_from(s.len()).map_err(|_| GlueError::OutOfBounds {
    ptr: 0,
    len: u32::MAX,
    memory_len: 0,
  })?;
  if len == 0 {
    return Ok((EMPTY_STRING_PTR, 0));
  }
  let ptr = env.alloc(len, 1)?;
  // `alloc` may have grown memory; `memory()` hands out the current buffer.
  env.memory()?.write_bytes(ptr, s.as_bytes())?;
  Ok((ptr, len))
}

/// Wraps entry `fn_index` of the module's function table as a host function.
///
/// Invoking the result calls `fn_index(ctx_ptr)`. Arguments passed by the host caller are not
/// forwarded to the module.
pub fn closure_new(
  env: &mut dyn ModuleEnv,
  fn_index: u32,
  ctx_ptr: u32,
) -> Result<WireValue, GlueError> {
  env.glue().ensure_attached()?;
  env
    .glue()
    .encode(HostValue::Function(FunctionRef::closure(fn_index, ctx_ptr)))
}

pub fn increment_ref_count(env: &mut dyn ModuleEnv, r#ref: WireValue) -> Result<(), GlueError> {
  env.glue().ensure_attached()?;
  env.glue().increment(r#ref)
}

pub fn decrement_ref_count(env: &mut dyn ModuleEnv, r#ref: WireValue) -> Result<(), GlueError> {
  env.glue().ensure_attached()?;
  env.glue().decrement(r#ref)
}

/// Reads property `prop` of `ref`.
///
/// A function-valued result is bound to `ref` first, so it can later be invoked through [`call`]
/// without a receiver. Missing properties are `undefined`.
pub fn get(
  env: &mut dyn ModuleEnv,
  r#ref: WireValue,
  prop_ptr: u32,
  prop_len: u32,
) -> Result<WireValue, GlueError> {
  env.glue().ensure_attached()?;
  let receiver = env.glue().decode(r#ref)?;
  let prop = read_string(env, prop_ptr, prop_len)?;
  let Some(value) = receiver.get_property(&prop) else {
    return Err(GlueError::NotAnObject { operation: "get" });
  };
  let value = match value {
    HostValue::Function(f) => HostValue::Function(f.bind(receiver)),
    value => value,
  };
  env.glue().encode(value)
}

/// Assigns `value` to property `prop` of `ref`.
pub fn set(
  env: &mut dyn ModuleEnv,
  r#ref: WireValue,
  prop_ptr: u32,
  prop_len: u32,
  value: WireValue,
) -> Result<(), GlueError> {
  env.glue().ensure_attached()?;
  let receiver = env.glue().decode(r#ref)?;
  let value = env.glue().decode(value)?;
  let prop = read_string(env, prop_ptr, prop_len)?;
  if receiver.set_property(&prop, value) {
    Ok(())
  } else {
    Err(GlueError::NotAnObject { operation: "set" })
  }
}

fn settle(
  env: &mut dyn ModuleEnv,
  result: Result<HostValue, GlueError>,
) -> Result<(bool, WireValue), GlueError> {
  match result {
    Ok(value) => Ok((true, env.glue().encode(value)?)),
    Err(GlueError::Throw(exception)) => {
      tracing::debug!(exception = %exception.describe(), "host exception caught at boundary");
      Ok((false, env.glue().encode(exception)?))
    }
    Err(err) => Err(err),
  }
}

/// Calls `ref` with the argument list at `args_ptr`, without a receiver.
///
/// Returns `(true, result)` on success and `(false, exception)` if the host threw. Either value is
/// owned by the module.
pub fn call(
  env: &mut dyn ModuleEnv,
  r#ref: WireValue,
  args_ptr: u32,
  args_len: u32,
) -> Result<(bool, WireValue), GlueError> {
  env.glue().ensure_attached()?;
  let _span = tracing::trace_span!("call", args = args_len).entered();
  let callee = env.glue().decode(r#ref)?;
  let args = read_args(env, args_ptr, args_len)?;
  let result = call_function(env, &callee, &HostValue::Undefined, &args);
  settle(env, result)
}

/// Constructs `ref` with the argument list at `args_ptr`. Same contract as [`call`].
pub fn construct(
  env: &mut dyn ModuleEnv,
  r#ref: WireValue,
  args_ptr: u32,
  args_len: u32,
) -> Result<(bool, WireValue), GlueError> {
  env.glue().ensure_attached()?;
  let _span = tracing::trace_span!("construct", args = args_len).entered();
  let callee = env.glue().decode(r#ref)?;
  let args = read_args(env, args_ptr, args_len)?;
  let result = construct_function(env, &callee, &args);
  settle(env, result)
}
