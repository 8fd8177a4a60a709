use crate::value::HostValue;

/// Errors produced by the bridge.
///
/// [`GlueError::Throw`] is the only recoverable variant: it carries a host exception and is turned
/// into a `(false, value)` result by [`call`](crate::protocol::call) and
/// [`construct`](crate::protocol::construct). Every other variant is a violation of the contract
/// between the module and the bridge; embeddings must stop executing the module when they see one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GlueError {
  /// A host exception. This is catchable at the `call`/`construct` boundary.
  #[error("uncaught host exception: {}", .0.describe())]
  Throw(HostValue),

  /// A bridge operation was invoked before a module was attached.
  #[error("no module is attached to the bridge")]
  NotAttached,

  /// [`Glue::attach`](crate::Glue::attach) was called twice.
  #[error("a module is already attached to the bridge")]
  AlreadyAttached,

  /// A wire value addressed a slot outside of the value table.
  #[error("invalid handle: id {id} is outside of the value table")]
  InvalidHandle { id: u32 },

  /// A wire value addressed a slot whose reference count already dropped to zero.
  #[error("released handle: id {id} has no remaining references")]
  ReleasedHandle { id: u32 },

  /// A NaN-boxed wire value that is neither a number, a singleton, nor a well-formed reference.
  #[error("malformed wire value {0:#018x}")]
  MalformedWireValue(u64),

  /// A pointer/length pair did not fit within the module's memory.
  #[error("out of bounds memory access: {len} bytes at {ptr:#x} (memory is {memory_len} bytes)")]
  OutOfBounds { ptr: u32, len: u32, memory_len: usize },

  /// A property operation was attempted on a value that is not an object or function.
  #[error("{operation}: receiver is not an object")]
  NotAnObject { operation: &'static str },

  /// `string_get` was invoked on a value that is not a string.
  #[error("string_get: value is not a string")]
  NotAString,

  /// The value table would exceed its configured (or addressable) capacity.
  #[error("value table exhausted ({max} slots)")]
  OutOfSlots { max: u32 },

  /// The module raised an explicit error through `throw_str`.
  #[error("module error: {0}")]
  ModuleThrow(String),

  /// The module trapped or one of its exports misbehaved.
  #[error("module failure: {0}")]
  Module(String),

  /// A required module export is missing or has the wrong type.
  #[error("module does not export `{0}`")]
  MissingExport(&'static str),
}

impl GlueError {
  /// Whether this error must terminate the module.
  #[inline]
  pub fn is_fatal(&self) -> bool {
    !matches!(self, GlueError::Throw(_))
  }
}
