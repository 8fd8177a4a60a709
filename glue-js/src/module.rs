use crate::error::GlueError;
use crate::memory::MemoryView;
use crate::Glue;

/// The attached module, as seen from a bridge operation.
///
/// Embeddings implement this once per calling context (e.g. around a wasm `Caller` while servicing
/// an import, or around the store when the host drives the module). Every method is a fresh
/// borrow; operations never keep one alive across a call back into the module, so reentrant calls
/// observe a consistent bridge.
pub trait ModuleEnv {
  /// The bridge instance the module is attached to.
  fn glue(&mut self) -> &mut Glue;

  /// The module's current linear memory, paired with the bridge's cached view state.
  fn memory(&mut self) -> Result<MemoryView<'_>, GlueError>;

  /// Calls the module's exported `alloc(size, align)`.
  fn alloc(&mut self, size: u32, align: u32) -> Result<u32, GlueError>;

  /// Calls entry `fn_index` of the module's indirect function table as `fn(ctx_ptr)`.
  fn invoke_closure(&mut self, fn_index: u32, ctx_ptr: u32) -> Result<(), GlueError>;

  /// Calls entry `fn_index` of the module's indirect function table as `fn() -> bool`.
  fn invoke_tick(&mut self, fn_index: u32) -> Result<bool, GlueError>;
}
