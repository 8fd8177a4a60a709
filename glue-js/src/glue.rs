use crate::error::GlueError;
use crate::globals::{self, Console};
use crate::memory::ViewState;
use crate::options::GlueOptions;
use crate::table::{TableStats, ValueTable};
use crate::value::{FunctionRef, HostValue, ObjectRef};
use serde::Serialize;

/// A snapshot of bridge state, exposed to the module through `glue.stats()` and printed by the
/// runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GlueStats {
  pub attached: bool,
  pub table: TableStats,
  pub memory_revalidations: u64,
}

/// The bridge between one module instance and the host.
///
/// A `Glue` owns the value table, the two object singletons (the global object and the glue object
/// itself) and the cached view of module memory. It is attached to exactly one module; every
/// protocol operation fails with [`GlueError::NotAttached`] before that.
pub struct Glue {
  options: GlueOptions,
  table: ValueTable,
  global: ObjectRef,
  glue_object: ObjectRef,
  view: ViewState,
  attached: bool,
  console: Console,
}

impl Glue {
  /// Creates a bridge whose global object carries the default host globals.
  pub fn new(options: GlueOptions) -> Self {
    let console = Console::default();
    let global = ObjectRef::new();
    globals::install(&global, &console);
    Self::with_global(options, global, console)
  }

  /// Creates a bridge around an embedder-provided global object.
  pub fn with_global(options: GlueOptions, global: ObjectRef, console: Console) -> Self {
    let glue_object = ObjectRef::with_class("Glue");
    glue_object.set("version", HostValue::string(env!("CARGO_PKG_VERSION")));
    glue_object.set(
      "stats",
      HostValue::Function(FunctionRef::native("stats", |env, _this, _args| {
        let stats = env.glue().stats();
        let obj = ObjectRef::new();
        obj.set("capacity", HostValue::Number(stats.table.capacity as f64));
        obj.set("live", HostValue::Number(stats.table.live as f64));
        obj.set("free", HostValue::Number(stats.table.free as f64));
        Ok(HostValue::Object(obj))
      })),
    );

    Self {
      table: ValueTable::with_limits(options.initial_capacity, options.max_slots),
      options,
      global,
      glue_object,
      view: ViewState::default(),
      attached: false,
      console,
    }
  }

  /// Marks the bridge as attached to its module. A bridge is attached exactly once.
  pub fn attach(&mut self) -> Result<(), GlueError> {
    if self.attached {
      return Err(GlueError::AlreadyAttached);
    }
    self.attached = true;
    tracing::debug!(capacity = self.table.capacity(), "attached module to bridge");
    Ok(())
  }

  #[inline]
  pub fn is_attached(&self) -> bool {
    self.attached
  }

  #[inline]
  pub fn ensure_attached(&self) -> Result<(), GlueError> {
    if self.attached {
      Ok(())
    } else {
      Err(GlueError::NotAttached)
    }
  }

  pub fn options(&self) -> &GlueOptions {
    &self.options
  }

  pub fn table(&self) -> &ValueTable {
    &self.table
  }

  pub fn table_mut(&mut self) -> &mut ValueTable {
    &mut self.table
  }

  /// The host's global object (wire singleton `GLOBAL`).
  pub fn global(&self) -> &ObjectRef {
    &self.global
  }

  /// The object representing the bridge itself (wire singleton `GLUE`).
  pub fn glue_object(&self) -> &ObjectRef {
    &self.glue_object
  }

  pub fn view_state(&self) -> &ViewState {
    &self.view
  }

  /// The cached memory view state, for [`ModuleEnv::memory`](crate::ModuleEnv::memory)
  /// implementations.
  pub fn view_state_mut(&mut self) -> &mut ViewState {
    &mut self.view
  }

  pub fn console(&self) -> &Console {
    &self.console
  }

  pub fn stats(&self) -> GlueStats {
    GlueStats {
      attached: self.attached,
      table: self.table.stats(),
      memory_revalidations: self.view.revalidations(),
    }
  }
}

impl Default for Glue {
  fn default() -> Self {
    Self::new(GlueOptions::default())
  }
}
