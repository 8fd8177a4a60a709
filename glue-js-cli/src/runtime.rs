//! `wasmtime` embedding of the bridge.

use anyhow::{anyhow, Context};
use glue_js::protocol;
use glue_js::{
  FrameLoop, Glue, GlueError, GlueOptions, GlueStats, ManualScheduler, MemoryView, ModuleEnv,
  WireValue,
};
use std::path::Path;
use std::time::Duration;
use wasmtime::{
  AsContext, AsContextMut, Caller, Engine, Linker, Memory, Module, Ref, Store, StoreContextMut,
  Table, TypedFunc, Val,
};

/// Module name of every bridge import.
pub const IMPORT_MODULE: &str = "glue";

/// Store data: the bridge plus the exports it needs to reach back into the module.
pub struct HostState {
  glue: Glue,
  exports: Option<Exports>,
}

#[derive(Clone)]
struct Exports {
  memory: Memory,
  alloc: TypedFunc<(u32, u32), u32>,
  table: Table,
}

/// A [`ModuleEnv`] over a store context, created fresh for every import call and for every call
/// the host makes into the module.
struct WasmEnv<'a> {
  ctx: StoreContextMut<'a, HostState>,
}

impl<'a> WasmEnv<'a> {
  fn new(ctx: StoreContextMut<'a, HostState>) -> Self {
    Self { ctx }
  }

  fn exports(&self) -> Result<Exports, GlueError> {
    self.ctx.data().exports.clone().ok_or(GlueError::NotAttached)
  }

  fn table_func(&mut self, fn_index: u32) -> Result<wasmtime::Func, GlueError> {
    let table = self.exports()?.table;
    match table.get(self.ctx.as_context_mut(), fn_index.into()) {
      Some(Ref::Func(Some(func))) => Ok(func),
      _ => Err(GlueError::Module(format!(
        "function table entry {fn_index} is not a function"
      ))),
    }
  }
}

fn module_error(err: anyhow::Error) -> GlueError {
  GlueError::Module(format!("{err:#}"))
}

/// Turns a fatal bridge error into a wasm trap.
fn trap(err: GlueError) -> anyhow::Error {
  anyhow!("{err}")
}

impl ModuleEnv for WasmEnv<'_> {
  fn glue(&mut self) -> &mut Glue {
    &mut self.ctx.data_mut().glue
  }

  fn memory(&mut self) -> Result<MemoryView<'_>, GlueError> {
    let memory = self.exports()?.memory;
    let (bytes, state) = memory.data_and_store_mut(self.ctx.as_context_mut());
    Ok(MemoryView::new(bytes, state.glue.view_state_mut()))
  }

  fn alloc(&mut self, size: u32, align: u32) -> Result<u32, GlueError> {
    let alloc = self.exports()?.alloc;
    alloc
      .call(self.ctx.as_context_mut(), (size, align))
      .map_err(module_error)
  }

  fn invoke_closure(&mut self, fn_index: u32, ctx_ptr: u32) -> Result<(), GlueError> {
    let func = self.table_func(fn_index)?;
    let func = func
      .typed::<u32, ()>(self.ctx.as_context())
      .map_err(module_error)?;
    func
      .call(self.ctx.as_context_mut(), ctx_ptr)
      .map_err(module_error)
  }

  fn invoke_tick(&mut self, fn_index: u32) -> Result<bool, GlueError> {
    let func = self.table_func(fn_index)?;
    let func = func
      .typed::<(), i32>(self.ctx.as_context())
      .map_err(module_error)?;
    let again = func
      .call(self.ctx.as_context_mut(), ())
      .map_err(module_error)?;
    Ok(again != 0)
  }
}

fn env<'a>(caller: &'a mut Caller<'_, HostState>) -> WasmEnv<'a> {
  WasmEnv::new(caller.as_context_mut())
}

/// Defines every bridge import on `linker`. Wire values cross as `i64`, pointers and lengths as
/// `i32`.
pub fn link(linker: &mut Linker<HostState>) -> anyhow::Result<()> {
  linker.func_wrap(
    IMPORT_MODULE,
    "throw_str",
    |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| -> anyhow::Result<()> {
      Err(trap(protocol::throw_str(&mut env(&mut caller), ptr, len)))
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "string_new",
    |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| -> anyhow::Result<u64> {
      protocol::string_new(&mut env(&mut caller), ptr, len)
        .map(WireValue::bits)
        .map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "string_get",
    |mut caller: Caller<'_, HostState>, r#ref: u64| -> anyhow::Result<(u32, u32)> {
      protocol::string_get(&mut env(&mut caller), WireValue(r#ref)).map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "closure_new",
    |mut caller: Caller<'_, HostState>, fn_index: u32, ctx_ptr: u32| -> anyhow::Result<u64> {
      protocol::closure_new(&mut env(&mut caller), fn_index, ctx_ptr)
        .map(WireValue::bits)
        .map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "increment_ref_count",
    |mut caller: Caller<'_, HostState>, r#ref: u64| -> anyhow::Result<()> {
      protocol::increment_ref_count(&mut env(&mut caller), WireValue(r#ref)).map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "decrement_ref_count",
    |mut caller: Caller<'_, HostState>, r#ref: u64| -> anyhow::Result<()> {
      protocol::decrement_ref_count(&mut env(&mut caller), WireValue(r#ref)).map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "get",
    |mut caller: Caller<'_, HostState>,
     r#ref: u64,
     prop_ptr: u32,
     prop_len: u32|
     -> anyhow::Result<u64> {
      protocol::get(&mut env(&mut caller), WireValue(r#ref), prop_ptr, prop_len)
        .map(WireValue::bits)
        .map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "set",
    |mut caller: Caller<'_, HostState>,
     r#ref: u64,
     prop_ptr: u32,
     prop_len: u32,
     value: u64|
     -> anyhow::Result<()> {
      protocol::set(
        &mut env(&mut caller),
        WireValue(r#ref),
        prop_ptr,
        prop_len,
        WireValue(value),
      )
      .map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "call",
    |mut caller: Caller<'_, HostState>,
     r#ref: u64,
     args_ptr: u32,
     args_len: u32|
     -> anyhow::Result<(u32, u64)> {
      protocol::call(&mut env(&mut caller), WireValue(r#ref), args_ptr, args_len)
        .map(|(ok, value)| (u32::from(ok), value.bits()))
        .map_err(trap)
    },
  )?;
  linker.func_wrap(
    IMPORT_MODULE,
    "construct",
    |mut caller: Caller<'_, HostState>,
     r#ref: u64,
     args_ptr: u32,
     args_len: u32|
     -> anyhow::Result<(u32, u64)> {
      protocol::construct(&mut env(&mut caller), WireValue(r#ref), args_ptr, args_len)
        .map(|(ok, value)| (u32::from(ok), value.bits()))
        .map_err(trap)
    },
  )?;
  Ok(())
}

fn missing(name: &'static str) -> anyhow::Error {
  anyhow!("{}", GlueError::MissingExport(name))
}

/// An instantiated module attached to its own bridge.
pub struct Runtime {
  store: Store<HostState>,
  main: TypedFunc<(), ()>,
  frame_tick: Option<u32>,
}

impl Runtime {
  /// Loads a binary or text module from disk.
  pub fn from_file(path: &Path, options: GlueOptions) -> anyhow::Result<Self> {
    let engine = Engine::default();
    let module = Module::from_file(&engine, path)
      .with_context(|| format!("failed to load module {}", path.display()))?;
    Self::instantiate(&engine, &module, options)
  }

  /// Compiles a module from binary or text bytes.
  pub fn from_bytes(bytes: impl AsRef<[u8]>, options: GlueOptions) -> anyhow::Result<Self> {
    let engine = Engine::default();
    let module = Module::new(&engine, bytes).context("failed to compile module")?;
    Self::instantiate(&engine, &module, options)
  }

  fn instantiate(engine: &Engine, module: &Module, options: GlueOptions) -> anyhow::Result<Self> {
    let mut store = Store::new(
      engine,
      HostState {
        glue: Glue::new(options),
        exports: None,
      },
    );
    let mut linker = Linker::new(engine);
    link(&mut linker)?;
    let instance = linker
      .instantiate(&mut store, module)
      .context("failed to instantiate module")?;

    let memory = instance
      .get_memory(&mut store, "memory")
      .ok_or_else(|| missing("memory"))?;
    let table = instance
      .get_table(&mut store, "__indirect_function_table")
      .ok_or_else(|| missing("__indirect_function_table"))?;
    let alloc = instance
      .get_typed_func::<(u32, u32), u32>(&mut store, "alloc")
      .map_err(|_| missing("alloc"))?;
    let main = instance
      .get_typed_func::<(), ()>(&mut store, "main")
      .map_err(|_| missing("main"))?;
    let frame_tick = match instance.get_global(&mut store, "frame_tick") {
      Some(global) => match global.get(&mut store) {
        Val::I32(index) => Some(index as u32),
        _ => return Err(missing("frame_tick")),
      },
      None => None,
    };

    let state = store.data_mut();
    state.exports = Some(Exports {
      memory,
      alloc,
      table,
    });
    state.glue.attach().map_err(trap)?;

    Ok(Self {
      store,
      main,
      frame_tick,
    })
  }

  pub fn glue(&self) -> &Glue {
    &self.store.data().glue
  }

  pub fn stats(&self) -> GlueStats {
    self.glue().stats()
  }

  /// The function table index of the module's per-frame tick function, if it exports one.
  pub fn frame_tick(&self) -> Option<u32> {
    self.frame_tick
  }

  pub fn run_main(&mut self) -> anyhow::Result<()> {
    let _span = tracing::debug_span!("main").entered();
    self
      .main
      .call(&mut self.store, ())
      .context("module `main` failed")
  }

  /// Drives the frame loop until the module cancels it or `max_frames` frames have run, waiting
  /// `interval` before each frame. Returns the number of frames run.
  pub fn run_frames(
    &mut self,
    max_frames: Option<u64>,
    interval: Option<Duration>,
  ) -> anyhow::Result<u64> {
    let Some(tick_index) = self.frame_tick else {
      return Ok(0);
    };
    let mut frames = FrameLoop::new(tick_index);
    let mut scheduler = ManualScheduler::new();
    let mut env = WasmEnv::new(self.store.as_context_mut());
    let ran = frames
      .run(&mut env, &mut scheduler, max_frames, || {
        if let Some(interval) = interval {
          std::thread::sleep(interval);
        }
      })
      .map_err(trap)
      .context("frame loop failed")?;
    tracing::debug!(frames = ran, stopped = frames.is_stopped(), "frame loop finished");
    Ok(ran)
  }
}
