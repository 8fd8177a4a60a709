#![allow(dead_code)]

use glue_js::{Glue, GlueError, GlueOptions, MemoryView, ModuleEnv, WireValue};

pub type ClosureFn = fn(&mut FakeModule, u32);
pub type TickFn = fn(&mut FakeModule) -> bool;

#[derive(Clone, Copy)]
pub enum TableEntry {
  Closure(ClosureFn),
  Tick(TickFn),
}

/// A module stand-in: a byte vector for linear memory, a bump allocator, and a function table of
/// Rust fns that can call back into the bridge.
pub struct FakeModule {
  pub glue: Glue,
  pub memory: Vec<u8>,
  pub heap_top: u32,
  pub table: Vec<TableEntry>,
  /// `ctx_ptr` of every closure invocation, in order.
  pub closure_calls: Vec<u32>,
  /// Remaining `true` results for [`counting_tick`].
  pub ticks_left: u32,
  /// Wire values produced inside callbacks.
  pub produced: Vec<WireValue>,
}

pub const PAGE: usize = 64 * 1024;
const HEAP_BASE: u32 = 1024;

impl FakeModule {
  pub fn new() -> Self {
    let mut module = Self::unattached(GlueOptions::default());
    module.glue.attach().expect("fresh bridge attaches");
    module
  }

  pub fn with_options(options: GlueOptions) -> Self {
    let mut module = Self::unattached(options);
    module.glue.attach().expect("fresh bridge attaches");
    module
  }

  pub fn unattached(options: GlueOptions) -> Self {
    Self {
      glue: Glue::new(options),
      memory: vec![0; PAGE],
      heap_top: HEAP_BASE,
      table: Vec::new(),
      closure_calls: Vec::new(),
      ticks_left: 0,
      produced: Vec::new(),
    }
  }

  /// Reallocates memory with `pages` more pages, moving the buffer like `memory.grow` may.
  pub fn grow_memory(&mut self, pages: usize) {
    let mut grown = vec![0u8; self.memory.len() + pages * PAGE];
    grown[..self.memory.len()].copy_from_slice(&self.memory);
    self.memory = grown;
  }

  fn bump(&mut self, size: u32, align: u32) -> u32 {
    let align = align.max(1);
    let ptr = (self.heap_top + align - 1) / align * align;
    self.heap_top = ptr + size;
    while self.heap_top as usize > self.memory.len() {
      self.grow_memory(1);
    }
    ptr
  }

  /// Places `s` in module memory and returns its `(ptr, len)`.
  pub fn put_str(&mut self, s: &str) -> (u32, u32) {
    let ptr = self.bump(s.len() as u32, 1);
    self.memory[ptr as usize..ptr as usize + s.len()].copy_from_slice(s.as_bytes());
    (ptr, s.len() as u32)
  }

  /// Places an argument list in module memory and returns its `(ptr, len)`.
  pub fn put_args(&mut self, args: &[WireValue]) -> (u32, u32) {
    let ptr = self.bump(args.len() as u32 * 8, 8);
    for (i, arg) in args.iter().enumerate() {
      let at = ptr as usize + i * 8;
      self.memory[at..at + 8].copy_from_slice(&arg.bits().to_le_bytes());
    }
    (ptr, args.len() as u32)
  }

  pub fn bytes(&self, ptr: u32, len: u32) -> &[u8] {
    &self.memory[ptr as usize..(ptr + len) as usize]
  }

  pub fn add_closure(&mut self, f: ClosureFn) -> u32 {
    self.table.push(TableEntry::Closure(f));
    self.table.len() as u32 - 1
  }

  pub fn add_tick(&mut self, f: TickFn) -> u32 {
    self.table.push(TableEntry::Tick(f));
    self.table.len() as u32 - 1
  }

  pub fn live(&self) -> u32 {
    self.glue.table().live()
  }
}

impl ModuleEnv for FakeModule {
  fn glue(&mut self) -> &mut Glue {
    &mut self.glue
  }

  fn memory(&mut self) -> Result<MemoryView<'_>, GlueError> {
    Ok(MemoryView::new(
      &mut self.memory,
      self.glue.view_state_mut(),
    ))
  }

  fn alloc(&mut self, size: u32, align: u32) -> Result<u32, GlueError> {
    Ok(self.bump(size, align))
  }

  fn invoke_closure(&mut self, fn_index: u32, ctx_ptr: u32) -> Result<(), GlueError> {
    match self.table.get(fn_index as usize).copied() {
      Some(TableEntry::Closure(f)) => {
        f(self, ctx_ptr);
        Ok(())
      }
      _ => Err(GlueError::Module(format!(
        "table entry {fn_index} is not a closure"
      ))),
    }
  }

  fn invoke_tick(&mut self, fn_index: u32) -> Result<bool, GlueError> {
    match self.table.get(fn_index as usize).copied() {
      Some(TableEntry::Tick(f)) => Ok(f(self)),
      _ => Err(GlueError::Module(format!(
        "table entry {fn_index} is not a tick function"
      ))),
    }
  }
}

/// Records its context pointer.
pub fn recording_closure(module: &mut FakeModule, ctx_ptr: u32) {
  module.closure_calls.push(ctx_ptr);
}

/// Returns `true` while `ticks_left` is positive, counting down.
pub fn counting_tick(module: &mut FakeModule) -> bool {
  if module.ticks_left == 0 {
    return false;
  }
  module.ticks_left -= 1;
  true
}
