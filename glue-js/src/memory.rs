use crate::error::GlueError;

/// The bridge's cached view of the module's linear memory.
///
/// Only the identity of the buffer (base address and length) is cached, never the buffer itself.
/// Memory growth may move the buffer, so every access compares the buffer it is given against the
/// cache and re-derives the cache when they differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
  base: usize,
  len: usize,
  revalidations: u64,
}

impl ViewState {
  /// Number of times the view was re-derived because the buffer changed.
  pub fn revalidations(&self) -> u64 {
    self.revalidations
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  fn check(&mut self, bytes: &[u8]) {
    let base = bytes.as_ptr() as usize;
    let len = bytes.len();
    if self.base != base || self.len != len {
      tracing::trace!(
        old_len = self.len,
        new_len = len,
        "module memory changed identity; revalidating view"
      );
      self.base = base;
      self.len = len;
      self.revalidations += 1;
    }
  }
}

/// Byte, 32-bit and 64-bit little-endian access to the module's linear memory.
pub struct MemoryView<'a> {
  bytes: &'a mut [u8],
  state: &'a mut ViewState,
}

impl<'a> MemoryView<'a> {
  pub fn new(bytes: &'a mut [u8], state: &'a mut ViewState) -> Self {
    Self { bytes, state }
  }

  pub fn len(&mut self) -> usize {
    self.validated().len()
  }

  pub fn is_empty(&mut self) -> bool {
    self.len() == 0
  }

  fn validated(&mut self) -> &mut [u8] {
    self.state.check(&*self.bytes);
    &mut *self.bytes
  }

  fn range(&mut self, ptr: u32, len: u32) -> Result<core::ops::Range<usize>, GlueError> {
    let memory_len = self.validated().len();
    let start = ptr as usize;
    match start.checked_add(len as usize) {
      Some(end) if end <= memory_len => Ok(start..end),
      _ => Err(GlueError::OutOfBounds {
        ptr,
        len,
        memory_len,
      }),
    }
  }

  pub fn read_bytes(&mut self, ptr: u32, len: u32) -> Result<&[u8], GlueError> {
    let range = self.range(ptr, len)?;
    Ok(&self.bytes[range])
  }

  pub fn write_bytes(&mut self, ptr: u32, data: &[u8]) -> Result<(), GlueError> {
    let len = u32::try_from(data.len()).map_err(|_| GlueError::OutOfBounds {
      ptr,
      len: u32::MAX,
      memory_len: self.bytes.len(),
    })?;
    let range = self.range(ptr, len)?;
    self.bytes[range].copy_from_slice(data);
    Ok(())
  }

  fn read_array<const N: usize>(&mut self, ptr: u32) -> Result<[u8; N], GlueError> {
    let mut out = [0u8; N];
    out.copy_from_slice(self.read_bytes(ptr, N as u32)?);
    Ok(out)
  }

  pub fn read_u8(&mut self, ptr: u32) -> Result<u8, GlueError> {
    Ok(self.read_array::<1>(ptr)?[0])
  }

  pub fn read_u32(&mut self, ptr: u32) -> Result<u32, GlueError> {
    Ok(u32::from_le_bytes(self.read_array(ptr)?))
  }

  pub fn read_u64(&mut self, ptr: u32) -> Result<u64, GlueError> {
    Ok(u64::from_le_bytes(self.read_array(ptr)?))
  }

  pub fn write_u8(&mut self, ptr: u32, value: u8) -> Result<(), GlueError> {
    self.write_bytes(ptr, &[value])
  }

  pub fn write_u32(&mut self, ptr: u32, value: u32) -> Result<(), GlueError> {
    self.write_bytes(ptr, &value.to_le_bytes())
  }

  pub fn write_u64(&mut self, ptr: u32, value: u64) -> Result<(), GlueError> {
    self.write_bytes(ptr, &value.to_le_bytes())
  }
}
