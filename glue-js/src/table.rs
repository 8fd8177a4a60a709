use crate::error::GlueError;
use crate::value::HostValue;
use crate::wire::MAX_PREDEFINED;
use serde::Serialize;

/// The largest number of slots a 32-bit id can address.
pub const MAX_ADDRESSABLE_SLOTS: u32 = u32::MAX - MAX_PREDEFINED + 1;

/// Host values kept alive on behalf of the module, with parallel reference counts.
///
/// Invariants:
/// - `index` is on the free list iff `refcounts[index] == 0` iff `slots[index].is_none()`.
/// - Capacity never shrinks; when the free list runs dry the table at least doubles.
/// - Free indices are popped smallest first, so reuse is deterministic.
///
/// Slots carry no generation: a stale index that has since been reallocated is indistinguishable
/// from a fresh one.
pub struct ValueTable {
  slots: Vec<Option<HostValue>>,
  refcounts: Vec<u32>,
  free_list: Vec<u32>,
  max_slots: u32,
}

/// A snapshot of table occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TableStats {
  pub capacity: u32,
  pub live: u32,
  pub free: u32,
}

impl ValueTable {
  pub fn new() -> Self {
    Self::with_limits(0, None)
  }

  /// Creates a table with `initial_capacity` free slots that may grow up to `max_slots`.
  pub fn with_limits(initial_capacity: u32, max_slots: Option<u32>) -> Self {
    let max_slots = max_slots
      .unwrap_or(MAX_ADDRESSABLE_SLOTS)
      .min(MAX_ADDRESSABLE_SLOTS);
    let mut table = Self {
      slots: Vec::new(),
      refcounts: Vec::new(),
      free_list: Vec::new(),
      max_slots,
    };
    let initial = initial_capacity.min(max_slots);
    if initial > 0 {
      table.grow(initial);
    }
    table
  }

  #[inline]
  pub fn capacity(&self) -> u32 {
    self.slots.len() as u32
  }

  /// The capacity limit. Never above [`MAX_ADDRESSABLE_SLOTS`], so every slot index has a wire id.
  #[inline]
  pub fn max_slots(&self) -> u32 {
    self.max_slots
  }

  /// Number of slots currently holding a value.
  #[inline]
  pub fn live(&self) -> u32 {
    self.capacity() - self.free_list.len() as u32
  }

  pub fn stats(&self) -> TableStats {
    TableStats {
      capacity: self.capacity(),
      live: self.live(),
      free: self.free_list.len() as u32,
    }
  }

  /// The reference count of `index`, or `None` if it is out of range.
  pub fn refcount(&self, index: u32) -> Option<u32> {
    self.refcounts.get(index as usize).copied()
  }

  /// Appends `delta` free slots.
  ///
  /// Must only be called when the free list is empty (or on an empty table). Panics if the
  /// post-conditions do not hold; that would be a bug in the table itself.
  pub fn grow(&mut self, delta: u32) {
    let old = self.capacity();
    let new = old
      .checked_add(delta)
      .expect("value table capacity overflow");
    assert!(
      self.free_list.is_empty(),
      "value table grown while free slots remain"
    );

    self.slots.resize_with(new as usize, || None);
    self.refcounts.resize(new as usize, 0);
    // Highest index first so that `pop` hands out the smallest index.
    self.free_list.extend((old..new).rev());

    assert_eq!(self.capacity(), old + delta, "value table grew by the wrong amount");
    assert_eq!(
      self.free_list.len(),
      delta as usize,
      "value table free list does not match growth"
    );
    tracing::debug!(old, new, "grew value table");
  }

  /// Stores `value` in a free slot with a reference count of one and returns the slot index.
  ///
  /// The returned count is the owning reference handed to the module.
  pub fn alloc(&mut self, value: HostValue) -> Result<u32, GlueError> {
    if self.free_list.is_empty() {
      let capacity = self.capacity();
      if capacity >= self.max_slots {
        return Err(GlueError::OutOfSlots {
          max: self.max_slots,
        });
      }
      let delta = capacity.max(1).min(self.max_slots - capacity);
      self.grow(delta);
    }

    let Some(index) = self.free_list.pop() else {
      unreachable!("free list is non-empty after growth");
    };
    let idx = index as usize;
    debug_assert!(self.slots[idx].is_none(), "free list returned an occupied slot");
    debug_assert_eq!(self.refcounts[idx], 0);

    self.slots[idx] = Some(value);
    self.refcounts[idx] = 1;
    tracing::trace!(index, "allocated value table slot");
    Ok(index)
  }

  /// Returns the value stored at `index`.
  pub fn get(&self, index: u32) -> Result<&HostValue, GlueError> {
    match self.slots.get(index as usize) {
      Some(Some(value)) => Ok(value),
      Some(None) => Err(GlueError::ReleasedHandle {
        id: index + MAX_PREDEFINED,
      }),
      None => Err(GlueError::InvalidHandle {
        id: index.saturating_add(MAX_PREDEFINED),
      }),
    }
  }

  /// Adds a count to a live slot; required before the module duplicates a handle.
  pub fn increment(&mut self, index: u32) -> Result<(), GlueError> {
    let count = self.live_refcount_mut(index)?;
    *count += 1;
    Ok(())
  }

  /// Drops a count. At zero the stored value is released and the slot returns to the free list.
  pub fn decrement(&mut self, index: u32) -> Result<(), GlueError> {
    let count = self.live_refcount_mut(index)?;
    *count -= 1;
    if *count == 0 {
      self.slots[index as usize] = None;
      self.free_list.push(index);
      tracing::trace!(index, "released value table slot");
    }
    Ok(())
  }

  fn live_refcount_mut(&mut self, index: u32) -> Result<&mut u32, GlueError> {
    match self.refcounts.get_mut(index as usize) {
      Some(0) => Err(GlueError::ReleasedHandle {
        id: index + MAX_PREDEFINED,
      }),
      Some(count) => Ok(count),
      None => Err(GlueError::InvalidHandle {
        id: index.saturating_add(MAX_PREDEFINED),
      }),
    }
  }
}

impl Default for ValueTable {
  fn default() -> Self {
    Self::new()
  }
}
