use crate::error::GlueError;
use crate::value::HostValue;
use crate::wire::{WireValue, ID_FALSE, ID_GLOBAL, ID_GLUE, ID_NAN, ID_NULL, ID_TRUE, ID_UNDEFINED};
use crate::Glue;

impl Glue {
  /// Encodes a host value into a wire value.
  ///
  /// Numbers and singletons never touch the value table. Every other value is boxed into a fresh
  /// slot whose single count is owned by the receiver of the returned wire value.
  pub fn encode(&mut self, value: HostValue) -> Result<WireValue, GlueError> {
    match value {
      HostValue::Undefined => Ok(WireValue::UNDEFINED),
      HostValue::Null => Ok(WireValue::NULL),
      HostValue::Bool(b) => Ok(WireValue::from_bool(b)),
      HostValue::Number(n) => Ok(WireValue::from_f64(n)),
      HostValue::Object(ref o) if o.ptr_eq(self.global()) => Ok(WireValue::GLOBAL),
      HostValue::Object(ref o) if o.ptr_eq(self.glue_object()) => Ok(WireValue::GLUE),
      value => {
        let tag = value.tag();
        let index = self.table_mut().alloc(value)?;
        match WireValue::from_slot(tag, index) {
          Some(wire) => Ok(wire),
          None => {
            self.table_mut().decrement(index)?;
            Err(GlueError::OutOfSlots {
              max: self.table().max_slots(),
            })
          }
        }
      }
    }
  }

  /// Decodes a wire value into the host value it denotes, without affecting reference counts.
  pub fn decode(&self, wire: WireValue) -> Result<HostValue, GlueError> {
    if wire.is_raw_number() {
      return Ok(HostValue::Number(f64::from_bits(wire.bits())));
    }
    if !wire.is_well_formed_box() {
      return Err(GlueError::MalformedWireValue(wire.bits()));
    }
    if let Some(index) = wire.slot_index() {
      return self.table().get(index).cloned();
    }
    let singleton = match wire {
      WireValue::UNDEFINED => HostValue::Undefined,
      WireValue::NULL => HostValue::Null,
      WireValue::NAN => HostValue::Number(f64::NAN),
      WireValue::TRUE => HostValue::Bool(true),
      WireValue::FALSE => HostValue::Bool(false),
      WireValue::GLOBAL => HostValue::Object(self.global().clone()),
      WireValue::GLUE => HostValue::Object(self.glue_object().clone()),
      _ => return Err(GlueError::MalformedWireValue(wire.bits())),
    };
    Ok(singleton)
  }

  /// Decodes a sequence of wire values.
  pub fn decode_all(&self, wires: &[WireValue]) -> Result<Vec<HostValue>, GlueError> {
    wires.iter().map(|w| self.decode(*w)).collect()
  }

  /// Adds a count to a reference. Numbers and singletons are unaffected.
  pub fn increment(&mut self, wire: WireValue) -> Result<(), GlueError> {
    match self.counted_index(wire)? {
      Some(index) => self.table_mut().increment(index),
      None => Ok(()),
    }
  }

  /// Drops a count from a reference, releasing the host value at zero. Numbers and singletons are
  /// unaffected.
  pub fn decrement(&mut self, wire: WireValue) -> Result<(), GlueError> {
    match self.counted_index(wire)? {
      Some(index) => self.table_mut().decrement(index),
      None => Ok(()),
    }
  }

  fn counted_index(&self, wire: WireValue) -> Result<Option<u32>, GlueError> {
    if wire.is_raw_number() {
      return Ok(None);
    }
    if !wire.is_well_formed_box() {
      return Err(GlueError::MalformedWireValue(wire.bits()));
    }
    match wire.id() {
      0 => Err(GlueError::MalformedWireValue(wire.bits())),
      ID_UNDEFINED | ID_NULL | ID_NAN | ID_TRUE | ID_FALSE | ID_GLOBAL | ID_GLUE => Ok(None),
      _ => Ok(wire.slot_index()),
    }
  }
}
