use core::fmt;

/// The quiet NaN prefix. Every non-number wire value has exactly these bits set in its top 24 bits
/// (above the tag).
pub const QUIET_NAN: u64 = 0x7ff8_0000_0000_0000;

const PREFIX_MASK: u64 = 0xffff_ff00_0000_0000;
const TAG_MASK: u64 = (1 << 8) - 1;
const ID_MASK: u64 = (1 << 32) - 1;

pub const ID_UNDEFINED: u32 = 1;
pub const ID_NULL: u32 = 2;
pub const ID_NAN: u32 = 3;
pub const ID_TRUE: u32 = 4;
pub const ID_FALSE: u32 = 5;
pub const ID_GLOBAL: u32 = 6;
pub const ID_GLUE: u32 = 7;

/// Ids below this value are singletons. Ids at or above it address value table slot
/// `id - MAX_PREDEFINED`.
///
/// Id 0 is never used: `tag 0, id 0` is the bit pattern of `f64::NAN` itself.
pub const MAX_PREDEFINED: u32 = 8;

/// The kind of a boxed value, stored in bits 32..40 of a NaN-boxed wire value.
///
/// There is no number tag: a wire value is either a number or a tagged NaN.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
  DontCare = 0,
  Object = 1,
  Function = 2,
  String = 3,
}

impl Tag {
  pub const fn from_bits(bits: u8) -> Option<Self> {
    match bits {
      0 => Some(Tag::DontCare),
      1 => Some(Tag::Object),
      2 => Some(Tag::Function),
      3 => Some(Tag::String),
      _ => None,
    }
  }
}

/// A 64-bit value crossing the module boundary.
///
/// If the bits are a non-NaN double, the wire value is that number. Otherwise they are a quiet NaN
/// carrying a [`Tag`] and a 32-bit id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct WireValue(pub u64);

impl WireValue {
  pub const UNDEFINED: WireValue = WireValue::from_tag_id(Tag::DontCare, ID_UNDEFINED);
  pub const NULL: WireValue = WireValue::from_tag_id(Tag::DontCare, ID_NULL);
  pub const NAN: WireValue = WireValue::from_tag_id(Tag::DontCare, ID_NAN);
  pub const TRUE: WireValue = WireValue::from_tag_id(Tag::DontCare, ID_TRUE);
  pub const FALSE: WireValue = WireValue::from_tag_id(Tag::DontCare, ID_FALSE);
  pub const GLOBAL: WireValue = WireValue::from_tag_id(Tag::Object, ID_GLOBAL);
  pub const GLUE: WireValue = WireValue::from_tag_id(Tag::Object, ID_GLUE);

  pub const fn from_tag_id(tag: Tag, id: u32) -> Self {
    Self(QUIET_NAN | ((tag as u64) << 32) | id as u64)
  }

  /// Encodes a number. Every NaN, whatever its payload, becomes [`WireValue::NAN`]; forwarding an
  /// arbitrary NaN would be read back as a tag and id.
  pub fn from_f64(f: f64) -> Self {
    if f.is_nan() {
      Self::NAN
    } else {
      Self(f.to_bits())
    }
  }

  pub const fn from_bool(b: bool) -> Self {
    if b {
      Self::TRUE
    } else {
      Self::FALSE
    }
  }

  #[inline]
  pub const fn bits(self) -> u64 {
    self.0
  }

  /// Whether the bits are a non-NaN double.
  #[inline]
  pub fn is_raw_number(self) -> bool {
    !f64::from_bits(self.0).is_nan()
  }

  /// Whether this is a number, including the canonical NaN singleton.
  #[inline]
  pub fn is_number(self) -> bool {
    self == Self::NAN || self.is_raw_number()
  }

  /// Whether the NaN-boxed bits are well formed: quiet, positive, and with nothing set between the
  /// tag and the exponent.
  #[inline]
  pub fn is_well_formed_box(self) -> bool {
    self.0 & PREFIX_MASK == QUIET_NAN && Tag::from_bits(self.tag_bits()).is_some()
  }

  #[inline]
  fn tag_bits(self) -> u8 {
    ((self.0 >> 32) & TAG_MASK) as u8
  }

  /// The tag of a boxed value. Meaningless for numbers.
  #[inline]
  pub fn tag(self) -> Option<Tag> {
    Tag::from_bits(self.tag_bits())
  }

  /// The id of a boxed value. Meaningless for numbers.
  #[inline]
  pub const fn id(self) -> u32 {
    (self.0 & ID_MASK) as u32
  }

  #[inline]
  pub fn is_predefined(self) -> bool {
    !self.is_raw_number() && self.id() < MAX_PREDEFINED
  }

  /// Whether this value addresses a value table slot and therefore participates in reference
  /// counting.
  #[inline]
  pub fn is_ref(self) -> bool {
    !self.is_raw_number() && self.id() >= MAX_PREDEFINED
  }

  /// The value table index addressed by this value, if it is a reference.
  #[inline]
  pub fn slot_index(self) -> Option<u32> {
    self.is_ref().then(|| self.id() - MAX_PREDEFINED)
  }

  /// Composes a reference to value table slot `index`.
  ///
  /// Returns `None` if the slot cannot be addressed by a 32-bit id.
  #[inline]
  pub fn from_slot(tag: Tag, index: u32) -> Option<Self> {
    index
      .checked_add(MAX_PREDEFINED)
      .map(|id| Self::from_tag_id(tag, id))
  }

  pub fn try_as_f64(self) -> Option<f64> {
    if self == Self::NAN {
      Some(f64::NAN)
    } else if self.is_raw_number() {
      Some(f64::from_bits(self.0))
    } else {
      None
    }
  }

  pub fn try_as_bool(self) -> Option<bool> {
    match self {
      Self::TRUE => Some(true),
      Self::FALSE => Some(false),
      _ => None,
    }
  }
}

impl fmt::Debug for WireValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(n) = self.try_as_f64() {
      return f.debug_tuple("Number").field(&n).finish();
    }
    f.debug_struct("WireValue")
      .field("tag", &self.tag())
      .field("id", &self.id())
      .finish()
  }
}

impl From<f64> for WireValue {
  fn from(value: f64) -> Self {
    Self::from_f64(value)
  }
}

impl From<bool> for WireValue {
  fn from(value: bool) -> Self {
    Self::from_bool(value)
  }
}
