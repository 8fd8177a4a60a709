use crate::error::GlueError;
use crate::module::ModuleEnv;
use crate::wire::Tag;
use ahash::HashMap;
use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

/// A native `[[Call]]` entrypoint implemented in Rust.
///
/// Natives receive the module environment so they can re-enter the module (e.g. to invoke a
/// closure passed to them). They must not hold on to any borrow of the bridge across such a call.
pub type NativeCallFn =
  Rc<dyn Fn(&mut dyn ModuleEnv, &HostValue, &[HostValue]) -> Result<HostValue, GlueError>>;

/// A native `[[Construct]]` entrypoint implemented in Rust.
pub type NativeConstructFn =
  Rc<dyn Fn(&mut dyn ModuleEnv, &[HostValue]) -> Result<HostValue, GlueError>>;

/// A value owned by the host.
///
/// This is a closed union: the kind of a value is fixed when it is encoded and recorded in the wire
/// tag, so call sites never inspect it again.
#[derive(Clone)]
pub enum HostValue {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Rc<str>),
  Object(ObjectRef),
  Function(FunctionRef),
}

impl HostValue {
  pub fn string(s: &str) -> Self {
    HostValue::String(Rc::from(s))
  }

  /// The wire tag used when this value is boxed into the value table.
  pub fn tag(&self) -> Tag {
    match self {
      HostValue::Object(_) => Tag::Object,
      HostValue::Function(_) => Tag::Function,
      HostValue::String(_) => Tag::String,
      HostValue::Undefined | HostValue::Null | HostValue::Bool(_) | HostValue::Number(_) => {
        Tag::DontCare
      }
    }
  }

  pub fn is_object_like(&self) -> bool {
    matches!(self, HostValue::Object(_) | HostValue::Function(_))
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      HostValue::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      HostValue::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_object(&self) -> Option<&ObjectRef> {
    match self {
      HostValue::Object(o) => Some(o),
      _ => None,
    }
  }

  pub fn as_function(&self) -> Option<&FunctionRef> {
    match self {
      HostValue::Function(f) => Some(f),
      _ => None,
    }
  }

  /// Property lookup with host semantics: missing properties are `undefined`.
  ///
  /// Returns `None` if the receiver is not an object or function.
  pub fn get_property(&self, key: &str) -> Option<HostValue> {
    match self {
      HostValue::Object(o) => Some(o.get(key)),
      HostValue::Function(f) => Some(f.get(key)),
      _ => None,
    }
  }

  /// Property assignment. Returns `false` if the receiver is not an object or function.
  pub fn set_property(&self, key: &str, value: HostValue) -> bool {
    match self {
      HostValue::Object(o) => {
        o.set(key, value);
        true
      }
      HostValue::Function(f) => {
        f.set(key, value);
        true
      }
      _ => false,
    }
  }

  /// `SameValue` with reference identity for objects and functions.
  ///
  /// `NaN` is the same as `NaN`; `+0` and `-0` are distinct.
  pub fn same_value(&self, other: &Self) -> bool {
    match (self, other) {
      (HostValue::Number(a), HostValue::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          return true;
        }
        a.to_bits() == b.to_bits()
      }
      _ => self == other,
    }
  }

  /// A short human-readable rendering, used for console output and error messages.
  pub fn describe(&self) -> String {
    match self {
      HostValue::Undefined => "undefined".to_string(),
      HostValue::Null => "null".to_string(),
      HostValue::Bool(b) => b.to_string(),
      HostValue::Number(n) => format_number(*n),
      HostValue::String(s) => s.to_string(),
      HostValue::Object(o) => {
        if o.is_error() {
          let name = o.get("name");
          let message = o.get("message");
          match (name.as_str(), message.as_str()) {
            (Some(name), Some(message)) if !message.is_empty() => format!("{name}: {message}"),
            (Some(name), _) => name.to_string(),
            _ => "Error".to_string(),
          }
        } else {
          "[object Object]".to_string()
        }
      }
      HostValue::Function(f) => format!("function {}()", f.name()),
    }
  }
}

fn format_number(n: f64) -> String {
  if n.is_nan() {
    "NaN".to_string()
  } else if n.is_infinite() {
    let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
    s.to_string()
  } else if n == 0.0 {
    // Covers -0.
    "0".to_string()
  } else if n == n.trunc() && n.abs() < 1e21 {
    format!("{n:.0}")
  } else {
    n.to_string()
  }
}

/// Strict equality: numbers compare by IEEE-754 `==`, objects and functions by identity.
impl PartialEq for HostValue {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (HostValue::Undefined, HostValue::Undefined) => true,
      (HostValue::Null, HostValue::Null) => true,
      (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
      (HostValue::Number(a), HostValue::Number(b)) => a == b,
      (HostValue::String(a), HostValue::String(b)) => a == b,
      (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
      (HostValue::Function(a), HostValue::Function(b)) => a.ptr_eq(b),
      _ => false,
    }
  }
}

impl fmt::Debug for HostValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HostValue::Undefined => f.write_str("Undefined"),
      HostValue::Null => f.write_str("Null"),
      HostValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
      HostValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
      HostValue::String(s) => f.debug_tuple("String").field(s).finish(),
      HostValue::Object(o) => f.debug_tuple("Object").field(&o.class()).finish(),
      HostValue::Function(func) => f.debug_tuple("Function").field(&func.name()).finish(),
    }
  }
}

impl From<bool> for HostValue {
  fn from(value: bool) -> Self {
    HostValue::Bool(value)
  }
}

impl From<f64> for HostValue {
  fn from(value: f64) -> Self {
    HostValue::Number(value)
  }
}

impl From<&str> for HostValue {
  fn from(value: &str) -> Self {
    HostValue::string(value)
  }
}

impl From<ObjectRef> for HostValue {
  fn from(value: ObjectRef) -> Self {
    HostValue::Object(value)
  }
}

impl From<FunctionRef> for HostValue {
  fn from(value: FunctionRef) -> Self {
    HostValue::Function(value)
  }
}

#[derive(Default)]
struct ObjectData {
  class: &'static str,
  props: HashMap<Rc<str>, HostValue>,
}

/// A shared, mutable host object with reference identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
  pub fn new() -> Self {
    Self::with_class("Object")
  }

  pub fn with_class(class: &'static str) -> Self {
    Self(Rc::new(RefCell::new(ObjectData {
      class,
      props: HashMap::default(),
    })))
  }

  /// Creates an error object (`name`/`message` properties), the value thrown by host natives.
  pub fn error(name: &str, message: &str) -> Self {
    let obj = Self::with_class("Error");
    obj.set("name", HostValue::string(name));
    obj.set("message", HostValue::string(message));
    obj
  }

  pub fn class(&self) -> &'static str {
    self.0.borrow().class
  }

  pub fn is_error(&self) -> bool {
    self.class() == "Error"
  }

  pub fn get(&self, key: &str) -> HostValue {
    self
      .0
      .borrow()
      .props
      .get(key)
      .cloned()
      .unwrap_or(HostValue::Undefined)
  }

  pub fn set(&self, key: &str, value: HostValue) {
    self.0.borrow_mut().props.insert(Rc::from(key), value);
  }

  pub fn has(&self, key: &str) -> bool {
    self.0.borrow().props.contains_key(key)
  }

  /// Property names, sorted.
  pub fn keys(&self) -> Vec<Rc<str>> {
    let mut keys: Vec<_> = self.0.borrow().props.keys().cloned().collect();
    keys.sort();
    keys
  }

  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }
}

impl Default for ObjectRef {
  fn default() -> Self {
    Self::new()
  }
}

/// What happens when a function is invoked.
#[derive(Clone)]
pub enum FunctionKind {
  Native {
    call: NativeCallFn,
    construct: Option<NativeConstructFn>,
  },
  /// Created by `closure_new`: re-enters the module through its indirect function table.
  ModuleClosure { fn_index: u32, ctx_ptr: u32 },
  /// A function with a fixed receiver, produced when `get` returns a method.
  Bound { target: FunctionRef, this: HostValue },
}

struct FunctionData {
  name: Rc<str>,
  kind: FunctionKind,
  props: RefCell<HashMap<Rc<str>, HostValue>>,
}

/// A host function with reference identity.
#[derive(Clone)]
pub struct FunctionRef(Rc<FunctionData>);

impl FunctionRef {
  pub fn new(name: &str, kind: FunctionKind) -> Self {
    Self(Rc::new(FunctionData {
      name: Rc::from(name),
      kind,
      props: RefCell::new(HashMap::default()),
    }))
  }

  /// A callable, non-constructable native function.
  pub fn native<F>(name: &str, call: F) -> Self
  where
    F: Fn(&mut dyn ModuleEnv, &HostValue, &[HostValue]) -> Result<HostValue, GlueError> + 'static,
  {
    Self::new(
      name,
      FunctionKind::Native {
        call: Rc::new(call),
        construct: None,
      },
    )
  }

  /// A native function that is also a constructor.
  pub fn native_constructor<F, C>(name: &str, call: F, construct: C) -> Self
  where
    F: Fn(&mut dyn ModuleEnv, &HostValue, &[HostValue]) -> Result<HostValue, GlueError> + 'static,
    C: Fn(&mut dyn ModuleEnv, &[HostValue]) -> Result<HostValue, GlueError> + 'static,
  {
    Self::new(
      name,
      FunctionKind::Native {
        call: Rc::new(call),
        construct: Some(Rc::new(construct)),
      },
    )
  }

  pub fn closure(fn_index: u32, ctx_ptr: u32) -> Self {
    Self::new("", FunctionKind::ModuleClosure { fn_index, ctx_ptr })
  }

  /// `Function.prototype.bind(this)` without partial arguments.
  pub fn bind(&self, this: HostValue) -> Self {
    let name = format!("bound {}", self.name());
    Self::new(
      &name,
      FunctionKind::Bound {
        target: self.clone(),
        this,
      },
    )
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn kind(&self) -> &FunctionKind {
    &self.0.kind
  }

  pub fn is_constructor(&self) -> bool {
    match &self.0.kind {
      FunctionKind::Native { construct, .. } => construct.is_some(),
      FunctionKind::ModuleClosure { .. } => true,
      FunctionKind::Bound { target, .. } => target.is_constructor(),
    }
  }

  pub fn get(&self, key: &str) -> HostValue {
    if let Some(v) = self.0.props.borrow().get(key) {
      return v.clone();
    }
    match key {
      "name" => HostValue::string(self.name()),
      _ => HostValue::Undefined,
    }
  }

  pub fn set(&self, key: &str, value: HostValue) {
    self.0.props.borrow_mut().insert(Rc::from(key), value);
  }

  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }
}

/// Creates a `TypeError` exception, ready to be returned from a native.
pub fn type_error(message: &str) -> GlueError {
  GlueError::Throw(HostValue::Object(ObjectRef::error("TypeError", message)))
}

/// Invokes `callee` with an explicit receiver.
///
/// Calling a value that is not a function throws a `TypeError`, as the host would.
pub fn call_function(
  env: &mut dyn ModuleEnv,
  callee: &HostValue,
  this: &HostValue,
  args: &[HostValue],
) -> Result<HostValue, GlueError> {
  let Some(func) = callee.as_function() else {
    return Err(type_error(&format!("{} is not a function", callee.describe())));
  };
  match func.kind() {
    FunctionKind::Native { call, .. } => {
      let call = Rc::clone(call);
      call(env, this, args)
    }
    FunctionKind::ModuleClosure { fn_index, ctx_ptr } => {
      invoke_closure(env, *fn_index, *ctx_ptr, args)?;
      Ok(HostValue::Undefined)
    }
    FunctionKind::Bound { target, this } => {
      call_function(env, &HostValue::Function(target.clone()), this, args)
    }
  }
}

/// Invokes `callee` as a constructor.
pub fn construct_function(
  env: &mut dyn ModuleEnv,
  callee: &HostValue,
  args: &[HostValue],
) -> Result<HostValue, GlueError> {
  let Some(func) = callee.as_function() else {
    return Err(type_error(&format!("{} is not a constructor", callee.describe())));
  };
  match func.kind() {
    FunctionKind::Native {
      construct: Some(construct),
      ..
    } => {
      let construct = Rc::clone(construct);
      construct(env, args)
    }
    FunctionKind::Native { construct: None, .. } => Err(type_error(&format!(
      "{} is not a constructor",
      func.name()
    ))),
    FunctionKind::ModuleClosure { fn_index, ctx_ptr } => {
      // A constructed function that returns undefined yields the freshly created receiver.
      invoke_closure(env, *fn_index, *ctx_ptr, args)?;
      Ok(HostValue::Object(ObjectRef::new()))
    }
    FunctionKind::Bound { target, .. } => {
      construct_function(env, &HostValue::Function(target.clone()), args)
    }
  }
}

fn invoke_closure(
  env: &mut dyn ModuleEnv,
  fn_index: u32,
  ctx_ptr: u32,
  args: &[HostValue],
) -> Result<(), GlueError> {
  // The module-side closure signature has no room for arguments; they are dropped.
  if !args.is_empty() {
    tracing::warn!(
      fn_index,
      discarded = args.len(),
      "module closure invoked with arguments; they are not forwarded"
    );
  }
  env.invoke_closure(fn_index, ctx_ptr)
}
