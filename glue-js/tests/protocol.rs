mod common;

use common::{recording_closure, FakeModule};
use glue_js::protocol::{self, EMPTY_STRING_PTR};
use glue_js::{
  call_function, type_error, FunctionRef, GlueError, GlueOptions, HostValue, ObjectRef, Tag,
  WireValue,
};

fn prop(m: &mut FakeModule, target: WireValue, name: &str) -> Result<WireValue, GlueError> {
  let (ptr, len) = m.put_str(name);
  protocol::get(m, target, ptr, len)
}

fn invoke(
  m: &mut FakeModule,
  callee: WireValue,
  args: &[WireValue],
) -> Result<(bool, WireValue), GlueError> {
  let (ptr, len) = m.put_args(args);
  protocol::call(m, callee, ptr, len)
}

fn new_string(m: &mut FakeModule, s: &str) -> Result<WireValue, GlueError> {
  let (ptr, len) = m.put_str(s);
  protocol::string_new(m, ptr, len)
}

#[test]
fn string_round_trips_through_module_memory() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let wire = new_string(&mut m, "hi")?;
  assert_eq!(wire.tag(), Some(Tag::String));

  let (ptr, len) = protocol::string_get(&mut m, wire)?;
  assert_eq!(len, 2);
  assert_eq!(m.bytes(ptr, len), &[0x68, 0x69]);

  protocol::decrement_ref_count(&mut m, wire)?;
  assert_eq!(m.live(), 0);
  Ok(())
}

#[test]
fn empty_string_get_does_not_allocate() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let wire = new_string(&mut m, "")?;
  let heap_top = m.heap_top;
  assert_eq!(protocol::string_get(&mut m, wire)?, (EMPTY_STRING_PTR, 0));
  assert_eq!(m.heap_top, heap_top);
  Ok(())
}

#[test]
fn invalid_utf8_is_replaced() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let ptr = 64;
  m.memory[ptr..ptr + 3].copy_from_slice(&[b'o', 0xff, b'k']);
  let wire = protocol::string_new(&mut m, ptr as u32, 3)?;
  assert_eq!(m.glue.decode(wire)?.as_str(), Some("o\u{fffd}k"));
  Ok(())
}

#[test]
fn string_get_writes_into_grown_memory() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let wire = new_string(&mut m, "hello")?;
  let before = m.glue.stats().memory_revalidations;
  let old_len = m.memory.len();

  // The next allocation does not fit and forces a memory reallocation.
  m.heap_top = old_len as u32 - 2;
  let (ptr, len) = protocol::string_get(&mut m, wire)?;
  assert!(m.memory.len() > old_len);
  assert_eq!(m.bytes(ptr, len), b"hello");
  assert!(m.glue.stats().memory_revalidations > before);
  Ok(())
}

#[test]
fn console_log_reaches_the_host() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let console = prop(&mut m, WireValue::GLOBAL, "console")?;
  let log = prop(&mut m, console, "log")?;
  assert_eq!(log.tag(), Some(Tag::Function));
  let text = new_string(&mut m, "hello")?;

  let (ok, result) = invoke(&mut m, log, &[text, WireValue::from_f64(2.0)])?;
  assert!(ok);
  assert_eq!(result, WireValue::UNDEFINED);
  assert_eq!(m.glue.console().lines(), vec!["hello 2".to_string()]);

  for wire in [console, log, text] {
    protocol::decrement_ref_count(&mut m, wire)?;
  }
  assert_eq!(m.live(), 0);
  Ok(())
}

#[test]
fn get_binds_methods_to_their_receiver() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let thing = ObjectRef::new();
  thing.set(
    "whoami",
    HostValue::Function(FunctionRef::native("whoami", |_, this, _| Ok(this.clone()))),
  );
  m.glue.global().set("thing", HostValue::Object(thing.clone()));

  let wire = prop(&mut m, WireValue::GLOBAL, "thing")?;
  let method = prop(&mut m, wire, "whoami")?;
  let (ok, result) = invoke(&mut m, method, &[])?;
  assert!(ok);
  assert_eq!(m.glue.decode(result)?, HostValue::Object(thing));
  Ok(())
}

#[test]
fn missing_property_is_undefined() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  assert_eq!(prop(&mut m, WireValue::GLOBAL, "nope")?, WireValue::UNDEFINED);
  Ok(())
}

#[test]
fn set_then_get() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let object_ctor = prop(&mut m, WireValue::GLOBAL, "Object")?;
  let (ptr, len) = m.put_args(&[]);
  let (ok, obj) = protocol::construct(&mut m, object_ctor, ptr, len)?;
  assert!(ok);

  let (ptr, len) = m.put_str("x");
  protocol::set(&mut m, obj, ptr, len, WireValue::from_f64(5.0))?;
  assert_eq!(prop(&mut m, obj, "x")?.try_as_f64(), Some(5.0));

  let label = new_string(&mut m, "label")?;
  let (ptr, len) = m.put_str("name");
  protocol::set(&mut m, obj, ptr, len, label)?;
  // The property holds the host value, not the slot: releasing the handle keeps it alive.
  protocol::decrement_ref_count(&mut m, label)?;
  let name = prop(&mut m, obj, "name")?;
  assert_eq!(m.glue.decode(name)?.as_str(), Some("label"));
  Ok(())
}

#[test]
fn property_access_on_a_primitive_is_fatal() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let err = prop(&mut m, WireValue::from_f64(1.0), "x").unwrap_err();
  assert!(matches!(err, GlueError::NotAnObject { operation: "get" }));
  assert!(err.is_fatal());

  let s = new_string(&mut m, "str")?;
  let (ptr, len) = m.put_str("x");
  let err = protocol::set(&mut m, s, ptr, len, WireValue::NULL).unwrap_err();
  assert!(matches!(err, GlueError::NotAnObject { operation: "set" }));
  Ok(())
}

#[test]
fn host_exceptions_come_back_as_data() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  m.glue.global().set(
    "explode",
    HostValue::Function(FunctionRef::native("explode", |_, _, _| Err(type_error("boom")))),
  );
  let explode = prop(&mut m, WireValue::GLOBAL, "explode")?;
  let (ok, exception) = invoke(&mut m, explode, &[])?;
  assert!(!ok);

  let exception = m.glue.decode(exception)?;
  let obj = exception.as_object().expect("exception is an object");
  assert_eq!(obj.get("name").as_str(), Some("TypeError"));
  assert_eq!(obj.get("message").as_str(), Some("boom"));
  assert_eq!(exception.describe(), "TypeError: boom");
  Ok(())
}

#[test]
fn calling_a_non_function_throws_a_type_error() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let s = new_string(&mut m, "text")?;
  let (ok, exception) = invoke(&mut m, s, &[])?;
  assert!(!ok);
  assert_eq!(
    m.glue.decode(exception)?.describe(),
    "TypeError: text is not a function"
  );
  Ok(())
}

#[test]
fn construct_builds_error_instances() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let error_ctor = prop(&mut m, WireValue::GLOBAL, "Error")?;
  let message = new_string(&mut m, "bad input")?;
  let (ptr, len) = m.put_args(&[message]);
  let (ok, instance) = protocol::construct(&mut m, error_ctor, ptr, len)?;
  assert!(ok);
  assert_eq!(m.glue.decode(instance)?.describe(), "Error: bad input");
  Ok(())
}

#[test]
fn constructing_a_plain_function_throws() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let math = prop(&mut m, WireValue::GLOBAL, "Math")?;
  let floor = prop(&mut m, math, "floor")?;
  let (ptr, len) = m.put_args(&[WireValue::from_f64(1.5)]);
  let (ok, exception) = protocol::construct(&mut m, floor, ptr, len)?;
  assert!(!ok);
  assert!(m
    .glue
    .decode(exception)?
    .describe()
    .starts_with("TypeError:"));

  let (ok, result) = invoke(&mut m, floor, &[WireValue::from_f64(1.5)])?;
  assert!(ok);
  assert_eq!(result.try_as_f64(), Some(1.0));
  Ok(())
}

#[test]
fn closures_reenter_the_module_with_their_context() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let fn_index = m.add_closure(recording_closure);
  let closure = protocol::closure_new(&mut m, fn_index, 77)?;
  assert_eq!(closure.tag(), Some(Tag::Function));

  // Arguments are accepted but not forwarded.
  let (ok, result) = invoke(&mut m, closure, &[WireValue::from_f64(1.0)])?;
  assert!(ok);
  assert_eq!(result, WireValue::UNDEFINED);
  assert_eq!(m.closure_calls, vec![77]);

  let (ptr, len) = m.put_args(&[]);
  let (ok, instance) = protocol::construct(&mut m, closure, ptr, len)?;
  assert!(ok);
  assert_eq!(instance.tag(), Some(Tag::Object));
  assert_eq!(m.closure_calls, vec![77, 77]);
  Ok(())
}

fn makes_a_string(m: &mut FakeModule, _ctx_ptr: u32) {
  let wire = new_string(m, "inner").expect("reentrant string_new");
  m.produced.push(wire);
}

#[test]
fn host_to_module_to_host_reentry() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  m.glue.global().set(
    "invoke",
    HostValue::Function(FunctionRef::native("invoke", |env, _, args| {
      let callback = args.first().cloned().unwrap_or(HostValue::Undefined);
      call_function(env, &callback, &HostValue::Undefined, &[])
    })),
  );
  let fn_index = m.add_closure(makes_a_string);
  let closure = protocol::closure_new(&mut m, fn_index, 0)?;
  let invoke_fn = prop(&mut m, WireValue::GLOBAL, "invoke")?;

  let live_before = m.live();
  let (ok, _) = invoke(&mut m, invoke_fn, &[closure])?;
  assert!(ok);
  assert_eq!(m.produced.len(), 1);
  assert_eq!(m.live(), live_before + 1);
  let inner = m.produced[0];
  assert_eq!(m.glue.decode(inner)?.as_str(), Some("inner"));
  Ok(())
}

#[test]
fn missing_table_entry_is_fatal() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let closure = protocol::closure_new(&mut m, 9, 0)?;
  let err = invoke(&mut m, closure, &[]).unwrap_err();
  assert!(matches!(err, GlueError::Module(_)));
  Ok(())
}

#[test]
fn string_get_on_a_non_string_is_fatal() {
  let mut m = FakeModule::new();
  let err = protocol::string_get(&mut m, WireValue::GLOBAL).unwrap_err();
  assert!(matches!(err, GlueError::NotAString));
}

#[test]
fn throw_str_carries_the_message() {
  let mut m = FakeModule::new();
  let (ptr, len) = m.put_str("oops");
  let err = protocol::throw_str(&mut m, ptr, len);
  assert!(matches!(&err, GlueError::ModuleThrow(msg) if msg == "oops"));
  assert!(err.is_fatal());
}

#[test]
fn out_of_bounds_arguments_are_fatal() {
  let mut m = FakeModule::new();
  let past_end = m.memory.len() as u32 - 4;
  let err = protocol::call(&mut m, WireValue::GLOBAL, past_end, 1).unwrap_err();
  assert!(matches!(err, GlueError::OutOfBounds { .. }));

  let err = protocol::string_new(&mut m, u32::MAX, 2).unwrap_err();
  assert!(matches!(err, GlueError::OutOfBounds { .. }));
}

#[test]
fn oversized_argument_count_is_rejected_before_reading() {
  let mut m = FakeModule::new();
  let err = protocol::call(&mut m, WireValue::UNDEFINED, 0, u32::MAX).unwrap_err();
  assert!(matches!(err, GlueError::OutOfBounds { ptr: 0, .. }));

  // Fits the multiplication, still far past the end of memory.
  let err = protocol::construct(&mut m, WireValue::UNDEFINED, 0, 1 << 20).unwrap_err();
  assert!(matches!(
    err,
    GlueError::OutOfBounds {
      len: 0x80_0000,
      ..
    }
  ));
  assert_eq!(m.live(), 0);
}

#[test]
fn operations_require_an_attached_module() {
  let mut m = FakeModule::unattached(GlueOptions::default());
  let (ptr, len) = m.put_str("x");
  assert!(matches!(
    protocol::string_new(&mut m, ptr, len),
    Err(GlueError::NotAttached)
  ));
  assert!(matches!(
    protocol::get(&mut m, WireValue::GLOBAL, ptr, len),
    Err(GlueError::NotAttached)
  ));
  assert!(matches!(
    protocol::decrement_ref_count(&mut m, WireValue::NULL),
    Err(GlueError::NotAttached)
  ));
  assert!(matches!(
    protocol::throw_str(&mut m, ptr, len),
    GlueError::NotAttached
  ));
}

#[test]
fn attaching_twice_fails() {
  let mut m = FakeModule::new();
  assert!(matches!(m.glue.attach(), Err(GlueError::AlreadyAttached)));
  assert!(m.glue.is_attached());
}

#[test]
fn glue_object_reports_stats() -> Result<(), GlueError> {
  let mut m = FakeModule::new();
  let version = prop(&mut m, WireValue::GLUE, "version")?;
  assert_eq!(
    m.glue.decode(version)?.as_str(),
    Some(env!("CARGO_PKG_VERSION"))
  );

  let stats = prop(&mut m, WireValue::GLUE, "stats")?;
  let (ok, result) = invoke(&mut m, stats, &[])?;
  assert!(ok);
  let live = prop(&mut m, result, "live")?;
  // `version` and `stats`; the result is encoded after the snapshot is taken.
  assert_eq!(live.try_as_f64(), Some(2.0));
  Ok(())
}

#[test]
fn slot_limit_is_fatal() -> Result<(), GlueError> {
  let mut m = FakeModule::with_options(GlueOptions {
    initial_capacity: 1,
    max_slots: Some(2),
  });
  new_string(&mut m, "a")?;
  new_string(&mut m, "b")?;
  let err = new_string(&mut m, "c").unwrap_err();
  assert!(matches!(err, GlueError::OutOfSlots { max: 2 }));
  Ok(())
}
