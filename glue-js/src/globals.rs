//! Default contents of the host's global object.

use crate::error::GlueError;
use crate::module::ModuleEnv;
use crate::value::{FunctionRef, HostValue, ObjectRef};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
  Debug,
  Info,
  Log,
  Warn,
  Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConsoleMessage {
  pub level: ConsoleLevel,
  pub text: String,
}

/// Sink for `console.*` output.
///
/// Messages are emitted as `tracing` events under the `glue_js::console` target and also kept
/// here so embedders can inspect them.
#[derive(Clone, Default)]
pub struct Console(Rc<RefCell<Vec<ConsoleMessage>>>);

impl Console {
  pub fn push(&self, level: ConsoleLevel, text: String) {
    match level {
      ConsoleLevel::Debug => tracing::debug!(target: "glue_js::console", "{text}"),
      ConsoleLevel::Info | ConsoleLevel::Log => tracing::info!(target: "glue_js::console", "{text}"),
      ConsoleLevel::Warn => tracing::warn!(target: "glue_js::console", "{text}"),
      ConsoleLevel::Error => tracing::error!(target: "glue_js::console", "{text}"),
    }
    self.0.borrow_mut().push(ConsoleMessage { level, text });
  }

  pub fn messages(&self) -> Vec<ConsoleMessage> {
    self.0.borrow().clone()
  }

  /// The text of every message, in order.
  pub fn lines(&self) -> Vec<String> {
    self.0.borrow().iter().map(|m| m.text.clone()).collect()
  }

  pub fn clear(&self) {
    self.0.borrow_mut().clear();
  }
}

fn method<F>(target: &ObjectRef, name: &str, call: F)
where
  F: Fn(&mut dyn ModuleEnv, &HostValue, &[HostValue]) -> Result<HostValue, GlueError> + 'static,
{
  target.set(name, HostValue::Function(FunctionRef::native(name, call)));
}

fn number_arg(args: &[HostValue], i: usize) -> f64 {
  match args.get(i) {
    Some(HostValue::Number(n)) => *n,
    Some(HostValue::Bool(b)) => f64::from(u8::from(*b)),
    Some(HostValue::Null) => 0.0,
    _ => f64::NAN,
  }
}

fn error_from_args(name: &'static str, args: &[HostValue]) -> HostValue {
  let message = match args.first() {
    None | Some(HostValue::Undefined) => String::new(),
    Some(v) => v.describe(),
  };
  HostValue::Object(ObjectRef::error(name, &message))
}

fn install_console(global: &ObjectRef, sink: &Console) {
  let console = ObjectRef::new();
  for (name, level) in [
    ("debug", ConsoleLevel::Debug),
    ("info", ConsoleLevel::Info),
    ("log", ConsoleLevel::Log),
    ("warn", ConsoleLevel::Warn),
    ("error", ConsoleLevel::Error),
  ] {
    let sink = sink.clone();
    method(&console, name, move |_env, _this, args| {
      let text = args
        .iter()
        .map(HostValue::describe)
        .collect::<Vec<_>>()
        .join(" ");
      sink.push(level, text);
      Ok(HostValue::Undefined)
    });
  }
  global.set("console", HostValue::Object(console));
}

fn install_math(global: &ObjectRef) {
  let math = ObjectRef::new();
  method(&math, "floor", |_, _, args| {
    Ok(HostValue::Number(number_arg(args, 0).floor()))
  });
  method(&math, "sqrt", |_, _, args| {
    Ok(HostValue::Number(number_arg(args, 0).sqrt()))
  });
  method(&math, "abs", |_, _, args| {
    Ok(HostValue::Number(number_arg(args, 0).abs()))
  });
  method(&math, "min", |_, _, args| {
    let mut out = f64::INFINITY;
    for i in 0..args.len() {
      let n = number_arg(args, i);
      if n.is_nan() {
        return Ok(HostValue::Number(f64::NAN));
      }
      out = out.min(n);
    }
    Ok(HostValue::Number(out))
  });
  method(&math, "max", |_, _, args| {
    let mut out = f64::NEG_INFINITY;
    for i in 0..args.len() {
      let n = number_arg(args, i);
      if n.is_nan() {
        return Ok(HostValue::Number(f64::NAN));
      }
      out = out.max(n);
    }
    Ok(HostValue::Number(out))
  });
  global.set("Math", HostValue::Object(math));
}

fn install_performance(global: &ObjectRef) {
  let started = Instant::now();
  let performance = ObjectRef::new();
  method(&performance, "now", move |_, _, _| {
    Ok(HostValue::Number(started.elapsed().as_secs_f64() * 1000.0))
  });
  global.set("performance", HostValue::Object(performance));
}

fn install_constructors(global: &ObjectRef) {
  global.set(
    "Object",
    HostValue::Function(FunctionRef::native_constructor(
      "Object",
      |_, _, args| match args.first() {
        Some(v) if v.is_object_like() => Ok(v.clone()),
        _ => Ok(HostValue::Object(ObjectRef::new())),
      },
      |_, _| Ok(HostValue::Object(ObjectRef::new())),
    )),
  );
  for name in ["Error", "TypeError"] {
    global.set(
      name,
      HostValue::Function(FunctionRef::native_constructor(
        name,
        move |_, _, args| Ok(error_from_args(name, args)),
        move |_, args| Ok(error_from_args(name, args)),
      )),
    );
  }
}

/// Populates `global` with the default host environment.
pub fn install(global: &ObjectRef, console: &Console) {
  install_console(global, console);
  install_math(global);
  install_performance(global);
  install_constructors(global);
}
