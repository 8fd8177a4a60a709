//! A value bridge between a WebAssembly module and a host object graph.
//!
//! The module has no view of host memory, so host values reach it as 64-bit wire values
//! ([`WireValue`]):
//! - A non-NaN double is itself: numbers cross with no bookkeeping.
//! - Anything else is a quiet NaN carrying a [`Tag`] and a 32-bit id. Ids below
//!   [`MAX_PREDEFINED`] are singletons (`undefined`, `null`, `NaN`, `true`, `false`, the global
//!   object and the glue object). Larger ids address a slot in the [`ValueTable`].
//!
//! # Ownership
//!
//! Every wire value the bridge hands to the module that addresses a table slot carries one count,
//! owned by the module. The module releases it with `decrement_ref_count` and must call
//! `increment_ref_count` before duplicating a handle. The table only counts; it never traces.
//! Values passed *into* bridge operations are borrowed.
//!
//! # Errors
//!
//! Host exceptions raised during `call`/`construct` come back to the module as data
//! (`(false, exception)`). Every other [`GlueError`] is a broken contract between the module and
//! the bridge and must end the module's execution.
//!
//! # Embedding
//!
//! Embedders implement [`ModuleEnv`] over their module instance and route the module's imports to
//! the functions in [`protocol`]. [`FrameLoop`] drives a per-frame tick function.

mod codec;
mod error;
mod frame;
mod glue;
mod globals;
mod memory;
mod module;
mod options;
pub mod protocol;
pub mod surface;
mod table;
mod value;
mod wire;

pub use crate::error::GlueError;
pub use crate::frame::FrameLoop;
pub use crate::frame::FrameLoopState;
pub use crate::frame::FrameScheduler;
pub use crate::frame::ManualScheduler;
pub use crate::globals::Console;
pub use crate::globals::ConsoleLevel;
pub use crate::globals::ConsoleMessage;
pub use crate::glue::Glue;
pub use crate::glue::GlueStats;
pub use crate::memory::MemoryView;
pub use crate::memory::ViewState;
pub use crate::module::ModuleEnv;
pub use crate::options::GlueOptions;
pub use crate::table::TableStats;
pub use crate::table::ValueTable;
pub use crate::table::MAX_ADDRESSABLE_SLOTS;
pub use crate::value::call_function;
pub use crate::value::construct_function;
pub use crate::value::type_error;
pub use crate::value::FunctionKind;
pub use crate::value::FunctionRef;
pub use crate::value::HostValue;
pub use crate::value::NativeCallFn;
pub use crate::value::NativeConstructFn;
pub use crate::value::ObjectRef;
pub use crate::wire::Tag;
pub use crate::wire::WireValue;
pub use crate::wire::MAX_PREDEFINED;
pub use crate::wire::QUIET_NAN;
