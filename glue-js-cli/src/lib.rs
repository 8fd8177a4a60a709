//! Runs WebAssembly modules against the `glue-js` value bridge.

pub mod config;
pub mod runtime;

pub use config::RunConfig;
pub use runtime::Runtime;
