//! Runtime check evaluator
//!
//! Runs lowered runtime checks against concrete argument values, the way
//! the emitted code would at a call site.

mod env;
mod error;
mod eval;
mod value;

pub use env::{child_env, EnvRef, Environment};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use eval::{bind_arguments, Evaluator};
pub use value::Value;
