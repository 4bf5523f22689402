//! Covenant contract core
//!
//! Compiles quantified contracts into runtime checks, proves them with an
//! SMT solver, and remembers the proofs in a content-addressed cache.

pub mod config;
pub mod contract;
pub mod error;
pub mod interp;
pub mod quantifier;
pub mod verify;

pub use config::Config;
pub use contract::{ContractExpr, ContractFile, FunctionContract, Span};
pub use error::{CovenantError, Result};
