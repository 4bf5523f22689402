//! Contract verification module
//!
//! Verifies function contracts (pre/post conditions) using SMT solving.
//!
//! - `hash`: content hashes of contracts and their binding context
//! - `cache`: on-disk proof cache keyed by contract hash
//! - `smt`, `model`, `solver`: SMT-LIB2 translation and the Z3 process
//! - `contract`: the per-contract verification pipeline

pub mod cache;
mod contract;
pub mod hash;
pub mod model;
mod outcome;
mod report;
pub mod smt;
pub mod solver;

pub use cache::{
    clear_directory, CacheEntry, CacheStatistics, CacheSummary, CachedOutcome, SessionStatistics, VerificationCache,
    CACHE_FORMAT_VERSION,
};
pub use contract::{ContractVerifier, INFEASIBLE_PRECONDITION};
pub use hash::{canonicalize, postcondition_key, precondition_key, ContractHash};
pub use outcome::VerificationOutcome;
pub use report::{ContractReport, FileReport, FunctionReport, ObligationKind, OutcomeCounts, RunReport};
pub use smt::{SmtError, SmtSort, SmtTranslator};
pub use solver::{SmtBackend, SolverError, SolverResult, Z3Process};
