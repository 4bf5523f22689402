//! Contract verification logic
//!
//! Discharges each precondition and postcondition of a function as one
//! solver query, consulting the verification cache first.
//!
//! - Precondition: feasibility. `sat` means some input satisfies it.
//! - Postcondition: validity. All preconditions are assumed, `result` is
//!   bound to the body when one is known, and the negated postcondition is
//!   checked; `unsat` means it always holds.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::cache::VerificationCache;
use super::hash::{postcondition_key, precondition_key, ContractHash};
use super::model::Model;
use super::outcome::VerificationOutcome;
use super::report::{ContractReport, FileReport, FunctionReport, ObligationKind, RunReport};
use super::smt::{Declared, SmtError, SmtTranslator};
use super::solver::{SmtBackend, SolverResult, Z3Process};
use crate::config::{CacheConfig, Config};
use crate::contract::{ContractExpr, ContractFile, FunctionContract, RESULT_VAR};

/// Counterexample text for an unsatisfiable precondition
pub const INFEASIBLE_PRECONDITION: &str = "precondition is unsatisfiable";

/// A translated query, ready for the solver
struct Query {
    script: String,
    declared: Vec<Declared>,
}

/// Contract verifier for one session
pub struct ContractVerifier {
    backend: Box<dyn SmtBackend>,
    /// `None` when the solver is unavailable
    build_id: Option<String>,
    timeout: Duration,
    pool: Option<rayon::ThreadPool>,
}

impl ContractVerifier {
    /// Create a verifier, probing the backend for its build identity once.
    pub fn new(backend: Box<dyn SmtBackend>, timeout: Duration) -> Self {
        let build_id = backend.build_id();
        match &build_id {
            Some(id) => info!(solver = %id, "SMT solver available"),
            None => warn!("SMT solver unavailable; contracts will be skipped"),
        }
        Self {
            backend,
            build_id,
            timeout,
            pool: None,
        }
    }

    /// Verifier using the configured Z3 binary, timeout and worker count
    pub fn from_config(config: &Config) -> Self {
        Self::new(Box::new(Z3Process::new(config.solver.path.clone())), config.solver.timeout())
            .with_jobs(config.jobs)
    }

    /// Verify functions on `jobs` worker threads (1 = sequential)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.pool = if jobs > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .inspect_err(|e| warn!(error = %e, "failed to create worker pool; verifying sequentially"))
                .ok()
        } else {
            None
        };
        self
    }

    /// Check if the solver is available
    pub fn is_solver_available(&self) -> bool {
        self.build_id.is_some()
    }

    pub fn solver_build_id(&self) -> Option<&str> {
        self.build_id.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open the cache keyed by this session's solver build.
    ///
    /// Without a solver there is no build identity to validate entries
    /// against, so the cache is disabled.
    pub fn open_cache(&self, config: &CacheConfig) -> VerificationCache {
        match &self.build_id {
            Some(id) => VerificationCache::open(config, id.clone()),
            None => VerificationCache::disabled(),
        }
    }

    /// Verify every file and summarize the run
    pub fn verify_files(&self, files: &[ContractFile], cache: &VerificationCache) -> RunReport {
        let start = Instant::now();
        let reports = files.iter().map(|file| self.verify_file(file, cache)).collect();
        let report = RunReport::new(reports, self.build_id.clone(), cache.statistics(), start.elapsed());
        info!(
            files = files.len(),
            proven = report.totals.proven,
            disproven = report.totals.disproven,
            unproven = report.totals.unproven,
            unsupported = report.totals.unsupported,
            skipped = report.totals.skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "verification run finished"
        );
        report
    }

    /// Verify all functions of one file. Results keep declaration order.
    pub fn verify_file(&self, file: &ContractFile, cache: &VerificationCache) -> FileReport {
        let start = Instant::now();
        let functions: Vec<&FunctionContract> = file.functions.iter().filter(|f| f.has_contracts()).collect();
        let reports: Vec<FunctionReport> = match &self.pool {
            Some(pool) => pool.install(|| {
                functions
                    .par_iter()
                    .map(|func| self.verify_function(func, cache))
                    .collect()
            }),
            None => functions.iter().map(|func| self.verify_function(func, cache)).collect(),
        };
        let report = FileReport {
            path: file.path.clone(),
            functions: reports,
            elapsed: start.elapsed(),
        };
        let counts = report.counts();
        info!(
            path = %file.path.display(),
            contracts = counts.total(),
            proven = counts.proven,
            disproven = counts.disproven,
            "verified file"
        );
        report
    }

    /// Verify a single function's preconditions, then its postconditions
    pub fn verify_function(&self, func: &FunctionContract, cache: &VerificationCache) -> FunctionReport {
        let mut report = FunctionReport::new(&func.name);

        for (i, pre) in func.preconditions.iter().enumerate() {
            let key = precondition_key(&func.params, &pre.condition);
            let (outcome, cached, elapsed) = self.discharge(&key, cache, ObligationKind::Precondition, || {
                self.precondition_query(func, &pre.condition)
            });
            report.contracts.push(self.record(
                func,
                ObligationKind::Precondition,
                i + 1,
                &pre.condition,
                pre.message.clone(),
                key,
                outcome,
                cached,
                elapsed,
            ));
        }

        let assumptions: Vec<&ContractExpr> = func.preconditions.iter().map(|p| &p.condition).collect();
        for (i, post) in func.postconditions.iter().enumerate() {
            let key = postcondition_key(
                &func.params,
                &func.ret_ty,
                assumptions.iter().copied(),
                func.body.as_ref(),
                &post.condition,
            );
            let (outcome, cached, elapsed) = self.discharge(&key, cache, ObligationKind::Postcondition, || {
                self.postcondition_query(func, &assumptions, &post.condition)
            });
            report.contracts.push(self.record(
                func,
                ObligationKind::Postcondition,
                i + 1,
                &post.condition,
                post.message.clone(),
                key,
                outcome,
                cached,
                elapsed,
            ));
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        func: &FunctionContract,
        kind: ObligationKind,
        index: usize,
        condition: &ContractExpr,
        message: Option<String>,
        key: ContractHash,
        outcome: VerificationOutcome,
        cached: bool,
        elapsed: Duration,
    ) -> ContractReport {
        debug!(
            function = %func.name,
            kind = kind.short(),
            index,
            key = %key.short(),
            cached,
            outcome = outcome.label(),
            "contract checked"
        );
        ContractReport {
            kind,
            index,
            condition: condition.to_string(),
            message,
            key: key.to_hex(),
            outcome,
            cached,
            elapsed,
        }
    }

    /// Cache lookup, then translate, solve, classify and store.
    fn discharge(
        &self,
        key: &ContractHash,
        cache: &VerificationCache,
        kind: ObligationKind,
        translate: impl FnOnce() -> std::result::Result<Query, String>,
    ) -> (VerificationOutcome, bool, Duration) {
        let start = Instant::now();
        if self.build_id.is_none() {
            return (VerificationOutcome::Skipped, false, Duration::ZERO);
        }
        if let Some(entry) = cache.lookup(key) {
            return (entry.to_outcome(), true, start.elapsed());
        }

        let query = match translate() {
            Ok(query) => query,
            Err(reason) => {
                debug!(key = %key.short(), %reason, "contract not translatable");
                return (VerificationOutcome::unsupported(reason), false, start.elapsed());
            }
        };

        let outcome = match self.backend.solve(&query.script, self.timeout) {
            Ok(SolverResult::Sat { model }) => match kind {
                ObligationKind::Precondition => VerificationOutcome::Proven,
                ObligationKind::Postcondition => {
                    VerificationOutcome::disproven(counterexample(model.as_ref(), &query.declared))
                }
            },
            Ok(SolverResult::Unsat) => match kind {
                ObligationKind::Precondition => VerificationOutcome::disproven(INFEASIBLE_PRECONDITION),
                ObligationKind::Postcondition => VerificationOutcome::Proven,
            },
            Ok(SolverResult::Unknown { reason }) => {
                debug!(key = %key.short(), %reason, "solver gave no answer");
                VerificationOutcome::Unproven { elapsed: start.elapsed() }
            }
            Ok(SolverResult::Timeout) => VerificationOutcome::Unproven { elapsed: start.elapsed() },
            Err(e) => {
                warn!(key = %key.short(), error = %e, "solver failed");
                VerificationOutcome::Unproven { elapsed: start.elapsed() }
            }
        };

        if outcome.is_cacheable() {
            cache.store(key, &outcome);
        }
        (outcome, false, start.elapsed())
    }

    fn precondition_query(
        &self,
        func: &FunctionContract,
        condition: &ContractExpr,
    ) -> std::result::Result<Query, String> {
        let mut translator = SmtTranslator::new();
        declare_signature(&mut translator, func, &[condition], false).map_err(|e| e.to_string())?;
        translator.assert_expr(condition).map_err(|e| e.to_string())?;
        Ok(Query {
            script: translator.render(self.timeout),
            declared: translator.declared().to_vec(),
        })
    }

    fn postcondition_query(
        &self,
        func: &FunctionContract,
        assumptions: &[&ContractExpr],
        condition: &ContractExpr,
    ) -> std::result::Result<Query, String> {
        let mut mentioned: Vec<&ContractExpr> = assumptions.to_vec();
        mentioned.extend(func.body.as_ref());
        mentioned.push(condition);

        let mut translator = SmtTranslator::new();
        declare_signature(&mut translator, func, &mentioned, true).map_err(|e| e.to_string())?;
        for (i, pre) in assumptions.iter().enumerate() {
            translator
                .assert_expr(pre)
                .map_err(|e| format!("precondition #{}: {e}", i + 1))?;
        }
        if let Some(body) = &func.body {
            translator
                .assert_defines(RESULT_VAR, body)
                .map_err(|e| format!("body: {e}"))?;
        }
        translator.assert_not(condition).map_err(|e| e.to_string())?;
        Ok(Query {
            script: translator.render(self.timeout),
            declared: translator.declared().to_vec(),
        })
    }
}

/// Declare the parameters (and `result`) that the query mentions, in
/// declaration order.
fn declare_signature(
    translator: &mut SmtTranslator,
    func: &FunctionContract,
    exprs: &[&ContractExpr],
    with_result: bool,
) -> std::result::Result<(), SmtError> {
    let mentioned = |name: &str| exprs.iter().any(|e| e.mentions_any(&[name]));
    for param in &func.params {
        if mentioned(&param.name) {
            translator.declare(&param.name, &param.ty)?;
        }
    }
    // A parameter named `result` shadows the return value
    if with_result
        && !func.params.iter().any(|p| p.name == RESULT_VAR)
        && (mentioned(RESULT_VAR) || func.body.is_some())
    {
        translator.declare(RESULT_VAR, &func.ret_ty)?;
    }
    Ok(())
}

/// Render `x = -1, result = 0, len(a) = 3` from a model.
///
/// Scalars come first in declaration order, then array lengths.
fn counterexample(model: Option<&Model>, declared: &[Declared]) -> String {
    let Some(model) = model else {
        return String::new();
    };
    let scalars = declared
        .iter()
        .filter(|d| d.length.is_none())
        .filter_map(|d| model.render(&d.symbol).map(|v| format!("{} = {v}", d.name)));
    let lengths = declared.iter().filter_map(|d| {
        let len = d.length.as_ref()?;
        model.int(len).map(|n| format!("len({}) = {n}", d.name))
    });
    scalars.chain(lengths).collect::<Vec<_>>().join(", ")
}
