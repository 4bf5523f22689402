//! Integration tests for the Covenant contract core
//!
//! Exercises the full pipeline:
//! - Contract files loaded from JSON
//! - Verification through a scripted solver backend
//! - Cache reuse, invalidation, eviction and corruption handling
//! - Runtime checks evaluated against concrete arguments
//! - Real Z3, when installed

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use covenant::config::CacheConfig;
use covenant::contract::{BinOp, BoundVar, ContractExpr, ContractFile, FunctionContract, Param, Type};
use covenant::interp::{bind_arguments, Evaluator};
use covenant::quantifier::{file_runtime_checks, lower_runtime_check, CheckSite};
use covenant::verify::{
    postcondition_key, precondition_key, CacheSummary, ContractVerifier, RunReport, SessionStatistics, SmtBackend,
    SolverError, SolverResult, VerificationCache, VerificationOutcome, Z3Process,
};
use tempfile::TempDir;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/search.json");

/// Backend whose answers are a pure function of the script
struct Scripted {
    build_id: Option<String>,
    calls: Arc<AtomicUsize>,
    answer: fn(&str) -> SolverResult,
}

impl SmtBackend for Scripted {
    fn build_id(&self) -> Option<String> {
        self.build_id.clone()
    }

    fn solve(&self, script: &str, _timeout: Duration) -> Result<SolverResult, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.answer)(script))
    }
}

/// Preconditions feasible, postconditions valid
fn always_holds(script: &str) -> SolverResult {
    if script.contains("(assert (not ") {
        SolverResult::Unsat
    } else {
        SolverResult::Sat { model: None }
    }
}

fn always_times_out(_script: &str) -> SolverResult {
    SolverResult::Timeout
}

/// Helper to build a verifier around a scripted backend and return its call counter
fn scripted(build_id: Option<&str>, answer: fn(&str) -> SolverResult) -> (ContractVerifier, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = Scripted {
        build_id: build_id.map(str::to_string),
        calls: Arc::clone(&calls),
        answer,
    };
    (ContractVerifier::new(Box::new(backend), Duration::from_secs(1)), calls)
}

/// Helper to run one verification session against a cache directory
fn run_session(
    verifier: &ContractVerifier,
    files: &[ContractFile],
    config: &CacheConfig,
) -> RunReport {
    let cache = verifier.open_cache(config);
    let report = verifier.verify_files(files, &cache);
    cache.close();
    report
}

fn fixture() -> ContractFile {
    ContractFile::load(Path::new(FIXTURE)).unwrap()
}

fn var(name: &str) -> ContractExpr {
    ContractExpr::var(name)
}

fn all_in_range(bound: &str, lo: i64) -> ContractExpr {
    ContractExpr::forall(
        vec![BoundVar::int(bound)],
        ContractExpr::implies(
            ContractExpr::and(
                ContractExpr::binary(var(bound), BinOp::Ge, ContractExpr::int(lo)),
                ContractExpr::binary(var(bound), BinOp::Lt, ContractExpr::len(var("a"))),
            ),
            ContractExpr::binary(ContractExpr::index(var("a"), var(bound)), BinOp::Ge, ContractExpr::int(0)),
        ),
    )
}

fn outcomes(report: &RunReport) -> Vec<VerificationOutcome> {
    report
        .files
        .iter()
        .flat_map(|f| f.contracts())
        .map(|(_, c)| c.outcome.clone())
        .collect()
}

// ============================================
// Contract Files
// ============================================

#[test]
fn test_fixture_loads() {
    let file = fixture();
    assert_eq!(file.path, Path::new("src/search.cov"));
    assert_eq!(file.functions.len(), 2);
    assert_eq!(file.contract_count(), 4);
    assert_eq!(file.assertions.len(), 1);
    assert_eq!(file.functions[1].params[0].ty, Type::array_of(Type::Int));
}

#[test]
fn test_missing_contract_file_is_io_error() {
    let err = ContractFile::load(Path::new("/nonexistent/contracts.json")).unwrap_err();
    assert_eq!(err.kind(), "IO");
}

#[test]
fn test_empty_path_defaults_to_file_location() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.json");
    fs::write(&path, r#"{"functions": []}"#).unwrap();
    assert_eq!(ContractFile::load(&path).unwrap().path, path);
}

// ============================================
// Verification Cache
// ============================================

#[test]
fn test_second_run_is_answered_from_cache() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let files = [fixture()];

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let first = run_session(&verifier, &files, &config);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(first.totals.proven, 4);
    assert_eq!(first.cache.writes, 4);

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let second = run_session(&verifier, &files, &config);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.cache.hits, 4);
    assert_eq!(outcomes(&first), outcomes(&second));
    assert!(second.files[0].contracts().all(|(_, c)| c.cached));
}

#[test]
fn test_solver_upgrade_invalidates_entries() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let files = [fixture()];

    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    run_session(&verifier, &files, &config);

    let (verifier, calls) = scripted(Some("4.13.0"), always_holds);
    let report = run_session(&verifier, &files, &config);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.cache.hits, 0);
    assert_eq!(report.cache.errors, 0);
}

#[test]
fn test_unproven_is_never_cached() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let files = [fixture()];

    for _ in 0..2 {
        let (verifier, calls) = scripted(Some("4.12.0"), always_times_out);
        let report = run_session(&verifier, &files, &config);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.totals.unproven, 4);
    }
    assert_eq!(CacheSummary::inspect(dir.path()).unwrap().entries, 0);
}

#[test]
fn test_unsupported_contract_skips_solver_and_cache() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let file = ContractFile {
        functions: vec![FunctionContract::new("greet", vec![Param::new("name", Type::String)], Type::Bool)
            .with_pre(ContractExpr::binary(var("name"), BinOp::Ne, ContractExpr::string("")))],
        ..ContractFile::default()
    };

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let report = run_session(&verifier, &[file], &config);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.totals.unsupported, 1);
    assert_eq!(report.cache.writes, 0);
}

#[test]
fn test_editing_a_precondition_invalidates_postconditions() {
    let params = vec![Param::new("x", Type::Int)];
    let post = ContractExpr::binary(var("result"), BinOp::Ge, ContractExpr::int(0));
    let before = ContractExpr::binary(var("x"), BinOp::Ge, ContractExpr::int(0));
    let after = ContractExpr::binary(var("x"), BinOp::Gt, ContractExpr::int(0));

    let key_before = postcondition_key(&params, &Type::Int, [&before], None, &post);
    let key_after = postcondition_key(&params, &Type::Int, [&after], None, &post);
    assert_ne!(key_before, key_after);

    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let func = |pre: &ContractExpr| ContractFile {
        functions: vec![FunctionContract::new("f", params.clone(), Type::Int)
            .with_pre(pre.clone())
            .with_post(post.clone())],
        ..ContractFile::default()
    };

    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    run_session(&verifier, &[func(&before)], &config);

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let report = run_session(&verifier, &[func(&after)], &config);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.cache.hits, 0);
}

#[test]
fn test_messages_and_bound_names_do_not_affect_keys() {
    let params = vec![Param::new("a", Type::array_of(Type::Int))];
    assert_eq!(
        precondition_key(&params, &all_in_range("i", 0)),
        precondition_key(&params, &all_in_range("j", 0))
    );
    assert_ne!(
        precondition_key(&params, &all_in_range("i", 0)),
        precondition_key(&params, &all_in_range("i", 1))
    );

    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let file = |bound: &str, message: &str| {
        let mut func = FunctionContract::new("nonneg", params.clone(), Type::Bool).with_pre(all_in_range(bound, 0));
        func.preconditions[0].message = Some(message.to_string());
        ContractFile {
            functions: vec![func],
            ..ContractFile::default()
        }
    };

    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    run_session(&verifier, &[file("i", "elements are non-negative")], &config);
    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let report = run_session(&verifier, &[file("k", "no negatives")], &config);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.cache.hits, 1);
}

#[test]
fn test_size_bound_evicts_entries() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path()).with_max_size(2_000);
    let file = ContractFile {
        functions: (0..20)
            .map(|i| {
                FunctionContract::new(format!("f{i}"), vec![Param::new("x", Type::Int)], Type::Int)
                    .with_pre(ContractExpr::binary(var("x"), BinOp::Gt, ContractExpr::int(i)))
            })
            .collect(),
        ..ContractFile::default()
    };

    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    let report = run_session(&verifier, &[file], &config);
    assert_eq!(report.cache.writes, 20);
    assert!(report.cache.evictions > 0);

    let summary = CacheSummary::inspect(dir.path()).unwrap();
    assert!(summary.total_bytes <= 2_000, "{} bytes cached", summary.total_bytes);
    assert!(summary.entries < 20);
}

#[test]
fn test_corrupted_entries_are_recomputed() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let files = [fixture()];

    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    let first = run_session(&verifier, &files, &config);

    for entry in fs::read_dir(dir.path().join("entries")).unwrap() {
        fs::write(entry.unwrap().path(), b"{ truncated").unwrap();
    }

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let second = run_session(&verifier, &files, &config);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(second.cache.errors, 4);
    assert_eq!(outcomes(&first), outcomes(&second));
}

#[test]
fn test_disabled_cache_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let config = CacheConfig {
        enabled: false,
        ..CacheConfig::at(&cache_dir)
    };

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    run_session(&verifier, &[fixture()], &config);
    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    let report = run_session(&verifier, &[fixture()], &config);

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.cache.lookups(), 0);
    assert!(!cache_dir.exists());
}

#[test]
fn test_unusable_cache_directory_does_not_stop_verification() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("not_a_dir");
    fs::write(&not_a_dir, b"plain file").unwrap();
    let config = CacheConfig::at(&not_a_dir);

    let (verifier, calls) = scripted(Some("4.12.0"), always_holds);
    let report = run_session(&verifier, &[fixture()], &config);

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.totals.proven, 4);
    assert_eq!(report.cache.errors, 1);
    assert_eq!((report.cache.lookups(), report.cache.writes), (0, 0));
    assert_eq!(fs::read(&not_a_dir).unwrap(), b"plain file");
}

#[test]
fn test_session_statistics_flushed_on_close() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::at(dir.path());
    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    run_session(&verifier, &[fixture()], &config);

    let session = SessionStatistics::load(dir.path()).unwrap().unwrap();
    assert_eq!(session.solver_build_id, "4.12.0");
    assert_eq!(session.statistics.misses, 4);
    assert_eq!(session.statistics.writes, 4);
}

#[test]
fn test_statistics_flushed_when_session_is_dropped() {
    let dir = TempDir::new().unwrap();
    {
        let (verifier, _) = scripted(Some("4.12.0"), always_holds);
        let cache = verifier.open_cache(&CacheConfig::at(dir.path()));
        verifier.verify_files(&[fixture()], &cache);
    }
    assert!(SessionStatistics::load(dir.path()).unwrap().is_some());
}

// ============================================
// Solver Availability
// ============================================

#[test]
fn test_unavailable_solver_skips_all_contracts() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    let (verifier, calls) = scripted(None, always_holds);
    let report = run_session(&verifier, &[fixture()], &CacheConfig::at(&cache_dir));

    assert!(!report.solver_available);
    assert_eq!(report.totals.skipped, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!cache_dir.exists());
    assert!(report.to_string().contains("solver: unavailable"));
}

#[test]
fn test_parallel_run_matches_sequential() {
    let files = [fixture()];
    let (sequential, _) = scripted(Some("4.12.0"), always_holds);
    let (parallel, _) = scripted(Some("4.12.0"), always_holds);
    let parallel = parallel.with_jobs(4);

    let a = sequential.verify_files(&files, &VerificationCache::disabled());
    let b = parallel.verify_files(&files, &VerificationCache::disabled());
    assert_eq!(outcomes(&a), outcomes(&b));
    let names = |r: &RunReport| r.files[0].functions.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&a), names(&b));
}

#[test]
fn test_json_report_round_trips_through_serde_json() {
    let (verifier, _) = scripted(Some("4.12.0"), always_holds);
    let report = verifier.verify_files(&[fixture()], &VerificationCache::disabled());
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["solver_build_id"], "4.12.0");
    assert_eq!(json["files"][0]["path"], "src/search.cov");
    assert_eq!(json["files"][0]["functions"][0]["contracts"][1]["message"], "abs is never negative");
}

// ============================================
// Runtime Checks
// ============================================

#[test]
fn test_fixture_runtime_checks() {
    let checks = file_runtime_checks(&fixture());
    assert_eq!(checks.len(), 5);

    // `i + 1 < len(a)` does not bound `i` directly
    let sorted = &checks[2];
    assert_eq!((sorted.function.as_str(), sorted.site), ("binary_search", CheckSite::Precondition(1)));
    assert!(!sorted.check.is_executable());
    assert!(sorted.check.annotations()[0].contains("`i`"));

    let found = &checks[4];
    assert_eq!(found.site, CheckSite::Assertion(1));
    assert_eq!(
        found.check.fragment().as_deref(),
        Some("(0..a.len()).any(|k| (a[k] == key))")
    );
}

#[test]
fn test_runtime_check_evaluates_against_arguments() {
    let file = fixture();
    let search = &file.functions[1];
    let check = lower_runtime_check(&file.assertions[0].expr);

    let args = serde_json::json!({ "a": [1, 3, 5, 7], "key": 5 });
    let env = bind_arguments(&search.params, args.as_object().unwrap()).unwrap();
    assert_eq!(Evaluator::new().check(&check, &env).unwrap(), Some(true));

    let args = serde_json::json!({ "a": [], "key": 5 });
    let env = bind_arguments(&search.params, args.as_object().unwrap()).unwrap();
    assert_eq!(Evaluator::new().check(&check, &env).unwrap(), Some(false));

    // Static-only checks are not evaluated
    let sorted = lower_runtime_check(&search.preconditions[0].condition);
    assert_eq!(Evaluator::new().check(&sorted, &env).unwrap(), None);
}

#[test]
fn test_runtime_and_solver_agree_on_bounded_forall() {
    let expr = all_in_range("i", 0);
    let check = lower_runtime_check(&expr);
    assert_eq!(
        check.fragment().as_deref(),
        Some("(0..a.len()).all(|i| (a[i] >= 0))")
    );

    let params = [Param::new("a", Type::array_of(Type::Int))];
    for (values, expected) in [(serde_json::json!([0, 4, 2]), true), (serde_json::json!([3, -1]), false)] {
        let args = serde_json::json!({ "a": values });
        let env = bind_arguments(&params, args.as_object().unwrap()).unwrap();
        assert_eq!(Evaluator::new().check(&check, &env).unwrap(), Some(expected));
    }
}

// ============================================
// Real Solver
// ============================================

#[test]
fn test_z3_end_to_end_when_installed() {
    if !Z3Process::default().is_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let verifier = ContractVerifier::new(Box::new(Z3Process::default()), Duration::from_secs(10));
    let report = run_session(&verifier, &[fixture()], &CacheConfig::at(dir.path()));

    let abs = &report.files[0].functions[0];
    assert!(abs.is_verified(), "{abs}");

    // Without a body, `result` is unconstrained
    let search = &report.files[0].functions[1];
    assert_eq!(search.contracts[0].outcome, VerificationOutcome::Proven);
    let VerificationOutcome::Disproven { counterexample } = &search.contracts[1].outcome else {
        panic!("expected a counterexample, got {}", search.contracts[1].outcome);
    };
    assert!(counterexample.contains("result = "), "{counterexample}");
    assert!(counterexample.contains("len(a) = "), "{counterexample}");
}

#[test]
fn test_z3_infeasible_precondition_when_installed() {
    if !Z3Process::default().is_available() {
        return;
    }
    let verifier = ContractVerifier::new(Box::new(Z3Process::default()), Duration::from_secs(10));
    let func = FunctionContract::new("never", vec![Param::new("x", Type::Int)], Type::Int).with_pre(ContractExpr::and(
        ContractExpr::binary(var("x"), BinOp::Gt, ContractExpr::int(3)),
        ContractExpr::binary(var("x"), BinOp::Lt, ContractExpr::int(2)),
    ));
    let report = verifier.verify_function(&func, &VerificationCache::disabled());
    assert!(report.has_failure());
}
