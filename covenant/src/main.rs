//! Covenant CLI

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::Level;

use covenant::config::{Config, Overrides};
use covenant::contract::{ContractFile, RESULT_VAR};
use covenant::interp::{bind_arguments, Evaluator, Value};
use covenant::quantifier::{file_runtime_checks, lower_runtime_check};
use covenant::verify::{clear_directory, postcondition_key, precondition_key, CacheSummary, ContractVerifier};

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "covenant", version, about = "Covenant - quantified-contract verification")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prove contracts with the SMT solver
    Verify {
        /// Contract files (JSON) to verify
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        settings: Settings,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,

        /// Exit with failure when any contract is disproven
        #[arg(long)]
        deny_disproven: bool,
    },
    /// Emit runtime checks for every contract and inline assertion
    Runtime {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,
    },
    /// Evaluate a function's runtime checks against concrete arguments
    Check {
        file: PathBuf,

        /// Function whose contracts to evaluate
        #[arg(long)]
        function: String,

        /// Arguments as a JSON object, e.g. '{"x": 3, "a": [1, 2]}'
        #[arg(long)]
        args: String,

        /// Return value as JSON; enables postcondition checks
        #[arg(long)]
        result: Option<String>,
    },
    /// Print the cache key of every contract
    Hash { file: PathBuf },
    /// Inspect or clear the verification cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Configuration file (default: ./covenant.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count, size and last-session statistics
    Stats,
    /// Remove every cached entry
    Clear,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Human,
    Json,
}

/// Settings that override `covenant.toml`
#[derive(Args)]
struct Settings {
    /// Configuration file (default: ./covenant.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the verification cache
    #[arg(long)]
    no_cache: bool,

    /// Cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Maximum cache size in bytes (0 = unlimited)
    #[arg(long)]
    max_cache_size: Option<u64>,

    /// Empty the cache before verifying
    #[arg(long)]
    clear_cache: bool,

    /// Solver timeout per contract in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Path to the z3 binary
    #[arg(long = "z3")]
    solver_path: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long)]
    jobs: Option<usize>,
}

impl Settings {
    fn load(&self) -> covenant::Result<Config> {
        let mut config = Config::discover(self.config.as_deref(), Path::new("."))?;
        config.apply(&Overrides {
            no_cache: self.no_cache,
            cache_dir: self.cache_dir.clone(),
            max_cache_size: self.max_cache_size,
            clear_cache: self.clear_cache,
            timeout_ms: self.timeout_ms,
            solver_path: self.solver_path.clone(),
            jobs: self.jobs,
        });
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Verify {
            files,
            settings,
            format,
            deny_disproven,
        } => verify_files(&files, &settings, format, deny_disproven),
        Command::Runtime { file, format } => emit_runtime_checks(&file, format),
        Command::Check {
            file,
            function,
            args,
            result,
        } => check_function(&file, &function, &args, result.as_deref()),
        Command::Hash { file } => hash_contracts(&file),
        Command::Cache {
            action,
            config,
            cache_dir,
        } => manage_cache(action, config.as_deref(), cache_dir),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn verify_files(paths: &[PathBuf], settings: &Settings, format: Format, deny_disproven: bool) -> CliResult {
    let config = settings.load()?;
    let files = paths
        .iter()
        .map(|path| ContractFile::load(path))
        .collect::<covenant::Result<Vec<_>>>()?;

    let verifier = ContractVerifier::from_config(&config);
    let cache = verifier.open_cache(&config.cache);
    let report = verifier.verify_files(&files, &cache);
    cache.close();

    match format {
        Format::Human => print!("{report}"),
        Format::Json => println!("{}", report.to_json()?),
    }

    if deny_disproven && report.has_disproven() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn emit_runtime_checks(path: &Path, format: Format) -> CliResult {
    let file = ContractFile::load(path)?;
    let checks = file_runtime_checks(&file);

    match format {
        Format::Human => {
            for site in &checks {
                match site.check.fragment() {
                    Some(fragment) => println!("{} {}: {fragment}", site.function, site.site),
                    None => {
                        for note in site.check.annotations() {
                            println!("{} {}: {note}", site.function, site.site);
                        }
                    }
                }
            }
        }
        Format::Json => {
            let json: Vec<serde_json::Value> = checks
                .iter()
                .map(|site| {
                    serde_json::json!({
                        "function": site.function,
                        "site": site.site.to_string(),
                        "executable": site.check.is_executable(),
                        "fragment": site.check.fragment(),
                        "static_only": site.check.annotations(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn check_function(path: &Path, function: &str, args: &str, result: Option<&str>) -> CliResult {
    let file = ContractFile::load(path)?;
    let func = file
        .functions
        .iter()
        .find(|f| f.name == function)
        .ok_or_else(|| format!("no function `{function}` in {}", path.display()))?;

    let args: serde_json::Value = serde_json::from_str(args)?;
    let args = args.as_object().ok_or("--args must be a JSON object")?;
    let env = bind_arguments(&func.params, args)?;

    let mut conditions: Vec<(String, _)> = func
        .preconditions
        .iter()
        .enumerate()
        .map(|(i, pre)| (format!("pre #{}", i + 1), &pre.condition))
        .collect();
    if let Some(result) = result {
        let json: serde_json::Value = serde_json::from_str(result)?;
        let value = Value::from_json(&json, &func.ret_ty)
            .ok_or_else(|| format!("--result is not a valid {}", func.ret_ty))?;
        env.borrow_mut().define(RESULT_VAR, value);
        conditions.extend(
            func.postconditions
                .iter()
                .enumerate()
                .map(|(i, post)| (format!("post #{}", i + 1), &post.condition)),
        );
    }

    let mut evaluator = Evaluator::new();
    let mut violated = false;
    for (label, condition) in conditions {
        let check = lower_runtime_check(condition);
        match evaluator.check(&check, &env)? {
            Some(true) => println!("✓ {function}: {label} holds"),
            Some(false) => {
                violated = true;
                println!("✗ {function}: {label} violated: {condition}");
            }
            None => println!("- {function}: {label} is static-only"),
        }
    }

    Ok(if violated { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn hash_contracts(path: &Path) -> CliResult {
    let file = ContractFile::load(path)?;
    for func in &file.functions {
        for (i, pre) in func.preconditions.iter().enumerate() {
            let key = precondition_key(&func.params, &pre.condition);
            println!("{key}  {} pre #{}", func.name, i + 1);
        }
        let assumptions = func.preconditions.iter().map(|p| &p.condition);
        for (i, post) in func.postconditions.iter().enumerate() {
            let key = postcondition_key(
                &func.params,
                &func.ret_ty,
                assumptions.clone(),
                func.body.as_ref(),
                &post.condition,
            );
            println!("{key}  {} post #{}", func.name, i + 1);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn manage_cache(action: CacheAction, config: Option<&Path>, cache_dir: Option<PathBuf>) -> CliResult {
    let mut config = Config::discover(config, Path::new("."))?;
    config.apply(&Overrides {
        cache_dir,
        ..Overrides::default()
    });
    let dir = &config.cache.directory;

    match action {
        CacheAction::Stats => {
            let summary = CacheSummary::inspect(dir)?;
            println!("cache: {}", summary.directory.display());
            println!("entries: {} ({} bytes)", summary.entries, summary.total_bytes);
            match summary.last_session {
                Some(session) => {
                    let stats = session.statistics;
                    println!(
                        "last session: {} (solver {})",
                        session.closed_at.to_rfc3339(),
                        session.solver_build_id
                    );
                    println!(
                        "  {} hit(s), {} miss(es), {} write(s), {} eviction(s), {} error(s), hit rate {:.1}%",
                        stats.hits,
                        stats.misses,
                        stats.writes,
                        stats.evictions,
                        stats.errors,
                        stats.hit_rate() * 100.0
                    );
                }
                None => println!("last session: none"),
            }
        }
        CacheAction::Clear => {
            let removed = clear_directory(dir)?;
            println!("removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" });
        }
    }
    Ok(ExitCode::SUCCESS)
}
