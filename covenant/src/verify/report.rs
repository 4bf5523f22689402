//! Verification reports
//!
//! Per-contract outcomes rolled up per function, per file and per run.
//! Rendered as human-readable text through `Display` or as JSON.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::cache::CacheStatistics;
use super::outcome::{duration_serde, VerificationOutcome};
use crate::error::{CovenantError, Result};

/// Which side of the function a contract sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationKind {
    Precondition,
    Postcondition,
}

impl ObligationKind {
    pub fn short(self) -> &'static str {
        match self {
            ObligationKind::Precondition => "pre",
            ObligationKind::Postcondition => "post",
        }
    }
}

/// Outcome of one contract
#[derive(Debug, Clone, Serialize)]
pub struct ContractReport {
    pub kind: ObligationKind,
    /// 1-based position among the function's contracts of this kind
    pub index: usize,
    /// Source form of the condition
    pub condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Cache key (hex)
    pub key: String,
    pub outcome: VerificationOutcome,
    /// Answered from the cache
    pub cached: bool,
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl ContractReport {
    pub fn label(&self) -> String {
        format!("{} #{}", self.kind.short(), self.index)
    }
}

/// Counts of each outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub proven: usize,
    pub disproven: usize,
    pub unproven: usize,
    pub unsupported: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: &VerificationOutcome) {
        match outcome {
            VerificationOutcome::Proven => self.proven += 1,
            VerificationOutcome::Disproven { .. } => self.disproven += 1,
            VerificationOutcome::Unproven { .. } => self.unproven += 1,
            VerificationOutcome::Unsupported { .. } => self.unsupported += 1,
            VerificationOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: OutcomeCounts) {
        self.proven += other.proven;
        self.disproven += other.disproven;
        self.unproven += other.unproven;
        self.unsupported += other.unsupported;
        self.skipped += other.skipped;
    }

    pub fn total(&self) -> usize {
        self.proven + self.disproven + self.unproven + self.unsupported + self.skipped
    }
}

impl<'a> FromIterator<&'a VerificationOutcome> for OutcomeCounts {
    fn from_iter<I: IntoIterator<Item = &'a VerificationOutcome>>(iter: I) -> Self {
        let mut counts = Self::default();
        for outcome in iter {
            counts.record(outcome);
        }
        counts
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} contract(s): {} proven, {} disproven, {} unproven, {} unsupported, {} skipped",
            self.total(),
            self.proven,
            self.disproven,
            self.unproven,
            self.unsupported,
            self.skipped
        )
    }
}

/// Report for a single function's contracts
#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub contracts: Vec<ContractReport>,
}

impl FunctionReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contracts: Vec::new(),
        }
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.contracts.iter().map(|c| &c.outcome).collect()
    }

    /// Every contract proven
    pub fn is_verified(&self) -> bool {
        self.contracts.iter().all(|c| c.outcome.is_proven())
    }

    /// Some contract disproven
    pub fn has_failure(&self) -> bool {
        self.contracts.iter().any(|c| c.outcome.is_disproven())
    }
}

impl fmt::Display for FunctionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for contract in &self.contracts {
            let marker = match &contract.outcome {
                VerificationOutcome::Proven => "✓",
                VerificationOutcome::Disproven { .. } => "✗",
                VerificationOutcome::Unproven { .. } => "?",
                VerificationOutcome::Unsupported { .. } => "-",
                VerificationOutcome::Skipped => "!",
            };
            write!(f, "{marker} {}: {} {}", self.name, contract.label(), contract.outcome)?;
            if contract.cached {
                write!(f, " [cached]")?;
            }
            writeln!(f)?;
            if contract.outcome.is_disproven() {
                writeln!(f, "    {}", contract.condition)?;
                if let Some(message) = &contract.message {
                    writeln!(f, "    {message}")?;
                }
            }
        }
        Ok(())
    }
}

/// Report for one contract file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub functions: Vec<FunctionReport>,
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl FileReport {
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for function in &self.functions {
            counts.merge(function.counts());
        }
        counts
    }

    pub fn contracts(&self) -> impl Iterator<Item = (&FunctionReport, &ContractReport)> {
        self.functions
            .iter()
            .flat_map(|func| func.contracts.iter().map(move |c| (func, c)))
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        for function in &self.functions {
            write!(f, "{function}")?;
        }
        writeln!(f, "  {} in {}ms", self.counts(), self.elapsed.as_millis())
    }
}

/// Report for a whole verification run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub solver_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_build_id: Option<String>,
    pub cache: CacheStatistics,
    pub totals: OutcomeCounts,
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(files: Vec<FileReport>, solver_build_id: Option<String>, cache: CacheStatistics, elapsed: Duration) -> Self {
        let mut totals = OutcomeCounts::default();
        for file in &files {
            totals.merge(file.counts());
        }
        Self {
            files,
            solver_available: solver_build_id.is_some(),
            solver_build_id,
            cache,
            totals,
            elapsed,
        }
    }

    pub fn has_disproven(&self) -> bool {
        self.totals.disproven > 0
    }

    /// Every contract of every file proven
    pub fn all_verified(&self) -> bool {
        self.totals.proven == self.totals.total()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CovenantError::input(format!("report serialization: {e}")))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            write!(f, "{file}")?;
        }
        writeln!(f)?;
        match &self.solver_build_id {
            Some(id) => writeln!(f, "solver: {id}")?,
            None => writeln!(f, "solver: unavailable, all contracts skipped")?,
        }
        if self.cache.lookups() > 0 || self.cache.writes > 0 {
            writeln!(
                f,
                "cache: {} hit(s), {} miss(es), {} write(s), {} eviction(s), {} error(s)",
                self.cache.hits, self.cache.misses, self.cache.writes, self.cache.evictions, self.cache.errors
            )?;
        }
        if self.all_verified() {
            writeln!(
                f,
                "All {} contract(s) verified in {}ms.",
                self.totals.total(),
                self.elapsed.as_millis()
            )
        } else {
            writeln!(f, "{} in {}ms", self.totals, self.elapsed.as_millis())
        }
    }
}
