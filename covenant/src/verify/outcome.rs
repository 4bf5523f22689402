//! Verification outcomes

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of checking one contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The obligation holds
    Proven,
    /// The obligation fails; the counterexample names concrete values
    Disproven { counterexample: String },
    /// The solver answered unknown, timed out, or failed
    Unproven {
        #[serde(with = "duration_serde")]
        elapsed: Duration,
    },
    /// The contract uses constructs the solver translation cannot express
    Unsupported { reason: String },
    /// No solver available in this session
    Skipped,
}

impl VerificationOutcome {
    pub fn disproven(counterexample: impl Into<String>) -> Self {
        Self::Disproven {
            counterexample: counterexample.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    /// Only definite answers are persisted
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Proven | Self::Disproven { .. })
    }

    pub fn is_proven(&self) -> bool {
        matches!(self, Self::Proven)
    }

    pub fn is_disproven(&self) -> bool {
        matches!(self, Self::Disproven { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Proven => "proven",
            Self::Disproven { .. } => "disproven",
            Self::Unproven { .. } => "unproven",
            Self::Unsupported { .. } => "unsupported",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proven => write!(f, "proven"),
            Self::Disproven { counterexample } if counterexample.is_empty() => write!(f, "disproven"),
            Self::Disproven { counterexample } => write!(f, "disproven ({counterexample})"),
            Self::Unproven { elapsed } => write!(f, "unproven after {}ms", elapsed.as_millis()),
            Self::Unsupported { reason } => write!(f, "unsupported: {reason}"),
            Self::Skipped => write!(f, "skipped (no solver)"),
        }
    }
}

/// Duration as whole milliseconds
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
