//! Advisory warnings and the sinks that receive them.
//!
//! Warnings never abort preparation. Each operation returns the warnings it
//! produced as values; the [`Preparation`](crate::Preparation) orchestrator
//! forwards them to an injected [`WarningSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use tabprep::{Preparation, CollectingSink};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(CollectingSink::new());
//! let prepared = Preparation::builder()
//!     .config(config)
//!     .warning_sink(sink.clone())
//!     .build()?
//!     .prepare(&input)?;
//!
//! for warning in sink.warnings() {
//!     println!("[{}] {}", warning.kind, warning.message);
//! }
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Category of an advisory warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The target column is also listed as a feature
    TargetInFeatures,
    /// The groups column is the target column
    GroupsAreTarget,
    /// The groups column is also listed as a feature
    GroupsInFeatures,
    /// Confound columns are also listed as features
    ConfoundsInFeatures,
    /// Target does not fit the problem type, tolerated because the target is transformed
    ProblemTypeMismatch,
    /// Number of distinct target values hints at another problem type
    SuspiciousClassCount,
    /// Groups were given but the CV scheme does not use them
    GroupsIgnoredByCv,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetInFeatures => "target_in_features",
            Self::GroupsAreTarget => "groups_are_target",
            Self::GroupsInFeatures => "groups_in_features",
            Self::ConfoundsInFeatures => "confounds_in_features",
            Self::ProblemTypeMismatch => "problem_type_mismatch",
            Self::SuspiciousClassCount => "suspicious_class_count",
            Self::GroupsIgnoredByCv => "groups_ignored_by_cv",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal finding surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl PrepWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PrepWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Receives advisory warnings.
///
/// Implementations must be `Send + Sync` so a single sink can be shared by
/// preparations running on different threads.
pub trait WarningSink: Send + Sync {
    fn warn(&self, warning: &PrepWarning);
}

/// Wrapper that implements [`WarningSink`] using a closure.
pub struct ClosureWarningSink<F>
where
    F: Fn(&PrepWarning) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureWarningSink<F>
where
    F: Fn(&PrepWarning) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> WarningSink for ClosureWarningSink<F>
where
    F: Fn(&PrepWarning) + Send + Sync,
{
    fn warn(&self, warning: &PrepWarning) {
        (self.callback)(warning);
    }
}

/// Stores every warning it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: Mutex<Vec<PrepWarning>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the warnings received so far.
    pub fn warnings(&self) -> Vec<PrepWarning> {
        self.warnings.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.lock().is_empty()
    }

    /// Take the stored warnings, leaving the sink empty.
    pub fn drain(&self) -> Vec<PrepWarning> {
        std::mem::take(&mut *self.warnings.lock())
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, warning: &PrepWarning) {
        self.warnings.lock().push(warning.clone());
    }
}

/// Emits warnings as `tracing` events. Default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, warning: &PrepWarning) {
        warn!(kind = %warning.kind, "{}", warning.message);
    }
}

static_assertions::assert_impl_all!(CollectingSink: Send, Sync);
static_assertions::assert_impl_all!(PrepWarning: Send, Sync);
