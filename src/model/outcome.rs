use crate::model::Role;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use tracing::warn;

/// A condition that degraded a pipeline stage without stopping it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No column of `source` matched `role`.
    UnresolvedColumn { source: String, role: Role },
    /// `source` could not be read. Only sources that are allowed to be missing produce this.
    SourceUnavailable { source: String, reason: String },
    /// The provenance tag of `source` matched no category rule, so its rows were not summed.
    UncategorizedSource { source: String },
    /// `source` has no amount column, so it contributed zero to every station.
    MissingAmountColumn { source: String },
    /// A non-numeric amount was counted as zero. `row` is 1-based within the source data rows.
    AmountCoercedToZero {
        source: String,
        row: usize,
        value: String,
    },
    /// An amount that would push a station's sum out of range was skipped. `row` is 1-based.
    AmountOutOfRange {
        source: String,
        row: usize,
        value: String,
    },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnresolvedColumn { source, role } => {
                write!(f, "No '{role}' column found in '{source}'")
            }
            Diagnostic::SourceUnavailable { source, reason } => {
                write!(f, "Source '{source}' is unavailable: {reason}")
            }
            Diagnostic::UncategorizedSource { source } => {
                write!(f, "Source '{source}' matches no category rule")
            }
            Diagnostic::MissingAmountColumn { source } => {
                write!(f, "Source '{source}' has no amount column, counted as zero")
            }
            Diagnostic::AmountCoercedToZero { source, row, value } => {
                write!(
                    f,
                    "Non-numeric amount '{value}' in '{source}' row {row} counted as zero"
                )
            }
            Diagnostic::AmountOutOfRange { source, row, value } => {
                write!(f, "Amount '{value}' in '{source}' row {row} is out of range, skipped")
            }
        }
    }
}

/// The result of a stage that completed, possibly in a degraded way. Fatal failures are returned
/// as `Err` instead.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Outcome<T> {
    value: T,
    diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when at least one diagnostic was recorded.
    pub fn is_degraded(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}

/// Collects diagnostics for a stage, logging each one as it is recorded.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.0.push(diagnostic);
    }

    pub(crate) fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.0.extend(diagnostics);
    }

    pub(crate) fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome::new(value, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_outcome_is_not_degraded() {
        let outcome = Diagnostics::default().finish(5);
        assert!(!outcome.is_degraded());
        assert_eq!(*outcome.value(), 5);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::UnresolvedColumn {
            source: "Short Cash".into(),
            role: Role::Amount,
        };
        assert_eq!(d.to_string(), "No 'amount' column found in 'Short Cash'");
    }

    #[test]
    fn test_serialize_tagged() {
        let d = Diagnostic::UncategorizedSource {
            source: "X".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"kind":"uncategorized_source","source":"X"}"#);
    }
}
