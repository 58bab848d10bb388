//! Conformance report types: results, severity levels, and report aggregation.

use serde::Serialize;

/// Severity level of a conformance check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The check passed.
    Pass,
    /// The check identified a warning (non-blocking).
    Warning,
    /// The check failed (blocks conformance).
    Failure,
}

impl Severity {
    /// Returns the tag printed in front of a result line.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Severity::Pass => "PASS",
            Severity::Warning => "WARN",
            Severity::Failure => "FAIL",
        }
    }
}

/// A single conformance check result.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Short identifier of the validator that produced this result.
    pub validator: String,
    /// Human-readable message describing the outcome.
    pub message: String,
    /// Severity of the result.
    pub severity: Severity,
    /// Optional additional detail lines.
    pub details: Vec<String>,
}

impl TestResult {
    /// Creates a passing result.
    pub fn pass(validator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(validator, message, Severity::Pass, Vec::new())
    }

    /// Creates a failure result.
    pub fn fail(validator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(validator, message, Severity::Failure, Vec::new())
    }

    /// Creates a failure result with additional detail lines.
    pub fn fail_with_details(
        validator: impl Into<String>,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        Self::new(validator, message, Severity::Failure, details)
    }

    /// Creates a warning result.
    pub fn warn(validator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(validator, message, Severity::Warning, Vec::new())
    }

    /// Passes when `details` is empty, otherwise fails listing them.
    pub fn check(
        validator: impl Into<String>,
        passed: impl Into<String>,
        failed: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        if details.is_empty() {
            Self::pass(validator, passed)
        } else {
            Self::fail_with_details(validator, failed, details)
        }
    }

    fn new(
        validator: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        details: Vec<String>,
    ) -> Self {
        Self {
            validator: validator.into(),
            message: message.into(),
            severity,
            details,
        }
    }

    /// Returns true if this result represents a failure.
    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

/// Aggregated conformance report from all validators.
#[derive(Debug, Default, Serialize)]
pub struct ConformanceReport {
    /// All individual test results across all validators.
    pub results: Vec<TestResult>,
}

impl ConformanceReport {
    /// Creates a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result to this report.
    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Extends this report with results from another report.
    pub fn extend(&mut self, other: ConformanceReport) {
        self.results.extend(other.results);
    }

    /// Returns the count of results with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.results.iter().filter(|r| r.severity == severity).count()
    }

    /// Returns the count of failed checks.
    pub fn failure_count(&self) -> usize {
        self.count(Severity::Failure)
    }

    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        self.failure_count() == 0
    }

    /// Results produced by one validator.
    pub fn by_validator<'a>(&'a self, validator: &'a str) -> impl Iterator<Item = &'a TestResult> {
        self.results.iter().filter(move |r| r.validator == validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_fails_only_with_details() {
        let ok = TestResult::check("layout", "fine", "broken", Vec::new());
        let bad = TestResult::check("layout", "fine", "broken", vec!["x".to_owned()]);
        assert_eq!(ok.severity, Severity::Pass);
        assert!(bad.is_failure());
        assert_eq!(bad.message, "broken");
    }

    #[test]
    fn warnings_do_not_fail_the_report() {
        let mut report = ConformanceReport::new();
        report.push(TestResult::pass("a", "ok"));
        report.push(TestResult::warn("a", "hmm"));
        assert!(report.all_passed());
        report.push(TestResult::fail("b", "no"));
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.by_validator("a").count(), 2);
    }
}
