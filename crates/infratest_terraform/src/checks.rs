//! Accumulating assertions over terraform outputs.
//!
//! Every check is recorded and evaluation continues, so one run reports all
//! diverging outputs at once.

use std::fmt;

use regex::Regex;
use serde_json::Value;

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Report collecting the outcome of every check in a run.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub checks: Vec<CheckOutcome>,
}

impl CheckReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_check(&mut self, name: &str, passed: bool, message: impl Into<String>) {
        self.checks.push(CheckOutcome {
            name: name.to_string(),
            passed,
            message: message.into(),
        });
    }

    /// Record a check that could not be evaluated (e.g. the output failed to
    /// fetch or decode).
    pub fn fail(&mut self, name: &str, message: impl Into<String>) {
        self.add_check(name, false, message);
    }

    /// Exact string equality.
    pub fn equal(&mut self, name: &str, expected: &str, actual: &str) -> bool {
        let passed = expected == actual;
        let message = if passed {
            format!("{} = {:?}", name, actual)
        } else {
            format!("{}: expected {:?}, got {:?}", name, expected, actual)
        };
        self.add_check(name, passed, message);
        passed
    }

    /// Exact ordered sequence equality.
    pub fn list_equal<S: AsRef<str>>(&mut self, name: &str, expected: &[S], actual: &[String]) -> bool {
        let expected: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
        let passed = expected.len() == actual.len()
            && expected.iter().zip(actual).all(|(e, a)| *e == a.as_str());
        let message = if passed {
            format!("{} = {:?}", name, actual)
        } else {
            format!("{}: expected {:?}, got {:?}", name, expected, actual)
        };
        self.add_check(name, passed, message);
        passed
    }

    /// Regex match.
    pub fn matches(&mut self, name: &str, pattern: &Regex, actual: &str) -> bool {
        let passed = pattern.is_match(actual);
        let message = if passed {
            format!("{} = {:?} matches /{}/", name, actual, pattern.as_str())
        } else {
            format!(
                "{}: {:?} does not match /{}/",
                name,
                actual,
                pattern.as_str()
            )
        };
        self.add_check(name, passed, message);
        passed
    }

    /// Containment; extra items in `haystack` are tolerated.
    pub fn contains<T: PartialEq + fmt::Debug>(&mut self, name: &str, haystack: &[T], needle: &T) -> bool {
        let passed = haystack.contains(needle);
        let message = if passed {
            format!("{} contains {:?}", name, needle)
        } else {
            format!("{}: expected to contain {:?}, got {:?}", name, needle, haystack)
        };
        self.add_check(name, passed, message);
        passed
    }

    /// Absent, null, or an empty string/list/map.
    pub fn empty(&mut self, name: &str, value: Option<&Value>) -> bool {
        let passed = is_empty_value(value);
        let message = if passed {
            format!("{} is empty", name)
        } else {
            format!(
                "{}: expected empty, got {}",
                name,
                value.map(Value::to_string).unwrap_or_default()
            )
        };
        self.add_check(name, passed, message);
        passed
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let mark = if check.passed { "ok" } else { "FAILED" };
            writeln!(f, "  [{}] {}", mark, check.message)?;
        }
        write!(
            f,
            "{} checks, {} failed",
            self.checks.len(),
            self.failure_count()
        )
    }
}

/// Whether an output value counts as empty.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}
