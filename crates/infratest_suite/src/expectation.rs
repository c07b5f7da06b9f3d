//! Expected output values and their evaluation against a live module.
//!
//! Expected strings are templates: `{id}` is the run's random id,
//! `{prefix}` the derived resource-name prefix, and `{output:NAME}` the
//! actual value of another output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use infratest_terraform::{AsgTag, AsgTags, CheckReport, Terraform, TerraformError};

use crate::error::{SuiteError, SuiteResult};

/// Values substituted into expectation templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub id: String,
    pub prefix: String,
}

impl Placeholders {
    /// `prefix_template` may itself reference `{id}`.
    pub fn new(id: impl Into<String>, prefix_template: Option<&str>) -> Self {
        let id = id.into();
        let prefix = prefix_template
            .map(|t| t.replace("{id}", &id))
            .unwrap_or_else(|| id.clone());
        Self { id, prefix }
    }

    /// Substitute `{id}` and `{prefix}`.
    pub fn apply(&self, template: &str) -> String {
        template
            .replace("{prefix}", &self.prefix)
            .replace("{id}", &self.id)
    }

    /// Substitute inside every string of a JSON value.
    pub fn apply_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.apply_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// How an output is compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// Exact string equality.
    Equals { value: String },
    /// Exact ordered list equality.
    List { values: Vec<String> },
    /// Regex match; substituted placeholders are escaped.
    Matches { pattern: String },
    /// Every listed tag is present; extra tags are fine.
    ContainsTags { tags: Vec<AsgTag> },
    /// Output is absent, null, or empty.
    Empty,
}

impl Expectation {
    /// Substitute `{id}` and `{prefix}` now, leaving `{output:NAME}`
    /// references for evaluation time. Patterns get the escaped values.
    pub fn resolve(&self, placeholders: &Placeholders) -> Self {
        match self {
            Self::Equals { value } => Self::Equals {
                value: placeholders.apply(value),
            },
            Self::List { values } => Self::List {
                values: values.iter().map(|v| placeholders.apply(v)).collect(),
            },
            Self::Matches { pattern } => {
                let escaped = Placeholders {
                    id: regex::escape(&placeholders.id),
                    prefix: regex::escape(&placeholders.prefix),
                };
                Self::Matches {
                    pattern: escaped.apply(pattern),
                }
            }
            Self::ContainsTags { tags } => Self::ContainsTags {
                tags: tags
                    .iter()
                    .map(|t| {
                        AsgTag::new(
                            placeholders.apply(&t.key),
                            placeholders.apply(&t.value),
                            t.propagate_at_launch,
                        )
                    })
                    .collect(),
            },
            Self::Empty => Self::Empty,
        }
    }
}

/// One named output and its expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCheck {
    pub output: String,
    pub expect: Expectation,
}

impl OutputCheck {
    pub fn new(output: impl Into<String>, expect: Expectation) -> Self {
        Self {
            output: output.into(),
            expect,
        }
    }

    /// Reject unusable patterns before anything is provisioned.
    pub fn validate(&self) -> SuiteResult<()> {
        if self.output.trim().is_empty() {
            return Err(SuiteError::InvalidSuite("output name is empty".to_string()));
        }
        if let Expectation::Matches { pattern } = &self.expect {
            let sample = Placeholders::new("sample", Some("sample"));
            let rendered = render_pattern(pattern, &sample, |_| Ok(String::new()))?;
            Regex::new(&rendered).map_err(|source| SuiteError::InvalidPattern {
                output: self.output.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Fetch the output and record the comparison in `report`. Fetch and
    /// decode errors become failed checks so sibling checks still run.
    pub async fn evaluate(&self, tf: &Terraform, placeholders: &Placeholders, report: &mut CheckReport) {
        if let Err(e) = self.try_evaluate(tf, placeholders, report).await {
            report.fail(&self.output, format!("{}: {}", self.output, e));
        }
    }

    async fn try_evaluate(
        &self,
        tf: &Terraform,
        placeholders: &Placeholders,
        report: &mut CheckReport,
    ) -> Result<(), EvalError> {
        let name = self.output.as_str();
        match &self.expect {
            Expectation::Equals { value } => {
                let expected = render(value, placeholders, tf).await?;
                let actual = tf.output(name).await?;
                report.equal(name, &expected, &actual);
            }
            Expectation::List { values } => {
                let expected: Vec<String> = values.iter().map(|v| placeholders.apply(v)).collect();
                let actual = tf.output_list(name).await?;
                report.list_equal(name, &expected, &actual);
            }
            Expectation::Matches { pattern } => {
                let mut referenced = Vec::new();
                for output in referenced_outputs(pattern) {
                    referenced.push((output.clone(), tf.output(&output).await?));
                }
                let rendered = render_pattern(pattern, placeholders, |name| {
                    referenced
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| SuiteError::InvalidSuite(format!("unresolved output {}", name)))
                })?;
                let regex = Regex::new(&rendered).map_err(|source| SuiteError::InvalidPattern {
                    output: name.to_string(),
                    source,
                })?;
                let actual = tf.output(name).await?;
                report.matches(name, &regex, &actual);
            }
            Expectation::ContainsTags { tags } => {
                let actual: AsgTags = tf.output_struct(name).await?;
                for tag in tags {
                    let expected = AsgTag::new(
                        placeholders.apply(&tag.key),
                        placeholders.apply(&tag.value),
                        tag.propagate_at_launch,
                    );
                    match &actual {
                        AsgTags::Records(records) => {
                            report.contains(name, records, &expected);
                        }
                        AsgTags::Map(_) => {
                            let passed = actual.contains(&expected);
                            let message = if passed {
                                format!("{} contains {}={}", name, expected.key, expected.value)
                            } else {
                                format!(
                                    "{}: expected to contain {}={}, got {:?}",
                                    name, expected.key, expected.value, actual
                                )
                            };
                            report.add_check(name, passed, message);
                        }
                    }
                }
            }
            Expectation::Empty => {
                let outputs = tf.output_all().await?;
                report.empty(name, outputs.get(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum EvalError {
    #[error(transparent)]
    Terraform(#[from] TerraformError),
    #[error(transparent)]
    Suite(#[from] SuiteError),
}

/// Names referenced as `{output:NAME}`, in order of appearance.
pub fn referenced_outputs(template: &str) -> Vec<String> {
    const MARKER: &str = "{output:";
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find(MARKER) {
        let after = &rest[start + MARKER.len()..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Substitute `{output:NAME}` references using `lookup`.
fn substitute_outputs<F>(template: &str, mut lookup: F) -> SuiteResult<String>
where
    F: FnMut(&str) -> SuiteResult<String>,
{
    let mut rendered = template.to_string();
    for name in referenced_outputs(template) {
        let value = lookup(&name)?;
        rendered = rendered.replace(&format!("{{output:{}}}", name), &value);
    }
    Ok(rendered)
}

/// Render an equality template, fetching referenced outputs.
async fn render(template: &str, placeholders: &Placeholders, tf: &Terraform) -> Result<String, EvalError> {
    let mut values = Vec::new();
    for name in referenced_outputs(template) {
        values.push((name.clone(), tf.output(&name).await?));
    }
    let with_outputs = substitute_outputs(template, |name| {
        values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| SuiteError::InvalidSuite(format!("unresolved output {}", name)))
    })?;
    Ok(placeholders.apply(&with_outputs))
}

/// Render a regex template; substituted values are matched literally.
fn render_pattern<F>(pattern: &str, placeholders: &Placeholders, mut lookup: F) -> SuiteResult<String>
where
    F: FnMut(&str) -> SuiteResult<String>,
{
    let escaped = Placeholders {
        id: regex::escape(&placeholders.id),
        prefix: regex::escape(&placeholders.prefix),
    };
    let with_outputs = substitute_outputs(pattern, |name| lookup(name).map(|v| regex::escape(&v)))?;
    Ok(escaped.apply(&with_outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholders() {
        let p = Placeholders::new("abc123", Some("eg-test-suite-{id}"));
        assert_eq!(p.prefix, "eg-test-suite-abc123");
        assert_eq!(p.apply("{prefix}-workers"), "eg-test-suite-abc123-workers");
        assert_eq!(p.apply_value(&json!(["{id}"])), json!(["abc123"]));
        assert_eq!(p.apply_value(&json!({"a": ["{id}", 1]})), json!({"a": ["abc123", 1]}));
    }

    #[test]
    fn test_referenced_outputs() {
        assert_eq!(
            referenced_outputs("arn:aws:ec2:us-east-2:1:launch-template/{output:launch_template_id}"),
            vec!["launch_template_id"]
        );
        assert!(referenced_outputs("{prefix}-workers").is_empty());
        assert!(referenced_outputs("{output:unterminated").is_empty());
    }

    #[test]
    fn test_render_pattern_escapes_values() {
        let p = Placeholders::new("a.b", Some("eg-{id}"));
        let rendered = render_pattern("^{prefix}-", &p, |_| Ok(String::new())).unwrap();
        let re = Regex::new(&rendered).unwrap();

        assert!(re.is_match("eg-a.b-20210416185727403200000006"));
        assert!(!re.is_match("eg-aXb-20210416185727403200000006"));
    }

    #[test]
    fn test_resolve_keeps_output_references() {
        let p = Placeholders::new("a.b", Some("eg-{id}"));

        let matches = Expectation::Matches {
            pattern: "^{prefix}-".to_string(),
        };
        match matches.resolve(&p) {
            Expectation::Matches { pattern } => {
                let re = Regex::new(&pattern).unwrap();
                assert!(re.is_match("eg-a.b-x"));
                assert!(!re.is_match("eg-aXb-x"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let arn = Expectation::Equals {
            value: "{prefix}/{output:launch_template_id}".to_string(),
        };
        assert_eq!(
            arn.resolve(&p),
            Expectation::Equals {
                value: "eg-a.b/{output:launch_template_id}".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let check = OutputCheck::new(
            "autoscaling_group_name",
            Expectation::Matches {
                pattern: "^({prefix}".to_string(),
            },
        );
        assert!(matches!(check.validate(), Err(SuiteError::InvalidPattern { .. })));

        let empty_name = OutputCheck::new(" ", Expectation::Empty);
        assert!(matches!(empty_name.validate(), Err(SuiteError::InvalidSuite(_))));
    }

    #[test]
    fn test_expectation_yaml_shape() {
        let yaml = r#"
- output: vpc_cidr
  expect:
    kind: equals
    value: 172.16.0.0/16
- output: autoscaling_group_tags
  expect:
    kind: contains_tags
    tags:
      - key: Name
        value: "{prefix}"
        propagate_at_launch: true
- output: datadog_monitor_names
  expect:
    kind: empty
"#;
        let checks: Vec<OutputCheck> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(checks.len(), 3);
        assert_eq!(
            checks[0].expect,
            Expectation::Equals {
                value: "172.16.0.0/16".to_string()
            }
        );
        assert_eq!(checks[2].expect, Expectation::Empty);
    }
}
