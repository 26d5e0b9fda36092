//! Anomaly rules.
//!
//! A rule is a pure predicate over one record. The loop does not care which
//! rule runs; swapping the suffix test for a real scorer only touches this
//! module.

use crate::error::RuleError;
use shared_types::RequestRecord;

/// Signature test used when nothing else is configured.
pub const DEFAULT_SUFFIX: &str = "70";

/// Result of evaluating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not anomalous.
    Clean,
    /// Anomalous: the source should be blocked.
    Malicious { rule: String, reason: String },
}

impl Verdict {
    pub fn is_malicious(&self) -> bool {
        matches!(self, Verdict::Malicious { .. })
    }
}

/// Substitutable anomaly predicate.
pub trait AnomalyRule: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, record: &RequestRecord) -> Result<Verdict, RuleError>;
}

/// Matches when the textual source address ends with a fixed suffix.
#[derive(Debug, Clone)]
pub struct SuffixRule {
    suffix: String,
}

impl SuffixRule {
    pub fn new(suffix: impl Into<String>) -> Result<Self, RuleError> {
        let suffix = suffix.into();
        if suffix.is_empty() {
            return Err(RuleError::InvalidParameter(
                "suffix cannot be empty".to_string(),
            ));
        }
        Ok(Self { suffix })
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl Default for SuffixRule {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl AnomalyRule for SuffixRule {
    fn name(&self) -> &str {
        "suffix"
    }

    fn evaluate(&self, record: &RequestRecord) -> Result<Verdict, RuleError> {
        if record.source_address.is_empty() {
            return Err(RuleError::MissingField("source_address"));
        }
        if record.source_address.ends_with(&self.suffix) {
            Ok(Verdict::Malicious {
                rule: self.name().to_string(),
                reason: format!("source address ends with {:?}", self.suffix),
            })
        } else {
            Ok(Verdict::Clean)
        }
    }
}

/// Matches if any inner rule matches. Evaluation stops at the first match.
#[derive(Default)]
pub struct AnyRule {
    rules: Vec<Box<dyn AnomalyRule>>,
}

impl AnyRule {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, rule: impl AnomalyRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl AnomalyRule for AnyRule {
    fn name(&self) -> &str {
        "any"
    }

    fn evaluate(&self, record: &RequestRecord) -> Result<Verdict, RuleError> {
        for rule in &self.rules {
            let verdict = rule.evaluate(record)?;
            if verdict.is_malicious() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Clean)
    }
}
