//! Guardrail policy engine
//!
//! Maps a [`ScanReport`](crate::scanner::ScanReport) to a
//! [`GuardrailDecision`]. The policy is a pure function over the report:
//! the same findings and risk score always produce the same decision.

use crate::scanner::ScanReport;
use serde::{Deserialize, Serialize};

/// Decision applied to one scanned message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailDecision {
    /// Text passes through unchanged
    Allow,
    /// Turn is refused; the text never reaches the next stage
    Block,
    /// Sanitized text is used in place of the original
    Sanitize,
}

/// Threshold-based guardrail policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    /// Risk score above which a message is blocked
    pub block_threshold: f64,

    /// Entity categories that force a block regardless of risk score
    pub blocked_categories: Vec<String>,

    /// Sanitize when findings are present (false = allow findings through)
    pub sanitize_on_findings: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            block_threshold: 0.8,
            blocked_categories: Vec::new(),
            sanitize_on_findings: true,
        }
    }
}

impl GuardrailPolicy {
    /// Decide how to handle a scanned message.
    ///
    /// A report with no findings and no risk always yields `Allow`.
    pub fn decide(&self, report: &ScanReport) -> GuardrailDecision {
        if report.risk_score > self.block_threshold {
            return GuardrailDecision::Block;
        }

        if report
            .findings
            .iter()
            .any(|f| self.blocked_categories.iter().any(|c| c == &f.category))
        {
            return GuardrailDecision::Block;
        }

        if !report.findings.is_empty() && self.sanitize_on_findings {
            return GuardrailDecision::Sanitize;
        }

        GuardrailDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Finding;

    fn report(findings: Vec<Finding>, risk_score: f64) -> ScanReport {
        ScanReport {
            findings,
            sanitized_text: String::new(),
            risk_score,
        }
    }

    fn finding(category: &str) -> Finding {
        Finding {
            category: category.to_string(),
            start: 0,
            end: 4,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_empty_report_allows() {
        let policy = GuardrailPolicy::default();
        assert_eq!(
            policy.decide(&report(vec![], 0.0)),
            GuardrailDecision::Allow
        );
    }

    #[test]
    fn test_high_risk_blocks() {
        let policy = GuardrailPolicy::default();
        assert_eq!(
            policy.decide(&report(vec![], 0.95)),
            GuardrailDecision::Block
        );
    }

    #[test]
    fn test_risk_at_threshold_does_not_block() {
        let policy = GuardrailPolicy::default();
        assert_eq!(
            policy.decide(&report(vec![], 0.8)),
            GuardrailDecision::Allow
        );
    }

    #[test]
    fn test_findings_sanitize() {
        let policy = GuardrailPolicy::default();
        assert_eq!(
            policy.decide(&report(vec![finding("SSN")], 0.1)),
            GuardrailDecision::Sanitize
        );
    }

    #[test]
    fn test_blocked_category_blocks() {
        let policy = GuardrailPolicy {
            blocked_categories: vec!["API_KEY".to_string()],
            ..Default::default()
        };
        assert_eq!(
            policy.decide(&report(vec![finding("API_KEY")], 0.0)),
            GuardrailDecision::Block
        );
    }

    #[test]
    fn test_sanitize_disabled_allows_findings() {
        let policy = GuardrailPolicy {
            sanitize_on_findings: false,
            ..Default::default()
        };
        assert_eq!(
            policy.decide(&report(vec![finding("EMAIL")], 0.0)),
            GuardrailDecision::Allow
        );
    }

    #[test]
    fn test_decision_is_deterministic() {
        let policy = GuardrailPolicy::default();
        let r = report(vec![finding("SSN")], 0.3);
        assert_eq!(policy.decide(&r), policy.decide(&r));
    }
}
