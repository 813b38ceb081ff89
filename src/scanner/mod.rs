//! Sensitive-data scanning
//!
//! A scanner takes a piece of text and produces a [`ScanReport`]: the
//! findings (entity category + span + confidence), a sanitized rendition of
//! the text with findings replaced by `[CATEGORY]` labels, and a semantic
//! risk score used by the guardrail policy.
//!
//! Two backends implement [`SensitivityScanner`]:
//! - [`RuleScanner`]: local regex rules, no external service required
//! - [`RemoteScanner`]: data-discovery + semantic-guardrail REST services

mod remote;
mod rules;

pub use remote::RemoteScanner;
pub use rules::RuleScanner;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single sensitive-data finding.
///
/// Spans are byte offsets into the scanned text and are never mutated after
/// the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Entity category (e.g. "SSN", "EMAIL", "CREDIT_CARD")
    pub category: String,
    /// Start byte offset in the scanned text
    pub start: usize,
    /// End byte offset in the scanned text
    pub end: usize,
    /// Detection confidence (0.0 to 1.0)
    pub confidence: f64,
}

/// Result of scanning one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// All findings, ordered by start offset
    pub findings: Vec<Finding>,
    /// Text with findings replaced by `[CATEGORY]` labels
    pub sanitized_text: String,
    /// Semantic risk score (0.0 to 1.0)
    pub risk_score: f64,
}

impl ScanReport {
    /// Report for text that was not scanned (protection disabled).
    pub fn passthrough(text: &str) -> Self {
        Self {
            findings: Vec::new(),
            sanitized_text: text.to_string(),
            risk_score: 0.0,
        }
    }
}

/// Direction of the message being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDirection {
    /// User input headed to the model
    UserToAi,
    /// Model output headed back to the user
    AiToUser,
}

/// Options for a single scan call
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Message direction (selects guardrail processors)
    pub direction: ScanDirection,
    /// Request tokenization instead of redaction.
    ///
    /// Backends without tokenization support fall back to redaction.
    pub tokenize: bool,
}

impl ScanOptions {
    /// Options for scanning user input
    pub fn input(tokenize: bool) -> Self {
        Self {
            direction: ScanDirection::UserToAi,
            tokenize,
        }
    }

    /// Options for scanning a model reply
    pub fn output(tokenize: bool) -> Self {
        Self {
            direction: ScanDirection::AiToUser,
            tokenize,
        }
    }
}

/// Pluggable sensitive-data scanner interface
#[async_trait]
pub trait SensitivityScanner: Send + Sync {
    /// Scan text and return findings plus a sanitized rendition.
    async fn scan(&self, text: &str, opts: ScanOptions) -> Result<ScanReport>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Replace each finding's span with a `[CATEGORY]` label.
///
/// Findings are applied back-to-front so earlier offsets stay valid.
/// Overlapping or out-of-bounds spans are skipped; spans that do not fall
/// on char boundaries (possible with remote offsets) are skipped as well.
pub fn apply_redactions(text: &str, findings: &[Finding]) -> String {
    let mut spans: Vec<&Finding> = findings
        .iter()
        .filter(|f| {
            f.start < f.end
                && f.end <= text.len()
                && text.is_char_boundary(f.start)
                && text.is_char_boundary(f.end)
        })
        .collect();
    spans.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = text.to_string();
    let mut applied_start = text.len() + 1;
    for f in spans {
        if f.end > applied_start {
            continue;
        }
        result.replace_range(f.start..f.end, &format!("[{}]", f.category));
        applied_start = f.start;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(category: &str, start: usize, end: usize) -> Finding {
        Finding {
            category: category.to_string(),
            start,
            end,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_apply_redactions_single() {
        let text = "My SSN is 123-45-6789";
        let redacted = apply_redactions(text, &[finding("SSN", 10, 21)]);
        assert_eq!(redacted, "My SSN is [SSN]");
    }

    #[test]
    fn test_apply_redactions_multiple_preserves_offsets() {
        let text = "mail a@b.io then call 555-123-4567";
        let findings = vec![finding("EMAIL", 5, 11), finding("PHONE", 22, 34)];
        let redacted = apply_redactions(text, &findings);
        assert_eq!(redacted, "mail [EMAIL] then call [PHONE]");
    }

    #[test]
    fn test_apply_redactions_skips_overlap() {
        let text = "0123456789";
        let findings = vec![finding("A", 2, 8), finding("B", 4, 9)];
        let redacted = apply_redactions(text, &findings);
        // One of the overlapping spans is applied, never both
        assert_eq!(redacted.matches('[').count(), 1);
    }

    #[test]
    fn test_apply_redactions_out_of_bounds_ignored() {
        let text = "short";
        let redacted = apply_redactions(text, &[finding("X", 2, 99)]);
        assert_eq!(redacted, "short");
    }

    #[test]
    fn test_passthrough_report() {
        let report = ScanReport::passthrough("hello");
        assert!(report.findings.is_empty());
        assert_eq!(report.sanitized_text, "hello");
        assert_eq!(report.risk_score, 0.0);
    }
}
